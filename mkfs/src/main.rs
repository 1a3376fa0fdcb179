//! `mkfs` creates a fresh simplefs filesystem on a device or image file, the way this
//! toolbox's other commands work: parse a small, fixed argument list, do one thing,
//! print to stderr and exit nonzero on failure. It is deliberately not an interactive
//! shell — there is no command loop, only a one-shot format (and optional dump).

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::exit;

use simplefs::layout::{Superblock, MAGIC};
use simplefs::{BlockDevice, Error, FileDisk, FileSystem, BLOCK_SIZE};
use utils::prompt::prompt;

/// Command line arguments, parsed by hand the way this toolbox's other commands do.
#[derive(Default)]
struct Args {
	/// Program name as invoked, used in diagnostics.
	prog: String,
	/// Path to the device or image file to format.
	device_path: Option<PathBuf>,
	/// Print the superblock and inode table after formatting.
	debug: bool,
	/// Print usage and exit.
	help: bool,
}

fn parse_args() -> Args {
	let mut args = Args::default();
	let mut iter = env::args();

	args.prog = iter.next().unwrap_or_else(|| "mkfs".to_owned());

	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			"--debug" => args.debug = true,
			_ => args.device_path = Some(PathBuf::from(arg)),
		}
	}

	args
}

fn print_usage(prog: &str) {
	eprintln!("usage: {prog} [--debug] <device>");
	eprintln!("    --debug   dump the superblock and inode table after formatting");
}

/// Peeks at block 0 of `device` directly, so a previously-formatted disk can be
/// detected and confirmed before `format` runs, without needing a successful `mount`
/// just to ask the question.
fn already_formatted(device: &mut FileDisk) -> Result<bool, Error> {
	let mut buf = [0u8; BLOCK_SIZE];
	device.read_block(0, &mut buf)?;
	Ok(Superblock::decode(&buf).magic == MAGIC)
}

fn main() {
	let args = parse_args();

	if args.help {
		print_usage(&args.prog);
		exit(0);
	}

	let device_path = args.device_path.unwrap_or_else(|| {
		print_usage(&args.prog);
		exit(1);
	});

	let mut device = FileDisk::open(&device_path).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, device_path.display(), e);
		exit(1);
	});

	match already_formatted(&mut device) {
		Ok(true) => {
			println!("{} already contains a simplefs filesystem", device_path.display());
			let confirm = prompt(Some("Proceed anyway? (y/N) "), false)
				.map(|s| s.to_lowercase() == "y")
				.unwrap_or(false);
			if !confirm {
				eprintln!("Abort.");
				exit(1);
			}
		}
		Ok(false) => {}
		Err(e) => {
			eprintln!("{}: {}: {}", args.prog, device_path.display(), e);
			exit(1);
		}
	}

	let mut fs = FileSystem::new(device);
	fs.format().unwrap_or_else(|e| {
		eprintln!("{}: failed to create filesystem: {}", args.prog, e);
		exit(1);
	});

	if args.debug {
		fs.debug(&mut io::stdout()).unwrap_or_else(|e| {
			eprintln!("{}: {}", args.prog, e);
			exit(1);
		});
	}
}
