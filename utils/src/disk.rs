//! Implements disk-related utility functions.

use libc::ioctl;
use std::ffi::c_long;
use std::fs::File;
use std::io::Error;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;

/// ioctl macro: Command.
macro_rules! ioc {
	($a:expr, $b:expr, $c:expr, $d:expr) => {
		(($a) << 30) | (($b) << 8) | ($c) | (($d) << 16)
	};
}

/// ioctl macro: Read command.
#[macro_export]
macro_rules! ior {
	($a:expr, $b:expr, $c:ty) => {
		ioc!(2, $a, $b, std::mem::size_of::<$c>() as c_long)
	};
}

/// ioctl command: Get size of disk in number of bytes.
const BLKGETSIZE64: c_long = ior!(0x12, 114, u64);

/// Returns the size in bytes of the device or regular file backing `file`.
///
/// For a block or character special file, the size is obtained through the `BLKGETSIZE64`
/// ioctl rather than `stat`, since special files do not carry a meaningful length in their
/// metadata.
pub fn get_disk_size(file: &File) -> io::Result<u64> {
	let metadata = file.metadata()?;
	let file_type = metadata.file_type();

	if file_type.is_block_device() || file_type.is_char_device() {
		let mut size = 0;
		let ret = unsafe {
			ioctl(file.as_raw_fd(), BLKGETSIZE64 as _, &mut size)
		};
		if ret < 0 {
			return Err(Error::last_os_error());
		}
		Ok(size)
	} else {
		Ok(metadata.len())
	}
}
