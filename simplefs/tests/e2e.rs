//! End-to-end scenarios and write/read property tests driven entirely through the
//! public [`FileSystem`] API, against an in-memory device.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simplefs::{Error, FileSystem, MemDisk, BLOCK_SIZE};

const POINTERS_PER_INODE: usize = 5;
const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 4;
const MAX_FILE_SIZE: usize = (POINTERS_PER_INODE + POINTERS_PER_BLOCK) * BLOCK_SIZE;

fn fresh(nblocks: u32) -> FileSystem<MemDisk> {
	let mut fs = FileSystem::new(MemDisk::new(nblocks));
	fs.format().unwrap();
	fs.mount().unwrap();
	fs
}

/// E1 — formatting a fresh 20-block device sizes the inode table to ten percent:
/// `ninodeblocks == 2`, so `ninodes == 256` and inumbers 1..255 are creatable before
/// the 256th `create` fails for want of a free slot — observable purely through the
/// public API, without reaching into the superblock.
#[test]
fn e1_format_fresh() {
	let mut fs = fresh(20);
	for expected in 1..256u32 {
		assert_eq!(fs.create().unwrap(), expected);
	}
	assert!(matches!(fs.create(), Err(Error::NoFreeInode)));
}

/// E2 — a second `mount` on an already-mounted filesystem is rejected.
#[test]
fn e2_double_mount_rejected() {
	let mut fs = fresh(20);
	assert!(matches!(fs.mount(), Err(Error::AlreadyMounted)));
}

/// E3 — create/delete symmetry: the first inumber handed out is reused after delete.
#[test]
fn e3_create_delete_symmetry() {
	let mut fs = fresh(20);
	let inum = fs.create().unwrap();
	assert_eq!(inum, 1);
	assert_eq!(fs.getsize(1).unwrap(), 0);
	fs.delete(1).unwrap();
	assert_eq!(fs.create().unwrap(), 1);
}

/// E4 — a small write/read round-trips exactly.
#[test]
fn e4_small_write_read() {
	let mut fs = fresh(20);
	let inum = fs.create().unwrap();
	let n = fs.write(inum, b"hello", 0).unwrap();
	assert_eq!(n, 5);
	assert_eq!(fs.getsize(inum).unwrap(), 5);

	let mut out = [0u8; 5];
	let n = fs.read(inum, &mut out, 0).unwrap();
	assert_eq!(n, 5);
	assert_eq!(&out, b"hello");
}

/// E5 — a write spanning exactly two blocks occupies `direct[0]` and `direct[1]`.
#[test]
fn e5_cross_block_write() {
	let mut fs = fresh(400);
	let inum = fs.create().unwrap();
	let pattern: Vec<u8> = (0..BLOCK_SIZE * 2).map(|i| (i % 256) as u8).collect();

	let n = fs.write(inum, &pattern, 0).unwrap();
	assert_eq!(n, pattern.len());
	assert_eq!(fs.getsize(inum).unwrap(), pattern.len() as u32);

	let mut out = vec![0u8; pattern.len()];
	let n = fs.read(inum, &mut out, 0).unwrap();
	assert_eq!(n, pattern.len());
	assert_eq!(out, pattern);
}

/// E6 — writing past all direct pointers engages the indirect block.
#[test]
fn e6_indirect_engagement() {
	let mut fs = fresh(4096);
	let inum = fs.create().unwrap();
	let len = (POINTERS_PER_INODE + 1) * BLOCK_SIZE;
	let data = vec![0xAB; len];

	let n = fs.write(inum, &data, 0).unwrap();
	assert_eq!(n, len);

	let mut out = vec![0u8; len];
	fs.read(inum, &mut out, 0).unwrap();
	assert_eq!(out, data);
}

/// E7 — writing past the device's free capacity returns a short count, and the bytes
/// that did land are readable afterwards.
#[test]
fn e7_disk_full_then_recover() {
	// 3 blocks: block 0 is the superblock, block 1 is the sole inode block, leaving
	// exactly one free data block.
	let mut fs = fresh(3);
	let inum = fs.create().unwrap();
	let data = vec![7u8; BLOCK_SIZE * 2];

	let n = fs.write(inum, &data, 0).unwrap();
	assert_eq!(n, BLOCK_SIZE);
	assert_eq!(fs.getsize(inum).unwrap(), BLOCK_SIZE as u32);

	let mut out = vec![0u8; BLOCK_SIZE];
	let n = fs.read(inum, &mut out, 0).unwrap();
	assert_eq!(n, BLOCK_SIZE);
	assert_eq!(out, data[..BLOCK_SIZE]);
}

/// A write that would cross the maximum file size stops exactly at the boundary and
/// still reports success for the bytes that fit.
#[test]
fn write_stops_at_max_file_size() {
	// Enough blocks that running out of free space is never what stops the write:
	// the file needs POINTERS_PER_INODE + POINTERS_PER_BLOCK data blocks plus one more
	// for the indirect block itself, and roughly a tenth of the device is reserved for
	// the inode table, so the device must be sized with that overhead in mind.
	let nblocks = 2000u32;
	let mut fs = fresh(nblocks);
	let inum = fs.create().unwrap();
	let data = vec![1u8; MAX_FILE_SIZE + BLOCK_SIZE];

	let n = fs.write(inum, &data, 0).unwrap();
	assert_eq!(n, MAX_FILE_SIZE);
	assert_eq!(fs.getsize(inum).unwrap(), MAX_FILE_SIZE as u32);
}

/// Property test: a sequence of non-overlapping, randomly sized writes into a single
/// file, replayed against a plain `Vec<u8>` model, reads back identically through the
/// real filesystem, for several random seeds.
#[test]
fn write_then_read_matches_a_plain_byte_buffer_model() {
	for seed in 0..8u64 {
		let mut rng = StdRng::seed_from_u64(seed);
		let mut fs = fresh(2048);
		let inum = fs.create().unwrap();

		let mut model = Vec::new();
		let mut offset = 0u32;
		for _ in 0..20 {
			let len = rng.gen_range(1..=3 * BLOCK_SIZE);
			let chunk: Vec<u8> = (0..len).map(|_| rng.gen()).collect();

			let written = fs.write(inum, &chunk, offset).unwrap();
			if written < chunk.len() {
				// ran out of space or hit the max file size; stop growing the model
				model.extend_from_slice(&chunk[..written]);
				break;
			}
			model.extend_from_slice(&chunk);
			offset += written as u32;
		}

		assert_eq!(fs.getsize(inum).unwrap() as usize, model.len());
		let mut out = vec![0u8; model.len()];
		let n = fs.read(inum, &mut out, 0).unwrap();
		assert_eq!(n, model.len());
		assert_eq!(out, model, "seed {seed} mismatched");
	}
}

/// Property test: several independently created files never end up sharing a data
/// block, even when each grows to use its indirect block.
#[test]
fn independent_files_never_share_blocks() {
	let mut rng = StdRng::seed_from_u64(42);
	let mut fs = fresh(20_000);

	let inodes: Vec<u32> = (0..6).map(|_| fs.create().unwrap()).collect();
	let mut models = vec![Vec::new(); inodes.len()];

	for _ in 0..30 {
		let i = rng.gen_range(0..inodes.len());
		let len = rng.gen_range(1..=2 * BLOCK_SIZE);
		let chunk: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
		let offset = models[i].len() as u32;
		let written = fs.write(inodes[i], &chunk, offset).unwrap();
		models[i].extend_from_slice(&chunk[..written]);
	}

	for (i, inum) in inodes.iter().enumerate() {
		let mut out = vec![0u8; models[i].len()];
		fs.read(*inum, &mut out, 0).unwrap();
		assert_eq!(out, models[i], "inode {inum} corrupted, cross-file block sharing?");
	}
}
