//! The block device abstraction the filesystem is layered over, plus two concrete
//! backends: a real file or block special device, and an in-memory stand-in for tests.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use utils::disk::get_disk_size;

use crate::error::{Error, Result};
use crate::layout::BLOCK_SIZE;

/// A fixed-size, block-addressable storage device.
///
/// Implementors own whatever state is needed to turn a block number into bytes;
/// [`FileSystem`](crate::fs::FileSystem) never assumes anything about the backing
/// medium beyond this trait.
pub trait BlockDevice {
	/// The device's total block count. Never changes for the lifetime of the device.
	fn block_count(&self) -> u32;

	/// The size in bytes of one block. Always [`BLOCK_SIZE`] for this filesystem.
	fn block_size(&self) -> usize {
		BLOCK_SIZE
	}

	/// Reads block `blockno` in full into `buf`.
	fn read_block(&mut self, blockno: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

	/// Writes `buf` to block `blockno` in full.
	fn write_block(&mut self, blockno: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()>;
}

fn check_range(blockno: u32, nblocks: u32) -> Result<()> {
	if blockno >= nblocks {
		return Err(Error::OutOfRange { blockno, nblocks });
	}
	Ok(())
}

/// A block device backed by a regular file or a block special device (`/dev/sdX`,
/// a loopback image, ...).
pub struct FileDisk {
	file: File,
	nblocks: u32,
}

impl FileDisk {
	/// Opens an existing image or block device, sizing the filesystem to whatever
	/// fits in whole blocks. For a block special file this uses the `BLKGETSIZE64`
	/// ioctl rather than file metadata, since special files carry no meaningful
	/// length of their own.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		let size = get_disk_size(&file)?;
		Ok(Self { file, nblocks: (size / BLOCK_SIZE as u64) as u32 })
	}

	/// Creates a new regular file of exactly `nblocks` blocks and opens it as a disk.
	/// Refuses to truncate a file that already exists.
	pub fn create(path: impl AsRef<Path>, nblocks: u32) -> Result<Self> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create_new(true)
			.open(path)?;
		file.set_len(nblocks as u64 * BLOCK_SIZE as u64)?;
		Ok(Self { file, nblocks })
	}
}

impl BlockDevice for FileDisk {
	fn block_count(&self) -> u32 {
		self.nblocks
	}

	fn read_block(&mut self, blockno: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
		check_range(blockno, self.nblocks)?;
		self.file.seek(SeekFrom::Start(blockno as u64 * BLOCK_SIZE as u64))?;
		self.file.read_exact(buf)?;
		Ok(())
	}

	fn write_block(&mut self, blockno: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
		check_range(blockno, self.nblocks)?;
		self.file.seek(SeekFrom::Start(blockno as u64 * BLOCK_SIZE as u64))?;
		self.file.write_all(buf)?;
		Ok(())
	}
}

/// An in-memory block device, for tests and anything else that would rather not touch
/// the filesystem.
pub struct MemDisk {
	blocks: Vec<[u8; BLOCK_SIZE]>,
}

impl MemDisk {
	/// Creates a zero-filled device of `nblocks` blocks.
	pub fn new(nblocks: u32) -> Self {
		Self { blocks: vec![[0u8; BLOCK_SIZE]; nblocks as usize] }
	}
}

impl BlockDevice for MemDisk {
	fn block_count(&self) -> u32 {
		self.blocks.len() as u32
	}

	fn read_block(&mut self, blockno: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
		let nblocks = self.block_count();
		check_range(blockno, nblocks)?;
		buf.copy_from_slice(&self.blocks[blockno as usize]);
		Ok(())
	}

	fn write_block(&mut self, blockno: u32, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
		let nblocks = self.block_count();
		check_range(blockno, nblocks)?;
		self.blocks[blockno as usize].copy_from_slice(buf);
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn mem_disk_round_trips_blocks() {
		let mut disk = MemDisk::new(4);
		let mut buf = [0u8; BLOCK_SIZE];
		buf[0] = 7;
		buf[BLOCK_SIZE - 1] = 9;
		disk.write_block(2, &buf).unwrap();

		let mut out = [0u8; BLOCK_SIZE];
		disk.read_block(2, &mut out).unwrap();
		assert_eq!(buf, out);

		// untouched blocks stay zeroed
		let mut zero = [0u8; BLOCK_SIZE];
		disk.read_block(0, &mut zero).unwrap();
		assert_eq!(zero, [0u8; BLOCK_SIZE]);
	}

	#[test]
	fn mem_disk_rejects_out_of_range() {
		let mut disk = MemDisk::new(2);
		let buf = [0u8; BLOCK_SIZE];
		match disk.write_block(2, &buf) {
			Err(Error::OutOfRange { blockno: 2, nblocks: 2 }) => {}
			other => panic!("expected OutOfRange, got {other:?}"),
		}
	}
}
