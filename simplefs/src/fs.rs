//! The public filesystem API: format, mount, create, delete, getsize, read, write and
//! debug, layered over any [`BlockDevice`].

use std::io::Write as _;

use crate::bitmap::Bitmap;
use crate::disk::BlockDevice;
use crate::error::{Error, Result};
use crate::inode_store;
use crate::layout::{
	read_pointer, Inode, Superblock, BLOCK_SIZE, INODES_PER_BLOCK, MAGIC, POINTERS_PER_BLOCK,
};
use crate::walker::{self, IndirectCache};

/// A mountable filesystem over a device `D`.
///
/// Mount state (the superblock and the free block bitmap) lives on the `FileSystem`
/// value itself, not in any process-wide global, so a single process can hold several
/// filesystems mounted at once, each against its own device.
pub struct FileSystem<D: BlockDevice> {
	device: D,
	mounted: bool,
	superblock: Option<Superblock>,
	bitmap: Option<Bitmap>,
}

impl<D: BlockDevice> FileSystem<D> {
	/// Wraps `device` in an unmounted filesystem handle.
	pub fn new(device: D) -> Self {
		Self { device, mounted: false, superblock: None, bitmap: None }
	}

	/// Whether `mount` has succeeded and `format`/`unmount` hasn't happened since.
	pub fn is_mounted(&self) -> bool {
		self.mounted
	}

	/// Hands the underlying device back, discarding any mount state.
	pub fn into_device(self) -> D {
		self.device
	}

	fn require_mounted(&self) -> Result<()> {
		if self.mounted {
			Ok(())
		} else {
			Err(Error::NotMounted)
		}
	}

	fn superblock(&self) -> &Superblock {
		self.superblock.as_ref().expect("mounted implies a cached superblock")
	}

	fn validate_inum(&self, inum: u32) -> Result<()> {
		let sb = self.superblock();
		if inum == 0 || inum >= sb.ninodes as u32 {
			return Err(Error::InvalidInumber(inum));
		}
		Ok(())
	}

	fn load_inode(&mut self, inum: u32) -> Result<Inode> {
		self.require_mounted()?;
		self.validate_inum(inum)?;
		inode_store::load(&mut self.device, inum)
	}

	fn store_inode(&mut self, inum: u32, inode: &Inode) -> Result<()> {
		inode_store::store(&mut self.device, inum, inode)
	}

	/// Writes a fresh superblock and an empty inode table to the device.
	///
	/// Refuses to run against a filesystem that's currently mounted (on this handle or,
	/// for a backing file another process has mounted, presumably elsewhere) — formatting
	/// out from under a live mount would invalidate its cached bitmap and superblock.
	/// Formatting an already-formatted, unmounted device is allowed and simply starts
	/// over: every existing file is lost.
	pub fn format(&mut self) -> Result<()> {
		if self.mounted {
			return Err(Error::AlreadyMounted);
		}
		let nblocks = self.device.block_count();
		let sb = Superblock::compute(nblocks);

		let mut buf = [0u8; BLOCK_SIZE];
		sb.encode(&mut buf);
		self.device.write_block(0, &buf)?;

		let empty = Inode::default();
		for iblock in 1..=sb.ninodeblocks as u32 {
			let mut ib = [0u8; BLOCK_SIZE];
			for slot in 0..INODES_PER_BLOCK {
				empty.encode_into_block(&mut ib, slot);
			}
			self.device.write_block(iblock, &ib)?;
		}
		Ok(())
	}

	/// Reads the superblock, validates its magic, and rebuilds the free block bitmap by
	/// scanning every inode in the table.
	pub fn mount(&mut self) -> Result<()> {
		if self.mounted {
			return Err(Error::AlreadyMounted);
		}

		let mut buf = [0u8; BLOCK_SIZE];
		self.device.read_block(0, &mut buf)?;
		let sb = Superblock::decode(&buf);
		if sb.magic != MAGIC {
			return Err(Error::BadMagic);
		}

		let nblocks = sb.nblocks as u32;
		let mut bitmap = Bitmap::new(nblocks, sb.ninodeblocks as u32);

		inode_store::for_each_valid(&mut self.device, sb.ninodeblocks as u32, |device, _inum, inode| {
			for &d in &inode.direct {
				if d != 0 {
					bitmap.mark_used(d as u32);
				}
			}
			if inode.indirect != 0 {
				bitmap.mark_used(inode.indirect as u32);
				let mut pb = [0u8; BLOCK_SIZE];
				device.read_block(inode.indirect as u32, &mut pb)?;
				for idx in 0..POINTERS_PER_BLOCK {
					let p = read_pointer(&pb, idx);
					if p != 0 {
						bitmap.mark_used(p as u32);
					}
				}
			}
			Ok(())
		})?;

		self.superblock = Some(sb);
		self.bitmap = Some(bitmap);
		self.mounted = true;
		Ok(())
	}

	/// Scans the inode table for the first free slot, marks it in use, and returns its
	/// inumber. The new file starts at size zero with no blocks allocated.
	pub fn create(&mut self) -> Result<u32> {
		self.require_mounted()?;
		let ninodeblocks = self.superblock().ninodeblocks as u32;
		inode_store::create(&mut self.device, ninodeblocks)
	}

	/// Frees every block the file owns (its direct blocks, its indirect data blocks and
	/// the indirect block itself) and marks the inode slot free.
	pub fn delete(&mut self, inum: u32) -> Result<()> {
		self.require_mounted()?;
		let mut inode = self.load_inode(inum)?;
		if inode.isvalid == 0 {
			return Err(Error::InvalidInumber(inum));
		}

		for d in &mut inode.direct {
			if *d != 0 {
				self.bitmap.as_mut().expect("mounted").free(*d as u32);
				*d = 0;
			}
		}
		if inode.indirect != 0 {
			let mut pb = [0u8; BLOCK_SIZE];
			self.device.read_block(inode.indirect as u32, &mut pb)?;
			for idx in 0..POINTERS_PER_BLOCK {
				let p = read_pointer(&pb, idx);
				if p != 0 {
					self.bitmap.as_mut().expect("mounted").free(p as u32);
				}
			}
			self.bitmap.as_mut().expect("mounted").free(inode.indirect as u32);
			inode.indirect = 0;
		}

		inode.isvalid = 0;
		inode.size = 0;
		self.store_inode(inum, &inode)
	}

	/// The file's size in bytes.
	pub fn getsize(&mut self, inum: u32) -> Result<u32> {
		let inode = self.load_inode(inum)?;
		if inode.isvalid == 0 || inode.size < 0 {
			return Err(Error::InvalidInumber(inum));
		}
		Ok(inode.size as u32)
	}

	/// Reads up to `buf.len()` bytes starting at `offset`, stopping early at a hole or
	/// end of file. Returns the number of bytes actually read, which is `0` at or past
	/// end of file and is never an error on its own.
	pub fn read(&mut self, inum: u32, buf: &mut [u8], offset: u32) -> Result<usize> {
		self.require_mounted()?;
		let inode = self.load_inode(inum)?;
		if inode.isvalid == 0 {
			return Err(Error::InvalidInumber(inum));
		}
		let size = inode.size.max(0) as u32;
		if offset >= size || buf.is_empty() {
			return Ok(0);
		}

		let to_read = buf.len().min((size - offset) as usize);
		let mut done = 0usize;
		while done < to_read {
			let pos = offset as usize + done;
			let logical = (pos / BLOCK_SIZE) as u32;
			let within = pos % BLOCK_SIZE;
			let phys = match walker::resolve_block(&mut self.device, &inode, logical)? {
				Some(p) => p,
				None => break,
			};
			let mut block = [0u8; BLOCK_SIZE];
			self.device.read_block(phys, &mut block)?;
			let chunk = (to_read - done).min(BLOCK_SIZE - within);
			buf[done..done + chunk].copy_from_slice(&block[within..within + chunk]);
			done += chunk;
		}
		Ok(done)
	}

	/// Writes `buf` starting at `offset`, allocating blocks (and growing the file) as
	/// needed. Stops early, returning the number of bytes actually written, if the
	/// device runs out of free blocks or the file would exceed its maximum size — this
	/// is a normal partial result, not an error.
	pub fn write(&mut self, inum: u32, buf: &[u8], offset: u32) -> Result<usize> {
		self.require_mounted()?;
		let mut inode = self.load_inode(inum)?;
		if inode.isvalid == 0 {
			return Err(Error::InvalidInumber(inum));
		}

		let mut indirect_cache = IndirectCache::default();
		let mut done = 0usize;
		while done < buf.len() {
			let pos = offset as usize + done;
			let logical = (pos / BLOCK_SIZE) as u32;
			let within = pos % BLOCK_SIZE;

			let bitmap = self.bitmap.as_mut().expect("mounted");
			let phys = match walker::resolve_or_allocate_block(
				&mut self.device,
				bitmap,
				&mut inode,
				&mut indirect_cache,
				logical,
			)? {
				Some(p) => p,
				None => break,
			};

			let chunk = (buf.len() - done).min(BLOCK_SIZE - within);
			if within == 0 && chunk == BLOCK_SIZE {
				let mut block = [0u8; BLOCK_SIZE];
				block.copy_from_slice(&buf[done..done + chunk]);
				self.device.write_block(phys, &block)?;
			} else {
				let mut block = [0u8; BLOCK_SIZE];
				self.device.read_block(phys, &mut block)?;
				block[within..within + chunk].copy_from_slice(&buf[done..done + chunk]);
				self.device.write_block(phys, &block)?;
			}
			done += chunk;
		}

		// The pointer tree (indirect block, then the inode itself) only ever reaches
		// disk here, after every data block this write touched has already been
		// written above — a crash earlier in the loop leaves an allocated block that
		// nothing on disk references yet, never a pointer to data that was never
		// written.
		if done > 0 {
			if inode.indirect != 0 {
				indirect_cache.flush(&mut self.device, inode.indirect as u32)?;
			}
			let new_size = offset as usize + done;
			if new_size as i32 > inode.size {
				inode.size = new_size as i32;
			}
			self.store_inode(inum, &inode)?;
		}
		Ok(done)
	}

	/// Writes a human-readable dump of the superblock and every in-use inode to `out`,
	/// in the style of a disk-inspection tool: one line per fact, nothing hidden.
	pub fn debug(&mut self, out: &mut impl std::io::Write) -> Result<()> {
		let mut buf = [0u8; BLOCK_SIZE];
		self.device.read_block(0, &mut buf)?;
		let sb = Superblock::decode(&buf);

		writeln!(out, "superblock:")?;
		if sb.magic != MAGIC {
			writeln!(out, "    magic number is not valid")?;
			return Ok(());
		}
		writeln!(out, "    magic number is valid")?;
		writeln!(out, "    {} blocks", sb.nblocks)?;
		writeln!(out, "    {} inode blocks", sb.ninodeblocks)?;
		writeln!(out, "    {} inodes", sb.ninodes)?;

		if let Some(bitmap) = self.bitmap.as_ref().filter(|b| !b.is_empty()) {
			let free = (0..bitmap.len()).filter(|&b| bitmap.is_free(b)).count();
			writeln!(out, "    {free} of {} blocks free", bitmap.len())?;
		}

		inode_store::for_each_valid(&mut self.device, sb.ninodeblocks as u32, |device, inum, inode| {
			writeln!(out, "inode {inum}:")?;
			writeln!(out, "    size: {} bytes", inode.size)?;

			let direct: Vec<i32> = inode.direct.iter().copied().filter(|&d| d != 0).collect();
			if !direct.is_empty() {
				write!(out, "    direct blocks:")?;
				for d in direct {
					write!(out, " {d}")?;
				}
				writeln!(out)?;
			}

			if inode.indirect != 0 {
				writeln!(out, "    indirect block: {}", inode.indirect)?;
				let mut pb = [0u8; BLOCK_SIZE];
				device.read_block(inode.indirect as u32, &mut pb)?;
				write!(out, "    indirect data blocks:")?;
				for idx in 0..POINTERS_PER_BLOCK {
					let p = read_pointer(&pb, idx);
					if p != 0 {
						write!(out, " {p}")?;
					}
				}
				writeln!(out)?;
			}
			Ok(())
		})?;
		Ok(())
	}
}
