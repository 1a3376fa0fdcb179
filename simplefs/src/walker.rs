//! Translates a file-relative logical block number into a physical block number,
//! walking the direct pointers and, past those, the single indirect block.

use crate::bitmap::Bitmap;
use crate::disk::BlockDevice;
use crate::error::Result;
use crate::layout::{read_pointer, write_pointer, Inode, BLOCK_SIZE, POINTERS_PER_BLOCK, POINTERS_PER_INODE};

/// One past the highest logical block number a file can address:
/// `POINTERS_PER_INODE` direct blocks plus `POINTERS_PER_BLOCK` indirect ones.
pub const MAX_LOGICAL_BLOCKS: u32 = (POINTERS_PER_INODE + POINTERS_PER_BLOCK) as u32;

/// Resolves `logical` to a physical block number without allocating.
///
/// Returns `Ok(None)` for a hole, a file with no indirect block yet, or a logical
/// block past [`MAX_LOGICAL_BLOCKS`] — all three read back as end-of-data.
pub(crate) fn resolve_block<D: BlockDevice>(
	device: &mut D,
	inode: &Inode,
	logical: u32,
) -> Result<Option<u32>> {
	if logical >= MAX_LOGICAL_BLOCKS {
		return Ok(None);
	}
	if (logical as usize) < POINTERS_PER_INODE {
		let p = inode.direct[logical as usize];
		return Ok((p != 0).then_some(p as u32));
	}
	if inode.indirect == 0 {
		return Ok(None);
	}
	let idx = logical as usize - POINTERS_PER_INODE;
	let mut pb = [0u8; BLOCK_SIZE];
	device.read_block(inode.indirect as u32, &mut pb)?;
	let p = read_pointer(&pb, idx);
	Ok((p != 0).then_some(p as u32))
}

/// A staging area for one inode's indirect pointer block across the lifetime of a
/// single `write` call. The on-disk indirect block is read at most once — lazily, the
/// first time the write touches the indirect range — and written back at most once,
/// whenever the caller calls [`Self::flush`]. A caller that flushes only after every
/// data block the write touched has itself been written never leaves an on-disk
/// indirect entry pointing at a block whose contents were never persisted: the same
/// "commit once, at the end" discipline the inode's own direct pointers already get
/// from being written back through a single final `store` call.
pub(crate) struct IndirectCache {
	buf: [u8; BLOCK_SIZE],
	loaded: bool,
	dirty: bool,
}

impl Default for IndirectCache {
	fn default() -> Self {
		Self { buf: [0u8; BLOCK_SIZE], loaded: false, dirty: false }
	}
}

impl IndirectCache {
	fn ensure_loaded<D: BlockDevice>(&mut self, device: &mut D, block: u32) -> Result<()> {
		if !self.loaded {
			device.read_block(block, &mut self.buf)?;
			self.loaded = true;
		}
		Ok(())
	}

	/// Stages a freshly allocated, still-unwritten indirect block as all holes,
	/// without touching the device.
	fn init_zeroed(&mut self) {
		self.buf = [0u8; BLOCK_SIZE];
		self.loaded = true;
		self.dirty = true;
	}

	/// Persists the staged buffer to `block`, if anything in it actually changed.
	pub(crate) fn flush<D: BlockDevice>(&mut self, device: &mut D, block: u32) -> Result<()> {
		if self.dirty {
			device.write_block(block, &self.buf)?;
			self.dirty = false;
		}
		Ok(())
	}
}

/// Resolves `logical` to a physical block number, allocating a data block (and, the
/// first time a file grows past its direct pointers, the indirect block itself) when
/// the pointer is currently a hole.
///
/// Returns `Ok(None)` when `logical` is past [`MAX_LOGICAL_BLOCKS`] or no block is free
/// to allocate — both are the write path's "stop here, return what was written so far"
/// conditions, not errors. Allocation only ever touches the in-memory `inode` and
/// `indirect_cache`; the caller is responsible for writing the data block this
/// returns, then flushing `indirect_cache` and storing `inode`, in that order, so the
/// pointer tree never reaches disk ahead of the data it names.
pub(crate) fn resolve_or_allocate_block<D: BlockDevice>(
	device: &mut D,
	bitmap: &mut Bitmap,
	inode: &mut Inode,
	indirect_cache: &mut IndirectCache,
	logical: u32,
) -> Result<Option<u32>> {
	if logical >= MAX_LOGICAL_BLOCKS {
		return Ok(None);
	}
	if (logical as usize) < POINTERS_PER_INODE {
		let slot = logical as usize;
		if inode.direct[slot] != 0 {
			return Ok(Some(inode.direct[slot] as u32));
		}
		let Some(block) = bitmap.allocate() else { return Ok(None) };
		inode.direct[slot] = block as i32;
		return Ok(Some(block));
	}

	let idx = logical as usize - POINTERS_PER_INODE;
	if inode.indirect == 0 {
		let Some(indirect_block) = bitmap.allocate() else { return Ok(None) };
		indirect_cache.init_zeroed();
		inode.indirect = indirect_block as i32;
	} else {
		indirect_cache.ensure_loaded(device, inode.indirect as u32)?;
	}

	let existing = read_pointer(&indirect_cache.buf, idx);
	if existing != 0 {
		return Ok(Some(existing as u32));
	}

	let Some(block) = bitmap.allocate() else { return Ok(None) };
	write_pointer(&mut indirect_cache.buf, idx, block as i32);
	indirect_cache.dirty = true;
	Ok(Some(block))
}
