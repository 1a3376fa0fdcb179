//! Whole-inode-table operations: reading and writing one inode by inumber, and
//! walking every inode-table block in order. Centralizing the traversal here means
//! `mount`'s bitmap scan, `create`'s free-slot search and the debug dumper all share
//! the same `iblock`/`slot`/`inum` arithmetic instead of re-deriving it three times.

use crate::disk::BlockDevice;
use crate::error::{Error, Result};
use crate::layout::{iblock_of, inum_of, slot_of, Inode, BLOCK_SIZE, INODES_PER_BLOCK};

/// Reads the inode named by `inum` from its home block.
pub(crate) fn load<D: BlockDevice>(device: &mut D, inum: u32) -> Result<Inode> {
	let mut buf = [0u8; BLOCK_SIZE];
	device.read_block(iblock_of(inum), &mut buf)?;
	Ok(Inode::decode_from_block(&buf, slot_of(inum) as usize))
}

/// Writes `inode` into the slot named by `inum`, preserving every other inode packed
/// into the same block.
pub(crate) fn store<D: BlockDevice>(device: &mut D, inum: u32, inode: &Inode) -> Result<()> {
	let iblock = iblock_of(inum);
	let mut buf = [0u8; BLOCK_SIZE];
	device.read_block(iblock, &mut buf)?;
	inode.encode_into_block(&mut buf, slot_of(inum) as usize);
	device.write_block(iblock, &buf)?;
	Ok(())
}

/// Visits every *valid* inode across all `ninodeblocks` inode-table blocks, in
/// inumber order, calling `f(device, inum, inode)` for each. Used by `mount`'s bitmap
/// scan and by the debug dumper, so both walk the table exactly the same way. `device`
/// is handed back to the callback so it can follow an inode's indirect block without
/// opening a second traversal.
pub(crate) fn for_each_valid<D: BlockDevice>(
	device: &mut D,
	ninodeblocks: u32,
	mut f: impl FnMut(&mut D, u32, Inode) -> Result<()>,
) -> Result<()> {
	for iblock in 1..=ninodeblocks {
		let mut buf = [0u8; BLOCK_SIZE];
		device.read_block(iblock, &mut buf)?;
		for slot in 0..INODES_PER_BLOCK {
			let inode = Inode::decode_from_block(&buf, slot);
			if inode.isvalid == 0 {
				continue;
			}
			let inum = inum_of(iblock, slot as u32);
			f(device, inum, inode)?;
		}
	}
	Ok(())
}

/// Scans the inode table for the first free slot (inumber 0 is always skipped, since
/// it's reserved), marks it valid, and returns its inumber.
pub(crate) fn create<D: BlockDevice>(device: &mut D, ninodeblocks: u32) -> Result<u32> {
	for iblock in 1..=ninodeblocks {
		let mut buf = [0u8; BLOCK_SIZE];
		device.read_block(iblock, &mut buf)?;
		for slot in 0..INODES_PER_BLOCK {
			let inum = inum_of(iblock, slot as u32);
			if inum == 0 {
				continue;
			}
			let inode = Inode::decode_from_block(&buf, slot);
			if inode.isvalid == 0 {
				let fresh = Inode { isvalid: 1, ..Inode::default() };
				fresh.encode_into_block(&mut buf, slot);
				device.write_block(iblock, &buf)?;
				return Ok(inum);
			}
		}
	}
	Err(Error::NoFreeInode)
}
