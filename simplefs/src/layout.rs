//! On-disk layout: the byte-level shape of the superblock, inode table and indirect
//! pointer blocks, plus the constants that size them.
//!
//! Every multi-byte field is a 32-bit signed integer stored in the host's native byte
//! order, encoded and decoded by hand rather than reinterpreted in place: the filesystem
//! is meant to be read back on the machine that wrote it, not shipped across a network,
//! so matching the host's order is enough and keeps the codec `unsafe`-free.

/// Size in bytes of every block on the device, including block 0 (the superblock) and
/// the inode table blocks.
pub const BLOCK_SIZE: usize = 4096;

/// Sentinel written to a freshly formatted superblock's magic field.
pub const MAGIC: i32 = 0xF0F0_3410u32 as i32;

/// Inode records packed into a single inode-table block.
pub const INODES_PER_BLOCK: usize = 128;

/// Direct pointers carried in every inode.
pub const POINTERS_PER_INODE: usize = 5;

/// Pointers packed into a single indirect block (`BLOCK_SIZE / 4`).
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 4;

/// Encoded size in bytes of one inode record: isvalid + size + 5 direct + indirect.
pub const INODE_SIZE: usize = 4 + 4 + POINTERS_PER_INODE * 4 + 4;

fn read_i32(buf: &[u8], off: usize) -> i32 {
	i32::from_ne_bytes(buf[off..off + 4].try_into().unwrap())
}

fn write_i32(buf: &mut [u8], off: usize, v: i32) {
	buf[off..off + 4].copy_from_slice(&v.to_ne_bytes());
}

/// The block 0 header describing the device's geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Superblock {
	/// Must equal [`MAGIC`] for the device to be recognized as formatted.
	pub magic: i32,
	/// Total number of blocks on the device, including the superblock and inode table.
	pub nblocks: i32,
	/// Number of blocks given over to the inode table, starting at block 1.
	pub ninodeblocks: i32,
	/// Total inode capacity: `ninodeblocks * INODES_PER_BLOCK`.
	pub ninodes: i32,
}

impl Superblock {
	/// Decodes a superblock from the first 16 bytes of block 0. The remainder of the
	/// block is reserved and currently unused.
	pub fn decode(buf: &[u8; BLOCK_SIZE]) -> Self {
		Self {
			magic: read_i32(buf, 0),
			nblocks: read_i32(buf, 4),
			ninodeblocks: read_i32(buf, 8),
			ninodes: read_i32(buf, 12),
		}
	}

	/// Encodes the superblock into block 0. Bytes beyond the header are zeroed.
	pub fn encode(&self, buf: &mut [u8; BLOCK_SIZE]) {
		buf.fill(0);
		write_i32(buf, 0, self.magic);
		write_i32(buf, 4, self.nblocks);
		write_i32(buf, 8, self.ninodeblocks);
		write_i32(buf, 12, self.ninodes);
	}

	/// Computes the geometry for a device of `nblocks` blocks: the inode table is sized
	/// to roughly ten percent of the device, rounded up to the nearest whole block.
	pub fn compute(nblocks: u32) -> Self {
		let ninodeblocks = nblocks.saturating_add(9) / 10;
		let ninodes = ninodeblocks * INODES_PER_BLOCK as u32;
		Self {
			magic: MAGIC,
			nblocks: nblocks as i32,
			ninodeblocks: ninodeblocks as i32,
			ninodes: ninodes as i32,
		}
	}
}

/// One inode record: validity flag, byte size, direct pointers and a single indirect
/// pointer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inode {
	/// Nonzero if this slot names an in-use file.
	pub isvalid: i32,
	/// File size in bytes. Negative is a corruption sentinel the filesystem never writes.
	pub size: i32,
	/// Block numbers of the file's first `POINTERS_PER_INODE` blocks; zero is a hole.
	pub direct: [i32; POINTERS_PER_INODE],
	/// Block number of the indirect block, or zero if the file has never grown past its
	/// direct pointers.
	pub indirect: i32,
}

impl Inode {
	/// Decodes the inode stored at `slot` within a raw inode-table block.
	pub fn decode_from_block(buf: &[u8; BLOCK_SIZE], slot: usize) -> Self {
		let base = slot * INODE_SIZE;
		let isvalid = read_i32(buf, base);
		let size = read_i32(buf, base + 4);
		let mut direct = [0i32; POINTERS_PER_INODE];
		for (i, d) in direct.iter_mut().enumerate() {
			*d = read_i32(buf, base + 8 + i * 4);
		}
		let indirect = read_i32(buf, base + 8 + POINTERS_PER_INODE * 4);
		Self { isvalid, size, direct, indirect }
	}

	/// Encodes this inode into `slot` of a raw inode-table block, leaving the rest of
	/// the block untouched.
	pub fn encode_into_block(&self, buf: &mut [u8; BLOCK_SIZE], slot: usize) {
		let base = slot * INODE_SIZE;
		write_i32(buf, base, self.isvalid);
		write_i32(buf, base + 4, self.size);
		for (i, d) in self.direct.iter().enumerate() {
			write_i32(buf, base + 8 + i * 4, *d);
		}
		write_i32(buf, base + 8 + POINTERS_PER_INODE * 4, self.indirect);
	}
}

/// Reads pointer `idx` from a raw indirect block.
pub fn read_pointer(buf: &[u8; BLOCK_SIZE], idx: usize) -> i32 {
	read_i32(buf, idx * 4)
}

/// Writes pointer `idx` into a raw indirect block.
pub fn write_pointer(buf: &mut [u8; BLOCK_SIZE], idx: usize, v: i32) {
	write_i32(buf, idx * 4, v);
}

/// The inode-table block number holding `inum` (inode blocks start at 1).
pub fn iblock_of(inum: u32) -> u32 {
	inum / INODES_PER_BLOCK as u32 + 1
}

/// The slot within its inode-table block holding `inum`.
pub fn slot_of(inum: u32) -> u32 {
	inum % INODES_PER_BLOCK as u32
}

/// The inumber named by a given inode-table block and slot. Inverse of
/// [`iblock_of`]/[`slot_of`].
pub fn inum_of(iblock: u32, slot: u32) -> u32 {
	(iblock - 1) * INODES_PER_BLOCK as u32 + slot
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn superblock_roundtrip() {
		let sb = Superblock::compute(20);
		assert_eq!(sb.ninodeblocks, 2);
		assert_eq!(sb.ninodes, 256);
		let mut buf = [0u8; BLOCK_SIZE];
		sb.encode(&mut buf);
		assert_eq!(Superblock::decode(&buf), sb);
	}

	#[test]
	fn inode_roundtrip() {
		let inode = Inode {
			isvalid: 1,
			size: 12345,
			direct: [1, 2, 3, 0, 0],
			indirect: 9,
		};
		let mut buf = [0u8; BLOCK_SIZE];
		inode.encode_into_block(&mut buf, 42);
		assert_eq!(Inode::decode_from_block(&buf, 42), inode);
		// neighboring slots stay zeroed
		assert_eq!(Inode::decode_from_block(&buf, 41), Inode::default());
	}

	#[test]
	fn pointer_roundtrip() {
		let mut buf = [0u8; BLOCK_SIZE];
		write_pointer(&mut buf, 0, 7);
		write_pointer(&mut buf, POINTERS_PER_BLOCK - 1, -1);
		assert_eq!(read_pointer(&buf, 0), 7);
		assert_eq!(read_pointer(&buf, POINTERS_PER_BLOCK - 1), -1);
		assert_eq!(read_pointer(&buf, 1), 0);
	}

	#[test]
	fn inum_block_slot_are_inverses() {
		for inum in [0u32, 1, 127, 128, 129, 255, 256] {
			let iblock = iblock_of(inum);
			let slot = slot_of(inum);
			assert_eq!(inum_of(iblock, slot), inum);
		}
	}
}
