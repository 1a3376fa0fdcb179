//! The crate-wide error type.

use std::fmt;
use std::io;

/// An error produced by a [`crate::fs::FileSystem`] operation or by the underlying
/// [`crate::disk::BlockDevice`].
///
/// `DiskFull` and `MaxFileSize` conditions are deliberately not represented here: per the
/// filesystem's write contract, they surface as a short `Ok(bytes_written)` rather than an
/// `Err`, so that a well-behaved partial write never needs exception-like handling.
#[derive(Debug)]
pub enum Error {
	/// The underlying block device failed to read or write (short count, seek failure,
	/// metadata lookup, ...).
	Io(io::Error),
	/// A block number outside `0..nblocks` was read from or written to.
	OutOfRange {
		/// The offending block number.
		blockno: u32,
		/// The device's total block count.
		nblocks: u32,
	},
	/// An operation requiring mount state was attempted before `mount` succeeded.
	NotMounted,
	/// `mount` or `format` was attempted while the filesystem was already mounted.
	AlreadyMounted,
	/// `mount` found a superblock whose magic did not match the expected sentinel.
	BadMagic,
	/// An inumber was zero, out of range, or named a free slot.
	InvalidInumber(u32),
	/// `create` found no free inode slot.
	NoFreeInode,
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Io(e) => write!(f, "device I/O error: {e}"),
			Self::OutOfRange { blockno, nblocks } => {
				write!(f, "block {blockno} is out of range (device has {nblocks} blocks)")
			}
			Self::NotMounted => write!(f, "filesystem is not mounted"),
			Self::AlreadyMounted => write!(f, "filesystem is already mounted"),
			Self::BadMagic => write!(f, "invalid superblock magic number"),
			Self::InvalidInumber(inum) => write!(f, "invalid inumber {inum}"),
			Self::NoFreeInode => write!(f, "no free inode"),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Self {
		Self::Io(e)
	}
}

/// Shorthand for a [`Result`](std::result::Result) returning this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
