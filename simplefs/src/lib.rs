//! A numbered-inode, directory-less filesystem layered over a fixed-size block device.
//!
//! There is no notion of a file name or a directory tree: every file is addressed by
//! its inumber, a small integer handed back by [`FileSystem::create`]. Files are flat
//! byte arrays reachable through five direct block pointers and, past those, a single
//! indirect block, in the tradition of the earliest Unix filesystems. The free block
//! bitmap lives only in memory and is rebuilt from the inode table every time the
//! filesystem is mounted, so the on-disk image never needs its own free list kept in
//! sync.

pub mod bitmap;
pub mod disk;
pub mod error;
pub mod fs;
mod inode_store;
pub mod layout;
mod walker;

pub use disk::{BlockDevice, FileDisk, MemDisk};
pub use error::{Error, Result};
pub use fs::FileSystem;
pub use layout::BLOCK_SIZE;
