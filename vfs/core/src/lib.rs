//! Drive-letter filesystem switch.
//!
//! Backends implementing [`FsBackend`] are mounted on drive letters `A:` to
//! `Z:` of a [`Vfs`], which dispatches file and directory operations on
//! paths such as `A:/dir/file.bin` to the right backend and tracks every
//! open handle in a fixed-size arena.

pub mod bitset;
pub mod config;
pub mod dir;
pub mod error;
pub mod flags;
pub mod fs;
pub mod handle;
pub mod ids;
pub mod listing;
pub mod mount;
pub mod path;
pub mod path_store;
pub mod transfer;
mod vfs;

pub use bitset::BitSet;
pub use config::{DEFAULT_MAX_HANDLES, MAX_PATH, PathStoreConfig, VfsConfig};
pub use dir::{DirEntry, EntryName};
pub use error::{VfsError, VfsErrorKind, VfsResult};
pub use flags::{BackendOps, EntityKind, EntryFlags, OpenMode};
pub use fs::{FsBackend, Ioctl, IoctlReply, VolumeString, volume_string};
pub use handle::{Handle, HandleArena};
pub use ids::{Drive, HandleId, MOUNT_SLOTS};
pub use listing::Listing;
pub use mount::{Mount, MountTable};
pub use path_store::PathStore;
pub use transfer::{BlockTransfer, MAX_BLOCK_LEN, copy_file, move_file};
pub use vfs::{Vfs, Whence};
