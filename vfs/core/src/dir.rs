//! Directory entry types.

use crate::config::MAX_PATH;
use crate::flags::EntryFlags;
use crate::{VfsError, VfsErrorKind, VfsResult};

/// Entry name, bounded by [`MAX_PATH`].
pub type EntryName = heapless::String<MAX_PATH>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirEntry {
    pub name: EntryName,
    pub flags: EntryFlags,
}

impl DirEntry {
    pub fn new(name: &str, flags: EntryFlags) -> VfsResult<Self> {
        let mut buf = EntryName::new();
        buf.push_str(name)
            .map_err(|_| VfsError::new(VfsErrorKind::InvalidArgument, "dir_entry.name"))?;
        Ok(Self { name: buf, flags })
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.flags.is_dir()
    }
}
