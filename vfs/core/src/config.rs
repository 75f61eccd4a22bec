use crate::{VfsError, VfsErrorKind, VfsResult};

/// Hard upper bound on a local path or directory entry name, in bytes.
pub const MAX_PATH: usize = 255;

/// Default number of simultaneously open handles per [`Vfs`](crate::Vfs).
pub const DEFAULT_MAX_HANDLES: usize = 32;

#[derive(Clone, Debug)]
pub struct VfsConfig {
    /// Longest local path (after the `X:/` prefix) accepted by path operations.
    pub max_path_len: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            max_path_len: MAX_PATH,
        }
    }
}

impl VfsConfig {
    pub fn validate(&self) -> VfsResult<()> {
        if self.max_path_len == 0 || self.max_path_len > MAX_PATH {
            return Err(VfsError::new(
                VfsErrorKind::InvalidArgument,
                "config.max_path_len",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PathStoreConfig {
    /// Bytes reserved for entry text.
    pub buffer_bytes: usize,
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl Default for PathStoreConfig {
    fn default() -> Self {
        Self {
            buffer_bytes: 64 << 10,
            max_entries: 16384,
        }
    }
}
