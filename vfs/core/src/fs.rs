//! Backend contract.
//!
//! A backend is anything that can be mounted on a drive letter. It owns its
//! own state; the switch owns the mount slot and the handle arena and hands
//! the backend the [`Handle`] it is operating on.
//!
//! Backends advertise what they implement through [`FsBackend::supported`].
//! The switch refuses anything outside that set with `Unsupported` before
//! dispatching. The optional methods also default to `Unsupported`, so a
//! backend that forgets to advertise correctly still cannot crash the switch.

use crate::dir::DirEntry;
use crate::flags::{BackendOps, OpenMode};
use crate::handle::Handle;
use crate::{VfsError, VfsErrorKind, VfsResult};

/// Volume label or serial string.
pub type VolumeString = heapless::String<32>;

/// Volume queries answered by [`FsBackend::ioctl`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ioctl {
    /// Volume size in bytes.
    VolumeSize,
    Label,
    Serial,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IoctlReply {
    Size(u64),
    Label(VolumeString),
    Serial(VolumeString),
}

/// Build a [`VolumeString`], truncating at a character boundary if needed.
pub fn volume_string(s: &str) -> VolumeString {
    let mut out = VolumeString::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

fn unsupported<T>(context: &'static str) -> VfsResult<T> {
    Err(VfsError::new(VfsErrorKind::Unsupported, context))
}

pub trait FsBackend: 'static {
    /// Short driver name, for logs.
    fn name(&self) -> &'static str;

    /// Operations this backend implements.
    fn supported(&self) -> BackendOps {
        BackendOps::REQUIRED
    }

    fn mount(&mut self) -> VfsResult<()>;
    fn unmount(&mut self) -> VfsResult<()>;

    /// Open `path` (drive prefix already stripped). `handle` carries the
    /// mode; the backend may stash state in `handle.cookie`.
    fn open(&mut self, handle: &mut Handle, path: &str, mode: OpenMode) -> VfsResult<()>;
    fn close(&mut self, handle: &mut Handle) -> VfsResult<()>;

    /// Read at `handle.cursor()`. The switch advances the cursor.
    fn read(&mut self, handle: &Handle, buf: &mut [u8]) -> VfsResult<usize>;
    /// Write at `handle.cursor()`. The switch advances the cursor.
    fn write(&mut self, handle: &Handle, buf: &[u8]) -> VfsResult<usize>;
    fn size(&mut self, handle: &Handle) -> VfsResult<u64>;

    /// Notification that the cursor moves to `pos` (already clamped to
    /// `[0, size]`). Returns the position the backend actually settled on.
    fn seek(&mut self, _handle: &mut Handle, _pos: u64) -> VfsResult<u64> {
        unsupported("backend.seek")
    }

    fn unlink(&mut self, _path: &str) -> VfsResult<()> {
        unsupported("backend.unlink")
    }

    fn rename(&mut self, _old: &str, _new: &str) -> VfsResult<()> {
        unsupported("backend.rename")
    }

    fn mkdir(&mut self, _path: &str) -> VfsResult<()> {
        unsupported("backend.mkdir")
    }

    fn diropen(&mut self, _handle: &mut Handle, _path: &str) -> VfsResult<()> {
        unsupported("backend.diropen")
    }

    fn dirclose(&mut self, _handle: &mut Handle) -> VfsResult<()> {
        unsupported("backend.dirclose")
    }

    /// Return the entry at position `handle.cursor()`, or `NotFound` once
    /// the directory is exhausted. The switch advances the cursor.
    fn dirnext(&mut self, _handle: &Handle) -> VfsResult<DirEntry> {
        unsupported("backend.dirnext")
    }

    fn ioctl(&mut self, _request: Ioctl) -> VfsResult<IoctlReply> {
        unsupported("backend.ioctl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_string_truncates() {
        let long = "x".repeat(40);
        assert_eq!(volume_string(&long).len(), 32);
        assert_eq!(volume_string("NDS").as_str(), "NDS");
    }
}
