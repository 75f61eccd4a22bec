//! Mount registry and operation dispatcher.
//!
//! [`Vfs`] owns the mount table and the handle arena. Every public operation
//! validates its arguments, checks the backend advertises the operation and
//! only then dispatches; nothing in the switch changes unless the backend
//! call succeeded.

use std::io::SeekFrom;

use tracing::{debug, trace, warn};

use crate::config::{DEFAULT_MAX_HANDLES, VfsConfig};
use crate::dir::DirEntry;
use crate::flags::{BackendOps, EntityKind, OpenMode};
use crate::fs::{FsBackend, Ioctl, IoctlReply, VolumeString};
use crate::handle::{Handle, HandleArena};
use crate::mount::{Mount, MountTable};
use crate::path;
use crate::{Drive, HandleId, VfsError, VfsErrorKind, VfsResult};

/// Seek origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Whence {
    Set = 0,
    Cur = 1,
    End = 2,
}

impl TryFrom<u8> for Whence {
    type Error = VfsError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            _ => Err(VfsError::new(VfsErrorKind::InvalidArgument, "whence")),
        }
    }
}

/// The drive-letter switch.
pub struct Vfs<const HANDLES: usize = DEFAULT_MAX_HANDLES> {
    config: VfsConfig,
    mounts: MountTable,
    handles: HandleArena<HANDLES>,
}

impl Vfs {
    /// A switch with the default handle capacity and configuration.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<const HANDLES: usize> Default for Vfs<HANDLES> {
    fn default() -> Self {
        Self {
            config: VfsConfig::default(),
            mounts: MountTable::new(),
            handles: HandleArena::new(),
        }
    }
}

impl<const HANDLES: usize> Vfs<HANDLES> {
    pub fn with_config(config: VfsConfig) -> VfsResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            mounts: MountTable::new(),
            handles: HandleArena::new(),
        })
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Mount `backend` on `drive`, granting at most `caps` to opens.
    pub fn mount<B: FsBackend>(&mut self, drive: Drive, backend: B, caps: OpenMode) -> VfsResult<()> {
        self.mount_boxed(drive, Box::new(backend), caps)
    }

    pub fn mount_boxed(
        &mut self,
        drive: Drive,
        backend: Box<dyn FsBackend>,
        caps: OpenMode,
    ) -> VfsResult<()> {
        self.mounts.mount(drive, backend, caps)
    }

    pub fn unmount(&mut self, drive: Drive) -> VfsResult<()> {
        self.mounts.unmount(drive)
    }

    #[inline]
    pub fn is_mounted(&self, drive: Drive) -> bool {
        self.mounts.is_mounted(drive)
    }

    /// Open handle count on `drive`.
    pub fn open_handles(&self, drive: Drive) -> VfsResult<usize> {
        self.mounts
            .get(drive)
            .map(Mount::open_handles)
            .ok_or(VfsError::new(VfsErrorKind::NotReady, "vfs.open_handles"))
    }

    pub fn mounted_drives(&self) -> impl Iterator<Item = Drive> + '_ {
        self.mounts.mounted().map(|(drive, _)| drive)
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.mounted().count()
    }

    pub fn mount_info(&self, drive: Drive) -> Option<&Mount> {
        self.mounts.get(drive)
    }

    /// Read-only view of an open handle.
    pub fn handle_info(&self, id: HandleId) -> VfsResult<&Handle> {
        self.handles
            .get(id)
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, "vfs.handle_info"))
    }

    /// Handles currently held across all drives.
    pub fn handles_in_use(&self) -> usize {
        self.handles.in_use()
    }

    pub fn open(&mut self, path: &str, mode: OpenMode) -> VfsResult<HandleId> {
        const CTX: &str = "vfs.open";
        let drive = path::parse_drive(path).map_err(|e| e.recontext(CTX))?;
        let mount = self
            .mounts
            .get_mut(drive)
            .ok_or(VfsError::new(VfsErrorKind::NotReady, CTX))?;
        let local = path::local_path(path, self.config.max_path_len).map_err(|e| e.recontext(CTX))?;
        mount.require(BackendOps::OPEN, CTX)?;
        if !mode.intersects(OpenMode::READ_WRITE) || mode.exceeds(mount.caps()) {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, "vfs.open.mode"));
        }

        let id = self
            .handles
            .acquire()
            .ok_or(VfsError::new(VfsErrorKind::OutOfResources, "vfs.open.handles"))?;
        let Some(handle) = self.handles.get_mut(id) else {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, CTX));
        };
        handle.populate(drive, EntityKind::File, mode);

        match mount.backend.open(handle, local, mode) {
            Ok(()) => {
                mount.handle_opened();
                debug!(%drive, handle = ?id, ?mode, path = local, "opened");
                Ok(id)
            }
            Err(err) => {
                self.handles.release(id);
                debug!(%drive, path = local, error = %err, "open failed");
                Err(err)
            }
        }
    }

    pub fn close(&mut self, id: HandleId) -> VfsResult<()> {
        const CTX: &str = "vfs.close";
        let (mount, handle) = self.resolve(id, EntityKind::File, CTX)?;
        mount.require(BackendOps::CLOSE, CTX)?;
        if let Err(err) = mount.backend.close(handle) {
            warn!(handle = ?id, error = %err, "close failed, handle stays open");
            return Err(err);
        }
        mount.handle_closed();
        self.handles.release(id);
        debug!(handle = ?id, "closed");
        Ok(())
    }

    /// Read at the handle cursor. Short reads are not errors.
    pub fn read(&mut self, id: HandleId, buf: &mut [u8]) -> VfsResult<usize> {
        const CTX: &str = "vfs.read";
        let (mount, handle) = self.resolve(id, EntityKind::File, CTX)?;
        if !handle.mode().contains(OpenMode::READ) {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, "vfs.read.mode"));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        mount.require(BackendOps::READ, CTX)?;
        let read = mount.backend.read(handle, buf)?.min(buf.len());
        handle.advance(read as u64);
        trace!(handle = ?id, requested = buf.len(), read, "read");
        Ok(read)
    }

    /// Write at the handle cursor. Short writes are not errors.
    pub fn write(&mut self, id: HandleId, buf: &[u8]) -> VfsResult<usize> {
        const CTX: &str = "vfs.write";
        let (mount, handle) = self.resolve(id, EntityKind::File, CTX)?;
        if !handle.mode().contains(OpenMode::WRITE) {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, "vfs.write.mode"));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        mount.require(BackendOps::WRITE, CTX)?;
        let written = mount.backend.write(handle, buf)?.min(buf.len());
        handle.advance(written as u64);
        trace!(handle = ?id, requested = buf.len(), written, "write");
        Ok(written)
    }

    /// Move the cursor; the target is clamped to `[0, size]`.
    pub fn seek(&mut self, id: HandleId, offset: i64, whence: Whence) -> VfsResult<u64> {
        const CTX: &str = "vfs.seek";
        let (mount, handle) = self.resolve(id, EntityKind::File, CTX)?;
        mount.require(BackendOps::SIZE, CTX)?;
        let size = mount.backend.size(handle)?;
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => handle.cursor(),
            Whence::End => size,
        };
        let target = base.saturating_add_signed(offset).min(size);
        let pos = if mount.supports(BackendOps::SEEK) {
            mount.backend.seek(handle, target)?.min(size)
        } else {
            target
        };
        handle.set_cursor(pos);
        trace!(handle = ?id, offset, ?whence, pos, "seek");
        Ok(pos)
    }

    /// [`seek`](Self::seek) taking a [`SeekFrom`].
    pub fn seek_from(&mut self, id: HandleId, from: SeekFrom) -> VfsResult<u64> {
        let (offset, whence) = match from {
            SeekFrom::Start(pos) => (i64::try_from(pos).unwrap_or(i64::MAX), Whence::Set),
            SeekFrom::Current(delta) => (delta, Whence::Cur),
            SeekFrom::End(delta) => (delta, Whence::End),
        };
        self.seek(id, offset, whence)
    }

    /// Current cursor of a file handle.
    pub fn tell(&self, id: HandleId) -> VfsResult<u64> {
        self.handles
            .get(id)
            .filter(|h| h.kind() == EntityKind::File)
            .map(Handle::cursor)
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, "vfs.tell"))
    }

    pub fn size(&mut self, id: HandleId) -> VfsResult<u64> {
        const CTX: &str = "vfs.size";
        let (mount, handle) = self.resolve(id, EntityKind::File, CTX)?;
        mount.require(BackendOps::SIZE, CTX)?;
        mount.backend.size(handle)
    }

    pub fn mkdir(&mut self, path: &str) -> VfsResult<()> {
        let (mount, local) = self.path_target(path, BackendOps::MKDIR, "vfs.mkdir")?;
        mount.backend.mkdir(local)?;
        debug!(path, "mkdir");
        Ok(())
    }

    pub fn unlink(&mut self, path: &str) -> VfsResult<()> {
        let (mount, local) = self.path_target(path, BackendOps::UNLINK, "vfs.unlink")?;
        mount.backend.unlink(local)?;
        debug!(path, "unlink");
        Ok(())
    }

    /// Rename within one drive. Cross-drive renames are `Unsupported`.
    pub fn rename(&mut self, old: &str, new: &str) -> VfsResult<()> {
        const CTX: &str = "vfs.rename";
        if old.as_bytes().first() != new.as_bytes().first() {
            return Err(VfsError::new(VfsErrorKind::Unsupported, "vfs.rename.cross_drive"));
        }
        let max_len = self.config.max_path_len;
        let (mount, old_local) = self.path_target(old, BackendOps::RENAME, CTX)?;
        let new_local = path::local_path(new, max_len).map_err(|e| e.recontext(CTX))?;
        mount.backend.rename(old_local, new_local)?;
        debug!(old, new, "rename");
        Ok(())
    }

    pub fn diropen(&mut self, path: &str) -> VfsResult<HandleId> {
        const CTX: &str = "vfs.diropen";
        let drive = path::parse_drive(path).map_err(|e| e.recontext(CTX))?;
        let mount = self
            .mounts
            .get_mut(drive)
            .ok_or(VfsError::new(VfsErrorKind::NotReady, CTX))?;
        let local = path::local_path(path, self.config.max_path_len).map_err(|e| e.recontext(CTX))?;
        mount.require(BackendOps::DIROPEN, CTX)?;

        let id = self
            .handles
            .acquire()
            .ok_or(VfsError::new(VfsErrorKind::OutOfResources, "vfs.diropen.handles"))?;
        let Some(handle) = self.handles.get_mut(id) else {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, CTX));
        };
        handle.populate(drive, EntityKind::Directory, OpenMode::READ);

        match mount.backend.diropen(handle, local) {
            Ok(()) => {
                mount.handle_opened();
                debug!(%drive, handle = ?id, path = local, "dir opened");
                Ok(id)
            }
            Err(err) => {
                self.handles.release(id);
                Err(err)
            }
        }
    }

    pub fn dirclose(&mut self, id: HandleId) -> VfsResult<()> {
        const CTX: &str = "vfs.dirclose";
        let (mount, handle) = self.resolve(id, EntityKind::Directory, CTX)?;
        mount.require(BackendOps::DIRCLOSE, CTX)?;
        if let Err(err) = mount.backend.dirclose(handle) {
            warn!(handle = ?id, error = %err, "dirclose failed, handle stays open");
            return Err(err);
        }
        mount.handle_closed();
        self.handles.release(id);
        debug!(handle = ?id, "dir closed");
        Ok(())
    }

    /// Next entry of an open directory; `NotFound` once exhausted.
    pub fn dirnext(&mut self, id: HandleId) -> VfsResult<DirEntry> {
        const CTX: &str = "vfs.dirnext";
        let (mount, handle) = self.resolve(id, EntityKind::Directory, CTX)?;
        mount.require(BackendOps::DIRNEXT, CTX)?;
        let entry = mount.backend.dirnext(handle)?;
        handle.advance(1);
        Ok(entry)
    }

    pub fn ioctl(&mut self, drive: Drive, request: Ioctl) -> VfsResult<IoctlReply> {
        const CTX: &str = "vfs.ioctl";
        let mount = self
            .mounts
            .get_mut(drive)
            .ok_or(VfsError::new(VfsErrorKind::NotReady, CTX))?;
        mount.require(BackendOps::IOCTL, CTX)?;
        mount.backend.ioctl(request)
    }

    /// Volume size in bytes.
    pub fn volume_size(&mut self, drive: Drive) -> VfsResult<u64> {
        match self.ioctl(drive, Ioctl::VolumeSize)? {
            IoctlReply::Size(bytes) => Ok(bytes),
            _ => Err(VfsError::new(VfsErrorKind::DeviceError, "vfs.volume_size")),
        }
    }

    pub fn volume_label(&mut self, drive: Drive) -> VfsResult<VolumeString> {
        match self.ioctl(drive, Ioctl::Label)? {
            IoctlReply::Label(label) => Ok(label),
            _ => Err(VfsError::new(VfsErrorKind::DeviceError, "vfs.volume_label")),
        }
    }

    pub fn volume_serial(&mut self, drive: Drive) -> VfsResult<VolumeString> {
        match self.ioctl(drive, Ioctl::Serial)? {
            IoctlReply::Serial(serial) => Ok(serial),
            _ => Err(VfsError::new(VfsErrorKind::DeviceError, "vfs.volume_serial")),
        }
    }

    /// Open handle of `kind` together with its mount.
    fn resolve(
        &mut self,
        id: HandleId,
        kind: EntityKind,
        context: &'static str,
    ) -> VfsResult<(&mut Mount, &mut Handle)> {
        let handle = self
            .handles
            .get_mut(id)
            .filter(|h| h.kind() == kind)
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, context))?;
        let drive = handle
            .drive()
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, context))?;
        let mount = self
            .mounts
            .get_mut(drive)
            .ok_or(VfsError::new(VfsErrorKind::NotReady, context))?;
        Ok((mount, handle))
    }

    /// Mount and local path for a path-addressed operation.
    fn path_target<'p>(
        &mut self,
        path: &'p str,
        op: BackendOps,
        context: &'static str,
    ) -> VfsResult<(&mut Mount, &'p str)> {
        let drive = path::parse_drive(path).map_err(|e| e.recontext(context))?;
        let mount = self
            .mounts
            .get_mut(drive)
            .ok_or(VfsError::new(VfsErrorKind::NotReady, context))?;
        let local =
            path::local_path(path, self.config.max_path_len).map_err(|e| e.recontext(context))?;
        mount.require(op, context)?;
        Ok((mount, local))
    }
}

impl<const HANDLES: usize> core::fmt::Debug for Vfs<HANDLES> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vfs")
            .field("config", &self.config)
            .field("mounts", &self.mounts)
            .field("handles", &self.handles)
            .finish()
    }
}
