//! Per-drive mount slots.

use crate::flags::{BackendOps, OpenMode};
use crate::fs::FsBackend;
use crate::ids::MOUNT_SLOTS;
use crate::{Drive, VfsError, VfsErrorKind, VfsResult};
use tracing::{debug, warn};

/// A mounted filesystem.
pub struct Mount {
    pub(crate) backend: Box<dyn FsBackend>,
    caps: OpenMode,
    ops: BackendOps,
    open_handles: usize,
}

impl Mount {
    /// Open modes this mount grants.
    #[inline]
    pub fn caps(&self) -> OpenMode {
        self.caps
    }

    /// Operations the backend advertised at mount time.
    #[inline]
    pub fn ops(&self) -> BackendOps {
        self.ops
    }

    #[inline]
    pub fn open_handles(&self) -> usize {
        self.open_handles
    }

    #[inline]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    #[inline]
    pub(crate) fn supports(&self, op: BackendOps) -> bool {
        self.ops.contains(op)
    }

    pub(crate) fn require(&self, op: BackendOps, context: &'static str) -> VfsResult<()> {
        if self.supports(op) {
            Ok(())
        } else {
            Err(VfsError::new(VfsErrorKind::Unsupported, context))
        }
    }

    #[inline]
    pub(crate) fn handle_opened(&mut self) {
        self.open_handles += 1;
    }

    #[inline]
    pub(crate) fn handle_closed(&mut self) {
        self.open_handles = self.open_handles.saturating_sub(1);
    }
}

impl core::fmt::Debug for Mount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mount")
            .field("backend", &self.backend.name())
            .field("caps", &self.caps)
            .field("ops", &self.ops)
            .field("open_handles", &self.open_handles)
            .finish()
    }
}

/// Mount slots for the whole drive alphabet. A slot is either empty
/// (unmounted) or holds a [`Mount`] whose handle counter starts at zero.
#[derive(Debug)]
pub struct MountTable {
    slots: [Option<Mount>; MOUNT_SLOTS],
}

impl MountTable {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    #[inline]
    pub fn get(&self, drive: Drive) -> Option<&Mount> {
        self.slots[drive.index()].as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, drive: Drive) -> Option<&mut Mount> {
        self.slots[drive.index()].as_mut()
    }

    #[inline]
    pub fn is_mounted(&self, drive: Drive) -> bool {
        self.slots[drive.index()].is_some()
    }

    /// Drives with a mounted filesystem, in alphabet order.
    pub fn mounted(&self) -> impl Iterator<Item = (Drive, &Mount)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| Some((Drive::from_index(i)?, slot.as_ref()?)))
    }

    /// Run the backend's mount callback and, on success, occupy the slot.
    /// On failure the slot stays empty and the backend is dropped.
    pub fn mount(
        &mut self,
        drive: Drive,
        mut backend: Box<dyn FsBackend>,
        caps: OpenMode,
    ) -> VfsResult<()> {
        if self.is_mounted(drive) {
            return Err(VfsError::new(VfsErrorKind::Busy, "mount.occupied"));
        }

        let ops = backend.supported();
        // a backend that can open something must also be able to close it,
        // or the drive could never be unmounted again
        let coherent = (!ops.contains(BackendOps::OPEN) || ops.contains(BackendOps::CLOSE))
            && (!ops.contains(BackendOps::DIROPEN) || ops.contains(BackendOps::DIRCLOSE));
        if !coherent {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, "mount.ops"));
        }

        if let Err(err) = backend.mount() {
            warn!(%drive, backend = backend.name(), error = %err, "mount failed");
            return Err(err);
        }

        debug!(%drive, backend = backend.name(), ?caps, "mounted");
        self.slots[drive.index()] = Some(Mount {
            backend,
            caps,
            ops,
            open_handles: 0,
        });
        Ok(())
    }

    /// Run the backend's unmount callback and free the slot. Refused while
    /// any handle on the drive is open.
    pub fn unmount(&mut self, drive: Drive) -> VfsResult<()> {
        let slot = &mut self.slots[drive.index()];
        let mount = slot
            .as_mut()
            .ok_or(VfsError::new(VfsErrorKind::NotReady, "unmount.not_mounted"))?;
        if mount.open_handles > 0 {
            return Err(VfsError::new(VfsErrorKind::Busy, "unmount.handles_open"));
        }
        mount.require(BackendOps::UNMOUNT, "unmount")?;
        mount.backend.unmount()?;

        debug!(%drive, backend = mount.backend.name(), "unmounted");
        *slot = None;
        Ok(())
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}
