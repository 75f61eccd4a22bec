//! A flat directory of named device files.
//!
//! Every entry has a fixed size and permission flags, and may be open
//! through at most one handle at a time. Only the root directory exists.

use drivefs_core::{
    BackendOps, DirEntry, EntryFlags, FsBackend, Handle, Ioctl, IoctlReply, OpenMode, VfsError,
    VfsErrorKind, VfsResult, volume_string,
};
use tracing::trace;

use crate::config::DevFsConfig;
use crate::device::Device;

struct DevEntry {
    name: String,
    flags: EntryFlags,
    size: u64,
    open: bool,
    device: Box<dyn Device>,
}

#[derive(Default)]
pub struct DevFs {
    config: DevFsConfig,
    entries: Vec<DevEntry>,
}

impl DevFs {
    pub fn new(config: DevFsConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    /// Register a device file. `flags` gives its access bits; the file kind
    /// bit is added automatically.
    pub fn add<D: Device>(
        &mut self,
        name: &str,
        flags: EntryFlags,
        size: u64,
        device: D,
    ) -> VfsResult<()> {
        const CTX: &str = "devfs.add";
        if name.is_empty() || name.contains('/') || name.len() > drivefs_core::MAX_PATH {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, CTX));
        }
        if self.find(name).is_some() {
            return Err(VfsError::new(VfsErrorKind::Busy, CTX));
        }
        self.entries.push(DevEntry {
            name: name.to_string(),
            flags: (flags & (EntryFlags::READ | EntryFlags::WRITE)) | EntryFlags::FILE,
            size,
            open: false,
            device: Box::new(device),
        });
        Ok(())
    }

    /// Builder form of [`add`](Self::add).
    pub fn with_entry<D: Device>(
        mut self,
        name: &str,
        flags: EntryFlags,
        size: u64,
        device: D,
    ) -> VfsResult<Self> {
        self.add(name, flags, size, device)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    fn entry(&mut self, handle: &Handle, context: &'static str) -> VfsResult<&mut DevEntry> {
        self.entries
            .get_mut(handle.cookie as usize)
            .filter(|entry| entry.open)
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, context))
    }
}

/// Bytes between `pos` and the end of an entry of `size`, capped at `want`.
fn clamp(size: u64, pos: u64, want: usize) -> usize {
    usize::try_from(size.saturating_sub(pos)).map_or(want, |left| left.min(want))
}

impl FsBackend for DevFs {
    fn name(&self) -> &'static str {
        "devfs"
    }

    fn supported(&self) -> BackendOps {
        BackendOps::REQUIRED | BackendOps::SEEK | BackendOps::DIRECTORY | BackendOps::IOCTL
    }

    fn mount(&mut self) -> VfsResult<()> {
        Ok(())
    }

    fn unmount(&mut self) -> VfsResult<()> {
        Ok(())
    }

    fn open(&mut self, handle: &mut Handle, path: &str, mode: OpenMode) -> VfsResult<()> {
        const CTX: &str = "devfs.open";
        let index = self
            .find(path)
            .ok_or(VfsError::new(VfsErrorKind::NotFound, CTX))?;
        let entry = &mut self.entries[index];
        if entry.open {
            return Err(VfsError::new(VfsErrorKind::Busy, CTX));
        }
        if mode.exceeds(entry.flags.access()) {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, CTX));
        }
        entry.open = true;
        handle.cookie = index as u64;
        trace!(name = %entry.name, ?mode, "devfs open");
        Ok(())
    }

    fn close(&mut self, handle: &mut Handle) -> VfsResult<()> {
        self.entry(handle, "devfs.close")?.open = false;
        Ok(())
    }

    fn read(&mut self, handle: &Handle, buf: &mut [u8]) -> VfsResult<usize> {
        let pos = handle.cursor();
        let entry = self.entry(handle, "devfs.read")?;
        let n = clamp(entry.size, pos, buf.len());
        if n == 0 {
            return Ok(0);
        }
        entry.device.read_at(pos, &mut buf[..n]).map(|read| read.min(n))
    }

    fn write(&mut self, handle: &Handle, buf: &[u8]) -> VfsResult<usize> {
        let pos = handle.cursor();
        let entry = self.entry(handle, "devfs.write")?;
        let n = clamp(entry.size, pos, buf.len());
        if n == 0 {
            return Ok(0);
        }
        entry.device.write_at(pos, &buf[..n]).map(|written| written.min(n))
    }

    fn seek(&mut self, handle: &mut Handle, pos: u64) -> VfsResult<u64> {
        let entry = self.entry(handle, "devfs.seek")?;
        Ok(pos.min(entry.size))
    }

    fn size(&mut self, handle: &Handle) -> VfsResult<u64> {
        Ok(self.entry(handle, "devfs.size")?.size)
    }

    fn diropen(&mut self, _handle: &mut Handle, path: &str) -> VfsResult<()> {
        if path.is_empty() {
            Ok(())
        } else {
            Err(VfsError::new(VfsErrorKind::NotFound, "devfs.diropen"))
        }
    }

    fn dirclose(&mut self, _handle: &mut Handle) -> VfsResult<()> {
        Ok(())
    }

    fn dirnext(&mut self, handle: &Handle) -> VfsResult<DirEntry> {
        let entry = usize::try_from(handle.cursor())
            .ok()
            .and_then(|index| self.entries.get(index))
            .ok_or(VfsError::new(VfsErrorKind::NotFound, "devfs.dirnext"))?;
        DirEntry::new(&entry.name, entry.flags)
    }

    fn ioctl(&mut self, request: Ioctl) -> VfsResult<IoctlReply> {
        Ok(match request {
            Ioctl::VolumeSize => IoctlReply::Size(self.entries.iter().map(|e| e.size).sum()),
            Ioctl::Label => IoctlReply::Label(volume_string(&self.config.label)),
            Ioctl::Serial => IoctlReply::Serial(volume_string(&self.config.serial)),
        })
    }
}

impl core::fmt::Debug for DevFs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DevFs")
            .field("config", &self.config)
            .field(
                "entries",
                &self.entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticRegion;

    #[test]
    fn add_rejects_bad_and_duplicate_names() {
        let mut fs = DevFs::default();
        let rom = StaticRegion::new(b"abc");
        fs.add("bios", EntryFlags::READ, 3, rom).unwrap();
        assert_eq!(
            fs.add("BIOS", EntryFlags::READ, 3, rom).unwrap_err().kind(),
            VfsErrorKind::Busy
        );
        assert_eq!(
            fs.add("a/b", EntryFlags::READ, 3, rom).unwrap_err().kind(),
            VfsErrorKind::InvalidArgument
        );
        assert_eq!(fs.len(), 1);
    }

    #[test]
    fn clamp_to_entry_size() {
        assert_eq!(clamp(10, 4, 100), 6);
        assert_eq!(clamp(10, 10, 100), 0);
        assert_eq!(clamp(10, 12, 100), 0);
        assert_eq!(clamp(10, 0, 3), 3);
    }

    #[test]
    #[tracing_test::traced_test]
    fn open_is_traced() {
        let mut fs = DevFs::default()
            .with_entry("bios", EntryFlags::READ, 3, StaticRegion::new(b"abc"))
            .unwrap();
        let mut handle = Handle::default();
        fs.open(&mut handle, "BIOS", OpenMode::READ).unwrap();
        assert!(logs_contain("devfs open"));
        assert!(logs_contain("name=bios"));
    }
}
