//! Open modes, directory entry flags and backend operation sets.

use bitflags::bitflags;

bitflags! {
    /// Mode a file is opened with, and the capability mask a mount grants.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct OpenMode: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
        /// Create the file if missing (backends may truncate an existing one).
        const CREATE = 1 << 2;
    }
}

impl OpenMode {
    /// Whether this mode asks for anything outside `granted`.
    #[inline]
    pub fn exceeds(self, granted: OpenMode) -> bool {
        !granted.contains(self)
    }
}

bitflags! {
    /// Kind and permission flags surfaced by directory iteration.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const FILE = 1 << 3;
        const DIR = 1 << 4;
    }
}

impl EntryFlags {
    #[inline]
    pub fn is_dir(self) -> bool {
        self.contains(EntryFlags::DIR)
    }

    #[inline]
    pub fn is_read_only(self) -> bool {
        !self.contains(EntryFlags::WRITE)
    }

    /// Access bits expressed as an open mode.
    pub fn access(self) -> OpenMode {
        let mut mode = OpenMode::empty();
        if self.contains(EntryFlags::READ) {
            mode |= OpenMode::READ;
        }
        if self.contains(EntryFlags::WRITE) {
            mode |= OpenMode::WRITE;
        }
        mode
    }
}

bitflags! {
    /// Operations a backend implements. The dispatcher refuses anything
    /// outside this set with `Unsupported` before touching switch state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BackendOps: u16 {
        const MOUNT = 1 << 0;
        const UNMOUNT = 1 << 1;
        const OPEN = 1 << 2;
        const CLOSE = 1 << 3;
        const READ = 1 << 4;
        const WRITE = 1 << 5;
        const SIZE = 1 << 6;
        const SEEK = 1 << 7;
        const UNLINK = 1 << 8;
        const RENAME = 1 << 9;
        const MKDIR = 1 << 10;
        const DIROPEN = 1 << 11;
        const DIRCLOSE = 1 << 12;
        const DIRNEXT = 1 << 13;
        const IOCTL = 1 << 14;

        const REQUIRED = Self::MOUNT.bits()
            | Self::UNMOUNT.bits()
            | Self::OPEN.bits()
            | Self::CLOSE.bits()
            | Self::READ.bits()
            | Self::WRITE.bits()
            | Self::SIZE.bits();
        const DIRECTORY = Self::DIROPEN.bits() | Self::DIRCLOSE.bits() | Self::DIRNEXT.bits();
    }
}

/// What an arena slot refers to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EntityKind {
    #[default]
    File,
    Directory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_subset_check() {
        let caps = OpenMode::READ_WRITE;
        assert!(!OpenMode::READ.exceeds(caps));
        assert!(!OpenMode::READ_WRITE.exceeds(caps));
        assert!((OpenMode::WRITE | OpenMode::CREATE).exceeds(caps));
    }

    #[test]
    fn entry_flags_access() {
        let ro = EntryFlags::FILE | EntryFlags::READ;
        assert!(ro.is_read_only());
        assert!(!ro.is_dir());
        assert_eq!(ro.access(), OpenMode::READ);
    }
}
