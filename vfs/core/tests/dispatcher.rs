use drivefs_core::{
    BackendOps, Drive, FsBackend, Handle, OpenMode, Vfs, VfsConfig, VfsError, VfsErrorKind,
    VfsResult,
};
use drivefs_devfs::{DevFs, MemoryRegion};
use drivefs_ramdisk::{RamDiskFs, RamImage};
use pretty_assertions::assert_eq;

fn drive(letter: char) -> Drive {
    Drive::new(letter).unwrap()
}

fn ramdisk() -> RamDiskFs<RamImage> {
    RamDiskFs::new(RamImage::new(16))
}

const RWC: OpenMode = OpenMode::READ_WRITE.union(OpenMode::CREATE);

#[test]
fn drives_are_independent() {
    let mut vfs = Vfs::new();
    vfs.mount(drive('A'), ramdisk(), RWC).unwrap();
    vfs.mount(drive('B'), ramdisk(), RWC).unwrap();

    let a = vfs.open("A:/same", RWC).unwrap();
    vfs.write(a, b"on a").unwrap();
    vfs.close(a).unwrap();
    assert_eq!(
        vfs.open("B:/same", OpenMode::READ).unwrap_err().kind(),
        VfsErrorKind::NotFound
    );

    assert_eq!(
        vfs.mounted_drives().collect::<Vec<_>>(),
        vec![drive('A'), drive('B')]
    );
    assert_eq!(vfs.mount_count(), 2);
    assert_eq!(vfs.mount_info(drive('B')).unwrap().backend_name(), "ramdisk");
}

#[test]
fn stale_handle_rejected_after_slot_reuse() {
    let mut vfs = Vfs::<1>::default();
    vfs.mount(drive('A'), ramdisk(), RWC).unwrap();

    let first = vfs.open("A:/f", RWC).unwrap();
    vfs.close(first).unwrap();
    let second = vfs.open("A:/f", OpenMode::READ).unwrap();
    assert_eq!(first.index(), second.index());

    let mut buf = [0u8; 1];
    for err in [
        vfs.read(first, &mut buf).unwrap_err(),
        vfs.write(first, b"x").unwrap_err(),
        vfs.size(first).unwrap_err(),
        vfs.close(first).unwrap_err(),
    ] {
        assert_eq!(err.kind(), VfsErrorKind::InvalidArgument);
    }
    assert_eq!(vfs.open_handles(drive('A')).unwrap(), 1);
    vfs.close(second).unwrap();
}

#[test]
fn handle_counts_follow_open_and_close() {
    let mut vfs = Vfs::new();
    let ram = MemoryRegion::new(8);
    let devfs = DevFs::default()
        .with_entry("ram", drivefs_core::EntryFlags::READ, 8, ram)
        .unwrap();
    vfs.mount(drive('M'), devfs, OpenMode::READ).unwrap();
    vfs.mount(drive('A'), ramdisk(), RWC).unwrap();

    let m = vfs.open("M:/ram", OpenMode::READ).unwrap();
    let a1 = vfs.open("A:/x", RWC).unwrap();
    let a2 = vfs.open("A:/y", RWC).unwrap();
    let dd = vfs.diropen("A:/").unwrap();
    assert_eq!(vfs.open_handles(drive('A')).unwrap(), 3);
    assert_eq!(vfs.open_handles(drive('M')).unwrap(), 1);
    assert_eq!(vfs.handles_in_use(), 4);

    let info = vfs.handle_info(a1).unwrap();
    assert_eq!(info.drive(), Some(drive('A')));
    assert_eq!(info.mode(), RWC);

    vfs.close(a1).unwrap();
    vfs.close(a2).unwrap();
    assert_eq!(vfs.unmount(drive('A')).unwrap_err().kind(), VfsErrorKind::Busy);
    vfs.dirclose(dd).unwrap();
    vfs.unmount(drive('A')).unwrap();

    vfs.close(m).unwrap();
    vfs.unmount(drive('M')).unwrap();
    assert_eq!(vfs.mount_count(), 0);
    assert_eq!(
        vfs.open_handles(drive('A')).unwrap_err().kind(),
        VfsErrorKind::NotReady
    );
}

#[test]
fn path_validation_order() {
    let mut vfs: Vfs = Vfs::with_config(VfsConfig { max_path_len: 8 }).unwrap();
    vfs.mount(drive('A'), ramdisk(), RWC).unwrap();

    // drive problems win over path problems
    assert_eq!(
        vfs.open("B:bad", OpenMode::READ).unwrap_err().kind(),
        VfsErrorKind::NotReady
    );
    assert_eq!(
        vfs.open("A:bad", OpenMode::READ).unwrap_err().kind(),
        VfsErrorKind::InvalidArgument
    );
    assert_eq!(
        vfs.open("A:/123456789", RWC).unwrap_err().kind(),
        VfsErrorKind::InvalidArgument
    );
    assert!(vfs.open("A:///12345678", RWC).is_ok());
    assert!(Vfs::<4>::with_config(VfsConfig { max_path_len: 0 }).is_err());
}

struct Unmountable;

impl FsBackend for Unmountable {
    fn name(&self) -> &'static str {
        "unmountable"
    }

    fn supported(&self) -> BackendOps {
        BackendOps::REQUIRED - BackendOps::UNMOUNT - BackendOps::WRITE
    }

    fn mount(&mut self) -> VfsResult<()> {
        Ok(())
    }

    fn unmount(&mut self) -> VfsResult<()> {
        unreachable!("never advertised")
    }

    fn open(&mut self, _handle: &mut Handle, _path: &str, _mode: OpenMode) -> VfsResult<()> {
        Ok(())
    }

    fn close(&mut self, _handle: &mut Handle) -> VfsResult<()> {
        Ok(())
    }

    fn read(&mut self, _handle: &Handle, _buf: &mut [u8]) -> VfsResult<usize> {
        Ok(0)
    }

    fn write(&mut self, _handle: &Handle, _buf: &[u8]) -> VfsResult<usize> {
        unreachable!("never advertised")
    }

    fn size(&mut self, _handle: &Handle) -> VfsResult<u64> {
        Ok(0)
    }
}

#[test]
fn unadvertised_ops_never_dispatch() {
    let mut vfs = Vfs::new();
    vfs.mount(drive('U'), Unmountable, RWC).unwrap();
    let fd = vfs.open("U:/anything", OpenMode::WRITE).unwrap();
    assert_eq!(vfs.write(fd, b"x").unwrap_err().kind(), VfsErrorKind::Unsupported);
    assert_eq!(vfs.diropen("U:/").unwrap_err().kind(), VfsErrorKind::Unsupported);
    vfs.close(fd).unwrap();
    assert_eq!(
        vfs.unmount(drive('U')).unwrap_err().kind(),
        VfsErrorKind::Unsupported
    );
    assert!(vfs.is_mounted(drive('U')));
}

struct Broken;

impl FsBackend for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn mount(&mut self) -> VfsResult<()> {
        Err(VfsError::new(VfsErrorKind::DeviceError, "broken.mount"))
    }

    fn unmount(&mut self) -> VfsResult<()> {
        Ok(())
    }

    fn open(&mut self, _handle: &mut Handle, _path: &str, _mode: OpenMode) -> VfsResult<()> {
        Ok(())
    }

    fn close(&mut self, _handle: &mut Handle) -> VfsResult<()> {
        Ok(())
    }

    fn read(&mut self, _handle: &Handle, _buf: &mut [u8]) -> VfsResult<usize> {
        Ok(0)
    }

    fn write(&mut self, _handle: &Handle, _buf: &[u8]) -> VfsResult<usize> {
        Ok(0)
    }

    fn size(&mut self, _handle: &Handle) -> VfsResult<u64> {
        Ok(0)
    }
}

#[test]
fn failed_mount_leaves_slot_empty() {
    let mut vfs = Vfs::new();
    let err = vfs.mount(drive('C'), Broken, RWC).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::DeviceError);
    assert_eq!(err.context(), "broken.mount");
    assert!(!vfs.is_mounted(drive('C')));
    vfs.mount(drive('C'), ramdisk(), RWC).unwrap();
}
