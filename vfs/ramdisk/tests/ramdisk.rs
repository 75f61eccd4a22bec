use drivefs_core::{Drive, OpenMode, Vfs, VfsError, VfsErrorKind, VfsResult, Whence};
use drivefs_ramdisk::{BlockDevice, RamDiskConfig, RamDiskFs, RamImage, SECTOR_SIZE};
use pretty_assertions::assert_eq;

fn drive_a() -> Drive {
    Drive::new('A').unwrap()
}

fn vfs_with_disk(sectors: usize) -> Vfs {
    let mut vfs = Vfs::new();
    let fs = RamDiskFs::new(RamImage::new(sectors));
    vfs.mount(drive_a(), fs, OpenMode::READ_WRITE | OpenMode::CREATE)
        .unwrap();
    vfs
}

#[test]
fn sector_round_trip() {
    let mut vfs = vfs_with_disk(10);

    let fd = vfs.open("A:/f", OpenMode::CREATE | OpenMode::WRITE).unwrap();
    let data: Vec<u8> = (0..512u32).map(|i| (i * 7) as u8).collect();
    assert_eq!(vfs.write(fd, &data).unwrap(), 512);
    vfs.close(fd).unwrap();

    let fd = vfs.open("A:/f", OpenMode::READ).unwrap();
    let mut back = vec![0u8; 512];
    assert_eq!(vfs.read(fd, &mut back).unwrap(), 512);
    assert_eq!(back, data);
    assert_eq!(vfs.read(fd, &mut back).unwrap(), 0);
    vfs.close(fd).unwrap();
    assert_eq!(vfs.open_handles(drive_a()).unwrap(), 0);
}

#[test]
fn unaligned_overwrite_keeps_neighbours() {
    let mut vfs = vfs_with_disk(4);
    let fd = vfs
        .open("A:/f", OpenMode::READ_WRITE | OpenMode::CREATE)
        .unwrap();
    vfs.write(fd, &[b'a'; 700]).unwrap();
    vfs.seek(fd, 510, Whence::Set).unwrap();
    vfs.write(fd, b"XYZW").unwrap();
    assert_eq!(vfs.size(fd).unwrap(), 700);

    vfs.seek(fd, 508, Whence::Set).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(vfs.read(fd, &mut buf).unwrap(), 8);
    assert_eq!(&buf, b"aaXYZWaa");
}

#[test]
fn full_device_gives_short_then_failed_writes() {
    let mut vfs = vfs_with_disk(2);
    let fd = vfs.open("A:/big", OpenMode::WRITE | OpenMode::CREATE).unwrap();
    let written = vfs.write(fd, &[1u8; SECTOR_SIZE * 3]).unwrap();
    assert_eq!(written, SECTOR_SIZE * 2);
    let err = vfs.write(fd, &[1u8; 10]).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::OutOfResources);
    vfs.close(fd).unwrap();

    // space comes back once the file is gone
    vfs.unlink("A:/big").unwrap();
    let fd = vfs.open("A:/small", OpenMode::WRITE | OpenMode::CREATE).unwrap();
    assert_eq!(vfs.write(fd, &[2u8; 100]).unwrap(), 100);
}

#[test]
fn create_truncates_existing_file() {
    let mut vfs = vfs_with_disk(4);
    let fd = vfs.open("A:/f", OpenMode::WRITE | OpenMode::CREATE).unwrap();
    vfs.write(fd, b"long contents").unwrap();
    vfs.close(fd).unwrap();

    let fd = vfs.open("A:/f", OpenMode::WRITE | OpenMode::CREATE).unwrap();
    assert_eq!(vfs.size(fd).unwrap(), 0);
    vfs.close(fd).unwrap();

    let fd = vfs.open("A:/f", OpenMode::WRITE).unwrap();
    vfs.write(fd, b"ab").unwrap();
    vfs.close(fd).unwrap();
    let fd = vfs.open("A:/f", OpenMode::READ).unwrap();
    assert_eq!(vfs.size(fd).unwrap(), 2);
}

#[test]
fn create_refused_while_file_is_open() {
    let mut vfs = vfs_with_disk(8);
    let rwc = OpenMode::READ_WRITE | OpenMode::CREATE;
    let fd = vfs.open("A:/f", rwc).unwrap();
    assert_eq!(vfs.write(fd, &[b'a'; 600]).unwrap(), 600);

    let err = vfs.open("A:/f", OpenMode::WRITE | OpenMode::CREATE).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::Busy);
    assert_eq!(vfs.handles_in_use(), 1);

    // the surviving cursor still writes where it points
    assert_eq!(vfs.write(fd, b"ZZZZ").unwrap(), 4);
    vfs.seek(fd, 0, Whence::Set).unwrap();
    let mut back = vec![0u8; 604];
    assert_eq!(vfs.read(fd, &mut back).unwrap(), 604);
    assert!(back[..600].iter().all(|&b| b == b'a'));
    assert_eq!(&back[600..], b"ZZZZ");
    vfs.close(fd).unwrap();

    // plain reopen for reading is still fine alongside
    let fd = vfs.open("A:/f", OpenMode::READ).unwrap();
    let again = vfs.open("A:/f", OpenMode::READ).unwrap();
    vfs.close(again).unwrap();
    vfs.close(fd).unwrap();
}

/// Image that fails every write once its budget is spent.
struct WornImage {
    image: RamImage,
    writes_left: usize,
}

impl BlockDevice for WornImage {
    fn online(&self) -> bool {
        self.image.online()
    }

    fn init(&mut self) -> VfsResult<()> {
        self.image.init()
    }

    fn sector_count(&self) -> u64 {
        self.image.sector_count()
    }

    fn read_sectors(&mut self, start: u64, buf: &mut [u8]) -> VfsResult<()> {
        self.image.read_sectors(start, buf)
    }

    fn write_sectors(&mut self, start: u64, buf: &[u8]) -> VfsResult<()> {
        if self.writes_left == 0 {
            return Err(VfsError::new(VfsErrorKind::DeviceError, "worn.write"));
        }
        self.writes_left -= 1;
        self.image.write_sectors(start, buf)
    }
}

#[test]
fn device_failure_mid_write_keeps_written_prefix() {
    // block 0 takes a zero fill plus the data; block 1 gets only its zero fill
    let device = WornImage {
        image: RamImage::new(8),
        writes_left: 3,
    };
    let mut vfs = Vfs::new();
    let rwc = OpenMode::READ_WRITE | OpenMode::CREATE;
    vfs.mount(drive_a(), RamDiskFs::new(device), rwc).unwrap();

    let fd = vfs.open("A:/f", rwc).unwrap();
    let data: Vec<u8> = (0..2 * SECTOR_SIZE as u32).map(|i| i as u8).collect();
    assert_eq!(vfs.write(fd, &data).unwrap(), SECTOR_SIZE);
    assert_eq!(vfs.size(fd).unwrap(), SECTOR_SIZE as u64);

    let err = vfs.write(fd, &data[SECTOR_SIZE..]).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::DeviceError);
    assert_eq!(vfs.size(fd).unwrap(), SECTOR_SIZE as u64);

    vfs.seek(fd, 0, Whence::Set).unwrap();
    let mut back = vec![0u8; 2 * SECTOR_SIZE];
    assert_eq!(vfs.read(fd, &mut back).unwrap(), SECTOR_SIZE);
    assert_eq!(&back[..SECTOR_SIZE], &data[..SECTOR_SIZE]);
    vfs.close(fd).unwrap();
}

#[test]
fn missing_parent_is_not_found() {
    let mut vfs = vfs_with_disk(4);
    let err = vfs
        .open("A:/nodir/f", OpenMode::WRITE | OpenMode::CREATE)
        .unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotFound);
    assert_eq!(vfs.handles_in_use(), 0);
    let err = vfs.open("A:/nothing", OpenMode::READ).unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotFound);
}

#[test]
fn directories_and_rename() {
    let mut vfs = vfs_with_disk(8);
    vfs.mkdir("A:/docs").unwrap();
    vfs.mkdir("A:/docs/old").unwrap();
    let fd = vfs
        .open("A:/docs/note.txt", OpenMode::WRITE | OpenMode::CREATE)
        .unwrap();
    vfs.write(fd, b"hi").unwrap();

    // open files cannot be removed
    assert_eq!(vfs.unlink("A:/docs/note.txt").unwrap_err().kind(), VfsErrorKind::Busy);
    vfs.close(fd).unwrap();

    vfs.rename("A:/docs/note.txt", "A:/docs/old/note.txt").unwrap();
    assert_eq!(
        vfs.open("A:/docs/note.txt", OpenMode::READ).unwrap_err().kind(),
        VfsErrorKind::NotFound
    );
    let fd = vfs.open("A:/docs/old/note.txt", OpenMode::READ).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(vfs.read(fd, &mut buf).unwrap(), 2);
    vfs.close(fd).unwrap();

    // a directory cannot move into its own subtree
    assert_eq!(
        vfs.rename("A:/docs", "A:/docs/old/docs").unwrap_err().kind(),
        VfsErrorKind::InvalidArgument
    );
    // non-empty directories stay put
    assert_eq!(vfs.unlink("A:/docs/old").unwrap_err().kind(), VfsErrorKind::Busy);
    vfs.unlink("A:/docs/old/note.txt").unwrap();
    vfs.unlink("A:/docs/old").unwrap();

    let dd = vfs.diropen("A:/docs").unwrap();
    assert_eq!(vfs.dirnext(dd).unwrap_err().kind(), VfsErrorKind::NotFound);
    vfs.dirclose(dd).unwrap();
}

#[test]
fn directory_entries_carry_flags() {
    let mut vfs = vfs_with_disk(4);
    vfs.mkdir("A:/sub").unwrap();
    let fd = vfs.open("A:/file", OpenMode::WRITE | OpenMode::CREATE).unwrap();
    vfs.close(fd).unwrap();

    let dd = vfs.diropen("A:/").unwrap();
    let first = vfs.dirnext(dd).unwrap();
    assert_eq!(first.name(), "sub");
    assert!(first.is_dir());
    let second = vfs.dirnext(dd).unwrap();
    assert_eq!(second.name(), "file");
    assert!(!second.is_dir());
    assert!(!second.flags.is_read_only());
    assert_eq!(vfs.dirnext(dd).unwrap_err().kind(), VfsErrorKind::NotFound);
    vfs.dirclose(dd).unwrap();
}

#[test]
fn volume_queries() {
    let mut vfs = Vfs::new();
    let config = RamDiskConfig {
        label: "SCRATCH".to_string(),
        ..RamDiskConfig::default()
    };
    let fs = RamDiskFs::with_config(RamImage::new(16), config);
    vfs.mount(drive_a(), fs, OpenMode::READ).unwrap();
    assert_eq!(vfs.volume_size(drive_a()).unwrap(), 16 * 512);
    assert_eq!(vfs.volume_label(drive_a()).unwrap().as_str(), "SCRATCH");
    assert_eq!(vfs.volume_serial(drive_a()).unwrap().as_str(), "00000000");
}

#[test]
fn offline_image_does_not_mount() {
    let mut image = RamImage::new(4);
    image.set_online(false);
    let mut vfs = Vfs::new();
    let err = vfs
        .mount(drive_a(), RamDiskFs::new(image), OpenMode::READ)
        .unwrap_err();
    assert_eq!(err.kind(), VfsErrorKind::NotReady);
    assert!(!vfs.is_mounted(drive_a()));
}
