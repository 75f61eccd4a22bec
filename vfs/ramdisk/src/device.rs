use drivefs_core::{VfsError, VfsErrorKind, VfsResult};

/// Bytes per device sector.
pub const SECTOR_SIZE: usize = 512;

/// Sector-addressed storage underneath a [`RamDiskFs`](crate::RamDiskFs).
///
/// Transfers always cover whole sectors: `buf.len()` must be a multiple of
/// [`SECTOR_SIZE`].
pub trait BlockDevice: 'static {
    /// Whether the medium is present.
    fn online(&self) -> bool;
    fn init(&mut self) -> VfsResult<()>;
    fn sector_count(&self) -> u64;
    fn read_sectors(&mut self, start: u64, buf: &mut [u8]) -> VfsResult<()>;
    fn write_sectors(&mut self, start: u64, buf: &[u8]) -> VfsResult<()>;
}

/// A disk image held in memory.
#[derive(Clone, Debug)]
pub struct RamImage {
    data: Box<[u8]>,
    online: bool,
}

impl RamImage {
    /// Zero-filled image of `sectors` sectors.
    pub fn new(sectors: usize) -> Self {
        Self {
            data: vec![0u8; sectors * SECTOR_SIZE].into_boxed_slice(),
            online: true,
        }
    }

    /// Wrap existing image bytes. The length must be a whole number of sectors.
    pub fn from_bytes(data: Vec<u8>) -> VfsResult<Self> {
        if data.len() % SECTOR_SIZE != 0 {
            return Err(VfsError::new(
                VfsErrorKind::InvalidArgument,
                "ramimg.from_bytes",
            ));
        }
        Ok(Self {
            data: data.into_boxed_slice(),
            online: true,
        })
    }

    /// Simulate inserting or removing the medium.
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, start: u64, len: usize, context: &'static str) -> VfsResult<core::ops::Range<usize>> {
        if len % SECTOR_SIZE != 0 {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, context));
        }
        let begin = usize::try_from(start)
            .ok()
            .and_then(|s| s.checked_mul(SECTOR_SIZE))
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, context))?;
        let end = begin
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, context))?;
        Ok(begin..end)
    }
}

impl BlockDevice for RamImage {
    fn online(&self) -> bool {
        self.online
    }

    fn init(&mut self) -> VfsResult<()> {
        if !self.online {
            return Err(VfsError::new(VfsErrorKind::NotReady, "ramimg.init"));
        }
        Ok(())
    }

    fn sector_count(&self) -> u64 {
        (self.data.len() / SECTOR_SIZE) as u64
    }

    fn read_sectors(&mut self, start: u64, buf: &mut [u8]) -> VfsResult<()> {
        let range = self.range(start, buf.len(), "ramimg.read")?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_sectors(&mut self, start: u64, buf: &[u8]) -> VfsResult<()> {
        let range = self.range(start, buf.len(), "ramimg.write")?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }
}
