use std::sync::Arc;

use drivefs_core::{VfsError, VfsErrorKind, VfsResult};
use parking_lot::Mutex;

/// Byte-addressed source behind a device file.
///
/// Offsets and lengths are already clamped to the entry size by
/// [`DevFs`](crate::DevFs). Short transfers are allowed.
pub trait Device: 'static {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> VfsResult<usize>;

    fn write_at(&mut self, _pos: u64, _buf: &[u8]) -> VfsResult<usize> {
        Err(VfsError::new(VfsErrorKind::PermissionDenied, "device.write"))
    }
}

fn window(len: usize, pos: u64, want: usize) -> Option<core::ops::Range<usize>> {
    let start = usize::try_from(pos).ok().filter(|&start| start <= len)?;
    Some(start..start + want.min(len - start))
}

/// Writable memory shared with the host application.
///
/// Clones refer to the same bytes, so the application can keep one clone
/// and observe or update what the mounted device file exposes.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegion {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryRegion {
    /// Zero-filled region of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self::from_vec(vec![0u8; len])
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(bytes)),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// Run `f` with the region locked.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut bytes = self.bytes.lock();
        f(bytes.as_mut_slice())
    }
}

impl Device for MemoryRegion {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let bytes = self.bytes.lock();
        let Some(range) = window(bytes.len(), pos, buf.len()) else {
            return Ok(0);
        };
        let n = range.len();
        buf[..n].copy_from_slice(&bytes[range]);
        Ok(n)
    }

    fn write_at(&mut self, pos: u64, buf: &[u8]) -> VfsResult<usize> {
        let mut bytes = self.bytes.lock();
        let Some(range) = window(bytes.len(), pos, buf.len()) else {
            return Ok(0);
        };
        let n = range.len();
        bytes[range].copy_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// Read-only bytes baked into the program.
#[derive(Clone, Copy, Debug)]
pub struct StaticRegion {
    bytes: &'static [u8],
}

impl StaticRegion {
    pub const fn new(bytes: &'static [u8]) -> Self {
        Self { bytes }
    }

    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Device for StaticRegion {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let Some(range) = window(self.bytes.len(), pos, buf.len()) else {
            return Ok(0);
        };
        let n = range.len();
        buf[..n].copy_from_slice(&self.bytes[range]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_region_is_shared_between_clones() {
        let host = MemoryRegion::new(4);
        let mut dev = host.clone();
        assert_eq!(dev.write_at(1, b"xyz!").unwrap(), 3);
        assert_eq!(host.snapshot(), b"\0xyz");

        host.with_bytes(|b| b[0] = b'w');
        let mut buf = [0u8; 8];
        assert_eq!(dev.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"wxyz");
        assert_eq!(dev.read_at(9, &mut buf).unwrap(), 0);
    }

    #[test]
    fn static_region_rejects_writes() {
        let mut dev = StaticRegion::new(b"rom");
        let err = dev.write_at(0, b"x").unwrap_err();
        assert_eq!(err.kind(), VfsErrorKind::PermissionDenied);
        let mut buf = [0u8; 2];
        assert_eq!(dev.read_at(1, &mut buf).unwrap(), 2);
        assert_eq!(&buf, b"om");
    }
}
