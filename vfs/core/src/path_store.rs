//! Append-only bulk string store with a sparse offset cache.
//!
//! Entries are packed back to back in one byte buffer. Each entry's length
//! is kept in a single byte, so an entry can hold at most
//! [`MAX_ENTRY_LEN`] bytes; callers size intermediate buffers on that
//! bound. Instead of one offset per entry, only the offset of every
//! [`CACHE_STRIDE`]-th entry is remembered, and a lookup walks at most
//! `CACHE_STRIDE - 1` lengths forward from the nearest cached offset.
//!
//! All buffers are allocated in the constructor and never grow.

use crate::config::PathStoreConfig;
use crate::{VfsError, VfsErrorKind, VfsResult};

/// Every `CACHE_STRIDE`-th entry has its buffer offset cached.
pub const CACHE_STRIDE: usize = 32;

/// Longest single entry, bounded by the one-byte length field.
pub const MAX_ENTRY_LEN: usize = u8::MAX as usize;

pub struct PathStore {
    buf: Box<[u8]>,
    lengths: Box<[u8]>,
    cache: Box<[usize]>,
    count: usize,
    /// Write cursor: end of the committed entries plus any pending fragments.
    cursor: usize,
    /// Bytes of the record being assembled by `concat`.
    pending: usize,
}

impl PathStore {
    /// Reserve `buffer_bytes` of text space for up to `max_entries` entries.
    pub fn new(buffer_bytes: usize, max_entries: usize) -> Self {
        Self {
            buf: vec![0u8; buffer_bytes].into_boxed_slice(),
            lengths: vec![0u8; max_entries].into_boxed_slice(),
            cache: vec![0usize; max_entries.div_ceil(CACHE_STRIDE)].into_boxed_slice(),
            count: 0,
            cursor: 0,
            pending: 0,
        }
    }

    pub fn with_config(config: &PathStoreConfig) -> Self {
        Self::new(config.buffer_bytes, config.max_entries)
    }

    /// Number of committed entries.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Maximum number of entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.lengths.len()
    }

    #[inline]
    pub fn buffer_capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes used by committed entries and pending fragments.
    #[inline]
    pub fn bytes_used(&self) -> usize {
        self.cursor
    }

    /// Drop every entry and any pending fragments. Capacity is unchanged.
    pub fn reset(&mut self) {
        self.buf.fill(0);
        self.lengths.fill(0);
        self.cache.fill(0);
        self.count = 0;
        self.cursor = 0;
        self.pending = 0;
    }

    /// Append `segment` as one complete entry.
    ///
    /// Nothing is written unless the whole entry fits. Any fragments
    /// pending from [`concat`](Self::concat) become part of this entry.
    pub fn append(&mut self, segment: &str) -> VfsResult<()> {
        self.concat(segment)?;
        self.finish()
    }

    /// Add a fragment to the entry being assembled. The entry only becomes
    /// visible after [`finish`](Self::finish).
    pub fn concat(&mut self, fragment: &str) -> VfsResult<()> {
        let bytes = fragment.as_bytes();
        if self.count == self.capacity() {
            return Err(VfsError::new(
                VfsErrorKind::OutOfResources,
                "path_store.concat.entries",
            ));
        }
        if self.pending + bytes.len() > MAX_ENTRY_LEN {
            return Err(VfsError::new(
                VfsErrorKind::OutOfResources,
                "path_store.concat.entry_len",
            ));
        }
        if self.cursor + bytes.len() > self.buf.len() {
            return Err(VfsError::new(
                VfsErrorKind::OutOfResources,
                "path_store.concat.buffer",
            ));
        }

        self.buf[self.cursor..self.cursor + bytes.len()].copy_from_slice(bytes);
        self.cursor += bytes.len();
        self.pending += bytes.len();
        Ok(())
    }

    /// Commit the pending fragments as the next entry.
    pub fn finish(&mut self) -> VfsResult<()> {
        let index = self.count;
        if index == self.capacity() {
            return Err(VfsError::new(
                VfsErrorKind::OutOfResources,
                "path_store.finish",
            ));
        }

        let start = self.cursor - self.pending;
        // pending <= MAX_ENTRY_LEN is enforced by concat
        self.lengths[index] = self.pending as u8;
        if index % CACHE_STRIDE == 0 {
            self.cache[index / CACHE_STRIDE] = start;
        }
        self.count += 1;
        self.pending = 0;
        Ok(())
    }

    /// Throw away fragments added since the last commit.
    pub fn discard(&mut self) {
        let start = self.cursor - self.pending;
        self.buf[start..self.cursor].fill(0);
        self.cursor = start;
        self.pending = 0;
    }

    /// Borrow entry `index` as raw bytes.
    pub fn entry(&self, index: usize) -> VfsResult<&[u8]> {
        if index >= self.count {
            return Err(VfsError::new(
                VfsErrorKind::InvalidArgument,
                "path_store.get",
            ));
        }

        let slot = index / CACHE_STRIDE;
        let offset = self.lengths[slot * CACHE_STRIDE..index]
            .iter()
            .fold(self.cache[slot], |offset, &len| offset + len as usize);
        let len = self.lengths[index] as usize;
        Ok(&self.buf[offset..offset + len])
    }

    /// Borrow entry `index` as a string slice.
    pub fn get_str(&self, index: usize) -> VfsResult<&str> {
        // entries are assembled from whole `&str` fragments
        core::str::from_utf8(self.entry(index)?)
            .map_err(|_| VfsError::new(VfsErrorKind::InvalidArgument, "path_store.get_str"))
    }

    /// Copy up to `out.len()` bytes of entry `index` into `out`, returning
    /// the number of bytes copied.
    pub fn get(&self, index: usize, out: &mut [u8]) -> VfsResult<usize> {
        let entry = self.entry(index)?;
        let n = entry.len().min(out.len());
        out[..n].copy_from_slice(&entry[..n]);
        Ok(n)
    }

    /// Iterate over committed entries in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            store: self,
            index: 0,
            offset: 0,
        }
    }
}

impl core::fmt::Debug for PathStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PathStore")
            .field("count", &self.count)
            .field("capacity", &self.capacity())
            .field("bytes_used", &self.cursor)
            .field("buffer_capacity", &self.buf.len())
            .finish()
    }
}

/// Sequential iterator; walks the buffer once instead of using the cache.
pub struct Iter<'a> {
    store: &'a PathStore,
    index: usize,
    offset: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.store.count {
            return None;
        }
        let len = self.store.lengths[self.index] as usize;
        let bytes = &self.store.buf[self.offset..self.offset + len];
        self.index += 1;
        self.offset += len;
        core::str::from_utf8(bytes).ok()
    }
}
