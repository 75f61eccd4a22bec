//! Chunked transfers and whole-file helpers built on the dispatcher.

use tracing::{debug, warn};

use crate::flags::OpenMode;
use crate::vfs::Vfs;
use crate::{HandleId, VfsError, VfsErrorKind, VfsResult};

/// Largest chunk a [`BlockTransfer`] will ever buffer.
pub const MAX_BLOCK_LEN: usize = 0x80000;

/// Chunk size used by [`copy_file`].
pub const COPY_BLOCK_LEN: usize = 64 << 10;

/// Moves a byte range through a handle in bounded chunks.
///
/// The scratch buffer starts at `max_block` and is halved on allocation
/// failure, down to `min_block`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockTransfer {
    min_block: usize,
    max_block: usize,
}

impl BlockTransfer {
    pub fn new(min_block: usize, max_block: usize) -> VfsResult<Self> {
        let max_block = max_block.min(MAX_BLOCK_LEN);
        if min_block == 0 || min_block > max_block {
            return Err(VfsError::new(
                VfsErrorKind::InvalidArgument,
                "transfer.block_len",
            ));
        }
        Ok(Self {
            min_block,
            max_block,
        })
    }

    #[inline]
    pub fn min_block(&self) -> usize {
        self.min_block
    }

    #[inline]
    pub fn max_block(&self) -> usize {
        self.max_block
    }

    fn scratch(&self, len: u64) -> VfsResult<Vec<u8>> {
        if (self.min_block as u64) > len {
            return Err(VfsError::new(
                VfsErrorKind::InvalidArgument,
                "transfer.data_len",
            ));
        }
        let mut size = usize::try_from(len).map_or(self.max_block, |len| len.min(self.max_block));
        let mut buf = Vec::new();
        while size >= self.min_block {
            if buf.try_reserve_exact(size).is_ok() {
                buf.resize(size, 0);
                return Ok(buf);
            }
            size /= 2;
        }
        Err(VfsError::new(VfsErrorKind::OutOfResources, "transfer.buffer"))
    }

    /// Read `len` bytes from `id`, handing each chunk to `sink`.
    ///
    /// Stops early on a short read or when `sink` fails. Returns the number
    /// of bytes that were not transferred.
    pub fn read_blocks<const H: usize, F>(
        &self,
        vfs: &mut Vfs<H>,
        id: HandleId,
        len: u64,
        mut sink: F,
    ) -> VfsResult<u64>
    where
        F: FnMut(&mut Vfs<H>, &[u8]) -> VfsResult<()>,
    {
        let mut buf = self.scratch(len)?;
        let mut remaining = len;
        while remaining > 0 {
            let block = chunk_len(remaining, buf.len());
            let read = vfs.read(id, &mut buf[..block])?;
            sink(&mut *vfs, &buf[..read])?;
            remaining -= read as u64;
            if read != block {
                break;
            }
        }
        Ok(remaining)
    }

    /// Write `len` bytes to `id`, asking `source` to fill each chunk first.
    ///
    /// Stops early on a short write or when `source` fails. Returns the
    /// number of bytes that were not transferred.
    pub fn write_blocks<const H: usize, F>(
        &self,
        vfs: &mut Vfs<H>,
        id: HandleId,
        len: u64,
        mut source: F,
    ) -> VfsResult<u64>
    where
        F: FnMut(&mut Vfs<H>, &mut [u8]) -> VfsResult<()>,
    {
        let mut buf = self.scratch(len)?;
        let mut remaining = len;
        while remaining > 0 {
            let block = chunk_len(remaining, buf.len());
            source(&mut *vfs, &mut buf[..block])?;
            let written = vfs.write(id, &buf[..block])?;
            remaining -= written as u64;
            if written != block {
                break;
            }
        }
        Ok(remaining)
    }
}

fn chunk_len(remaining: u64, cap: usize) -> usize {
    usize::try_from(remaining).map_or(cap, |r| r.min(cap))
}

/// Copy `src` to `dst` (created or truncated), reporting `(done, total)`
/// after every chunk. Both handles are closed whatever the outcome.
pub fn copy_file<const H: usize, P>(
    vfs: &mut Vfs<H>,
    src: &str,
    dst: &str,
    mut progress: P,
) -> VfsResult<u64>
where
    P: FnMut(u64, u64),
{
    let out = vfs.open(dst, OpenMode::WRITE | OpenMode::CREATE)?;
    let input = match vfs.open(src, OpenMode::READ) {
        Ok(fd) => fd,
        Err(err) => {
            if let Err(close_err) = vfs.close(out) {
                warn!(dst, error = %close_err, "closing copy destination failed");
            }
            return Err(err);
        }
    };

    let result = copy_between(vfs, input, out, &mut progress);
    let closed_in = vfs.close(input);
    let closed_out = vfs.close(out);
    let copied = result?;
    closed_in?;
    closed_out?;
    debug!(src, dst, bytes = copied, "copied");
    Ok(copied)
}

fn copy_between<const H: usize>(
    vfs: &mut Vfs<H>,
    input: HandleId,
    out: HandleId,
    progress: &mut dyn FnMut(u64, u64),
) -> VfsResult<u64> {
    let total = vfs.size(input)?;
    if total == 0 {
        return Ok(0);
    }
    let mut done = 0u64;
    let transfer = BlockTransfer::new(1, COPY_BLOCK_LEN)?;
    let remaining = transfer.read_blocks(vfs, input, total, |vfs, block| {
        let written = vfs.write(out, block)?;
        done += written as u64;
        progress(done, total);
        if written < block.len() {
            return Err(VfsError::new(VfsErrorKind::IoError, "copy_file.short_write"));
        }
        Ok(())
    })?;
    if remaining > 0 {
        return Err(VfsError::new(VfsErrorKind::IoError, "copy_file.short_read"));
    }
    Ok(done)
}

/// Rename `old` to `new`. If the rename fails and `fallback` is set, copy
/// the file and remove the original instead.
pub fn move_file<const H: usize>(
    vfs: &mut Vfs<H>,
    old: &str,
    new: &str,
    fallback: bool,
) -> VfsResult<()> {
    match vfs.rename(old, new) {
        Ok(()) => Ok(()),
        Err(err) if !fallback => Err(err),
        Err(err) => {
            debug!(old, new, error = %err, "rename failed, copying");
            copy_file(vfs, old, new, |_, _| {})?;
            vfs.unlink(old)
        }
    }
}
