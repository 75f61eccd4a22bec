//! Directory browsing session: a scanned listing plus a selection set.

use tracing::debug;

use crate::bitset::BitSet;
use crate::config::PathStoreConfig;
use crate::path_store::PathStore;
use crate::vfs::Vfs;
use crate::{VfsErrorKind, VfsResult};

/// Name of the synthetic first entry of every scan.
pub const PARENT_ENTRY: &str = "../";

/// The entries of one directory, with a selection bit per entry.
///
/// Directory names carry a trailing `/`. Entry 0 is always [`PARENT_ENTRY`].
#[derive(Debug)]
pub struct Listing {
    entries: PathStore,
    selection: BitSet,
    truncated: bool,
}

impl Listing {
    pub fn new(config: &PathStoreConfig) -> Self {
        let entries = PathStore::with_config(config);
        let selection = BitSet::new(entries.capacity());
        Self {
            entries,
            selection,
            truncated: false,
        }
    }

    /// Replace the listing with the contents of `dir`.
    ///
    /// The previous listing is kept if `dir` cannot be opened. Running out of
    /// store space ends the scan early and sets [`truncated`](Self::truncated).
    pub fn scan<const H: usize>(&mut self, vfs: &mut Vfs<H>, dir: &str) -> VfsResult<usize> {
        let dd = vfs.diropen(dir)?;
        let result = self.fill(vfs, dd);
        let closed = vfs.dirclose(dd);
        result?;
        closed?;
        debug!(dir, entries = self.entries.count(), truncated = self.truncated, "scanned");
        Ok(self.entries.count())
    }

    fn fill<const H: usize>(&mut self, vfs: &mut Vfs<H>, dd: crate::HandleId) -> VfsResult<()> {
        self.entries.reset();
        self.selection.clear_all();
        self.truncated = false;
        self.entries.append(PARENT_ENTRY)?;

        loop {
            let entry = match vfs.dirnext(dd) {
                Ok(entry) => entry,
                Err(err) if err.kind() == VfsErrorKind::NotFound => return Ok(()),
                Err(err) => return Err(err),
            };
            let stored = self.entries.concat(entry.name()).and_then(|()| {
                if entry.is_dir() {
                    self.entries.concat("/")?;
                }
                self.entries.finish()
            });
            match stored {
                Ok(()) => {}
                Err(err) if err.kind() == VfsErrorKind::OutOfResources => {
                    self.entries.discard();
                    self.truncated = true;
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the last scan stopped because the store was full.
    #[inline]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn get(&self, index: usize) -> VfsResult<&str> {
        self.entries.get_str(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter()
    }

    /// Whether entry `index` names a directory.
    pub fn is_dir(&self, index: usize) -> bool {
        self.get(index).is_ok_and(crate::path::is_dir_path)
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selection.test(index)
    }

    /// Flip the selection of entry `index`. Returns the new state, or
    /// `None` if there is no such entry. The parent entry is never selectable.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        if index == 0 || index >= self.len() {
            return None;
        }
        Some(self.selection.toggle(index))
    }

    /// Select every entry except the parent entry.
    pub fn select_all(&mut self) {
        for index in 1..self.len() {
            self.selection.set(index);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_all();
    }

    pub fn selection_count(&self) -> usize {
        self.selection.count()
    }

    /// Selected entry names in listing order.
    pub fn selected(&self) -> impl Iterator<Item = &str> + '_ {
        self.selection
            .iter()
            .filter_map(|index| self.entries.get_str(index).ok())
    }
}
