//! Fixed pool of open file/directory handles.
//!
//! Slots are handed out from a freelist stack in O(1). Every release bumps
//! the slot generation, so a [`HandleId`] kept past `close` never resolves
//! again, even once the slot is reused.

use crate::flags::{EntityKind, OpenMode};
use crate::{Drive, HandleId};

/// Per-open state shared between the switch and the owning backend.
///
/// The switch owns `drive`, `kind`, `mode` and `cursor`; backends read them
/// and keep whatever they need in `cookie`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Handle {
    drive: Option<Drive>,
    kind: EntityKind,
    mode: OpenMode,
    cursor: u64,
    /// Backend-private value (entry index, open-file slot, ...).
    pub cookie: u64,
}

impl Handle {
    pub(crate) fn populate(&mut self, drive: Drive, kind: EntityKind, mode: OpenMode) {
        *self = Handle {
            drive: Some(drive),
            kind,
            mode,
            cursor: 0,
            cookie: 0,
        };
    }

    /// Drive the handle was opened on.
    #[inline]
    pub fn drive(&self) -> Option<Drive> {
        self.drive
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[inline]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// File position, or number of entries already returned for directories.
    #[inline]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    #[inline]
    pub(crate) fn set_cursor(&mut self, cursor: u64) {
        self.cursor = cursor;
    }

    #[inline]
    pub(crate) fn advance(&mut self, by: u64) {
        self.cursor = self.cursor.saturating_add(by);
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    open: bool,
    handle: Handle,
}

pub struct HandleArena<const N: usize> {
    slots: [Slot; N],
    /// Free slot indices; `free[..free_len]` is the stack.
    free: [u32; N],
    free_len: usize,
}

impl<const N: usize> HandleArena<N> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot {
                generation: 1,
                ..Slot::default()
            }),
            // pop order hands out slot 0 first
            free: core::array::from_fn(|i| (N - 1 - i) as u32),
            free_len: N,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of slots currently handed out.
    #[inline]
    pub fn in_use(&self) -> usize {
        N - self.free_len
    }

    /// Take a free slot and mark it open. `None` when the pool is exhausted.
    pub fn acquire(&mut self) -> Option<HandleId> {
        if self.free_len == 0 {
            return None;
        }
        self.free_len -= 1;
        let index = self.free[self.free_len] as usize;
        let slot = &mut self.slots[index];
        slot.open = true;
        slot.handle = Handle::default();
        HandleId::new(index, slot.generation)
    }

    /// Zero the slot and return it to the freelist. Returns `false` (and
    /// changes nothing) if `id` is not currently open.
    pub fn release(&mut self, id: HandleId) -> bool {
        if !self.is_valid_open(id) {
            return false;
        }
        let index = id.index();
        let slot = &mut self.slots[index];
        slot.open = false;
        slot.handle = Handle::default();
        // generation 0 is reserved so ids never pack to zero
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        self.free[self.free_len] = index as u32;
        self.free_len += 1;
        true
    }

    /// Bounds, open flag and generation check.
    pub fn is_valid_open(&self, id: HandleId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.open && slot.generation == id.generation())
    }

    pub fn get(&self, id: HandleId) -> Option<&Handle> {
        self.is_valid_open(id)
            .then(|| &self.slots[id.index()].handle)
    }

    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut Handle> {
        if self.is_valid_open(id) {
            Some(&mut self.slots[id.index()].handle)
        } else {
            None
        }
    }

    /// Iterate over the ids of every open slot.
    pub fn open_ids(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.open)
            .filter_map(|(index, slot)| HandleId::new(index, slot.generation))
    }
}

impl<const N: usize> Default for HandleArena<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for HandleArena<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandleArena")
            .field("capacity", &N)
            .field("in_use", &self.in_use())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_until_exhausted() {
        let mut arena = HandleArena::<3>::new();
        let ids: Vec<_> = (0..3).map(|_| arena.acquire().unwrap()).collect();
        assert_eq!(arena.in_use(), 3);
        assert!(arena.acquire().is_none());
        assert_eq!(ids.iter().map(|id| id.index()).collect::<Vec<_>>(), vec![0, 1, 2]);

        assert!(arena.release(ids[1]));
        let again = arena.acquire().unwrap();
        assert_eq!(again.index(), 1);
        assert_ne!(again, ids[1]);
    }

    #[test]
    fn stale_id_is_rejected_after_reuse() {
        let mut arena = HandleArena::<1>::new();
        let first = arena.acquire().unwrap();
        arena.get_mut(first).unwrap().cookie = 42;
        assert!(arena.release(first));

        assert!(!arena.is_valid_open(first));
        assert!(arena.get(first).is_none());
        assert!(!arena.release(first));

        let second = arena.acquire().unwrap();
        assert_eq!(second.index(), first.index());
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second).unwrap().cookie, 0);
    }

    #[test]
    fn out_of_bounds_id_is_invalid() {
        let arena = HandleArena::<2>::new();
        let foreign = HandleId::new(5, 1).unwrap();
        assert!(!arena.is_valid_open(foreign));
    }

    #[test]
    fn release_zeroes_slot() {
        let mut arena = HandleArena::<2>::new();
        let id = arena.acquire().unwrap();
        let drive = Drive::new('C').unwrap();
        let handle = arena.get_mut(id).unwrap();
        handle.populate(drive, EntityKind::Directory, OpenMode::READ);
        handle.advance(10);
        assert_eq!(arena.get(id).unwrap().cursor(), 10);
        arena.release(id);
        assert_eq!(arena.open_ids().count(), 0);
        let id = arena.acquire().unwrap();
        assert_eq!(arena.get(id), Some(&Handle::default()));
    }
}
