//! Fixed-capacity, word-packed membership bitmap.
//!
//! Used for multi-selection over path store entries (and for sector
//! allocation in the RAM disk backend). The storage is allocated once in
//! [`BitSet::new`] and never grows.
//!
//! `find_next_set`/`find_next_clear` scan forward word by word starting at
//! the word holding the last index set (resp. cleared), wrapping around at
//! the end. The hints only affect which matching bit is returned first,
//! never whether one is found.

const WORD_BITS: usize = usize::BITS as usize;

#[inline]
fn word_of(index: usize) -> usize {
    index / WORD_BITS
}

#[inline]
fn mask_of(index: usize) -> usize {
    1 << (index % WORD_BITS)
}

#[derive(Clone, PartialEq, Eq)]
pub struct BitSet {
    words: Box<[usize]>,
    max: usize,
    count: usize,
    last_set: usize,
    last_cleared: usize,
}

impl BitSet {
    /// Create an empty set able to hold indices `0..max`.
    pub fn new(max: usize) -> Self {
        let words = max.div_ceil(WORD_BITS);
        Self {
            words: vec![0usize; words].into_boxed_slice(),
            max,
            count: 0,
            last_set: 0,
            last_cleared: 0,
        }
    }

    /// Number of indices the set can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max
    }

    /// Number of set bits.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of clear bits.
    #[inline]
    pub fn clear_count(&self) -> usize {
        self.max - self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Membership test. Out-of-range indices are never members.
    #[inline]
    pub fn test(&self, index: usize) -> bool {
        index < self.max && self.words[word_of(index)] & mask_of(index) != 0
    }

    /// Set bit `index`. No-op if it is already set.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.capacity()`.
    pub fn set(&mut self, index: usize) {
        self.check_index(index);
        if self.test(index) {
            return;
        }
        self.words[word_of(index)] |= mask_of(index);
        self.last_set = index;
        self.count += 1;
    }

    /// Clear bit `index`. No-op if it is already clear.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.capacity()`.
    pub fn clear(&mut self, index: usize) {
        self.check_index(index);
        if !self.test(index) {
            return;
        }
        self.words[word_of(index)] &= !mask_of(index);
        self.last_cleared = index;
        self.count -= 1;
    }

    /// Flip bit `index`, returning its new state.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.capacity()`.
    pub fn toggle(&mut self, index: usize) -> bool {
        self.check_index(index);
        let was_set = self.test(index);
        self.words[word_of(index)] ^= mask_of(index);
        if was_set {
            self.count -= 1;
            self.last_cleared = index;
        } else {
            self.count += 1;
            self.last_set = index;
        }
        !was_set
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
        self.count = 0;
        self.last_set = 0;
        self.last_cleared = 0;
    }

    pub fn set_all(&mut self) {
        self.words.fill(usize::MAX);
        if let Some(last) = self.words.last_mut() {
            *last &= Self::tail_mask(self.max);
        }
        self.count = self.max;
        self.last_set = 0;
        self.last_cleared = 0;
    }

    /// Some set index, or `None` when the set is empty.
    pub fn find_next_set(&self) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        self.scan_from(word_of(self.last_set), |word, _| word)
    }

    /// Some clear index, or `None` when every bit is set.
    pub fn find_next_clear(&self) -> Option<usize> {
        if self.clear_count() == 0 {
            return None;
        }
        let max = self.max;
        let last_word = self.words.len() - 1;
        self.scan_from(word_of(self.last_cleared), move |word, i| {
            let valid = if i == last_word {
                Self::tail_mask(max)
            } else {
                usize::MAX
            };
            !word & valid
        })
    }

    /// Iterate over set indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            core::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(i * WORD_BITS + bit)
            })
        })
    }

    /// Walk words from `start`, wrapping, until `candidates` yields a
    /// non-zero word, then return the lowest candidate bit in it.
    fn scan_from(&self, start: usize, candidates: impl Fn(usize, usize) -> usize) -> Option<usize> {
        let n = self.words.len();
        (0..n)
            .map(|step| (start + step) % n)
            .find_map(|i| {
                let bits = candidates(self.words[i], i);
                (bits != 0).then(|| i * WORD_BITS + bits.trailing_zeros() as usize)
            })
            .filter(|&index| index < self.max)
    }

    /// Mask of the valid bits in the last word for a set of `max` bits.
    #[inline]
    fn tail_mask(max: usize) -> usize {
        match max % WORD_BITS {
            0 => usize::MAX,
            rem => (1 << rem) - 1,
        }
    }

    #[inline]
    fn check_index(&self, index: usize) {
        assert!(
            index < self.max,
            "bit index {index} out of range for BitSet of {}",
            self.max
        );
    }
}

impl core::fmt::Debug for BitSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BitSet")
            .field("max", &self.max)
            .field("count", &self.count)
            .finish()
    }
}
