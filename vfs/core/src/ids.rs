//! Core identifier types.

use core::fmt;
use core::num::NonZeroU64;

/// First drive letter of the mount alphabet.
pub const FIRST_DRIVE: u8 = b'A';
/// Last drive letter of the mount alphabet.
pub const LAST_DRIVE: u8 = b'Z';
/// Number of mount slots, one per letter in `FIRST_DRIVE..=LAST_DRIVE`.
pub const MOUNT_SLOTS: usize = (LAST_DRIVE - FIRST_DRIVE) as usize + 1;

/// A drive letter within the mount alphabet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Drive(u8);

impl Drive {
    /// Create a drive from an uppercase ASCII letter in the mount alphabet.
    #[inline]
    pub const fn new(letter: char) -> Option<Self> {
        if letter.is_ascii() {
            Self::from_byte(letter as u8)
        } else {
            None
        }
    }

    #[inline]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        if byte >= FIRST_DRIVE && byte <= LAST_DRIVE {
            Some(Self(byte))
        } else {
            None
        }
    }

    /// Create a drive from a zero-based mount slot index.
    #[inline]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < MOUNT_SLOTS {
            Some(Self(FIRST_DRIVE + index as u8))
        } else {
            None
        }
    }

    #[inline]
    pub fn letter(self) -> char {
        self.0 as char
    }

    /// Zero-based mount slot index.
    #[inline]
    pub fn index(self) -> usize {
        (self.0 - FIRST_DRIVE) as usize
    }

    /// Iterate over the whole mount alphabet in order.
    pub fn all() -> impl Iterator<Item = Drive> {
        (FIRST_DRIVE..=LAST_DRIVE).map(Drive)
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.letter())
    }
}

impl TryFrom<char> for Drive {
    type Error = crate::VfsError;

    fn try_from(letter: char) -> Result<Self, Self::Error> {
        Drive::new(letter).ok_or(crate::VfsError::new(
            crate::VfsErrorKind::InvalidArgument,
            "drive.from_char",
        ))
    }
}

/// Generation-checked handle identifier.
///
/// The low 32 bits hold the arena slot index, the high 32 bits the slot
/// generation at acquire time. Generations start at 1, so the packed value
/// is never zero. A released slot bumps its generation, which makes every
/// id issued before the release stale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct HandleId(NonZeroU64);

impl HandleId {
    #[inline]
    pub(crate) fn new(index: usize, generation: u32) -> Option<Self> {
        let index = u32::try_from(index).ok()?;
        NonZeroU64::new(((generation as u64) << 32) | index as u64).map(Self)
    }

    /// Zero-based arena slot index.
    #[inline]
    pub fn index(self) -> usize {
        (self.0.get() & 0xffff_ffff) as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    /// Raw packed value (for logging or handing across an FFI boundary).
    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Rebuild an id from a raw packed value. Zero is rejected.
    #[inline]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({}#{})", self.index(), self.generation())
    }
}
