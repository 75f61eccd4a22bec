//! Error taxonomy shared by the switch and every backend.
//!
//! Backends construct [`VfsError`]s directly, so nothing backend-specific
//! ever leaks past the dispatch boundary.

use thiserror::Error;

/// Kind of failure, independent of which layer produced it.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VfsErrorKind {
    /// A caller-supplied value (path, handle, mode, index) was rejected.
    #[error("invalid argument")]
    InvalidArgument,
    /// A fixed-capacity resource (handle arena, path store, sectors) is exhausted.
    #[error("out of memory")]
    OutOfResources,
    /// The underlying device misbehaved or is not usable.
    #[error("invalid device")]
    DeviceError,
    /// A transfer failed part way.
    #[error("IO error")]
    IoError,
    /// The drive or file is in use.
    #[error("device or file busy")]
    Busy,
    #[error("permission denied")]
    PermissionDenied,
    /// The drive is not mounted, or the device is offline.
    #[error("not ready")]
    NotReady,
    #[error("path not found")]
    NotFound,
    /// The mounted backend does not implement the operation.
    #[error("unsupported operation")]
    Unsupported,
}

impl VfsErrorKind {
    /// Stable snake-case name, for logs only.
    pub fn as_str(self) -> &'static str {
        match self {
            VfsErrorKind::InvalidArgument => "invalid_argument",
            VfsErrorKind::OutOfResources => "out_of_resources",
            VfsErrorKind::DeviceError => "device_error",
            VfsErrorKind::IoError => "io_error",
            VfsErrorKind::Busy => "busy",
            VfsErrorKind::PermissionDenied => "permission_denied",
            VfsErrorKind::NotReady => "not_ready",
            VfsErrorKind::NotFound => "not_found",
            VfsErrorKind::Unsupported => "unsupported",
        }
    }
}

/// An error kind tagged with the operation that produced it.
///
/// `context` is a dotted tag such as `"vfs.open"` or `"ramdisk.write"`.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
#[error("{context}: {kind}")]
pub struct VfsError {
    kind: VfsErrorKind,
    context: &'static str,
}

impl VfsError {
    #[inline]
    pub const fn new(kind: VfsErrorKind, context: &'static str) -> Self {
        Self { kind, context }
    }

    #[inline]
    pub fn kind(&self) -> VfsErrorKind {
        self.kind
    }

    #[inline]
    pub fn context(&self) -> &'static str {
        self.context
    }

    /// Same kind, re-tagged with the caller's context.
    pub fn recontext(self, context: &'static str) -> Self {
        Self { context, ..self }
    }
}

impl From<VfsError> for VfsErrorKind {
    fn from(err: VfsError) -> Self {
        err.kind
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
