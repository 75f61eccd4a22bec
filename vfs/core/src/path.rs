//! Drive-prefixed path parsing and small path helpers.
//!
//! Full paths look like `X:/local/path`. The drive letter must be in the
//! mount alphabet, exactly one `:` and one `/` must follow, and any further
//! leading slashes are collapsed before the local part reaches a backend.

use crate::{Drive, VfsError, VfsErrorKind, VfsResult};

/// Split off the drive letter. Anything that cannot name a drive is
/// reported as `NotReady`, the same as an unmounted drive.
pub fn parse_drive(path: &str) -> VfsResult<Drive> {
    path.as_bytes()
        .first()
        .and_then(|&b| Drive::from_byte(b))
        .ok_or(VfsError::new(VfsErrorKind::NotReady, "path.drive"))
}

/// Local part of `path`, after the `X:/` prefix and redundant slashes.
pub fn local_path(path: &str, max_len: usize) -> VfsResult<&str> {
    let rest = path
        .get(1..)
        .and_then(|rest| rest.strip_prefix(":/"))
        .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, "path.prefix"))?;
    let local = rest.trim_start_matches('/');
    if local.len() > max_len {
        return Err(VfsError::new(VfsErrorKind::InvalidArgument, "path.too_long"));
    }
    Ok(local)
}

/// Parse a full path into its drive and local part.
pub fn split_path(path: &str, max_len: usize) -> VfsResult<(Drive, &str)> {
    let drive = parse_drive(path)?;
    Ok((drive, local_path(path, max_len)?))
}

/// Last component of `path`, ignoring one trailing slash.
pub fn basename(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// `path` up to and including the slash before its last component.
/// The drive root is its own parent.
pub fn parent_dir(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(pos) => &path[..pos + 1],
        None => path,
    }
}

/// Whether `path` names a directory listing entry (trailing slash).
#[inline]
pub fn is_dir_path(path: &str) -> bool {
    path.ends_with('/')
}

/// Whether `path` is a drive root such as `A:/`.
pub fn is_drive_root(path: &str) -> bool {
    path.len() == 3 && parse_drive(path).is_ok() && &path[1..] == ":/"
}

/// Append `name` to the directory `dir`, inserting a slash if needed.
pub fn join(dir: &str, name: &str) -> String {
    let mut out = String::with_capacity(dir.len() + name.len() + 1);
    out.push_str(dir);
    if !dir.ends_with('/') {
        out.push('/');
    }
    out.push_str(name);
    out
}
