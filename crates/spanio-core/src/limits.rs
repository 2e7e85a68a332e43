//! Offset arithmetic helpers and size limits
//!
//! Every place that turns caller-supplied offsets into source positions goes
//! through these checks, so malformed part tables fail instead of wrapping.

use crate::Error;
use std::path::{Path, PathBuf};

/// Maximum file size for memory mapping (16 GB - practical limit for most systems)
pub const MAX_MMAP_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// Convert a caller-supplied signed length or offset into an unsigned one
///
/// Negative values are programmer errors, not I/O failures.
pub fn non_negative(value: i64, context: &str) -> crate::Result<u64> {
    u64::try_from(value).map_err(|_| {
        Error::contract_violation(format!("{}: negative value {}", context, value))
    })
}

/// Safely add two u64 offsets with overflow checking
pub fn checked_add_u64(a: u64, b: u64, context: &str) -> crate::Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| Error::out_of_bounds(format!("{}: {} + {} overflows", context, a, b)))
}

/// Safely convert u64 to usize with platform checking
///
/// Prevents truncation on 32-bit platforms
pub fn u64_to_usize(value: u64, context: &str) -> crate::Result<usize> {
    value.try_into().map_err(|_| {
        Error::out_of_bounds(format!(
            "{}: value {} exceeds platform usize limit",
            context, value
        ))
    })
}

/// Clamp a byte count to what fits in a buffer of `available` bytes
pub fn clamp_to_buffer(count: u64, available: usize) -> usize {
    usize::try_from(count).map_or(available, |c| c.min(available))
}

/// Check that a path names an existing regular file
///
/// # Returns
/// Canonical absolute path if valid, error otherwise
pub fn validate_file_path(path: &Path) -> crate::Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::out_of_bounds("Empty path"));
    }

    let canonical = path.canonicalize()?;

    if !canonical.is_file() {
        return Err(Error::out_of_bounds(format!(
            "Path is not a regular file: {}",
            canonical.display()
        )));
    }

    Ok(canonical)
}
