//! Skip-pointer arithmetic
//!
//! A commit at height `h` points at the commit `2^ruler(h)` below it, so a
//! chain walk from height `h` visits `popcount(h) + 1` commits including
//! the root sentinel.

use anyhow::Result;

use crate::error::IndexError;

/// Longest chain any valid height can produce (64 set bits plus the root)
pub const MAX_CHAIN: usize = 65;

/// 2-adic valuation of `h`: 0, 0, 1, 0, 2, 0, 1, 0, 3, ...
pub fn ruler(h: i64) -> usize {
    if h == 0 {
        return 0;
    }
    h.trailing_zeros() as usize
}

/// Pick the propagation fan-out and the skip pointer for a new commit.
///
/// `hops` is the tip's chain (tip first, root last) and `height` the new
/// commit's height. Returns `r` (hops[..r] propagate) and the ancestor.
pub fn skip_pointer<'h>(hops: &'h [String], height: i64) -> Result<(usize, &'h str)> {
    let r = ruler(height);
    match hops.get(r) {
        Some(ancestor) => Ok((r, ancestor.as_str())),
        None => Err(IndexError::CorruptAncestry {
            commit: hops.first().cloned().unwrap_or_default(),
            reason: format!(
                "ruler({height}) = {r} but the tip chain has only {} hops",
                hops.len()
            ),
        }
        .into()),
    }
}
