// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identifier minting shared by nodes, sockets and edges.

use uuid::Uuid;

/// Mint a fresh random identifier.
///
/// Persisted scenes store identifiers as JSON integers, so the value is kept
/// inside the 53-bit range that JSON numbers represent exactly.
pub(crate) fn mint() -> u64 {
    let (high, _) = Uuid::new_v4().as_u64_pair();
    (high >> 11).max(1)
}
