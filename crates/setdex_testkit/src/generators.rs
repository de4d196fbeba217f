//! Property-based test generators using proptest.
//!
//! Ranges are kept small so that generated streams repeat set ids and
//! users often enough to produce multi-member sets and duplicates.

use proptest::prelude::*;
use setdex_core::{SetId, UserId};

/// Largest user id produced by [`pair_strategy`].
pub const MAX_USER_ID: UserId = 64;

/// Largest set id produced by [`pair_strategy`].
pub const MAX_SET_ID: SetId = 48;

/// Strategy for one `(user_id, set_id)` pair with a non-zero user id.
pub fn pair_strategy() -> impl Strategy<Value = (UserId, SetId)> {
    (1..=MAX_USER_ID, 0..=MAX_SET_ID)
}

/// Strategy for a pair stream of up to `max_len` pairs.
pub fn pairs_strategy(max_len: usize) -> impl Strategy<Value = Vec<(UserId, SetId)>> {
    prop::collection::vec(pair_strategy(), 0..=max_len)
}

/// Strategy for a non-empty pair stream of up to `max_len` pairs.
pub fn non_empty_pairs_strategy(max_len: usize) -> impl Strategy<Value = Vec<(UserId, SetId)>> {
    prop::collection::vec(pair_strategy(), 1..=max_len.max(1))
}

/// Strategy for a segment size.
pub fn segment_size_strategy() -> impl Strategy<Value = usize> {
    1usize..=16
}

/// Strategy for a read buffer size in bytes: 1 to 32 pairs.
pub fn buffer_bytes_strategy() -> impl Strategy<Value = usize> {
    (1usize..=32).prop_map(|pairs| pairs * 8)
}

/// Proptest configuration for tests that touch the filesystem.
pub fn file_backed_config() -> ProptestConfig {
    ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    }
}
