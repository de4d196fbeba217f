//! Identifier types and on-disk constants.

use setdex_storage::WORD_SIZE;

/// Identifier of a set. Discovered from the input, not assumed contiguous.
pub type SetId = u32;

/// Identifier of a member. `0` is reserved for [`SENTINEL`].
pub type UserId = u32;

/// Terminator written after every member array.
///
/// Also the "absent" value in the dense index.
pub const SENTINEL: u32 = 0;

/// Width in bytes of one input pair.
pub const PAIR_SIZE: usize = 2 * WORD_SIZE;

/// One `(user_id, set_id)` record of the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MembershipPair {
    /// The member.
    pub user_id: UserId,
    /// The set it belongs to.
    pub set_id: SetId,
}

impl MembershipPair {
    /// Creates a pair.
    #[must_use]
    pub const fn new(user_id: UserId, set_id: SetId) -> Self {
        Self { user_id, set_id }
    }

    /// Builds a pair from two consecutive words as they appear on disk.
    #[must_use]
    pub const fn from_words(words: [u32; 2]) -> Self {
        Self::new(words[0], words[1])
    }
}
