//! Segment-bounded membership extraction.

use crate::error::CoreResult;
use crate::progress::ProgressReporter;
use crate::reader::PairStreamReader;
use crate::types::{SetId, UserId};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};
use tracing::info;

/// Distinct members of one set, in first-observed order.
///
/// Repeated `(user_id, set_id)` pairs are collapsed on purpose, so a
/// record never lists a member twice and the one-member drop rule counts
/// distinct users. The `seen` set costs roughly one extra word per member
/// for the lifetime of the segment.
#[derive(Debug, Default)]
struct MemberList {
    members: Vec<UserId>,
    seen: HashSet<UserId>,
}

impl MemberList {
    fn push(&mut self, user_id: UserId) {
        if self.seen.insert(user_id) {
            self.members.push(user_id);
        }
    }
}

/// Membership of every set in one segment.
///
/// Built fresh for each segment and dropped once written, so at most one
/// segment's members are held in memory.
#[derive(Debug, Default)]
pub struct SegmentMembership {
    order: Vec<SetId>,
    lists: HashMap<SetId, MemberList>,
}

impl SegmentMembership {
    /// Creates an empty membership table for `segment`.
    pub fn new(segment: &[SetId]) -> Self {
        let mut order = Vec::with_capacity(segment.len());
        let mut lists = HashMap::with_capacity(segment.len());
        for &set_id in segment {
            if lists.insert(set_id, MemberList::default()).is_none() {
                order.push(set_id);
            }
        }
        Self { order, lists }
    }

    /// Records that `user_id` belongs to `set_id`.
    ///
    /// Returns `false`, recording nothing, if `set_id` is not in the segment.
    pub fn record(&mut self, user_id: UserId, set_id: SetId) -> bool {
        match self.lists.get_mut(&set_id) {
            Some(list) => {
                list.push(user_id);
                true
            }
            None => false,
        }
    }

    /// Members of `set_id`, or `None` if it is not in the segment.
    #[must_use]
    pub fn members(&self, set_id: SetId) -> Option<&[UserId]> {
        self.lists.get(&set_id).map(|l| l.members.as_slice())
    }

    /// Iterates sets in segment order with their members.
    pub fn iter(&self) -> impl Iterator<Item = (SetId, &[UserId])> {
        self.order
            .iter()
            .map(move |id| (*id, self.lists[id].members.as_slice()))
    }

    /// Number of sets in the segment.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the segment has no sets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of member counts over all sets.
    #[must_use]
    pub fn total_members(&self) -> usize {
        self.lists.values().map(|l| l.members.len()).sum()
    }

    /// Member count of the largest set, 0 for an empty segment.
    #[must_use]
    pub fn largest_set(&self) -> usize {
        self.lists
            .values()
            .map(|l| l.members.len())
            .max()
            .unwrap_or(0)
    }
}

/// Rescans the whole input once per segment, keeping only that segment's
/// membership.
///
/// This trades one full pass per segment for a memory ceiling of a single
/// segment.
#[derive(Debug, Default)]
pub struct SegmentedMembershipExtractor;

impl SegmentedMembershipExtractor {
    /// Creates an extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds the membership of `segment` from a full scan of `reader`.
    ///
    /// Pairs whose set id is outside the segment are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input fails.
    pub fn extract<R: Read + Seek>(
        &self,
        reader: &mut PairStreamReader<R>,
        segment: &[SetId],
        progress: &mut ProgressReporter,
    ) -> CoreResult<SegmentMembership> {
        let mut membership = SegmentMembership::new(segment);
        reader.scan(progress, |pair| {
            membership.record(pair.user_id, pair.set_id);
        })?;

        info!(
            sets = membership.len(),
            "processed {} total members, the biggest set has {} members",
            membership.total_members(),
            membership.largest_set()
        );
        Ok(membership)
    }
}
