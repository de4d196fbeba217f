//! Test fixtures for pipeline runs.
//!
//! Every fixture lives in its own temporary directory, removed on drop.

use setdex_core::{
    read_members, BuildSummary, DenseIndex, Pipeline, PipelineConfig, SetId, UserId,
};
use setdex_storage::FileBackend;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Encodes pairs as consecutive little-endian `(user_id, set_id)` words.
pub fn encode_pairs(pairs: &[(UserId, SetId)]) -> Vec<u8> {
    pairs
        .iter()
        .flat_map(|(user, set)| [user.to_le_bytes(), set.to_le_bytes()])
        .flatten()
        .collect()
}

/// The membership a build of `pairs` must produce.
///
/// Maps every set with at least two distinct members to those members in
/// first-seen order. Sets with fewer members are absent.
pub fn expected_membership(pairs: &[(UserId, SetId)]) -> BTreeMap<SetId, Vec<UserId>> {
    let mut sets: BTreeMap<SetId, (Vec<UserId>, HashSet<UserId>)> = BTreeMap::new();
    for &(user, set) in pairs {
        let (members, seen) = sets.entry(set).or_default();
        if seen.insert(user) {
            members.push(user);
        }
    }
    sets.into_iter()
        .filter(|(_, (members, _))| members.len() > 1)
        .map(|(set, (members, _))| (set, members))
        .collect()
}

/// A temporary directory with the file layout of one build.
pub struct TempWorkspace {
    /// Pair file.
    pub input: PathBuf,
    /// Member-array file.
    pub arrays: PathBuf,
    /// Dense index file.
    pub index: PathBuf,
    /// Set id cache file.
    pub set_ids: PathBuf,
    /// Offsets journal file.
    pub journal: PathBuf,
    dir: TempDir,
}

impl TempWorkspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = dir.path();
        Self {
            input: root.join("pairs.bin"),
            arrays: root.join("arrays.bin"),
            index: root.join("index.bin"),
            set_ids: root.join("set_ids.cache"),
            journal: root.join("offsets.journal"),
            dir,
        }
    }

    /// Creates a workspace whose input holds `pairs`.
    pub fn with_pairs(pairs: &[(UserId, SetId)]) -> Self {
        let ws = Self::new();
        ws.write_pairs(pairs);
        ws
    }

    /// Root of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Replaces the input with `pairs`.
    pub fn write_pairs(&self, pairs: &[(UserId, SetId)]) {
        self.write_input(&encode_pairs(pairs));
    }

    /// Replaces the input with raw bytes.
    pub fn write_input(&self, bytes: &[u8]) {
        std::fs::write(&self.input, bytes).expect("Failed to write input");
    }

    /// A default configuration over this workspace's files.
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::new(&self.input, &self.arrays, &self.index).progress_interval_mb(0)
    }

    /// Runs a build, panicking on error.
    pub fn build(&self, config: PipelineConfig) -> BuildSummary {
        Pipeline::new(config)
            .and_then(|p| p.run())
            .expect("Build failed")
    }

    /// Loads the index file.
    pub fn load_index(&self) -> DenseIndex {
        let backend = FileBackend::open_read_only(&self.index).expect("Failed to open index");
        DenseIndex::load(&backend).expect("Failed to load index")
    }

    /// Reads the members of `set_id` through the index.
    ///
    /// Returns `None` if the index has no record for the set. An offset of 0
    /// also reads as `None`; build with a reserved offset base to make every
    /// record addressable.
    pub fn members(&self, set_id: SetId) -> Option<Vec<UserId>> {
        let offset = self.load_index().offset(set_id)?;
        Some(self.members_at(offset))
    }

    /// Reads the record starting at byte `offset` of the array file.
    pub fn members_at(&self, offset: u32) -> Vec<UserId> {
        let backend = FileBackend::open_read_only(&self.arrays).expect("Failed to open arrays");
        read_members(&backend, offset).expect("Failed to read members")
    }

    /// Raw contents of the array file.
    pub fn arrays_bytes(&self) -> Vec<u8> {
        std::fs::read(&self.arrays).expect("Failed to read arrays")
    }

    /// Raw contents of the index file.
    pub fn index_bytes(&self) -> Vec<u8> {
        std::fs::read(&self.index).expect("Failed to read index")
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
