//! End-to-end builds over real files.

use proptest::prelude::*;
use setdex_core::{
    CacheFormat, CoreError, IndexRange, IntegrityVerifier, OffsetBase, Pipeline, PipelineConfig,
    SetIdCache, SetIdUniverse,
};
use setdex_storage::FileBackend;
use setdex_testkit::prelude::*;

const SCENARIO: &[(u32, u32)] = &[(1, 5), (2, 5), (3, 7), (1, 7), (9, 12)];

fn words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[test]
fn scenario_layout() {
    let ws = TempWorkspace::with_pairs(SCENARIO);
    let summary = ws.build(ws.config().segment_size(2));

    assert_eq!(summary.universe_size, 3);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.sets_dropped, 1);
    assert_eq!(summary.max_set_id, Some(12));
    assert_eq!(words(&ws.arrays_bytes()), vec![1, 2, 0, 3, 1, 0]);

    let index = words(&ws.index_bytes());
    assert_eq!(index.len(), 13);
    assert_eq!(index[5], 0);
    assert_eq!(index[7], 12);
    assert_eq!(index[12], 0);
    assert_eq!(ws.members_at(0), vec![1, 2]);
    assert_eq!(ws.members(7), Some(vec![3, 1]));
}

#[test]
fn duplicate_pairs_are_recorded_once() {
    let ws = TempWorkspace::with_pairs(&[(1, 5), (1, 5), (2, 5), (1, 5), (4, 6), (4, 6)]);
    let summary = ws.build(ws.config().offset_base(OffsetBase::Reserved));

    assert_eq!(ws.members(5), Some(vec![1, 2]));
    assert_eq!(ws.members(6), None);
    assert_eq!(summary.sets_dropped, 1);
}

#[test]
fn reserved_offset_base_makes_first_record_addressable() {
    let ws = TempWorkspace::with_pairs(SCENARIO);
    let summary = ws.build(ws.config().offset_base(OffsetBase::Reserved));

    assert_eq!(words(&ws.arrays_bytes()), vec![0, 1, 2, 0, 3, 1, 0]);
    assert_eq!(summary.verified, 2);
    assert_eq!(ws.members(5), Some(vec![1, 2]));
    assert_eq!(ws.members(7), Some(vec![3, 1]));
}

#[test]
fn exclusive_range_omits_largest_id() {
    let ws = TempWorkspace::with_pairs(&[(1, 3), (2, 3), (4, 1), (5, 1)]);
    let summary = ws.build(
        ws.config()
            .index_range(IndexRange::Exclusive)
            .offset_base(OffsetBase::Reserved),
    );

    assert_eq!(summary.index_len, 3);
    let index = ws.load_index();
    assert_eq!(index.offset(1), Some(4));
    assert_eq!(index.offset(3), None);
    assert_eq!(ws.members_at(16), vec![1, 2]);
}

#[test]
fn trailing_partial_pair_is_ignored() {
    let ws = TempWorkspace::new();
    let mut bytes = encode_pairs(SCENARIO);
    bytes.extend_from_slice(&[7, 0, 0]);
    ws.write_input(&bytes);
    ws.build(ws.config());

    let reference = TempWorkspace::with_pairs(SCENARIO);
    reference.build(reference.config());
    assert_eq!(ws.arrays_bytes(), reference.arrays_bytes());
    assert_eq!(ws.index_bytes(), reference.index_bytes());
}

#[test]
fn empty_input_builds_empty_index() {
    let ws = TempWorkspace::with_pairs(&[]);
    let summary = ws.build(ws.config());

    assert_eq!(summary.universe_size, 0);
    assert_eq!(summary.index_len, 0);
    assert!(ws.arrays_bytes().is_empty());
    assert!(ws.index_bytes().is_empty());
}

#[test]
fn corrupted_terminator_fails_verification() {
    let ws = TempWorkspace::with_pairs(SCENARIO);
    ws.build(ws.config());

    let mut bytes = ws.arrays_bytes();
    bytes[8..12].copy_from_slice(&4u32.to_le_bytes());
    std::fs::write(&ws.arrays, bytes).unwrap();

    let arrays = FileBackend::open_read_only(&ws.arrays).unwrap();
    let result = IntegrityVerifier::new(&arrays).verify_index(&ws.load_index());
    assert!(matches!(
        result,
        Err(CoreError::IntegrityViolation {
            set_id: 7,
            offset: 12,
            found: 4
        })
    ));
}

#[test]
fn cache_is_written_then_reused() {
    for format in [CacheFormat::Binary, CacheFormat::Text] {
        let ws = TempWorkspace::with_pairs(SCENARIO);
        let cache = SetIdCache::new(&ws.set_ids, format);
        ws.build(ws.config().set_id_cache(cache.clone()));
        assert_eq!(cache.load().unwrap().ids(), &[5, 7, 12]);
        if format == CacheFormat::Text {
            assert_eq!(std::fs::read_to_string(&ws.set_ids).unwrap(), "5\n7\n12\n");
        }

        let first = (ws.arrays_bytes(), ws.index_bytes());
        std::fs::remove_file(&ws.arrays).unwrap();
        std::fs::remove_file(&ws.index).unwrap();
        ws.build(ws.config().set_id_cache(cache));
        assert_eq!((ws.arrays_bytes(), ws.index_bytes()), first);
    }
}

#[test]
fn corrupted_cache_aborts() {
    let ws = TempWorkspace::with_pairs(SCENARIO);
    std::fs::write(&ws.set_ids, [1u8, 2, 3, 4, 5]).unwrap();
    let config = ws
        .config()
        .set_id_cache(SetIdCache::new(&ws.set_ids, CacheFormat::Binary));

    let result = Pipeline::new(config).unwrap().run();
    assert!(matches!(result, Err(CoreError::CacheCorrupted { .. })));
}

#[test]
fn existing_output_is_left_untouched() {
    let ws = TempWorkspace::with_pairs(SCENARIO);
    std::fs::write(&ws.arrays, b"old").unwrap();

    assert!(matches!(
        Pipeline::new(ws.config()),
        Err(CoreError::OutputExists { .. })
    ));
    assert_eq!(ws.arrays_bytes(), b"old");
}

#[test]
fn resume_with_journal_matches_fresh_build() {
    let reference = TempWorkspace::with_pairs(SCENARIO);
    reference.build(reference.config().segment_size(1));

    // First run only saw the pairs of segment 0.
    let ws = TempWorkspace::with_pairs(&[(1, 5), (2, 5)]);
    let cache = SetIdCache::new(&ws.set_ids, CacheFormat::Binary);
    cache.store(&SetIdUniverse::from_ids([5, 7, 12])).unwrap();
    let config = ws
        .config()
        .segment_size(1)
        .set_id_cache(cache)
        .offsets_journal(&ws.journal);
    ws.build(config.clone());
    assert_eq!(words(&ws.arrays_bytes()), vec![1, 2, 0]);

    ws.write_pairs(SCENARIO);
    let summary = ws.build(config.resume_segment(1));

    assert_eq!(summary.segments_skipped, 1);
    assert_eq!(summary.segments_processed, 2);
    assert_eq!(summary.records_written, 1);
    assert_eq!(summary.indexed_sets, 2);
    assert_eq!(ws.arrays_bytes(), reference.arrays_bytes());
    assert_eq!(ws.index_bytes(), reference.index_bytes());
    assert_eq!(words(&std::fs::read(&ws.journal).unwrap()), vec![5, 0, 7, 12]);
}

/// Runs segment 0 of the scenario universe over an input holding only
/// set 5's pairs, leaving the files a run interrupted after segment 0 would.
fn first_segment_only(base: OffsetBase, journal: bool) -> (TempWorkspace, PipelineConfig) {
    let ws = TempWorkspace::with_pairs(&[(1, 5), (2, 5)]);
    let cache = SetIdCache::new(&ws.set_ids, CacheFormat::Binary);
    cache.store(&SetIdUniverse::from_ids([5, 7, 12])).unwrap();
    let mut config = ws
        .config()
        .segment_size(1)
        .set_id_cache(cache)
        .offset_base(base);
    if journal {
        config = config.offsets_journal(&ws.journal);
    }
    ws.build(config.clone());
    (ws, config)
}

#[test]
fn resume_without_journal_indexes_only_new_records() {
    let (ws, config) = first_segment_only(OffsetBase::Reserved, false);
    assert_eq!(words(&ws.arrays_bytes()), vec![0, 1, 2, 0]);

    ws.write_pairs(SCENARIO);
    let summary = ws.build(config.resume_segment(1));

    assert_eq!(summary.segments_skipped, 1);
    assert_eq!(summary.indexed_sets, 1);
    assert_eq!(words(&ws.arrays_bytes()), vec![0, 1, 2, 0, 3, 1, 0]);
    let index = ws.load_index();
    assert_eq!(index.len(), 13);
    assert_eq!(index.offset(5), None);
    assert_eq!(index.offset(7), Some(16));
    assert_eq!(ws.members(7), Some(vec![3, 1]));
}

#[test]
fn resume_with_reserved_base_keeps_single_leading_sentinel() {
    let reference = TempWorkspace::with_pairs(SCENARIO);
    reference.build(
        reference
            .config()
            .segment_size(1)
            .offset_base(OffsetBase::Reserved),
    );

    let (ws, config) = first_segment_only(OffsetBase::Reserved, true);
    ws.write_pairs(SCENARIO);
    ws.build(config.resume_segment(1));

    assert_eq!(words(&ws.arrays_bytes()), vec![0, 1, 2, 0, 3, 1, 0]);
    assert_eq!(ws.arrays_bytes(), reference.arrays_bytes());
    assert_eq!(ws.index_bytes(), reference.index_bytes());
    assert_eq!(ws.members(5), Some(vec![1, 2]));
}

#[test]
fn resume_with_reserved_base_over_empty_file() {
    let ws = TempWorkspace::with_pairs(SCENARIO);
    std::fs::write(&ws.arrays, b"").unwrap();
    ws.build(
        ws.config()
            .segment_size(1)
            .offset_base(OffsetBase::Reserved)
            .resume_segment(1),
    );

    assert_eq!(words(&ws.arrays_bytes()), vec![0, 3, 1, 0]);
    assert_eq!(ws.members(7), Some(vec![3, 1]));
    assert_eq!(ws.members(5), None);
}

#[test]
fn resume_ignores_journal_entry_without_record() {
    let (ws, config) = first_segment_only(OffsetBase::Zero, true);
    // Set 7 was journaled at the end of the file, then the run died.
    let mut journal = std::fs::read(&ws.journal).unwrap();
    journal.extend(encode_pairs(&[(7, 12)]));
    std::fs::write(&ws.journal, journal).unwrap();

    ws.write_pairs(&[(1, 5), (2, 5), (3, 7), (9, 12), (8, 12)]);
    let summary = ws.build(config.resume_segment(2));

    assert_eq!(summary.indexed_sets, 2);
    assert_eq!(words(&ws.arrays_bytes()), vec![1, 2, 0, 9, 8, 0]);
    let index = ws.load_index();
    assert_eq!(index.offset(7), None);
    assert_eq!(index.offset(12), Some(12));
    assert_eq!(ws.members_at(0), vec![1, 2]);
}

#[test]
fn index_path_over_input_is_refused() {
    let ws = TempWorkspace::with_pairs(SCENARIO);
    let before = std::fs::read(&ws.input).unwrap();
    let config = PipelineConfig::new(&ws.input, &ws.arrays, &ws.input);

    assert!(matches!(
        Pipeline::new(config),
        Err(CoreError::InvalidConfig { .. })
    ));
    assert_eq!(std::fs::read(&ws.input).unwrap(), before);
    assert!(!ws.arrays.exists());
}

#[test]
fn cache_path_over_index_is_refused() {
    let ws = TempWorkspace::with_pairs(SCENARIO);
    let config = ws
        .config()
        .set_id_cache(SetIdCache::new(&ws.index, CacheFormat::Binary));

    assert!(matches!(
        Pipeline::new(config),
        Err(CoreError::InvalidConfig { .. })
    ));
}

proptest! {
    #![proptest_config(file_backed_config())]

    #[test]
    fn every_multi_member_set_round_trips(pairs in non_empty_pairs_strategy(200)) {
        let ws = TempWorkspace::with_pairs(&pairs);
        ws.build(ws.config().segment_size(7).offset_base(OffsetBase::Reserved));

        let expected = expected_membership(&pairs);
        let index = ws.load_index();
        let max = pairs.iter().map(|(_, set)| *set).max().unwrap();
        prop_assert_eq!(index.len(), max as usize + 1);
        prop_assert_eq!(index.populated(), expected.len());

        for (set_id, members) in &expected {
            prop_assert_eq!(ws.members(*set_id), Some(members.clone()));
        }
        for (_, set_id) in &pairs {
            if !expected.contains_key(set_id) {
                prop_assert_eq!(index.offset(*set_id), None);
            }
        }
    }

    #[test]
    fn output_is_independent_of_segmentation(
        pairs in pairs_strategy(150),
        segment_size in segment_size_strategy(),
        buffer_bytes in buffer_bytes_strategy(),
    ) {
        let single = TempWorkspace::with_pairs(&pairs);
        single.build(single.config().segment_size(usize::MAX));

        let segmented = TempWorkspace::with_pairs(&pairs);
        segmented.build(
            segmented
                .config()
                .segment_size(segment_size)
                .buffer_bytes(buffer_bytes),
        );

        prop_assert_eq!(single.arrays_bytes(), segmented.arrays_bytes());
        prop_assert_eq!(single.index_bytes(), segmented.index_bytes());
    }

    #[test]
    fn every_record_is_terminated(pairs in pairs_strategy(150)) {
        let ws = TempWorkspace::with_pairs(&pairs);
        let summary = ws.build(ws.config().segment_size(5));

        let arrays = words(&ws.arrays_bytes());
        prop_assert_eq!(
            arrays.iter().filter(|&&w| w == 0).count(),
            summary.records_written
        );
        prop_assert!(arrays.last().map_or(true, |&w| w == 0));
    }
}
