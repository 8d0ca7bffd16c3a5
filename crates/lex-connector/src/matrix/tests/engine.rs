use std::sync::{Arc, Barrier};
use std::thread;

use crate::config::{parse_config_toml, ConnectorConfig};
use crate::matrix::store::{HEADER_SIZE, OFFSET_SIZE};
use crate::matrix::{
    encode_matrix, ConnError, ConnectionCost, ConnectionEngine, MatrixStore, INVALID_COST,
};

use super::{engine_for, scenario_table};

/// Scenario blob with the bit-width byte of row `right_id` overwritten.
fn corrupt_row(right_id: u16) -> Vec<u8> {
    let mut bytes = encode_matrix(&scenario_table()).unwrap();
    let num_right = u16::from_le_bytes([bytes[5], bytes[6]]) as usize;
    let units_start = HEADER_SIZE + (num_right + 1) * OFFSET_SIZE;
    let entry = HEADER_SIZE + right_id as usize * OFFSET_SIZE;
    let offset = u32::from_le_bytes(bytes[entry..entry + 4].try_into().unwrap()) as usize;
    bytes[units_start + offset + 2] = 13;
    bytes
}

#[test]
fn test_scenario() {
    let engine = engine_for(&scenario_table());
    assert_eq!(engine.num_right(), 3);
    assert_eq!(engine.num_left(), 3);
    assert_eq!(engine.cost(0, 1), 250);
    assert_eq!(engine.cost(1, 0), 0);
    assert_eq!(engine.cost(0, 0), 100);
    assert_eq!(engine.cost(2, 2), 999999);
    assert_eq!(engine.cost(1, 1), INVALID_COST);
    assert_eq!(engine.cost(2, 0), INVALID_COST);
}

#[test]
fn test_out_of_range_policy() {
    let engine = engine_for(&scenario_table());
    assert_eq!(engine.cost(3, 0), INVALID_COST);
    assert_eq!(engine.cost(0, 3), INVALID_COST);
    assert!(matches!(
        engine.try_cost(3, 1),
        Err(ConnError::OutOfRange {
            right_id: 3,
            left_id: 1,
            num_right: 3,
            num_left: 3
        })
    ));
    assert!(matches!(
        engine.try_cost(0, 3),
        Err(ConnError::OutOfRange { .. })
    ));
    // out-of-range queries never touch the cache
    assert_eq!(engine.resident_rows(), 0);
}

#[test]
fn test_repeated_queries_are_stable() {
    let engine = engine_for(&scenario_table());
    let first: Vec<i32> = (0..3)
        .flat_map(|r| (0..3).map(move |l| (r, l)))
        .map(|(r, l)| engine.cost(r, l))
        .collect();
    for _ in 0..5 {
        let again: Vec<i32> = (0..3)
            .flat_map(|r| (0..3).map(move |l| (r, l)))
            .map(|(r, l)| engine.cost(r, l))
            .collect();
        assert_eq!(again, first);
    }
    let stats = engine.cache_stats();
    assert_eq!(stats.decodes, 3);
    assert_eq!(stats.hits, 9 * 6 - 3);
}

#[test]
fn test_rows_decode_lazily() {
    let engine = engine_for(&scenario_table());
    assert_eq!(engine.resident_rows(), 0);
    engine.cost(2, 2);
    assert_eq!(engine.resident_rows(), 1);
    assert_eq!(engine.row(2).unwrap().as_slice(), &[INVALID_COST, INVALID_COST, 999999]);
    assert_eq!(engine.cache_stats().decodes, 1);
}

#[test]
fn test_corrupt_row_is_reported_consistently() {
    let engine = ConnectionEngine::from_bytes(&corrupt_row(1)).unwrap();
    // healthy rows are unaffected
    assert_eq!(engine.cost(0, 1), 250);
    assert_eq!(engine.cost(1, 0), INVALID_COST);

    for _ in 0..3 {
        match engine.try_cost(1, 0) {
            Err(ConnError::CorruptUnit(e)) => assert_eq!(e.right_id, 1),
            other => panic!("expected CorruptUnit, got {other:?}"),
        }
    }
    // the failure is memoized, not re-decoded
    assert_eq!(engine.cache_stats().decodes, 2);
}

#[test]
fn test_verify_finds_corrupt_row() {
    let engine = ConnectionEngine::from_bytes(&corrupt_row(2)).unwrap();
    assert!(matches!(
        engine.verify(),
        Err(ConnError::CorruptUnit(e)) if e.right_id == 2
    ));
    let healthy = engine_for(&scenario_table());
    healthy.verify().unwrap();
    assert_eq!(healthy.resident_rows(), 3);
}

#[test]
fn test_verify_on_load_config() {
    let config = parse_config_toml("[engine]\nverify_on_load = true\n").unwrap();
    let store = MatrixStore::from_vec(corrupt_row(0)).unwrap();
    assert!(matches!(
        ConnectionEngine::with_config(store, &config),
        Err(ConnError::CorruptUnit(_))
    ));

    // without verification the engine opens and fails per query
    let store = MatrixStore::from_vec(corrupt_row(0)).unwrap();
    let engine = ConnectionEngine::with_config(store, &ConnectorConfig::default()).unwrap();
    assert_eq!(engine.cost(0, 0), INVALID_COST);
}

#[test]
fn test_prefetch_rows_config() {
    let config = parse_config_toml("[engine]\nprefetch_rows = [0, 2]\n").unwrap();
    let store = MatrixStore::from_source(&scenario_table()).unwrap();
    let engine = ConnectionEngine::with_config(store, &config).unwrap();
    assert_eq!(engine.resident_rows(), 2);
    assert_eq!(engine.cost(0, 1), 250);
    assert_eq!(engine.cache_stats().decodes, 2);

    let config = parse_config_toml("[engine]\nprefetch_rows = [5]\n").unwrap();
    let store = MatrixStore::from_source(&scenario_table()).unwrap();
    assert!(matches!(
        ConnectionEngine::with_config(store, &config),
        Err(ConnError::OutOfRange { right_id: 5, .. })
    ));
}

#[test]
fn test_open_file_with_both_storage_modes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.conn");
    MatrixStore::from_source(&scenario_table())
        .unwrap()
        .save(&path)
        .unwrap();

    for toml in ["[store]\nmmap = true\n", "[store]\nmmap = false\n"] {
        let config = parse_config_toml(toml).unwrap();
        let engine = ConnectionEngine::open(&path, &config).unwrap();
        assert_eq!(engine.store().is_mapped(), config.store.mmap);
        assert_eq!(engine.cost(0, 1), 250);
        assert_eq!(engine.cost(1, 1), INVALID_COST);
    }
}

#[test]
fn test_engine_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ConnectionEngine>();
}

#[test]
fn test_concurrent_first_access() {
    const THREADS: usize = 8;
    let table = scenario_table();
    let engine = Arc::new(engine_for(&table));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut seen = Vec::new();
                for i in 0..9u16 {
                    // each thread walks the matrix from a different start
                    let k = (i + t as u16) % 9;
                    let (r, l) = (k / 3, k % 3);
                    seen.push(((r, l), engine.cost(r, l)));
                }
                seen
            })
        })
        .collect();

    for handle in handles {
        for ((r, l), cost) in handle.join().unwrap() {
            assert_eq!(cost, table.cost(r, l), "({r}, {l})");
        }
    }
    assert_eq!(engine.cache_stats().decodes, 3);
}
