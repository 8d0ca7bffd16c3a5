mod engine;

use std::fmt::Write;

use super::{ConnectionEngine, MatrixStore, ParsePolicy, TextTable};

/// Small table with a count header, one sparse row, and a large cost.
pub(super) const SCENARIO_TEXT: &str = "9\n0 0 100\n0 1 250\n1 0 0\n2 2 999999\n";

pub(super) fn scenario_table() -> TextTable {
    TextTable::from_text(SCENARIO_TEXT, ParsePolicy::Strict).unwrap()
}

pub(super) fn engine_for(table: &TextTable) -> ConnectionEngine {
    ConnectionEngine::new(MatrixStore::from_source(table).unwrap())
}

/// Deterministic `rid lid cost` text covering every pair of a
/// `num_right x num_left` matrix except every `hole_every`-th one.
///
/// Costs are drawn from a small pool per row so rows compress the way real
/// connection matrices do, with an occasional large outlier.
pub(super) fn synthetic_text(num_right: u16, num_left: u16, hole_every: usize, seed: u64) -> String {
    let mut state = seed;
    let mut next = move || {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let mut text = String::new();
    writeln!(text, "{num_right} {num_left}").unwrap();
    let mut n = 0usize;
    for right_id in 0..num_right {
        let pool: Vec<i32> = (0..(1 + next() % 40))
            .map(|_| (next() % 12_000) as i32)
            .collect();
        for left_id in 0..num_left {
            n += 1;
            if hole_every > 0 && n % hole_every == 0 {
                continue;
            }
            let cost = if next() % 997 == 0 {
                1_000_000 + (next() % 1000) as i32
            } else {
                pool[(next() as usize) % pool.len()]
            };
            writeln!(text, "{right_id} {left_id} {cost}").unwrap();
        }
    }
    text
}
