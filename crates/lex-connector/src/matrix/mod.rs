//! Connection-cost matrix storage and lookup.
//!
//! `MatrixStore` owns the encoded `LXCC` blob and hands out one encoded
//! unit (right-id row) at a time. `ConnectionEngine` decodes rows on demand
//! through its own `UnitCache`. `TextTable` parses the plain-text table
//! into a dense array and serves as ground truth for the engine.

mod builder;
mod cache;
mod codec;
mod engine;
mod store;
mod text_table;
#[cfg(test)]
mod tests;

pub use builder::{encode_matrix, MatrixBuilder};
pub use cache::{CacheStats, UnitCache};
pub use codec::{decode_unit, encode_row, DecodedUnit};
pub use engine::ConnectionEngine;
pub use store::MatrixStore;
pub use text_table::{parse_line, ParsePolicy, TextTable};

use std::io;

/// Transition cost between two adjacent nodes. Lower is preferred.
pub type Cost = i32;

/// Largest cost a modeled transition may carry.
pub const MAX_COST: Cost = i32::MAX - 1;

/// Sentinel for a forbidden or unmodeled transition.
pub const INVALID_COST: Cost = i32::MAX;

/// Returns `true` if `cost` is a modeled cost or the sentinel.
pub fn is_cost_in_domain(cost: Cost) -> bool {
    (0..=MAX_COST).contains(&cost) || cost == INVALID_COST
}

/// Error type for loading, decoding, and querying connection matrices.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected LXCC)")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Declared dimensions disagree with the offset table or byte length.
    #[error("inconsistent matrix layout: {0}")]
    Layout(String),

    #[error(transparent)]
    CorruptUnit(#[from] CorruptUnitError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("cost out of domain: {0}")]
    InvalidCost(i64),

    #[error("connection id out of range: ({right_id}, {left_id}) not in {num_right}x{num_left}")]
    OutOfRange {
        right_id: u16,
        left_id: u16,
        num_right: u16,
        num_left: u16,
    },
}

/// A unit whose bytes failed structural validation during decode.
///
/// `Clone` so that a failed decode can be memoized and reported identically
/// on every later access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("corrupt unit for right_id {right_id}: {reason}")]
pub struct CorruptUnitError {
    pub right_id: u16,
    pub reason: String,
}

impl CorruptUnitError {
    pub(crate) fn new(right_id: u16, reason: impl Into<String>) -> Self {
        Self {
            right_id,
            reason: reason.into(),
        }
    }
}

/// Query surface shared by the production engine and the reference table.
pub trait ConnectionCost: Send + Sync {
    /// Number of right connection IDs (rows).
    fn num_right(&self) -> u16;

    /// Number of left connection IDs (columns).
    fn num_left(&self) -> u16;

    /// Cost of joining a node with `right_id` to a following node with
    /// `left_id`. Out-of-range IDs answer [`INVALID_COST`].
    fn cost(&self, right_id: u16, left_id: u16) -> Cost;
}
