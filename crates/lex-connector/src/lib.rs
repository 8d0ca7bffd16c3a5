//! Connection-cost lookup for morpheme lattices.
//!
//! `matrix::ConnectionEngine` answers `(right_id, left_id) -> cost` from a
//! compact `LXCC` matrix, decoding one right-id row at a time into a
//! per-engine cache. `matrix::TextTable` is the uncompressed reference
//! built straight from a `rid lid cost` text table.

pub mod config;
pub mod matrix;

pub use matrix::{ConnError, ConnectionCost, Cost, INVALID_COST, MAX_COST};
