use std::path::Path;

use tracing::{debug, debug_span, error};

use super::cache::{CacheStats, UnitCache};
use super::codec::{decode_unit, DecodedUnit};
use super::store::MatrixStore;
use super::{ConnError, ConnectionCost, CorruptUnitError, Cost, INVALID_COST};
use crate::config::ConnectorConfig;

/// Production cost lookup over a compact `LXCC` matrix.
///
/// Rows are decoded on first use and kept for the lifetime of the engine.
/// Every engine owns its cache; two engines over the same data never see
/// each other's entries. Construct one at startup and share it by
/// reference or `Arc`.
pub struct ConnectionEngine {
    store: MatrixStore,
    cache: UnitCache<Result<DecodedUnit, CorruptUnitError>>,
}

impl ConnectionEngine {
    pub fn new(store: MatrixStore) -> Self {
        let cache = UnitCache::new(store.num_right() as usize);
        Self { store, cache }
    }

    /// Wrap `store` and apply the engine section of `config`
    /// (eager verification, row prefetch).
    pub fn with_config(store: MatrixStore, config: &ConnectorConfig) -> Result<Self, ConnError> {
        let engine = Self::new(store);
        if config.engine.verify_on_load {
            engine.verify()?;
        }
        engine.prefetch(&config.engine.prefetch_rows)?;
        Ok(engine)
    }

    /// Load a compiled matrix file and build an engine from it.
    pub fn open(path: &Path, config: &ConnectorConfig) -> Result<Self, ConnError> {
        let store = MatrixStore::load(path, config.store.mmap)?;
        Self::with_config(store, config)
    }

    /// Build an engine from an in-memory blob with default settings.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConnError> {
        Ok(Self::new(MatrixStore::from_bytes(data)?))
    }

    pub fn store(&self) -> &MatrixStore {
        &self.store
    }

    /// Cost of `(right_id, left_id)`, reporting out-of-range IDs and corrupt
    /// rows as errors.
    pub fn try_cost(&self, right_id: u16, left_id: u16) -> Result<Cost, ConnError> {
        if right_id >= self.store.num_right() || left_id >= self.store.num_left() {
            return Err(self.out_of_range(right_id, left_id));
        }
        Ok(self.row(right_id)?.cost_of(left_id))
    }

    /// Decoded row for `right_id`, decoding it on first access.
    pub fn row(&self, right_id: u16) -> Result<&DecodedUnit, ConnError> {
        let decoded = self
            .cache
            .get_or_decode(right_id as usize, || self.decode_row(right_id))
            .ok_or_else(|| self.out_of_range(right_id, 0))?;
        decoded
            .as_ref()
            .map_err(|e| ConnError::CorruptUnit(e.clone()))
    }

    fn decode_row(&self, right_id: u16) -> Result<DecodedUnit, CorruptUnitError> {
        let _span = debug_span!("decode_row", right_id).entered();
        let result = match self.store.unit_at(right_id) {
            Some(bytes) => decode_unit(right_id, bytes, self.store.num_left()),
            None => Err(CorruptUnitError::new(right_id, "unit missing from store")),
        };
        match &result {
            Ok(unit) => debug!(columns = unit.len(), "decoded row"),
            Err(e) => error!(%e, "corrupt connection matrix row"),
        }
        result
    }

    /// Decode every row, failing on the first corrupt one.
    pub fn verify(&self) -> Result<(), ConnError> {
        let _span = debug_span!("verify", num_right = self.store.num_right()).entered();
        for right_id in 0..self.store.num_right() {
            self.row(right_id)?;
        }
        Ok(())
    }

    /// Decode the given rows ahead of the first query.
    pub fn prefetch(&self, rows: &[u16]) -> Result<(), ConnError> {
        for &right_id in rows {
            self.row(right_id)?;
        }
        if !rows.is_empty() {
            debug!(rows = rows.len(), "prefetched rows");
        }
        Ok(())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of rows currently decoded.
    pub fn resident_rows(&self) -> usize {
        self.cache.resident()
    }

    fn out_of_range(&self, right_id: u16, left_id: u16) -> ConnError {
        ConnError::OutOfRange {
            right_id,
            left_id,
            num_right: self.store.num_right(),
            num_left: self.store.num_left(),
        }
    }
}

impl ConnectionCost for ConnectionEngine {
    fn num_right(&self) -> u16 {
        self.store.num_right()
    }

    fn num_left(&self) -> u16 {
        self.store.num_left()
    }

    /// Out-of-range IDs and rows that fail to decode answer [`INVALID_COST`];
    /// use [`ConnectionEngine::try_cost`] to tell them apart.
    #[inline]
    fn cost(&self, right_id: u16, left_id: u16) -> Cost {
        self.try_cost(right_id, left_id).unwrap_or(INVALID_COST)
    }
}
