use super::codec::encode_row;
use super::store::{HEADER_SIZE, MAGIC, OFFSET_SIZE, VERSION};
use super::{ConnError, ConnectionCost, Cost, MatrixStore};

/// Incremental `LXCC` writer: push one row per right ID, then `finish`.
pub struct MatrixBuilder {
    num_right: u16,
    num_left: u16,
    offsets: Vec<u32>,
    units: Vec<u8>,
}

impl MatrixBuilder {
    pub fn new(num_right: u16, num_left: u16) -> Self {
        let mut offsets = Vec::with_capacity(num_right as usize + 1);
        offsets.push(0);
        Self {
            num_right,
            num_left,
            offsets,
            units: Vec::new(),
        }
    }

    /// Number of rows pushed so far.
    pub fn rows(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Encode the next row. `costs` must hold exactly `num_left` values.
    pub fn push_row(&mut self, costs: &[Cost]) -> Result<(), ConnError> {
        if self.rows() >= self.num_right as usize {
            return Err(ConnError::Layout(format!(
                "more than {} rows pushed",
                self.num_right
            )));
        }
        if costs.len() != self.num_left as usize {
            return Err(ConnError::Layout(format!(
                "row {} has {} columns, expected {}",
                self.rows(),
                costs.len(),
                self.num_left
            )));
        }
        self.units.extend_from_slice(&encode_row(costs)?);
        let end = u32::try_from(self.units.len()).map_err(|_| {
            ConnError::Layout("unit area exceeds 4 GiB offset range".to_string())
        })?;
        self.offsets.push(end);
        Ok(())
    }

    /// Serialize header, offset table, and rows.
    pub fn finish(self) -> Result<Vec<u8>, ConnError> {
        if self.rows() != self.num_right as usize {
            return Err(ConnError::Layout(format!(
                "expected {} rows, got {}",
                self.num_right,
                self.rows()
            )));
        }
        let mut buf =
            Vec::with_capacity(HEADER_SIZE + self.offsets.len() * OFFSET_SIZE + self.units.len());
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&self.num_right.to_le_bytes());
        buf.extend_from_slice(&self.num_left.to_le_bytes());
        for offset in &self.offsets {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf.extend_from_slice(&self.units);
        Ok(buf)
    }
}

/// Encode the full matrix of any cost source (normally a `TextTable`).
pub fn encode_matrix<C>(source: &C) -> Result<Vec<u8>, ConnError>
where
    C: ConnectionCost + ?Sized,
{
    let num_left = source.num_left();
    let mut builder = MatrixBuilder::new(source.num_right(), num_left);
    let mut row = Vec::with_capacity(num_left as usize);
    for right_id in 0..source.num_right() {
        row.clear();
        row.extend((0..num_left).map(|left_id| source.cost(right_id, left_id)));
        builder.push_row(&row)?;
    }
    builder.finish()
}

impl MatrixStore {
    /// Encode `source` and load the result as an owned store.
    pub fn from_source<C>(source: &C) -> Result<Self, ConnError>
    where
        C: ConnectionCost + ?Sized,
    {
        Self::from_vec(encode_matrix(source)?)
    }
}
