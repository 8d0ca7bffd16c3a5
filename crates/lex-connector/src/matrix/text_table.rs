use std::io::BufRead;

use tracing::{debug, debug_span, warn};

use super::{ConnError, ConnectionCost, Cost, INVALID_COST, MAX_COST};

/// What the table loader does with a malformed record line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Abort loading with a `ConnError::Parse`.
    #[default]
    Strict,
    /// Log a warning and skip the line.
    SkipMalformed,
}

/// Parse one `"<rid> <lid> <cost>"` record.
pub fn parse_line(line: &str) -> Result<(u16, u16, Cost), ConnError> {
    parse_fields(line).map_err(ConnError::Parse)
}

fn parse_fields(line: &str) -> Result<(u16, u16, Cost), String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(format!("expected 3 fields, got {}", fields.len()));
    }
    let right_id: u16 = fields[0]
        .parse()
        .map_err(|e| format!("right_id '{}': {e}", fields[0]))?;
    let left_id: u16 = fields[1]
        .parse()
        .map_err(|e| format!("left_id '{}': {e}", fields[1]))?;
    let cost = parse_cost(fields[2])?;
    Ok((right_id, left_id, cost))
}

fn parse_cost(field: &str) -> Result<Cost, String> {
    let cost: Cost = field
        .parse()
        .map_err(|e| format!("cost '{field}': {e}"))?;
    if !(0..=MAX_COST).contains(&cost) {
        return Err(format!("cost {cost} outside 0..={MAX_COST}"));
    }
    Ok(cost)
}

/// Uncompressed, uncached connection costs parsed from text.
///
/// Dense `num_right * num_left` array indexed `right_id * num_left + left_id`.
/// Pairs absent from the source text hold [`INVALID_COST`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTable {
    num_right: u16,
    num_left: u16,
    costs: Vec<Cost>,
    records: usize,
}

impl TextTable {
    /// Parse a `rid lid cost` table whose first line is an ignored header.
    /// Dimensions are one past the largest right/left ID seen.
    pub fn from_text(text: &str, policy: ParsePolicy) -> Result<Self, ConnError> {
        Self::from_reader(text.as_bytes(), policy)
    }

    /// Streaming variant of [`TextTable::from_text`].
    pub fn from_reader<R: BufRead>(rdr: R, policy: ParsePolicy) -> Result<Self, ConnError> {
        let _span = debug_span!("text_table_load", ?policy).entered();
        let mut lines = rdr.lines();
        match lines.next() {
            Some(header) => {
                header?;
            }
            None => return Err(ConnError::Parse("empty table (missing header)".to_string())),
        }

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (idx, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            // +2: 1-based, and the header is line 1
            let line_no = idx + 2;
            match parse_fields(&line) {
                Ok(record) => records.push(record),
                Err(msg) => match policy {
                    ParsePolicy::Strict => {
                        return Err(ConnError::Parse(format!("line {line_no}: {msg}")));
                    }
                    ParsePolicy::SkipMalformed => {
                        warn!(line_no, %msg, "skipping malformed connection record");
                        skipped += 1;
                    }
                },
            }
        }

        let num_right = dimension(records.iter().map(|r| r.0), "right_id")?;
        let num_left = dimension(records.iter().map(|r| r.1), "left_id")?;
        debug!(records = records.len(), skipped, num_right, num_left, "parsed text table");
        Self::with_dims(num_right, num_left, records)
    }

    /// Build from records with explicit dimensions. Later duplicates win.
    pub fn with_dims<I>(num_right: u16, num_left: u16, records: I) -> Result<Self, ConnError>
    where
        I: IntoIterator<Item = (u16, u16, Cost)>,
    {
        let mut costs = vec![INVALID_COST; num_right as usize * num_left as usize];
        let mut count = 0usize;
        for (right_id, left_id, cost) in records {
            if right_id >= num_right || left_id >= num_left {
                return Err(ConnError::OutOfRange {
                    right_id,
                    left_id,
                    num_right,
                    num_left,
                });
            }
            if !(0..=MAX_COST).contains(&cost) {
                return Err(ConnError::InvalidCost(cost as i64));
            }
            costs[right_id as usize * num_left as usize + left_id as usize] = cost;
            count += 1;
        }
        Ok(Self {
            num_right,
            num_left,
            costs,
            records: count,
        })
    }

    /// Parse the dense single-column form: a header of `num_right num_left`
    /// (or one `num_ids` for a square matrix), then one cost per line in
    /// right-id-major order.
    pub fn from_dense_text(text: &str) -> Result<Self, ConnError> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| ConnError::Parse("empty file".to_string()))?;
        let dims: Vec<u16> = header
            .split_whitespace()
            .map(|f| {
                f.parse()
                    .map_err(|e| ConnError::Parse(format!("invalid dimension '{f}': {e}")))
            })
            .collect::<Result<_, _>>()?;
        let (num_right, num_left) = match dims[..] {
            [n] => (n, n),
            [r, l] => (r, l),
            _ => {
                return Err(ConnError::Parse(format!(
                    "expected 1 or 2 values in header, got {}",
                    dims.len()
                )));
            }
        };

        let expected = num_right as usize * num_left as usize;
        let mut costs = Vec::with_capacity(expected);
        for (idx, line) in lines.enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let cost = parse_cost(line)
                .map_err(|msg| ConnError::Parse(format!("line {}: {msg}", idx + 2)))?;
            costs.push(cost);
        }
        if costs.len() != expected {
            return Err(ConnError::Parse(format!(
                "expected {expected} costs, got {}",
                costs.len()
            )));
        }
        Ok(Self {
            num_right,
            num_left,
            costs,
            records: expected,
        })
    }

    /// Number of records applied to the table.
    pub fn records(&self) -> usize {
        self.records
    }
}

/// One past the largest ID, or 0 for no records.
fn dimension(ids: impl Iterator<Item = u16>, what: &str) -> Result<u16, ConnError> {
    match ids.max() {
        None => Ok(0),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| ConnError::Parse(format!("{what} {max} leaves no room for a dimension"))),
    }
}

impl ConnectionCost for TextTable {
    fn num_right(&self) -> u16 {
        self.num_right
    }

    fn num_left(&self) -> u16 {
        self.num_left
    }

    fn cost(&self, right_id: u16, left_id: u16) -> Cost {
        if right_id >= self.num_right || left_id >= self.num_left {
            return INVALID_COST;
        }
        self.costs[right_id as usize * self.num_left as usize + left_id as usize]
    }
}
