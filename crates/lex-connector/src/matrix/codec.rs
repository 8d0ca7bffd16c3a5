use std::collections::BTreeSet;

use super::{ConnError, CorruptUnitError, Cost, INVALID_COST};

/// Unit header: palette_len(2) + bit_width(1).
pub(super) const UNIT_HEADER_SIZE: usize = 2 + 1;
/// Bytes per palette value.
const PALETTE_VALUE_SIZE: usize = 4;

/// One right-id row expanded to a cost per left ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedUnit {
    costs: Box<[Cost]>,
}

impl DecodedUnit {
    /// Cost for `left_id` within this row. IDs past the row answer the sentinel.
    #[inline]
    pub fn cost_of(&self, left_id: u16) -> Cost {
        self.costs
            .get(left_id as usize)
            .copied()
            .unwrap_or(INVALID_COST)
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    pub fn as_slice(&self) -> &[Cost] {
        &self.costs
    }
}

/// Minimal index width for a palette of `palette_len` values.
pub(super) fn bit_width_for(palette_len: usize) -> u8 {
    if palette_len <= 1 {
        0
    } else {
        (usize::BITS - (palette_len - 1).leading_zeros()) as u8
    }
}

fn packed_len(num_left: usize, bit_width: u8) -> usize {
    (num_left * bit_width as usize).div_ceil(8)
}

/// Encode one row as a sorted palette of distinct costs followed by
/// LSB-first packed palette indices.
pub fn encode_row(costs: &[Cost]) -> Result<Vec<u8>, ConnError> {
    if let Some(&bad) = costs.iter().find(|&&c| c < 0) {
        return Err(ConnError::InvalidCost(bad as i64));
    }
    if costs.len() > u16::MAX as usize {
        return Err(ConnError::Layout(format!(
            "row has {} columns, at most {} allowed",
            costs.len(),
            u16::MAX
        )));
    }

    let palette: Vec<Cost> = costs
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let bit_width = bit_width_for(palette.len());

    let mut buf = Vec::with_capacity(
        UNIT_HEADER_SIZE
            + palette.len() * PALETTE_VALUE_SIZE
            + packed_len(costs.len(), bit_width),
    );
    buf.extend_from_slice(&(palette.len() as u16).to_le_bytes());
    buf.push(bit_width);
    for &value in &palette {
        buf.extend_from_slice(&(value as u32).to_le_bytes());
    }

    if bit_width > 0 {
        let mut acc: u64 = 0;
        let mut nbits: u32 = 0;
        for cost in costs {
            // The palette is built from `costs`, so the search always hits.
            let idx = palette.binary_search(cost).unwrap_or_default() as u64;
            acc |= idx << nbits;
            nbits += bit_width as u32;
            while nbits >= 8 {
                buf.push(acc as u8);
                acc >>= 8;
                nbits -= 8;
            }
        }
        if nbits > 0 {
            buf.push(acc as u8);
        }
    }
    Ok(buf)
}

/// Decode the encoded row for `right_id` into `num_left` costs.
///
/// Deterministic and side-effect free; the caller decides whether to cache
/// the result.
pub fn decode_unit(
    right_id: u16,
    bytes: &[u8],
    num_left: u16,
) -> Result<DecodedUnit, CorruptUnitError> {
    let corrupt = |reason: String| CorruptUnitError::new(right_id, reason);
    let num_left = num_left as usize;

    if bytes.len() < UNIT_HEADER_SIZE {
        return Err(corrupt(format!(
            "unit is {} bytes, shorter than its header",
            bytes.len()
        )));
    }
    let palette_len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
    let bit_width = bytes[2];

    if palette_len == 0 && num_left > 0 {
        return Err(corrupt("empty palette for a non-empty row".to_string()));
    }
    if palette_len > num_left.max(1) {
        return Err(corrupt(format!(
            "palette of {palette_len} values exceeds row width {num_left}"
        )));
    }
    let expected_width = bit_width_for(palette_len);
    if bit_width != expected_width {
        return Err(corrupt(format!(
            "bit width {bit_width}, expected {expected_width} for palette of {palette_len}"
        )));
    }

    let palette_end = UNIT_HEADER_SIZE + palette_len * PALETTE_VALUE_SIZE;
    let expected_len = palette_end + packed_len(num_left, bit_width);
    if bytes.len() != expected_len {
        return Err(corrupt(format!(
            "expected {expected_len} bytes, got {}",
            bytes.len()
        )));
    }

    let palette = bytes[UNIT_HEADER_SIZE..palette_end]
        .chunks_exact(PALETTE_VALUE_SIZE)
        .map(|b| {
            let raw = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            Cost::try_from(raw).map_err(|_| corrupt(format!("palette value {raw} out of domain")))
        })
        .collect::<Result<Vec<Cost>, _>>()?;

    if bit_width == 0 {
        return Ok(DecodedUnit {
            costs: vec![palette.first().copied().unwrap_or(INVALID_COST); num_left]
                .into_boxed_slice(),
        });
    }

    let mask = (1u64 << bit_width) - 1;
    let mut costs = Vec::with_capacity(num_left);
    let mut packed = bytes[palette_end..].iter();
    let mut acc: u64 = 0;
    let mut nbits: u32 = 0;
    for left_id in 0..num_left {
        while nbits < bit_width as u32 {
            let byte = packed
                .next()
                .ok_or_else(|| corrupt("packed indices truncated".to_string()))?;
            acc |= (*byte as u64) << nbits;
            nbits += 8;
        }
        let idx = (acc & mask) as usize;
        acc >>= bit_width;
        nbits -= bit_width as u32;
        let cost = palette.get(idx).copied().ok_or_else(|| {
            corrupt(format!(
                "index {idx} at left_id {left_id} outside palette of {palette_len}"
            ))
        })?;
        costs.push(cost);
    }

    Ok(DecodedUnit {
        costs: costs.into_boxed_slice(),
    })
}
