//! Tracker cell codes.
//!
//! A tracker hit is stored as one signed integer,
//! `code = sign(layer) * (row * 100 + |layer|)`. French layers are `0..=8`,
//! Italian layers are stored as `-1..=-9` (physical layer `n` at `-(n + 1)`).

use serde::{Deserialize, Serialize};

use crate::zone::Side;

/// Decoded tracker cell in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackerCell {
    /// Signed layer (map x).
    pub layer: i32,
    /// Row (map y).
    pub row: i32,
}

impl TrackerCell {
    /// Side of the source foil this cell is on.
    pub fn side(&self) -> Side {
        if self.layer < 0 { Side::Italy } else { Side::France }
    }
}

/// Decode a packed tracker cell code.
///
/// `row = |code| / 100` and `layer = code % 100`, both truncating, so the
/// layer keeps the sign of the code.
pub fn decode_tracker(code: i64) -> TrackerCell {
    let row = code.unsigned_abs() / 100;
    let layer = code % 100;
    TrackerCell { layer: layer as i32, row: i32::try_from(row).unwrap_or(i32::MAX) }
}

/// Pack a (layer, row) pair the way the simulation writes it.
pub fn encode_tracker(layer: i32, row: i32) -> i64 {
    let packed = i64::from(row.unsigned_abs()) * 100 + i64::from(layer.unsigned_abs());
    if layer < 0 { -packed } else { packed }
}
