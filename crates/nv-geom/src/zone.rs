//! Detector zones, their map dimensions and cell-labelling conventions.
//!
//! Map coordinates render the Italian side as the mirror image of the French
//! side around the source foil: an Italian column or layer `n` sits at
//! `x = -(n + 1)`. Labels undo that transform so operators read the physical
//! numbering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Demonstrator side, named after the hall orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// French side.
    France,
    /// Italian side.
    Italy,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::France => write!(f, "France"),
            Side::Italy => write!(f, "Italy"),
        }
    }
}

/// Undo the Italian mirror: returns the side and the physical index.
fn unmirror(x: i32) -> (Side, i32) {
    if x < 0 { (Side::Italy, -x - 1) } else { (Side::France, x) }
}

/// The six calorimeter zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CaloZone {
    /// Italian main wall.
    Italy,
    /// French main wall.
    France,
    /// X-walls on the tunnel side.
    Tunnel,
    /// X-walls on the mountain side.
    Mountain,
    /// Top veto wall.
    Top,
    /// Bottom veto wall.
    Bottom,
}

impl CaloZone {
    /// All zones, in array-index order.
    pub const ALL: [CaloZone; 6] = [
        CaloZone::Italy,
        CaloZone::France,
        CaloZone::Tunnel,
        CaloZone::Mountain,
        CaloZone::Top,
        CaloZone::Bottom,
    ];

    /// Index into a `[T; 6]` zone array.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase name, used in grid names.
    pub fn name(self) -> &'static str {
        match self {
            CaloZone::Italy => "italy",
            CaloZone::France => "france",
            CaloZone::Tunnel => "tunnel",
            CaloZone::Mountain => "mountain",
            CaloZone::Top => "top",
            CaloZone::Bottom => "bottom",
        }
    }

    /// Inclusive x range of the zone's map.
    pub fn x_range(self) -> (i32, i32) {
        match self {
            CaloZone::Italy => (-20, -1),
            CaloZone::France => (0, 19),
            CaloZone::Tunnel | CaloZone::Mountain => (-2, 1),
            CaloZone::Top | CaloZone::Bottom => (0, 15),
        }
    }

    /// Inclusive y range of the zone's map.
    pub fn y_range(self) -> (i32, i32) {
        match self {
            CaloZone::Italy | CaloZone::France => (0, 12),
            CaloZone::Tunnel | CaloZone::Mountain => (0, 15),
            CaloZone::Top | CaloZone::Bottom => (0, 1),
        }
    }

    /// Physical description of a map cell.
    pub fn cell_label(self, x: i32, y: i32) -> String {
        match self {
            CaloZone::France | CaloZone::Italy => {
                let (side, column) = unmirror(x);
                format!("{side} main wall: column {column}, row {y}")
            }
            CaloZone::Mountain => {
                let (side, column) = unmirror(x);
                format!("Mountain X-wall: {side} side, column {column}, row {y}")
            }
            CaloZone::Tunnel => {
                // Tunnel panels carry a second mirror, so non-negative x is Italian.
                let (side, column) = match unmirror(x) {
                    (Side::France, c) => (Side::Italy, c),
                    (Side::Italy, c) => (Side::France, c),
                };
                format!("Tunnel X-wall: {side} side, column {column}, row {y}")
            }
            CaloZone::Top => {
                let side = if y == 0 { Side::France } else { Side::Italy };
                format!("Top veto wall: {side} side, column {x}")
            }
            CaloZone::Bottom => {
                let side = if y == 1 { Side::France } else { Side::Italy };
                format!("Bottom veto wall: {side} side, column {x}")
            }
        }
    }
}

impl fmt::Display for CaloZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracker map: x = signed layer, y = row.
pub const TRACKER_LAYERS: (i32, i32) = (-9, 8);
/// Tracker rows (inclusive).
pub const TRACKER_ROWS: (i32, i32) = (0, 112);

/// What a grid's cells represent; drives axis ranges and cell labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "zone", rename_all = "snake_case")]
pub enum Layout {
    /// Tracker layer/row map.
    Tracker,
    /// One calorimeter zone map.
    Calo(CaloZone),
    /// 1-D distribution of a scalar observable.
    Distribution,
}

impl Layout {
    /// Label for an integer map cell. Distributions have no geometric label.
    pub fn cell_label(self, x: i32, y: i32) -> String {
        match self {
            Layout::Tracker => {
                let (side, layer) = unmirror(x);
                format!("Tracker: {side} side, layer {layer}, row {y}")
            }
            Layout::Calo(zone) => zone.cell_label(x, y),
            Layout::Distribution => format!("bin {x}"),
        }
    }
}
