//! # nv-geom
//!
//! Decoding of per-hit location codes into detector-map coordinates.
//!
//! Two detector families are covered:
//! - the wire tracker, whose cells are packed integers (signed layer, row);
//! - the segmented calorimeter, whose optical modules are geometry-ID tokens
//!   such as `[1302:0.1.12.5.*]`, spread over six zones.
//!
//! ```
//! use nv_geom::{CaloZone, decode_calorimeter, decode_tracker};
//!
//! let cell = decode_tracker(-1203);
//! assert_eq!((cell.layer, cell.row), (-3, 12));
//!
//! let hit = decode_calorimeter("[1302:0.1.12.5.*]").unwrap();
//! assert_eq!((hit.zone, hit.x, hit.y), (CaloZone::France, 12, 5));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calo;
pub mod tracker;
pub mod zone;

pub use calo::{CaloHit, DecodeError, decode_calorimeter};
pub use tracker::{TrackerCell, decode_tracker, encode_tracker};
pub use zone::{CaloZone, Layout, Side};
