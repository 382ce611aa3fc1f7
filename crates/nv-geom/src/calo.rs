//! Calorimeter geometry-ID tokens.
//!
//! Tokens look like `[TTTT:f1.f2.f3.f4.f5]`: characters 1..5 are the wall
//! type and the fields carry module, side, sub-wall and position. Flags are
//! read at fixed byte offsets, coordinates from period-delimited fields
//! (1-based, counting the `[TTTT:module` head as field 1).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::zone::CaloZone;

/// Main calorimeter walls.
pub const WALL_MAIN: &str = "1302";
/// X-walls.
pub const WALL_XWALL: &str = "1232";
/// Gamma-veto walls.
pub const WALL_VETO: &str = "1252";

const MIN_TOKEN_LEN: usize = 9;
const SIDE_OFFSET: usize = 8;
const SUBWALL_OFFSET: usize = 10;

/// Why a token could not be placed on a map.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Token shorter than the fixed header.
    #[error("token too short ({len} < 9 characters)")]
    TooShort {
        /// Token length in bytes.
        len: usize,
    },

    /// Wall type is none of the three calorimeter families.
    #[error("unknown wall type '{0}'")]
    UnknownWallType(String),

    /// A fixed-offset flag character is missing.
    #[error("no flag character at offset {0}")]
    MissingFlag(usize),

    /// A period-delimited coordinate field is missing or not an integer.
    #[error("field {index} is missing or not an integer")]
    BadField {
        /// 1-based field index.
        index: usize,
    },
}

/// A calorimeter hit in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaloHit {
    /// Zone whose map this hit lands on.
    pub zone: CaloZone,
    /// Map x.
    pub x: i32,
    /// Map y.
    pub y: i32,
}

fn flag_at(token: &[u8], offset: usize) -> Result<bool, DecodeError> {
    token.get(offset).map(|&c| c == b'1').ok_or(DecodeError::MissingFlag(offset))
}

/// Leading optional sign and digits of a field; trailing `]`, `*` etc. are ignored.
fn leading_int(s: &str) -> Option<i32> {
    let s = s.trim_start();
    let digits_start = usize::from(s.starts_with('-') || s.starts_with('+'));
    let end = s[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + digits_start);
    if end == digits_start {
        return None;
    }
    s[..end].parse().ok()
}

fn field(token: &str, index: usize) -> Result<i32, DecodeError> {
    token
        .split('.')
        .nth(index - 1)
        .and_then(leading_int)
        .ok_or(DecodeError::BadField { index })
}

fn mirror(x: i32) -> i32 {
    -(x + 1)
}

/// Decode one calorimeter geometry-ID token.
///
/// Main-wall hits go to the France/Italy zones, X-wall hits to
/// Tunnel/Mountain and veto hits to Top/Bottom. Italian x coordinates are
/// mirrored to `-(x + 1)`; tunnel X-wall hits are mirrored once more so that
/// France renders on the left of that panel.
pub fn decode_calorimeter(token: &str) -> Result<CaloHit, DecodeError> {
    let bytes = token.as_bytes();
    if bytes.len() < MIN_TOKEN_LEN {
        return Err(DecodeError::TooShort { len: bytes.len() });
    }
    let wall = token
        .get(1..5)
        .ok_or_else(|| DecodeError::UnknownWallType(String::from_utf8_lossy(&bytes[1..5]).into()))?;
    let is_france = flag_at(bytes, SIDE_OFFSET)?;

    match wall {
        WALL_MAIN => {
            let mut x = field(token, 3)?;
            let y = field(token, 4)?;
            if !is_france {
                x = mirror(x);
            }
            let zone = if is_france { CaloZone::France } else { CaloZone::Italy };
            Ok(CaloHit { zone, x, y })
        }
        WALL_XWALL => {
            let is_tunnel = flag_at(bytes, SUBWALL_OFFSET)?;
            let mut x = field(token, 4)?;
            let y = field(token, 5)?;
            if !is_france {
                x = mirror(x);
            }
            if is_tunnel {
                x = mirror(x);
            }
            let zone = if is_tunnel { CaloZone::Tunnel } else { CaloZone::Mountain };
            Ok(CaloHit { zone, x, y })
        }
        WALL_VETO => {
            let is_top = flag_at(bytes, SUBWALL_OFFSET)?;
            let x = field(token, 5)?;
            let y = i32::from(is_france ^ is_top);
            let zone = if is_top { CaloZone::Top } else { CaloZone::Bottom };
            Ok(CaloHit { zone, x, y })
        }
        other => Err(DecodeError::UnknownWallType(other.to_string())),
    }
}
