//! Event-level accumulation of hit maps and distributions.
//!
//! Events are split into fixed-size chunks, each chunk is accumulated on
//! its own (in parallel) and the partial grids are merged in chunk order, so
//! the result does not depend on thread scheduling.

use std::ops::AddAssign;

use nv_core::{FieldValue, Result};
use nv_geom::{decode_calorimeter, decode_tracker};
use nv_grid::{Grid, GridAccumulator, GridMode, GridSpec, ZoneSet};
use rayon::prelude::*;
use serde::Serialize;

/// Events per accumulation chunk.
pub const CHUNK_EVENTS: usize = 4096;

/// Bookkeeping of one accumulation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillStats {
    /// Events visited.
    pub events: u64,
    /// Hits (or values) seen.
    pub hits: u64,
    /// Hit tokens that could not be decoded.
    pub decode_errors: u64,
    /// Events whose average quantity was not aligned with the hit codes.
    pub misaligned_events: u64,
    /// Events whose value had the wrong type for the variable.
    pub bad_rows: u64,
}

impl AddAssign for FillStats {
    fn add_assign(&mut self, o: FillStats) {
        self.events += o.events;
        self.hits += o.hits;
        self.decode_errors += o.decode_errors;
        self.misaligned_events += o.misaligned_events;
        self.bad_rows += o.bad_rows;
    }
}

/// Accumulators that can be built per chunk and added together.
trait Partial: Clone + Send {
    fn absorb(&mut self, other: &Self) -> Result<()>;
}

impl Partial for GridAccumulator {
    fn absorb(&mut self, other: &Self) -> Result<()> {
        self.merge(other)
    }
}

impl Partial for ZoneSet<GridAccumulator> {
    fn absorb(&mut self, other: &Self) -> Result<()> {
        self.merge(other)
    }
}

fn accumulate<A, F>(n_events: usize, empty: A, fill_event: F) -> Result<(A, FillStats)>
where
    A: Partial + Sync,
    F: Fn(usize, &mut A, &mut FillStats) + Sync,
{
    let starts: Vec<usize> = (0..n_events).step_by(CHUNK_EVENTS).collect();
    let parts: Vec<(A, FillStats)> = starts
        .par_iter()
        .map(|&start| {
            let mut acc = empty.clone();
            let mut stats = FillStats::default();
            for i in start..(start + CHUNK_EVENTS).min(n_events) {
                stats.events += 1;
                fill_event(i, &mut acc, &mut stats);
            }
            (acc, stats)
        })
        .collect();

    let mut total = empty;
    let mut stats = FillStats::default();
    for (acc, s) in &parts {
        total.absorb(acc)?;
        stats += *s;
    }
    Ok((total, stats))
}

/// Per-hit quantities of event `i`, checked against the number of hits.
fn aligned_quantity(
    quantity: Option<&[FieldValue]>,
    i: usize,
    n_hits: usize,
    branch: &str,
    stats: &mut FillStats,
) -> std::result::Result<Option<Vec<f64>>, ()> {
    let Some(col) = quantity else {
        return Ok(None);
    };
    match col.get(i).and_then(FieldValue::as_reals) {
        Some(q) if q.len() == n_hits => Ok(Some(q)),
        Some(q) => {
            tracing::warn!(
                branch,
                event = i,
                hits = n_hits,
                values = q.len(),
                "average quantity not aligned with hits, event skipped"
            );
            stats.misaligned_events += 1;
            Err(())
        }
        None => {
            stats.bad_rows += 1;
            Err(())
        }
    }
}

/// Build a tracker map from packed cell codes, optionally averaging an
/// aligned per-hit quantity.
pub fn tracker_map(
    name: &str,
    codes: &[FieldValue],
    quantity: Option<&[FieldValue]>,
) -> Result<(Grid, FillStats)> {
    let mode = if quantity.is_some() { GridMode::Average } else { GridMode::Count };
    let empty = GridAccumulator::new(GridSpec::tracker(name, mode));

    let (acc, stats) = accumulate(codes.len(), empty, |i, acc, stats| {
        let Some(cells) = codes[i].as_integers() else {
            stats.bad_rows += 1;
            return;
        };
        let Ok(q) = aligned_quantity(quantity, i, cells.len(), name, stats) else {
            return;
        };
        for (k, &code) in cells.iter().enumerate() {
            let cell = decode_tracker(code);
            stats.hits += 1;
            acc.add_count(cell.layer, cell.row);
            if let Some(q) = &q {
                acc.add_weighted(cell.layer, cell.row, q[k]);
            }
        }
    })?;
    Ok((acc.finalize(), stats))
}

/// Build the six calorimeter zone maps from geometry-ID tokens, optionally
/// averaging an aligned per-hit quantity. Undecodable tokens are skipped.
pub fn calo_maps(
    name: &str,
    tokens: &[FieldValue],
    quantity: Option<&[FieldValue]>,
) -> Result<(ZoneSet<Grid>, FillStats)> {
    let mode = if quantity.is_some() { GridMode::Average } else { GridMode::Count };
    let empty = ZoneSet::calo_accumulators(name, mode);

    let (accs, stats) = accumulate(tokens.len(), empty, |i, accs, stats| {
        let Some(hits) = tokens[i].as_tokens() else {
            stats.bad_rows += 1;
            return;
        };
        let Ok(q) = aligned_quantity(quantity, i, hits.len(), name, stats) else {
            return;
        };
        for (k, token) in hits.iter().enumerate() {
            stats.hits += 1;
            match decode_calorimeter(token) {
                Ok(hit) => {
                    let acc = &mut accs[hit.zone];
                    acc.add_count(hit.x, hit.y);
                    if let Some(q) = &q {
                        acc.add_weighted(hit.x, hit.y, q[k]);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        branch = name,
                        event = i,
                        token = %token,
                        error = %e,
                        "hit skipped"
                    );
                    stats.decode_errors += 1;
                }
            }
        }
    })?;
    Ok((accs.finalize(), stats))
}

/// All numeric values of a branch, flattened over events. Rows without a
/// numeric view are counted in `bad_rows`.
pub fn flatten_values(column: &[FieldValue]) -> (Vec<f64>, FillStats) {
    let mut stats = FillStats::default();
    let mut out = Vec::with_capacity(column.len());
    for v in column {
        stats.events += 1;
        match v.as_reals() {
            Some(xs) => {
                stats.hits += xs.len() as u64;
                out.extend(xs);
            }
            None => stats.bad_rows += 1,
        }
    }
    (out, stats)
}

/// Fill a 1-D distribution grid.
pub fn distribution(spec: GridSpec, values: &[f64]) -> Grid {
    let mut acc = GridAccumulator::new(spec);
    for &v in values {
        acc.fill_value(v);
    }
    acc.finalize_count()
}
