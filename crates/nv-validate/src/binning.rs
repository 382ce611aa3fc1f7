//! Axis choice for 1-D distributions.

use nv_config::VariableConfig;
use nv_core::Result;
use nv_grid::Axis;

/// Bins used when neither the config nor integer data decide.
pub const AUTO_BINS: usize = 100;

/// Integer data spanning at most this many values get one bin per integer.
pub const MAX_INTEGER_BINS: i64 = 100;

/// Relative widening of a data-derived upper edge so the maximum lands in
/// the last bin.
const UPPER_EDGE_NUDGE: f64 = 1e-6;

/// Data-derived upper edge strictly above `max`.
fn upper_edge(lo: f64, max: f64) -> f64 {
    (max + (max - lo) * UPPER_EDGE_NUDGE).max(max.next_up())
}

fn finite_range(values: &[&[f64]]) -> Option<(f64, f64)> {
    values
        .iter()
        .flat_map(|vs| vs.iter().copied())
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn all_integral(values: &[&[f64]]) -> bool {
    values.iter().flat_map(|vs| vs.iter()).filter(|v| v.is_finite()).all(|v| v.fract() == 0.0)
}

fn integer_axis(lo: f64, hi: f64) -> Option<Axis> {
    let in_range = |v: f64| v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX);
    if !(in_range(lo) && in_range(hi)) {
        return None;
    }
    let (lo, hi) = (lo as i64, hi as i64);
    if hi - lo + 1 > MAX_INTEGER_BINS {
        return None;
    }
    Some(Axis::integer(lo as i32, hi as i32))
}

/// Choose the binning of a distribution from its config entry and the union
/// of the sample and reference values.
///
/// Configured bins and limits win. Without them, integer-valued data get one
/// bin per integer when that is at most [`MAX_INTEGER_BINS`] bins, and
/// anything else gets [`AUTO_BINS`] equal bins over `[min, max]`. A limit left
/// unset is taken from the data. Without any finite value the axis is
/// `[0, 1)`.
pub fn choose_axis(config: Option<&VariableConfig>, values: &[&[f64]]) -> Result<Axis> {
    let bins = config.map(|c| c.bin_count).filter(|&n| n > 0);
    let low = config.and_then(|c| c.low);
    let high = config.and_then(|c| c.high);

    let Some((min, max)) = finite_range(values) else {
        let (lo, hi) = config.and_then(VariableConfig::limits).unwrap_or((0.0, 1.0));
        return Axis::uniform(bins.unwrap_or(1), lo, hi);
    };

    if bins.is_none()
        && low.is_none()
        && high.is_none()
        && all_integral(values)
        && let Some(axis) = integer_axis(min, max)
    {
        return Ok(axis);
    }

    let lo = low.unwrap_or(min);
    let hi = match high {
        Some(h) => h,
        None if max > lo => upper_edge(lo, max),
        None => lo + 1.0,
    };
    let (lo, hi) = if lo < hi {
        (lo, hi)
    } else {
        tracing::warn!(low = lo, high = hi, "configured limits are not ordered, using data range");
        if max > min { (min, upper_edge(min, max)) } else { (min - 0.5, min + 0.5) }
    };
    Axis::uniform(bins.unwrap_or(AUTO_BINS), lo, hi)
}
