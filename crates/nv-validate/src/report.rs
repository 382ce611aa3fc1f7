//! Validation report artifact (numbers-first, serialisable).

use std::time::{SystemTime, UNIX_EPOCH};

use nv_core::{Error, Result};
use nv_grid::{Grid, GridMode};
use nv_stats::{ChiSquare, KsResult, PullGrid, PullReport};
use serde::Serialize;

use crate::classify::VariableKind;
use crate::maps::FillStats;

/// Version of the report layout.
pub const SCHEMA_VERSION: &str = "nemoval_validation_v1";

/// Whole-run report.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Always [`SCHEMA_VERSION`].
    pub schema_version: String,
    /// Run metadata.
    pub meta: ReportMeta,
    /// Processed variables, in sample branch order.
    pub variables: Vec<VariableReport>,
    /// Branches that could not be processed.
    pub skipped: Vec<SkippedVariable>,
    /// Run-level counters.
    pub summary: ReportSummary,
}

/// Provenance of a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    /// Producing tool, `nemoval`.
    pub tool: String,
    /// Tool version.
    pub tool_version: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_unix_ms: u128,
    /// Sample dataset name.
    pub sample: String,
    /// Reference dataset name, absent in single-file mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Events in the sample.
    pub sample_entries: usize,
    /// Events in the reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_entries: Option<usize>,
    /// Pull threshold used for flagging cells.
    pub threshold: f64,
}

impl ReportMeta {
    /// Metadata stamped with the current time.
    pub fn new(
        sample: (&str, usize),
        reference: Option<(&str, usize)>,
        threshold: f64,
    ) -> Result<Self> {
        Ok(Self {
            tool: "nemoval".to_string(),
            tool_version: nv_core::VERSION.to_string(),
            created_unix_ms: now_unix_ms()?,
            sample: sample.0.to_string(),
            reference: reference.map(|r| r.0.to_string()),
            sample_entries: sample.1,
            reference_entries: reference.map(|r| r.1),
            threshold,
        })
    }
}

fn now_unix_ms() -> Result<u128> {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Computation(format!("system time error: {}", e)))?;
    Ok(d.as_millis())
}

/// Chi-square of one calorimeter zone.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneChiSquare {
    /// Zone grid name (`<variable>_<zone>`).
    pub grid: String,
    /// Chi-square of this zone alone.
    pub chi_square: ChiSquare,
}

/// Everything computed for one variable.
#[derive(Debug, Clone, Serialize)]
pub struct VariableReport {
    /// Branch name.
    pub name: String,
    /// Display title (config title or branch name).
    pub title: String,
    /// Classification, flattened into the entry.
    #[serde(flatten)]
    pub kind: VariableKind,
    /// Count or average filling.
    pub mode: GridMode,
    /// Factor applied to the reference count-mode grids.
    pub scale_factor: f64,
    /// Fill counters of the sample maps.
    pub sample_fill: FillStats,
    /// Fill counters of the reference maps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_fill: Option<FillStats>,
    /// Global chi-square (summed over zones for the calorimeter).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chi_square: Option<ChiSquare>,
    /// Per-zone chi-square, calorimeter only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub zone_chi_square: Vec<ZoneChiSquare>,
    /// KS comparison, distributions only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ks: Option<KsResult>,
    /// Pull diagnostics over all grids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_report: Option<PullReport>,
    /// Sample grids (one, or six calorimeter zones).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_grids: Vec<Grid>,
    /// Rescaled reference grids, same order as `sample_grids`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reference_grids: Vec<Grid>,
    /// Per-cell pulls, same order as `sample_grids`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pull_grids: Vec<PullGrid>,
}

impl VariableReport {
    /// `true` if any cell was flagged by the pull diagnostics.
    pub fn is_flagged(&self) -> bool {
        self.pull_report.as_ref().is_some_and(|r| !r.flagged_cells.is_empty())
    }

    /// `true` if sample and reference agree cell for cell.
    pub fn is_identical(&self) -> bool {
        self.pull_report.as_ref().is_some_and(PullReport::is_identical)
    }

    /// Drop the grid payloads, keeping only the scalar results.
    pub fn strip_grids(&mut self) {
        self.sample_grids.clear();
        self.reference_grids.clear();
        self.pull_grids.clear();
    }
}

/// A branch that produced no comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedVariable {
    /// Branch name.
    pub name: String,
    /// Error that stopped processing.
    pub reason: String,
}

/// Run-level counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Variables processed.
    pub compared: usize,
    /// Branches skipped.
    pub skipped: usize,
    /// Variables with at least one flagged cell.
    pub flagged_variables: Vec<String>,
    /// Variables whose sample and reference agree exactly.
    pub identical: usize,
}

impl ReportSummary {
    /// Tally processed and skipped variables.
    pub fn from_results(variables: &[VariableReport], skipped: &[SkippedVariable]) -> Self {
        Self {
            compared: variables.len(),
            skipped: skipped.len(),
            flagged_variables: variables
                .iter()
                .filter(|v| v.is_flagged())
                .map(|v| v.name.clone())
                .collect(),
            identical: variables.iter().filter(|v| v.is_identical()).count(),
        }
    }
}
