//! Dataset boundary: ordered named branches with per-event values.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// One event's value for one branch.
///
/// Deserialised untagged, so JSON numbers become [`FieldValue::Scalar`],
/// integer arrays [`FieldValue::Integers`], string arrays
/// [`FieldValue::Tokens`] and any other numeric array [`FieldValue::Reals`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A single number.
    Scalar(f64),
    /// Integer sequence (tracker hit codes, integer counters).
    Integers(Vec<i64>),
    /// String sequence (calorimeter geometry tokens).
    Tokens(Vec<String>),
    /// Real-valued sequence (quantities to average, vector observables).
    Reals(Vec<f64>),
}

impl FieldValue {
    /// Number of elements (1 for a scalar).
    pub fn len(&self) -> usize {
        match self {
            FieldValue::Scalar(_) => 1,
            FieldValue::Integers(v) => v.len(),
            FieldValue::Tokens(v) => v.len(),
            FieldValue::Reals(v) => v.len(),
        }
    }

    /// `true` for an empty sequence.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric view of the value: a scalar becomes one element, integers are
    /// widened. Tokens have no numeric view.
    pub fn as_reals(&self) -> Option<Vec<f64>> {
        match self {
            FieldValue::Scalar(x) => Some(vec![*x]),
            FieldValue::Integers(v) => Some(v.iter().map(|&i| i as f64).collect()),
            FieldValue::Reals(v) => Some(v.clone()),
            FieldValue::Tokens(_) => None,
        }
    }

    /// Integer view: integer sequences as-is, a scalar if it is integral.
    pub fn as_integers(&self) -> Option<Vec<i64>> {
        match self {
            FieldValue::Integers(v) => Some(v.clone()),
            FieldValue::Scalar(x) if x.fract() == 0.0 && x.is_finite() => Some(vec![*x as i64]),
            FieldValue::Reals(v) if v.is_empty() => Some(Vec::new()),
            _ => None,
        }
    }

    /// Token view.
    pub fn as_tokens(&self) -> Option<&[String]> {
        match self {
            FieldValue::Tokens(v) => Some(v),
            // An empty JSON array deserialises as `Integers`.
            FieldValue::Integers(v) if v.is_empty() => Some(&[]),
            _ => None,
        }
    }
}

/// Source of event data for one dataset (sample or reference).
///
/// Implementors must keep `branch_names` in a stable order and every column
/// must hold exactly `entries()` values.
pub trait Dataset: Sync {
    /// Human-readable dataset name (used in diagnostics).
    fn name(&self) -> &str;

    /// Number of events.
    fn entries(&self) -> usize;

    /// Branch names in storage order.
    fn branch_names(&self) -> Vec<&str>;

    /// Per-event values of a branch, or `None` if absent.
    fn column(&self, branch: &str) -> Option<&[FieldValue]>;

    /// Whether a branch exists.
    fn has_branch(&self, branch: &str) -> bool {
        self.column(branch).is_some()
    }

    /// Per-event values of a branch, or [`Error::MissingBranch`].
    fn require(&self, branch: &str) -> Result<&[FieldValue]> {
        self.column(branch).ok_or_else(|| Error::MissingBranch {
            branch: branch.to_string(),
            dataset: self.name().to_string(),
        })
    }
}

/// One named column of a [`JsonDataset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name.
    pub name: String,
    /// One value per event.
    pub values: Vec<FieldValue>,
}

/// In-memory dataset, typically loaded from a JSON document:
///
/// ```json
/// {"name": "sample", "branches": [{"name": "h_ntracks", "values": [1, 2]}]}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDataset {
    /// Dataset name.
    pub name: String,
    /// Branches in storage order.
    pub branches: Vec<Branch>,
}

impl JsonDataset {
    /// Build a dataset and check that all branches have the same length.
    pub fn new(name: impl Into<String>, branches: Vec<Branch>) -> Result<Self> {
        let ds = Self { name: name.into(), branches };
        ds.validate()?;
        Ok(ds)
    }

    /// Parse a dataset from JSON text.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let ds: JsonDataset = serde_json::from_str(s)?;
        ds.validate()?;
        Ok(ds)
    }

    /// Read and parse a dataset file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let ds: JsonDataset = serde_json::from_slice(&bytes)?;
        ds.validate()?;
        Ok(ds)
    }

    fn validate(&self) -> Result<()> {
        let Some(first) = self.branches.first() else {
            return Ok(());
        };
        let n = first.values.len();
        for b in &self.branches {
            if b.values.len() != n {
                return Err(Error::Validation(format!(
                    "dataset '{}': branch '{}' has {} entries, expected {}",
                    self.name,
                    b.name,
                    b.values.len(),
                    n
                )));
            }
        }
        Ok(())
    }
}

impl Dataset for JsonDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> usize {
        self.branches.first().map(|b| b.values.len()).unwrap_or(0)
    }

    fn branch_names(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.name.as_str()).collect()
    }

    fn column(&self, branch: &str) -> Option<&[FieldValue]> {
        self.branches.iter().find(|b| b.name == branch).map(|b| b.values.as_slice())
    }
}
