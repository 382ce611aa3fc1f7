//! # nv-config
//!
//! Per-variable display and binning overrides.
//!
//! The table is plain comma-separated text, one variable per row:
//!
//! ```text
//! # name, title, bins, low, high
//! h_ntracks, Number of tracks per event, 10, 0, 10
//! h_calo_energy, Calorimeter energy (MeV), 0, ,
//! ```
//!
//! Numeric fields that are empty or malformed fall back to defaults instead
//! of failing: `bins = 0` asks for automatic binning and a missing limit is
//! `None`, to be derived from the data.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::collections::HashMap;
use std::path::Path;

use nv_core::Result;
use serde::Serialize;

/// Overrides for one variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariableConfig {
    /// Display title, if set.
    pub title: Option<String>,
    /// Requested bin count; 0 means automatic.
    pub bin_count: usize,
    /// Lower axis limit, if set.
    pub low: Option<f64>,
    /// Upper axis limit, if set.
    pub high: Option<f64>,
}

impl VariableConfig {
    /// Both limits, when set and ordered.
    pub fn limits(&self) -> Option<(f64, f64)> {
        match (self.low, self.high) {
            (Some(lo), Some(hi)) if lo < hi => Some((lo, hi)),
            _ => None,
        }
    }
}

/// Source of per-variable overrides.
pub trait ConfigLookup {
    /// Overrides for `variable`, if any.
    fn lookup(&self, variable: &str) -> Option<VariableConfig>;
}

/// No overrides at all: every variable uses automatic settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConfig;

impl ConfigLookup for NoConfig {
    fn lookup(&self, _variable: &str) -> Option<VariableConfig> {
        None
    }
}

/// Overrides loaded from a comma-separated table.
#[derive(Debug, Clone, Default)]
pub struct ConfigTable {
    entries: HashMap<String, VariableConfig>,
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
) -> Option<T> {
    let raw = record.get(idx)?;
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::debug!(
                variable = name,
                field = idx,
                value = raw,
                "non-numeric config field, using default"
            );
            None
        }
    }
}

impl ConfigTable {
    /// Parse a table from text. Later rows override earlier rows with the same name.
    pub fn parse(text: &str) -> Self {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut entries = HashMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(line = line + 1, error = %e, "unreadable config row skipped");
                    continue;
                }
            };
            if record.iter().all(str::is_empty) {
                continue;
            }
            if record.len() < 2 {
                tracing::warn!(line = line + 1, "config row needs at least a name and a title");
                continue;
            }
            let name = record[0].to_string();
            let title = Some(record[1].to_string()).filter(|t| !t.is_empty());
            let cfg = VariableConfig {
                title,
                bin_count: parse_field(&record, 2, &name).unwrap_or(0),
                low: parse_field::<f64>(&record, 3, &name).filter(|v| v.is_finite()),
                high: parse_field::<f64>(&record, 4, &name).filter(|v| v.is_finite()),
            };
            entries.insert(name, cfg);
        }
        Self { entries }
    }

    /// Read and parse a table file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let table = Self::parse(&text);
        tracing::info!(path = %path.as_ref().display(), variables = table.len(), "config loaded");
        Ok(table)
    }

    /// Number of configured variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConfigLookup for ConfigTable {
    fn lookup(&self, variable: &str) -> Option<VariableConfig> {
        self.entries.get(variable).cloned()
    }
}

impl<T: ConfigLookup + ?Sized> ConfigLookup for &T {
    fn lookup(&self, variable: &str) -> Option<VariableConfig> {
        (**self).lookup(variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
# name, title, bins, low, high
h_ntracks, Number of tracks, 10, 0, 10
h_energy, Energy (MeV), lots, -1, x
h_bare
h_title_only, Just a title

t_hits, , 0, ,
h_ntracks, Tracks per event, 12, 0, 12
";

    #[test]
    fn test_full_row() {
        let t = ConfigTable::parse(TABLE);
        let c = t.lookup("h_ntracks").unwrap();
        assert_eq!(c.title.as_deref(), Some("Tracks per event"));
        assert_eq!(c.bin_count, 12);
        assert_eq!(c.limits(), Some((0.0, 12.0)));
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let t = ConfigTable::parse(TABLE);
        let c = t.lookup("h_energy").unwrap();
        assert_eq!(c.title.as_deref(), Some("Energy (MeV)"));
        assert_eq!(c.bin_count, 0);
        assert_eq!(c.low, Some(-1.0));
        assert_eq!(c.high, None);
        assert_eq!(c.limits(), None);
    }

    #[test]
    fn test_short_and_empty_rows() {
        let t = ConfigTable::parse(TABLE);
        assert!(t.lookup("h_bare").is_none());
        let c = t.lookup("h_title_only").unwrap();
        assert_eq!(c, VariableConfig { title: Some("Just a title".into()), ..Default::default() });
        let c = t.lookup("t_hits").unwrap();
        assert_eq!(c.title, None);
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_no_config() {
        assert!(NoConfig.lookup("anything").is_none());
        assert!(ConfigTable::default().is_empty());
    }
}
