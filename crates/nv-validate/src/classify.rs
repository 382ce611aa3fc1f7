//! Branch classification by name.
//!
//! | prefix              | meaning                                          |
//! |---------------------|--------------------------------------------------|
//! | `h_`                | 1-D distribution of a scalar or numeric vector   |
//! | `t_`                | tracker hit map (packed integer cell codes)      |
//! | `c_`                | calorimeter hit map (geometry-ID tokens)         |
//! | `t_x__q`, `c_x__q`  | per-cell average of `q`, aligned with map `t_x`/`c_x` |
//!
//! Anything else is treated as a distribution.

use serde::Serialize;

/// Separator between a map branch and the quantity averaged over its hits.
pub const AVERAGE_SEPARATOR: &str = "__";

/// Detector family of a map variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    /// Wire tracker.
    Tracker,
    /// Segmented calorimeter.
    Calorimeter,
}

/// How a branch is turned into grids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableKind {
    /// 1-D distribution of the branch values.
    Distribution {
        /// Whether the name carried the `h_` prefix.
        declared: bool,
    },
    /// Hit map.
    Map {
        /// Detector the hit codes belong to.
        detector: Detector,
        /// Branch holding the hit codes.
        codes: String,
        /// Branch holding the per-hit quantity to average, for average maps.
        #[serde(skip_serializing_if = "Option::is_none")]
        quantity: Option<String>,
    },
}

/// A classified branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    /// Branch name.
    pub name: String,
    /// Classification.
    #[serde(flatten)]
    pub kind: VariableKind,
}

impl Variable {
    /// Branches that must exist in a dataset to build this variable.
    pub fn required_branches(&self) -> Vec<&str> {
        match &self.kind {
            VariableKind::Distribution { .. } => vec![self.name.as_str()],
            VariableKind::Map { codes, quantity, .. } => {
                let mut v = vec![codes.as_str()];
                if let Some(q) = quantity {
                    v.push(q.as_str());
                }
                v
            }
        }
    }

    /// `true` for average-mode maps.
    pub fn is_average(&self) -> bool {
        matches!(&self.kind, VariableKind::Map { quantity: Some(_), .. })
    }

    /// Short kind name for logs.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            VariableKind::Distribution { .. } => "distribution",
            VariableKind::Map { detector: Detector::Tracker, quantity: None, .. } => "tracker map",
            VariableKind::Map { detector: Detector::Tracker, .. } => "tracker average map",
            VariableKind::Map { detector: Detector::Calorimeter, quantity: None, .. } => {
                "calorimeter map"
            }
            VariableKind::Map { detector: Detector::Calorimeter, .. } => "calorimeter average map",
        }
    }
}

fn detector_of(name: &str) -> Option<Detector> {
    if name.starts_with("t_") {
        Some(Detector::Tracker)
    } else if name.starts_with("c_") {
        Some(Detector::Calorimeter)
    } else {
        None
    }
}

/// Classify a branch by its name.
pub fn classify(name: &str) -> Variable {
    let kind = if name.starts_with("h_") {
        VariableKind::Distribution { declared: true }
    } else if let Some(detector) = detector_of(name) {
        match name.split_once(AVERAGE_SEPARATOR) {
            Some((codes, q)) if !q.is_empty() && codes.len() > 2 => VariableKind::Map {
                detector,
                codes: codes.to_string(),
                quantity: Some(name.to_string()),
            },
            _ => VariableKind::Map { detector, codes: name.to_string(), quantity: None },
        }
    } else {
        VariableKind::Distribution { declared: false }
    };
    Variable { name: name.to_string(), kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(classify("h_ntracks").kind, VariableKind::Distribution { declared: true });
        assert_eq!(classify("ntracks").kind, VariableKind::Distribution { declared: false });
        assert_eq!(
            classify("t_cells").kind,
            VariableKind::Map {
                detector: Detector::Tracker,
                codes: "t_cells".into(),
                quantity: None,
            }
        );
        assert_eq!(classify("c_calo_hits").kind_name(), "calorimeter map");
    }

    #[test]
    fn test_average_maps() {
        let v = classify("c_calo_hits__energy");
        assert!(v.is_average());
        assert_eq!(v.required_branches(), vec!["c_calo_hits", "c_calo_hits__energy"]);
        assert_eq!(v.kind_name(), "calorimeter average map");

        let v = classify("t_cells__time");
        assert_eq!(v.kind_name(), "tracker average map");
    }

    #[test]
    fn test_degenerate_average_names_are_plain_maps() {
        assert!(!classify("t_cells__").is_average());
        assert!(!classify("t___q").is_average());
    }
}
