//! Variable-by-variable driver.

use nv_config::{ConfigLookup, VariableConfig};
use nv_core::{Dataset, Error, FieldValue, Result};
use nv_grid::{Grid, GridMode, GridSpec};
use nv_stats::{
    ChiSquare, DEFAULT_PULL_THRESHOLD, PullGrid, check_pulls, chi_square, ks_test, pull,
};

use crate::binning::choose_axis;
use crate::classify::{Detector, Variable, VariableKind, classify};
use crate::maps::{self, FillStats};
use crate::report::{
    ReportMeta, ReportSummary, SkippedVariable, ValidationReport, VariableReport, ZoneChiSquare,
};

/// Knobs of a validation run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// `|pull|` above which a cell is flagged.
    pub threshold: f64,
    /// Keep the sample, reference and pull grids in the report.
    pub include_grids: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { threshold: DEFAULT_PULL_THRESHOLD, include_grids: true }
    }
}

/// Validate every branch of `sample` against `reference`.
///
/// Branches are processed in sample order. A branch whose data (or parent
/// map) is missing from either dataset is listed under `skipped`; branches
/// present only in the reference are listed there as well. Without a
/// reference only the sample grids are built.
pub fn validate(
    sample: &dyn Dataset,
    reference: Option<&dyn Dataset>,
    config: &impl ConfigLookup,
    options: &EngineOptions,
) -> Result<ValidationReport> {
    let meta = ReportMeta::new(
        (sample.name(), sample.entries()),
        reference.map(|r| (r.name(), r.entries())),
        options.threshold,
    )?;
    tracing::info!(
        sample = sample.name(),
        reference = reference.map(|r| r.name()),
        branches = sample.branch_names().len(),
        "validation started"
    );

    let mut variables = Vec::new();
    let mut skipped = Vec::new();

    for name in sample.branch_names() {
        let variable = classify(name);
        match compare_variable(&variable, sample, reference, config, options) {
            Ok(report) => variables.push(report),
            Err(e) => {
                tracing::warn!(variable = name, error = %e, "variable skipped");
                skipped.push(SkippedVariable { name: name.to_string(), reason: e.to_string() });
            }
        }
    }

    if let Some(r) = reference {
        for name in r.branch_names() {
            if !sample.has_branch(name) {
                tracing::warn!(variable = name, "branch only present in the reference, skipped");
                skipped.push(SkippedVariable {
                    name: name.to_string(),
                    reason: Error::MissingBranch {
                        branch: name.to_string(),
                        dataset: sample.name().to_string(),
                    }
                    .to_string(),
                });
            }
        }
    }

    let summary = ReportSummary::from_results(&variables, &skipped);
    tracing::info!(
        compared = summary.compared,
        skipped = summary.skipped,
        flagged = summary.flagged_variables.len(),
        "validation finished"
    );
    Ok(ValidationReport {
        schema_version: crate::report::SCHEMA_VERSION.to_string(),
        meta,
        variables,
        skipped,
        summary,
    })
}

/// Grids of one variable built from one dataset.
struct Built {
    grids: Vec<Grid>,
    fill: FillStats,
}

fn build_map(variable: &Variable, ds: &dyn Dataset) -> Result<Built> {
    let VariableKind::Map { detector, codes, quantity } = &variable.kind else {
        return Err(Error::Validation(format!("'{}' is not a map variable", variable.name)));
    };
    let codes = ds.require(codes)?;
    let quantity: Option<&[FieldValue]> = match quantity {
        Some(q) => Some(ds.require(q)?),
        None => None,
    };
    match detector {
        Detector::Tracker => {
            let (grid, fill) = maps::tracker_map(&variable.name, codes, quantity)?;
            Ok(Built { grids: vec![grid], fill })
        }
        Detector::Calorimeter => {
            let (zones, fill) = maps::calo_maps(&variable.name, codes, quantity)?;
            Ok(Built { grids: zones.into_inner().into(), fill })
        }
    }
}

fn build_distributions(
    variable: &Variable,
    sample: &dyn Dataset,
    reference: Option<&dyn Dataset>,
    config: Option<&VariableConfig>,
) -> Result<(Built, Option<Built>)> {
    let (s_vals, s_fill) = maps::flatten_values(sample.require(&variable.name)?);
    let r = match reference {
        Some(r) => Some(maps::flatten_values(r.require(&variable.name)?)),
        None => None,
    };
    let r_vals: &[f64] = r.as_ref().map_or(&[], |(v, _)| v.as_slice());
    let axis = choose_axis(config, &[&s_vals, r_vals])?;
    let spec = GridSpec::distribution(variable.name.clone(), axis);

    let sample = Built { grids: vec![maps::distribution(spec.clone(), &s_vals)], fill: s_fill };
    let reference = r.map(|(vals, fill)| Built {
        grids: vec![maps::distribution(spec.clone(), &vals)],
        fill,
    });
    Ok((sample, reference))
}

fn retitle(grids: &mut [Grid], title: &str) {
    let many = grids.len() > 1;
    for g in grids {
        g.spec.title = match g.layout() {
            nv_geom::Layout::Calo(zone) if many => format!("{title} ({zone})"),
            _ => title.to_string(),
        };
    }
}

/// Build, compare and diagnose one classified variable.
///
/// Fails with [`Error::MissingBranch`] when a required branch is absent from
/// either dataset.
pub fn compare_variable(
    variable: &Variable,
    sample: &dyn Dataset,
    reference: Option<&dyn Dataset>,
    config: &impl ConfigLookup,
    options: &EngineOptions,
) -> Result<VariableReport> {
    let cfg = config.lookup(&variable.name);
    let title = cfg.as_ref().and_then(|c| c.title.clone()).unwrap_or_else(|| variable.name.clone());

    let (mut s, r) = match &variable.kind {
        VariableKind::Distribution { declared } => {
            if !declared {
                tracing::warn!(
                    variable = %variable.name,
                    "no recognised prefix, treating branch as a distribution"
                );
            }
            build_distributions(variable, sample, reference, cfg.as_ref())?
        }
        VariableKind::Map { .. } => {
            let s = build_map(variable, sample)?;
            let r = reference.map(|r| build_map(variable, r)).transpose()?;
            (s, r)
        }
    };
    tracing::debug!(
        variable = %variable.name,
        kind = variable.kind_name(),
        hits = s.fill.hits,
        decode_errors = s.fill.decode_errors,
        "sample grids built"
    );
    retitle(&mut s.grids, &title);

    let mode = if variable.is_average() { GridMode::Average } else { GridMode::Count };
    let mut report = VariableReport {
        name: variable.name.clone(),
        title: title.clone(),
        kind: variable.kind.clone(),
        mode,
        scale_factor: 1.0,
        sample_fill: s.fill,
        reference_fill: None,
        chi_square: None,
        zone_chi_square: Vec::new(),
        ks: None,
        pull_report: None,
        sample_grids: Vec::new(),
        reference_grids: Vec::new(),
        pull_grids: Vec::new(),
    };

    if let (Some(r), Some(ref_ds)) = (r, reference) {
        let scale = if ref_ds.entries() == 0 {
            1.0
        } else {
            sample.entries() as f64 / ref_ds.entries() as f64
        };
        let mut ref_grids: Vec<Grid> = r.grids.into_iter().map(|g| g.scaled(scale)).collect();
        retitle(&mut ref_grids, &title);

        let mut pulls: Vec<PullGrid> = Vec::with_capacity(s.grids.len());
        let mut chis: Vec<ChiSquare> = Vec::with_capacity(s.grids.len());
        for (sg, rg) in s.grids.iter().zip(&ref_grids) {
            pulls.push(pull(sg, rg)?);
            chis.push(chi_square(sg, rg)?);
        }

        let chi = if chis.len() > 1 {
            report.zone_chi_square = s
                .grids
                .iter()
                .zip(&chis)
                .map(|(g, c)| ZoneChiSquare { grid: g.name().to_string(), chi_square: *c })
                .collect();
            ChiSquare::combine(&chis)
        } else {
            chis.first().copied().unwrap_or_else(|| ChiSquare::new(0.0, 0))
        };

        if matches!(variable.kind, VariableKind::Distribution { .. })
            && let (Some(sg), Some(rg)) = (s.grids.first(), ref_grids.first())
        {
            report.ks = Some(ks_test(sg, rg)?);
        }

        let pull_report = check_pulls(&pulls, options.threshold);
        tracing::debug!(
            variable = %variable.name,
            chi2 = chi.chi2,
            ndf = chi.ndf,
            p_value = chi.p_value,
            flagged = pull_report.flagged_cells.len(),
            "{}",
            pull_report.summary()
        );

        report.scale_factor = scale;
        report.reference_fill = Some(r.fill);
        report.chi_square = Some(chi);
        report.pull_report = Some(pull_report);
        report.reference_grids = ref_grids;
        report.pull_grids = pulls;
    }

    report.sample_grids = s.grids;
    if !options.include_grids {
        report.strip_grids();
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nv_config::{ConfigTable, NoConfig};
    use nv_core::{Branch, JsonDataset};
    use nv_geom::encode_tracker;

    fn dataset(name: &str, branches: Vec<(&str, Vec<FieldValue>)>) -> JsonDataset {
        let branches = branches
            .into_iter()
            .map(|(n, values)| Branch { name: n.to_string(), values })
            .collect();
        JsonDataset::new(name, branches).unwrap()
    }

    fn scalars(xs: &[f64]) -> Vec<FieldValue> {
        xs.iter().map(|&x| FieldValue::Scalar(x)).collect()
    }

    #[test]
    fn test_distribution_against_itself() {
        let ds = dataset("s", vec![("h_n", scalars(&[1.0, 2.0, 2.0, 3.0]))]);
        let v = classify("h_n");
        let r = compare_variable(&v, &ds, Some(&ds), &NoConfig, &EngineOptions::default()).unwrap();
        let c = r.chi_square.unwrap();
        assert_eq!(c.chi2, 0.0);
        assert_eq!(c.p_value, 1.0);
        assert!(r.is_identical());
        assert_eq!(r.ks.unwrap().statistic, 0.0);
        assert_eq!(r.sample_grids[0].spec.x_axis.bins, 3);
    }

    #[test]
    fn test_reference_is_rescaled() {
        let s = dataset("s", vec![("h_n", scalars(&[1.0, 1.0, 2.0, 2.0]))]);
        let r = dataset("r", vec![("h_n", scalars(&[1.0, 2.0]))]);
        let v = classify("h_n");
        let rep = compare_variable(&v, &s, Some(&r), &NoConfig, &EngineOptions::default()).unwrap();
        assert_relative_eq!(rep.scale_factor, 2.0);
        assert_relative_eq!(rep.reference_grids[0].values[0], 2.0);
        assert_relative_eq!(rep.chi_square.unwrap().chi2, 0.0);
    }

    #[test]
    fn test_config_title_and_binning() {
        let ds = dataset("s", vec![("h_e", scalars(&[0.5, 1.5]))]);
        let cfg = ConfigTable::parse("h_e, Energy (MeV), 4, 0, 2\n");
        let rep = compare_variable(&classify("h_e"), &ds, None, &cfg, &EngineOptions::default())
            .unwrap();
        assert_eq!(rep.title, "Energy (MeV)");
        assert_eq!(rep.sample_grids[0].spec.title, "Energy (MeV)");
        assert_eq!(rep.sample_grids[0].spec.x_axis.bins, 4);
        assert!(rep.chi_square.is_none());
        assert!(rep.pull_grids.is_empty());
    }

    #[test]
    fn test_missing_parent_branch() {
        let ds = dataset("s", vec![("t_cells__time", vec![FieldValue::Reals(vec![1.0])])]);
        let err = compare_variable(
            &classify("t_cells__time"),
            &ds,
            None,
            &NoConfig,
            &EngineOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingBranch { ref branch, .. } if branch == "t_cells"));
    }

    #[test]
    fn test_tracker_map_grids_stripped_on_request() {
        let ds = dataset(
            "s",
            vec![("t_cells", vec![FieldValue::Integers(vec![encode_tracker(1, 2)])])],
        );
        let opts = EngineOptions { include_grids: false, ..Default::default() };
        let rep = compare_variable(&classify("t_cells"), &ds, Some(&ds), &NoConfig, &opts).unwrap();
        assert!(rep.sample_grids.is_empty());
        assert!(rep.chi_square.is_some());
        assert_eq!(rep.sample_fill.hits, 1);
    }
}
