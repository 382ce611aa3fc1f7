//! nemoval CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use nv_config::{ConfigLookup, ConfigTable, NoConfig};
use nv_core::{Dataset, JsonDataset};
use nv_validate::{EngineOptions, ValidationReport, classify, validate};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nemoval")]
#[command(about = "nemoval - detector-map construction and sample vs reference validation")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build maps for every branch and compare the sample against a reference
    Compare {
        /// Sample dataset (JSON)
        #[arg(short, long)]
        sample: PathBuf,

        /// Reference dataset (JSON). Without it only sample maps are built.
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Per-variable overrides (name, title, bins, low, high)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// |pull| above which a cell is flagged
        #[arg(long, default_value = "3.0")]
        threshold: f64,

        /// Leave grid contents out of the report (scalar results only).
        #[arg(long)]
        no_grids: bool,

        /// Output file for the report (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// List the branches of a dataset with their classification
    Inspect {
        /// Dataset (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reports go to stdout; keep logs out of the way.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compare { sample, reference, config, threshold, no_grids, output, threads } => {
            let options = EngineOptions { threshold, include_grids: !no_grids };
            cmd_compare(
                &sample,
                reference.as_ref(),
                config.as_ref(),
                &options,
                output.as_ref(),
                threads,
            )
        }
        Commands::Inspect { input, output } => cmd_inspect(&input, output.as_ref()),
    }
}

fn load_dataset(path: &PathBuf) -> Result<JsonDataset> {
    tracing::info!(path = %path.display(), "loading dataset");
    let ds = JsonDataset::open(path)?;
    tracing::info!(
        name = %ds.name,
        entries = ds.entries(),
        branches = ds.branches.len(),
        "dataset loaded"
    );
    Ok(ds)
}

fn cmd_compare(
    sample: &PathBuf,
    reference: Option<&PathBuf>,
    config: Option<&PathBuf>,
    options: &EngineOptions,
    output: Option<&PathBuf>,
    threads: usize,
) -> Result<()> {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    let sample_path = sample;
    let sample = load_dataset(sample_path)?;
    anyhow::ensure!(sample.entries() > 0, "{} does not contain any events", sample_path.display());
    let reference = reference.map(load_dataset).transpose()?;
    let table = config.map(ConfigTable::open).transpose()?;
    let lookup: &dyn ConfigLookup = match &table {
        Some(t) => t,
        None => &NoConfig,
    };

    let report =
        validate(&sample, reference.as_ref().map(|r| r as &dyn Dataset), &lookup, options)?;
    log_summary(&report);
    write_json(output, serde_json::to_value(&report)?)
}

fn log_summary(report: &ValidationReport) {
    for v in &report.variables {
        match (&v.chi_square, &v.pull_report) {
            (Some(c), Some(p)) => tracing::info!(
                variable = %v.name,
                chi2 = c.chi2,
                ndf = c.ndf,
                p_value = c.p_value,
                "{}",
                p.summary()
            ),
            _ => tracing::info!(variable = %v.name, hits = v.sample_fill.hits, "sample maps built"),
        }
    }
    if !report.summary.flagged_variables.is_empty() {
        tracing::warn!(
            variables = ?report.summary.flagged_variables,
            "cells flagged above pull threshold {}",
            report.meta.threshold
        );
    }
}

fn cmd_inspect(input: &PathBuf, output: Option<&PathBuf>) -> Result<()> {
    let ds = load_dataset(input)?;
    let branches: Vec<serde_json::Value> = ds
        .branch_names()
        .into_iter()
        .map(|name| {
            let variable = classify(name);
            let missing: Vec<&str> =
                variable.required_branches().into_iter().filter(|b| !ds.has_branch(b)).collect();
            serde_json::json!({
                "name": name,
                "classification": variable.kind_name(),
                "variable": variable,
                "missing_branches": missing,
            })
        })
        .collect();

    write_json(
        output,
        serde_json::json!({
            "name": ds.name,
            "entries": ds.entries(),
            "branches": branches,
        }),
    )
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
