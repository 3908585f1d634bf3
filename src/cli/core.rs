
use anyhow::bail;
use clap::{Parser, Subcommand};
use chrono::Datelike;
use lazy_static::lazy_static;
use log::info;
use std::path::Path;

use crate::cli::batch::BatchSettings;
use crate::cli::evaluate::EvaluateSettings;

lazy_static! {
    /// Stores the full version string we plan to use, which is generated in build.rs
    /// # Examples
    /// * `0.3.1-6bb9635-dirty` - while on a dirty branch
    /// * `0.3.1-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));

    /// Shared after help string
    pub static ref AFTER_HELP: String = format!("Copyright (C) 2023-{}     taxbench contributors
This program comes with ABSOLUTELY NO WARRANTY; metric keys follow
the metric_version written into every result.", chrono::Utc::now().year());
}

#[derive(Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = &**AFTER_HELP)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

/// Taxbench, scores taxonomic classifiers and profilers against ground truth.
/// Select a subcommand to see more usage information:
#[derive(Subcommand)]
pub enum Commands {
    /// Evaluates the outputs of one tool run against one dataset
    Evaluate(Box<EvaluateSettings>),
    /// Evaluates every run in a JSON manifest in parallel
    Batch(Box<BatchSettings>)
}

pub fn get_cli() -> Cli {
    Cli::parse()
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
pub fn check_required_filename(filename: &Path, label: &str) -> anyhow::Result<()> {
    if !filename.exists() {
        bail!("{} does not exist: \"{}\"", label, filename.display());
    }
    Ok(())
}

/// Checks if an optional file exists, if one was given
/// # Arguments
/// * `opt_filename` - the file path to check for, if any
/// * `label` - the label to use for error messages
pub fn check_optional_filename(opt_filename: Option<&Path>, label: &str) -> anyhow::Result<()> {
    if let Some(filename) = opt_filename {
        check_required_filename(filename, label)?;
    }

    // file either was not specified OR it exists
    Ok(())
}

/// Logs an optional input as `\t<label>: <path or None>`
pub fn log_optional_filename(opt_filename: Option<&Path>, label: &str) {
    match opt_filename {
        Some(filename) => info!("\t{label}: {filename:?}"),
        None => info!("\t{label}: None")
    };
}

/// Checks that the parent folder of an output file exists
/// # Errors
/// * if the output has a parent folder that does not exist
pub fn check_output_filename(opt_filename: Option<&Path>, label: &str) -> anyhow::Result<()> {
    if let Some(parent) = opt_filename.and_then(|f| f.parent()) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            bail!("{} folder does not exist: \"{}\"", label, parent.display());
        }
    }
    Ok(())
}
