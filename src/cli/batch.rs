
use anyhow::ensure;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_output_filename, check_required_filename, log_optional_filename, AFTER_HELP, FULL_VERSION};

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct BatchSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    taxbench_version: String,

    /// JSON manifest, a list of run descriptors
    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "manifest")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub manifest: PathBuf,

    /// Output metrics of all runs as `run_label metric value` rows (.csv for comma separated)
    #[clap(short = 'o')]
    #[clap(long = "output-tsv")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_tsv: Option<PathBuf>,

    /// Output metrics of all runs as a JSON object keyed by run label
    #[clap(long = "output-json")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_json: Option<PathBuf>,

    /// Number of runs to evaluate in parallel
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_batch_settings(mut settings: BatchSettings) -> anyhow::Result<BatchSettings> {
    // hard code the version in
    settings.taxbench_version = FULL_VERSION.clone();
    info!("Taxbench version: {:?}", &settings.taxbench_version);
    info!("Sub-command: batch");
    info!("Inputs:");

    check_required_filename(&settings.manifest, "Manifest")?;
    info!("\tManifest: {:?}", &settings.manifest);

    info!("Outputs:");
    ensure!(
        settings.output_tsv.is_some() || settings.output_json.is_some(),
        "At least one of --output-tsv or --output-json is required"
    );
    check_output_filename(settings.output_tsv.as_deref(), "Output TSV")?;
    check_output_filename(settings.output_json.as_deref(), "Output JSON")?;
    log_optional_filename(settings.output_tsv.as_deref(), "Output TSV");
    log_optional_filename(settings.output_json.as_deref(), "Output JSON");

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_batch_settings() {
        let settings = BatchSettings {
            manifest: PathBuf::from("./test_data/mini.tax"),
            output_tsv: Some(PathBuf::from("metrics.tsv")),
            threads: 0,
            ..Default::default()
        };
        let checked = check_batch_settings(settings.clone()).unwrap();
        assert_eq!(checked.threads, 1);

        let no_outputs = BatchSettings { output_tsv: None, ..settings.clone() };
        assert!(check_batch_settings(no_outputs).is_err());

        let missing = BatchSettings { manifest: PathBuf::from("./test_data/missing.json"), ..settings };
        assert!(check_batch_settings(missing).is_err());
    }
}
