
use anyhow::{bail, ensure};
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_output_filename, check_required_filename, log_optional_filename, AFTER_HELP, FULL_VERSION};
use crate::data_types::run_config::{DatasetConfig, ExperimentConfig, OutputKey, RunDescriptor, ToolKind, ToolOutputs};

/// Parses a `KEY=PATH` tool output argument
fn parse_prediction_arg(value: &str) -> Result<(OutputKey, PathBuf), String> {
    let Some((key, path)) = value.split_once('=') else {
        return Err(format!("expected KEY=PATH, got {value:?}"));
    };
    let key: OutputKey = key.trim().parse()
        .map_err(|_e| format!("unknown output key {key:?}"))?;
    if path.is_empty() {
        return Err(format!("empty path for {key}"));
    }
    Ok((key, PathBuf::from(path)))
}

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct EvaluateSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    taxbench_version: String,

    /// Taxonomy table, `taxid parent rank [name]`
    #[clap(short = 't')]
    #[clap(long = "taxonomy")]
    #[clap(value_name = "TAX")]
    #[clap(help_heading = Some("Database"))]
    pub taxonomy: Option<PathBuf>,

    /// Database prefix, `<PREFIX>.tax` is used if no taxonomy is given
    #[clap(long = "db-prefix")]
    #[clap(value_name = "PREFIX")]
    #[clap(help_heading = Some("Database"))]
    pub db_prefix: Option<PathBuf>,

    /// NCBI nodes.dmp, overrides the rank structure of the taxonomy
    #[clap(long = "nodes")]
    #[clap(value_name = "DMP")]
    #[clap(help_heading = Some("Database"))]
    pub nodes: Option<PathBuf>,

    /// NCBI names.dmp, used to resolve truth profile names
    #[clap(long = "names")]
    #[clap(value_name = "DMP")]
    #[clap(help_heading = Some("Database"))]
    pub names: Option<PathBuf>,

    /// Database reference targets, restricts scoring to covered taxa
    #[clap(long = "coverage-targets")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Database"))]
    pub coverage_targets: Option<PathBuf>,

    /// 0-based column of the taxid in the coverage targets
    #[clap(long = "coverage-taxid-column")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Database"))]
    #[clap(default_value = "1")]
    pub coverage_taxid_column: usize,

    /// CAMI read or contig mapping, can be given multiple times
    #[clap(long = "truth-map")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Truth"))]
    pub truth_maps: Vec<PathBuf>,

    /// Folder searched for `*sample_<id>*gsa_mapping.tsv` matching the reads
    #[clap(long = "truth-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Truth"))]
    pub truth_dir: Option<PathBuf>,

    /// Read files of the dataset, used to discover the truth mapping
    #[clap(long = "reads")]
    #[clap(value_name = "FASTX")]
    #[clap(help_heading = Some("Truth"))]
    pub reads: Vec<PathBuf>,

    /// Text truth profile, `name value` per line
    #[clap(long = "truth-profile")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Truth"))]
    pub truth_profile: Option<PathBuf>,

    /// Dataset name, used for the default run label
    #[clap(long = "dataset")]
    #[clap(value_name = "NAME")]
    #[clap(help_heading = Some("Truth"))]
    pub dataset_name: Option<String>,

    /// Tool output as KEY=PATH, e.g. classify_tsv=out.tsv; can be given multiple times
    #[clap(short = 'p')]
    #[clap(long = "prediction")]
    #[clap(value_name = "KEY=PATH")]
    #[clap(value_parser = parse_prediction_arg)]
    #[clap(help_heading = Some("Predictions"))]
    pub predictions: Vec<(OutputKey, PathBuf)>,

    /// The evaluated tool, restricts which outputs are considered
    #[clap(long = "tool")]
    #[clap(value_name = "TOOL")]
    #[clap(help_heading = Some("Predictions"))]
    pub tool: Option<ToolKind>,

    /// Ranks to evaluate, comma separated
    #[clap(long = "ranks")]
    #[clap(value_name = "RANKS")]
    #[clap(value_delimiter = ',')]
    #[clap(default_value = "species,genus")]
    #[clap(help_heading = Some("Metrics"))]
    pub ranks: Vec<String>,

    /// A taxon is present in a profile above this percentage
    #[clap(long = "presence-threshold")]
    #[clap(value_name = "PCT")]
    #[clap(default_value = "0.0")]
    #[clap(help_heading = Some("Metrics"))]
    pub presence_threshold: f64,

    /// Enables the `_unk` metrics that score unmapped labels as UNKNOWN
    #[clap(long = "enable-unk-metrics")]
    #[clap(help_heading = Some("Metrics"))]
    pub enable_unk_metrics: bool,

    /// Run label written next to every metric [default: <tool>_<dataset>]
    #[clap(long = "label")]
    #[clap(value_name = "LABEL")]
    #[clap(help_heading = Some("Outputs"))]
    pub label: Option<String>,

    /// Output metrics as a JSON object
    #[clap(long = "output-json")]
    #[clap(value_name = "JSON")]
    #[clap(help_heading = Some("Outputs"))]
    pub output_json: Option<PathBuf>,

    /// Output metrics as `run_label metric value` rows (.csv for comma separated)
    #[clap(short = 'o')]
    #[clap(long = "output-tsv")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Outputs"))]
    pub output_tsv: Option<PathBuf>,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl EvaluateSettings {
    /// Packs the command line inputs into a run descriptor
    pub fn run_descriptor(&self) -> RunDescriptor {
        let experiment = ExperimentConfig {
            taxonomy: self.taxonomy.clone(),
            db_prefix: self.db_prefix.clone(),
            nodes: self.nodes.clone(),
            names: self.names.clone(),
            coverage_targets: self.coverage_targets.clone(),
            coverage_taxid_column: self.coverage_taxid_column,
            ranks: self.ranks.clone(),
            presence_threshold: self.presence_threshold,
            unk_metrics: self.enable_unk_metrics,
            tool: self.tool.map(|t| t.to_string())
        };
        let dataset = DatasetConfig {
            name: self.dataset_name.clone(),
            truth_map: self.truth_maps.clone(),
            truth_dir: self.truth_dir.clone(),
            reads: self.reads.clone(),
            truth_profile: self.truth_profile.clone()
        };
        let outputs: ToolOutputs = self.predictions.iter().cloned().collect();
        RunDescriptor {
            label: self.label.clone().unwrap_or_default(),
            experiment,
            dataset,
            outputs
        }
    }
}

pub fn check_evaluate_settings(mut settings: EvaluateSettings) -> anyhow::Result<EvaluateSettings> {
    // hard code the version in
    settings.taxbench_version = FULL_VERSION.clone();
    info!("Taxbench version: {:?}", &settings.taxbench_version);
    info!("Sub-command: evaluate");

    info!("Database:");
    if settings.taxonomy.is_none() && settings.db_prefix.is_none() {
        bail!("One of --taxonomy or --db-prefix is required");
    }
    check_optional_filename(settings.taxonomy.as_deref(), "Taxonomy")?;
    check_optional_filename(settings.nodes.as_deref(), "Nodes table")?;
    check_optional_filename(settings.names.as_deref(), "Names table")?;
    check_optional_filename(settings.coverage_targets.as_deref(), "Coverage targets")?;
    log_optional_filename(settings.taxonomy.as_deref(), "Taxonomy");
    log_optional_filename(settings.db_prefix.as_deref(), "Database prefix");
    log_optional_filename(settings.nodes.as_deref(), "Nodes table");
    log_optional_filename(settings.names.as_deref(), "Names table");
    log_optional_filename(settings.coverage_targets.as_deref(), "Coverage targets");
    if settings.coverage_targets.is_some() {
        info!("\tCoverage taxid column: {}", settings.coverage_taxid_column);
    }

    info!("Truth:");
    for truth_map in settings.truth_maps.iter() {
        check_required_filename(truth_map, "Truth mapping")?;
        info!("\tTruth mapping: {truth_map:?}");
    }
    check_optional_filename(settings.truth_profile.as_deref(), "Truth profile")?;
    log_optional_filename(settings.truth_dir.as_deref(), "Truth folder");
    log_optional_filename(settings.truth_profile.as_deref(), "Truth profile");
    if !settings.reads.is_empty() {
        info!("\tReads: {:?}", settings.reads);
    }

    info!("Predictions:");
    ensure!(!settings.predictions.is_empty(), "At least one --prediction is required");
    for (key, path) in settings.predictions.iter() {
        check_required_filename(path, &format!("Prediction {key}"))?;
        info!("\t{key}: {path:?}");
    }
    match settings.tool {
        Some(tool) => info!("\tTool: {tool}"),
        None => info!("\tTool: None")
    };

    info!("Metrics:");
    settings.ranks.retain(|r| !r.trim().is_empty());
    ensure!(!settings.ranks.is_empty(), "--ranks must name at least one rank");
    info!("\tRanks: {:?}", settings.ranks);
    ensure!(settings.presence_threshold >= 0.0, "--presence-threshold must be >= 0");
    info!("\tPresence threshold: {}", settings.presence_threshold);
    info!("\tUNK metrics: {}", if settings.enable_unk_metrics { "ENABLED" } else { "DISABLED" });

    info!("Outputs:");
    check_output_filename(settings.output_json.as_deref(), "Output JSON")?;
    check_output_filename(settings.output_tsv.as_deref(), "Output TSV")?;
    log_optional_filename(settings.output_json.as_deref(), "Output JSON");
    log_optional_filename(settings.output_tsv.as_deref(), "Output TSV");

    Ok(settings)
}
