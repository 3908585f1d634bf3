
/*!
# Evaluator
Resolves the inputs of a single tool run, loads them, and drives both metric engines.
Every optional input that fails to resolve or load is logged and the metrics that need it are omitted.
*/

use derive_builder::Builder;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;

use crate::abundance_metrics::compute_abundance_metrics;
use crate::data_types::abundance::AbundanceProfile;
use crate::data_types::coverage::CoverageSet;
use crate::data_types::metrics_map::MetricsMap;
use crate::data_types::read_labels::TruthReads;
use crate::data_types::run_config::{DatasetConfig, ExperimentConfig, OutputKey, ToolOutputs, ABUNDANCE_PRIORITY, READ_LABEL_PRIORITY};
use crate::data_types::taxon::{default_ranks, TaxId};
use crate::name_index::NameIndex;
use crate::parsing::coverage_targets::load_coverage_targets;
use crate::parsing::predictions::{abundance_parser, read_label_parser, OutputParser, ParseContext};
use crate::parsing::sources::{existing_path, resolve_prediction, resolve_taxonomy, resolve_truth, PredictionSource, ResolvedSources, TruthSource};
use crate::parsing::taxonomy_tables::load_names_dmp;
use crate::parsing::truth::{load_cami_mapping, load_truth_profile};
use crate::per_read_metrics::compute_per_read_metrics;
use crate::taxonomy::{RankMapper, Taxonomy};

/// Names in a textual truth profile are resolved at this rank
pub const TRUTH_PROFILE_RANK: &str = "species";

/// Controls which metrics are computed and how
#[derive(Builder, Clone, Debug)]
#[builder(default)]
pub struct MetricsConfig {
    /// Ranks to evaluate, in output order
    ranks: Vec<String>,
    /// A taxon is present in a normalized profile if it is strictly above this, in percentage points
    presence_threshold: f64,
    /// if True, adds the `_unk` variants even without a coverage set
    unk_metrics: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            ranks: default_ranks(),
            presence_threshold: 0.0,
            unk_metrics: false
        }
    }
}

impl MetricsConfig {
    /// Takes the metric settings of an experiment; an empty rank list falls back to the defaults
    pub fn from_experiment(experiment: &ExperimentConfig) -> Self {
        let ranks = if experiment.ranks.is_empty() {
            warn!("No ranks configured, using {:?}", default_ranks());
            default_ranks()
        } else {
            experiment.ranks.clone()
        };
        Self {
            ranks,
            presence_threshold: experiment.presence_threshold,
            unk_metrics: experiment.unk_metrics
        }
    }

    // getters
    pub fn ranks(&self) -> &[String] {
        &self.ranks
    }

    pub fn presence_threshold(&self) -> f64 {
        self.presence_threshold
    }

    pub fn unk_metrics(&self) -> bool {
        self.unk_metrics
    }
}

/// The result of one evaluation together with the inputs it actually used
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub metrics: MetricsMap,
    pub sources: ResolvedSources,
}

/// Evaluates one tool run and returns only the metrics, see [`evaluate_with_sources`]
pub fn evaluate(experiment: &ExperimentConfig, dataset: &DatasetConfig, outputs: &ToolOutputs) -> MetricsMap {
    evaluate_with_sources(experiment, dataset, outputs).metrics
}

/// Loads one resolved prediction with the parser registered for its key
fn parse_prediction<T>(
    source: Option<&PredictionSource>,
    parser: impl Fn(OutputKey) -> Option<Box<dyn OutputParser<Output = T> + Send + Sync>>,
    context: &ParseContext
) -> Option<T> {
    let source = source?;
    let parser = parser(source.key)?;
    match parser.parse(&source.path, context) {
        Ok(parsed) => {
            debug!("Loaded {} output {:?}", parser.format_name(), source.path);
            Some(parsed)
        },
        Err(e) => {
            warn!("Error while parsing {} output {:?}, skipping: {e:#}", parser.format_name(), source.path);
            None
        }
    }
}

/// Builds the name index from a names table, or from the names embedded in the taxonomy
fn load_name_index(names: Option<&Path>, taxonomy: &Taxonomy) -> NameIndex {
    if let Some(path) = names {
        match load_names_dmp(path) {
            Ok(rows) => return NameIndex::from_rows(&rows, taxonomy),
            Err(e) => warn!("Error while loading names {path:?}, using taxonomy names: {e:#}")
        }
    }
    NameIndex::from_taxonomy(taxonomy)
}

/// Loads the truth labels and truth abundance of the resolved truth source
fn load_truth(truth: Option<&TruthSource>, names: Option<&Path>, taxonomy: &Taxonomy) -> (Option<TruthReads>, Option<AbundanceProfile>) {
    match truth {
        Some(TruthSource::Mapping { paths, .. }) => match load_cami_mapping(paths) {
            Ok(mapping) => {
                let profile = mapping.abundance();
                (Some(mapping.reads), Some(profile))
            },
            Err(e) => {
                warn!("Error while loading truth mapping, skipping truth: {e:#}");
                (None, None)
            }
        },
        Some(TruthSource::Profile { path }) => match load_truth_profile(path) {
            Ok(text_profile) => {
                let name_index = load_name_index(names, taxonomy);
                if name_index.is_empty() {
                    warn!("No names available, truth profile names cannot be resolved");
                }
                (None, Some(text_profile.resolve(&name_index, TRUTH_PROFILE_RANK)))
            },
            Err(e) => {
                warn!("Error while loading truth profile, skipping truth: {e:#}");
                (None, None)
            }
        },
        None => {
            warn!("No truth could be resolved");
            (None, None)
        }
    }
}

/// Evaluates one tool run.
/// Inputs are resolved in order: taxonomy, pipe taxonomy, coverage targets, names, truth, then predictions.
/// Without a taxonomy the result is empty.
/// # Arguments
/// * `experiment` - database side inputs and metric settings
/// * `dataset` - truth side inputs
/// * `outputs` - the tool outputs by key
pub fn evaluate_with_sources(experiment: &ExperimentConfig, dataset: &DatasetConfig, outputs: &ToolOutputs) -> Evaluation {
    let config = MetricsConfig::from_experiment(experiment);
    let mut sources = ResolvedSources::default();

    // taxonomy is the only hard requirement
    let Some(taxonomy_source) = resolve_taxonomy(experiment) else {
        warn!("No taxonomy could be resolved, no metrics computed");
        return Evaluation { metrics: MetricsMap::new(), sources };
    };
    let mut taxonomy = match Taxonomy::from_tax_table(&taxonomy_source.path) {
        Ok(t) => t,
        Err(e) => {
            warn!("Error while loading taxonomy {:?}, no metrics computed: {e:#}", taxonomy_source.path);
            return Evaluation { metrics: MetricsMap::new(), sources };
        }
    };
    sources.taxonomy = Some(taxonomy_source);

    if let Some(nodes) = existing_path(experiment.nodes.as_deref(), "Pipe taxonomy") {
        match taxonomy.apply_nodes_dmp(&nodes) {
            Ok(()) => sources.nodes = Some(nodes),
            Err(e) => warn!("Error while loading pipe taxonomy {nodes:?}, ignoring: {e:#}")
        }
    }

    let mut coverage: Option<CoverageSet> = None;
    if let Some(path) = existing_path(experiment.coverage_targets.as_deref(), "Coverage targets") {
        match load_coverage_targets(&path, experiment.coverage_taxid_column) {
            Ok(targets) if targets.is_empty() => warn!("Coverage targets {path:?} are empty, ignoring"),
            Ok(targets) => {
                for (reference, taxid) in targets.iter() {
                    taxonomy.add_file(reference, *taxid);
                }
                let taxids: Vec<TaxId> = targets.iter().map(|(_r, t)| *t).collect();
                let coverage_set = CoverageSet::from_targets(&taxids, &taxonomy, config.ranks());
                for rank in config.ranks().iter() {
                    debug!("Coverage at {rank}: {} taxa", coverage_set.len_at(rank));
                }
                coverage = Some(coverage_set);
                sources.coverage_targets = Some(path);
            },
            Err(e) => warn!("Error while loading coverage targets {path:?}, ignoring: {e:#}")
        }
    }

    // names are only loaded if a text profile needs them
    sources.names = existing_path(experiment.names.as_deref(), "Names table");

    sources.truth = resolve_truth(dataset);
    let (truth_reads, truth_profile) = load_truth(sources.truth.as_ref(), sources.names.as_deref(), &taxonomy);

    let unknown_keys = outputs.unknown_keys();
    if !unknown_keys.is_empty() {
        warn!("Ignoring unknown output keys: {unknown_keys:?}");
    }
    let tool = experiment.tool_kind();
    sources.read_labels = resolve_prediction(outputs, &READ_LABEL_PRIORITY, tool);
    sources.abundance = resolve_prediction(outputs, &ABUNDANCE_PRIORITY, tool);
    sources.log();

    let context = ParseContext {
        ranks: config.ranks(),
        taxonomy: &taxonomy
    };
    let mapper = RankMapper::new(&taxonomy, coverage.as_ref());
    let mut metrics = MetricsMap::new();

    match (truth_reads.as_ref(), sources.read_labels.is_some()) {
        (Some(truth), true) => {
            if let Some(predictions) = parse_prediction(sources.read_labels.as_ref(), read_label_parser, &context) {
                info!("Scoring {} truth reads against {} predictions", truth.len(), predictions.len());
                metrics.extend(compute_per_read_metrics(truth, &predictions, &mapper, &config));
            }
        },
        (None, true) => info!("Per-read predictions found but no per-read truth, skipping per-read metrics"),
        _ => debug!("No per-read predictions")
    };

    match (truth_profile.as_ref(), sources.abundance.is_some()) {
        (Some(truth), true) => {
            if let Some(predicted) = parse_prediction(sources.abundance.as_ref(), abundance_parser, &context) {
                info!("Comparing abundance profiles with {} truth and {} predicted entries", truth.entries().len(), predicted.entries().len());
                metrics.extend(compute_abundance_metrics(truth, &predicted, &mapper, &config));
            }
        },
        (None, true) => info!("Abundance predictions found but no truth abundance, skipping abundance metrics"),
        _ => debug!("No abundance predictions")
    };

    if metrics.is_empty() {
        warn!("No metrics were computed");
    } else {
        metrics.stamp_version();
    }
    Evaluation { metrics, sources }
}
