
/*!
Resolution of every evaluation input, in a fixed order.
Each step logs which file it picked and why, and the result records the origin of every choice.
*/

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::data_types::run_config::{DatasetConfig, ExperimentConfig, OutputKey, ToolKind, ToolOutputs};

lazy_static! {
    /// Sample identifier embedded in CAMI read file names
    static ref SAMPLE_ID: Regex = Regex::new(r"sample_(\d+)").unwrap();
}

/// Why a particular file was chosen
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceOrigin {
    /// Named directly in the run descriptor
    Explicit,
    /// Derived as `<db_prefix>.tax`
    DbPrefix,
    /// Found under `truth_dir` by the sample id of the reads
    SampleDiscovery,
    /// Derived from the read path, `/fasta/` becomes `/mapping/`
    ReadPathConvention,
    /// Picked from the tool outputs by priority
    OutputPriority,
}

/// A resolved file and the reason it was used
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedPath {
    pub path: PathBuf,
    pub origin: SourceOrigin,
}

/// Where the truth came from
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TruthSource {
    /// CAMI read or contig mappings, gives both read labels and an abundance profile
    Mapping { paths: Vec<PathBuf>, origin: SourceOrigin },
    /// Textual species profile, gives an abundance profile only
    Profile { path: PathBuf },
}

/// A tool output picked for one of the prediction families
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionSource {
    pub key: OutputKey,
    pub path: PathBuf,
}

/// Everything one evaluation read, for logs and for callers that want to audit the choice
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResolvedSources {
    pub taxonomy: Option<ResolvedPath>,
    pub nodes: Option<PathBuf>,
    pub names: Option<PathBuf>,
    pub coverage_targets: Option<PathBuf>,
    pub truth: Option<TruthSource>,
    pub read_labels: Option<PredictionSource>,
    pub abundance: Option<PredictionSource>,
}

/// Keeps an optional path only if it exists
/// # Arguments
/// * `path` - the configured path, if any
/// * `label` - input name for log messages
pub fn existing_path(path: Option<&Path>, label: &str) -> Option<PathBuf> {
    let path = path?;
    if path.exists() {
        Some(path.to_path_buf())
    } else {
        warn!("{label} does not exist, ignoring: {path:?}");
        None
    }
}

/// Explicit taxonomy table, else `<db_prefix>.tax`
pub fn resolve_taxonomy(experiment: &ExperimentConfig) -> Option<ResolvedPath> {
    if let Some(path) = existing_path(experiment.taxonomy.as_deref(), "Taxonomy table") {
        return Some(ResolvedPath { path, origin: SourceOrigin::Explicit });
    }

    let prefix = experiment.db_prefix.as_deref()?;
    let mut derived = prefix.as_os_str().to_owned();
    derived.push(".tax");
    let derived = PathBuf::from(derived);
    if derived.exists() {
        Some(ResolvedPath { path: derived, origin: SourceOrigin::DbPrefix })
    } else {
        debug!("Database prefix taxonomy not found: {derived:?}");
        None
    }
}

/// Returns the first `sample_<digits>` id found in the read file names
pub fn extract_sample_id(reads: &[PathBuf]) -> Option<String> {
    reads.iter()
        .filter_map(|p| p.to_str())
        .find_map(|p| SAMPLE_ID.captures(p))
        .map(|c| c[1].to_string())
}

/// Collects every file below `folder`; unreadable folders are logged and skipped
fn collect_files(folder: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(folder) {
        Ok(e) => e,
        Err(e) => {
            warn!("Error while reading {folder:?}: {e}");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => collect_files(&path, files),
            Ok(ft) if ft.is_file() => files.push(path),
            _ => {}
        }
    }
}

/// Recursively finds `*sample_<id>*gsa_mapping.tsv`, falling back to the `.tsv.gz` form.
/// The id must not be followed by another digit.
/// Results are sorted so repeated runs read the same files.
pub fn find_sample_mappings(truth_dir: &Path, sample_id: &str) -> Vec<PathBuf> {
    let mut files = vec![];
    collect_files(truth_dir, &mut files);
    files.sort();

    // the whole digit run must match, sample_1 never picks up sample_10
    let has_sample_id = |stem: &str| SAMPLE_ID.captures_iter(stem).any(|c| &c[1] == sample_id);
    for suffix in ["gsa_mapping.tsv", "gsa_mapping.tsv.gz"] {
        let found: Vec<PathBuf> = files.iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_suffix(suffix))
                    .is_some_and(has_sample_id)
            })
            .cloned()
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    vec![]
}

/// Maps `/fasta/..._anonymous_gsa.fasta` onto `/mapping/..._gsa_mapping.tsv[.gz]` if that file exists
pub fn mapping_by_read_path(read_path: &Path) -> Option<PathBuf> {
    if !read_path.components().any(|c| c.as_os_str() == "fasta") {
        return None;
    }
    let text = read_path.to_str()?
        .replace("/fasta/", "/mapping/")
        .replace("_anonymous_gsa.fasta", "_gsa_mapping.tsv");
    let candidate = PathBuf::from(&text);
    if candidate.exists() {
        return Some(candidate);
    }
    let gz = PathBuf::from(format!("{text}.gz"));
    gz.exists().then_some(gz)
}

/// Truth resolution: explicit mappings, then sample discovery, then the read path convention, then a text profile
pub fn resolve_truth(dataset: &DatasetConfig) -> Option<TruthSource> {
    if !dataset.truth_map.is_empty() {
        let paths: Vec<PathBuf> = dataset.truth_map.iter()
            .filter_map(|p| existing_path(Some(p), "Truth mapping"))
            .collect();
        if !paths.is_empty() {
            return Some(TruthSource::Mapping { paths, origin: SourceOrigin::Explicit });
        }
    }

    if let Some(truth_dir) = dataset.truth_dir.as_deref() {
        match extract_sample_id(&dataset.reads) {
            Some(sample_id) => {
                let paths = find_sample_mappings(truth_dir, &sample_id);
                if !paths.is_empty() {
                    return Some(TruthSource::Mapping { paths, origin: SourceOrigin::SampleDiscovery });
                }
                debug!("No mapping for sample_{sample_id} under {truth_dir:?}");
            },
            None => debug!("No sample id in read names, skipping discovery under {truth_dir:?}")
        }
    }

    if let Some(path) = dataset.reads.first().and_then(|r| mapping_by_read_path(r)) {
        return Some(TruthSource::Mapping { paths: vec![path], origin: SourceOrigin::ReadPathConvention });
    }

    existing_path(dataset.truth_profile.as_deref(), "Truth profile")
        .map(|path| TruthSource::Profile { path })
}

/// Picks the first existing output in `priority` that the tool (if known) can produce
pub fn resolve_prediction(outputs: &ToolOutputs, priority: &[OutputKey], tool: Option<ToolKind>) -> Option<PredictionSource> {
    for &key in priority.iter() {
        if tool.is_some_and(|t| !t.produces(key)) {
            continue;
        }
        if let Some(path) = outputs.get(key) {
            if path.exists() {
                return Some(PredictionSource { key, path: path.to_path_buf() });
            }
            warn!("Output {key} does not exist, trying the next one: {path:?}");
        }
    }
    None
}

impl ResolvedSources {
    /// Logs every resolved input
    pub fn log(&self) {
        info!("Resolved inputs:");
        match self.taxonomy.as_ref() {
            Some(t) => info!("\tTaxonomy: {:?} ({})", t.path, t.origin),
            None => info!("\tTaxonomy: None")
        };
        info!("\tPipe taxonomy: {:?}", self.nodes);
        info!("\tNames: {:?}", self.names);
        info!("\tCoverage targets: {:?}", self.coverage_targets);
        match self.truth.as_ref() {
            Some(TruthSource::Mapping { paths, origin }) => info!("\tTruth mapping: {paths:?} ({origin})"),
            Some(TruthSource::Profile { path }) => info!("\tTruth profile: {path:?}"),
            None => info!("\tTruth: None")
        };
        for (label, source) in [("Read labels", &self.read_labels), ("Abundance", &self.abundance)] {
            match source {
                Some(s) => info!("\t{label}: {:?} ({})", s.path, s.key),
                None => info!("\t{label}: None")
            };
        }
    }
}
