
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::data_types::taxon::default_ranks;

/// Every tool output the evaluator knows how to read
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize,
    strum_macros::AsRefStr, strum_macros::Display, strum_macros::EnumIter, strum_macros::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputKey {
    /// Per-read `read_id\ttaxid[:score]...`
    ClassifyTsv,
    /// Ganon per-read `.one` file
    ClassifyOne,
    /// Ganon rank report with read counts
    ReportReadsTre,
    /// Ganon rank report with abundance estimates
    ReportAbundanceTre,
    /// Sylph profile
    ProfileTsv,
    /// Sylph profile under its explicit name
    SylphProfileTsv,
    /// CAMI profiling format
    CamiProfileTsv,
    /// Taxor profile, written in the CAMI profiling format
    TaxorProfileTsv,
    /// Bracken abundance table
    BrackenTsv,
}

/// Per-read outputs, most preferred first
pub const READ_LABEL_PRIORITY: [OutputKey; 2] = [OutputKey::ClassifyTsv, OutputKey::ClassifyOne];

/// Abundance outputs, most preferred first
pub const ABUNDANCE_PRIORITY: [OutputKey; 7] = [
    OutputKey::ReportAbundanceTre,
    OutputKey::ReportReadsTre,
    OutputKey::ProfileTsv,
    OutputKey::SylphProfileTsv,
    OutputKey::CamiProfileTsv,
    OutputKey::TaxorProfileTsv,
    OutputKey::BrackenTsv,
];

/// The benchmarked tools; each one only produces a fixed set of outputs
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize, clap::ValueEnum,
    strum_macros::AsRefStr, strum_macros::Display, strum_macros::EnumIter, strum_macros::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ToolKind {
    Ganon,
    Kraken2,
    Sylph,
    Taxor,
    Bracken,
    Centrifuger,
    Chimera,
}

impl ToolKind {
    /// The outputs this tool writes
    pub fn output_keys(&self) -> &'static [OutputKey] {
        match self {
            ToolKind::Ganon => &[OutputKey::ClassifyOne, OutputKey::ReportReadsTre, OutputKey::ReportAbundanceTre],
            ToolKind::Kraken2 => &[OutputKey::ClassifyTsv],
            ToolKind::Sylph => &[OutputKey::ProfileTsv, OutputKey::SylphProfileTsv],
            ToolKind::Taxor => &[OutputKey::ClassifyTsv, OutputKey::TaxorProfileTsv],
            ToolKind::Bracken => &[OutputKey::BrackenTsv, OutputKey::CamiProfileTsv],
            ToolKind::Centrifuger => &[OutputKey::ClassifyTsv, OutputKey::CamiProfileTsv],
            ToolKind::Chimera => &[OutputKey::ClassifyTsv],
        }
    }

    /// True if this tool can have written `key`
    pub fn produces(&self, key: OutputKey) -> bool {
        self.output_keys().contains(&key)
    }
}

/// Accepts either a single path or a list of paths
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PathBuf),
        Many(Vec<PathBuf>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => vec![],
        Some(OneOrMany::One(p)) => vec![p],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Per-experiment inputs: the database side of an evaluation
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Tab taxonomy table
    #[serde(alias = "tax_path")]
    pub taxonomy: Option<PathBuf>,
    /// Database prefix, `<prefix>.tax` is tried when no taxonomy is given
    #[serde(alias = "db")]
    pub db_prefix: Option<PathBuf>,
    /// NCBI pipe table that overrides the rank structure
    pub nodes: Option<PathBuf>,
    /// NCBI names table
    pub names: Option<PathBuf>,
    /// Reference targets of the database, defines the coverage set
    #[serde(alias = "target_tsv")]
    pub coverage_targets: Option<PathBuf>,
    /// 0-based column of the taxid in the coverage targets
    pub coverage_taxid_column: usize,
    /// Ranks to evaluate
    pub ranks: Vec<String>,
    /// Presence threshold in percentage points
    pub presence_threshold: f64,
    /// Enables the `_unk` metric variants
    pub unk_metrics: bool,
    /// The tool being evaluated, restricts which outputs are considered
    pub tool: Option<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            taxonomy: None,
            db_prefix: None,
            nodes: None,
            names: None,
            coverage_targets: None,
            coverage_taxid_column: 1,
            ranks: default_ranks(),
            presence_threshold: 0.0,
            unk_metrics: false,
            tool: None
        }
    }
}

impl ExperimentConfig {
    /// Parses the tool name; unknown names are logged and ignored
    pub fn tool_kind(&self) -> Option<ToolKind> {
        let name = self.tool.as_deref()?;
        match name.parse::<ToolKind>() {
            Ok(kind) => Some(kind),
            Err(_e) => {
                warn!("Unknown tool {name:?}, all outputs will be considered");
                None
            }
        }
    }
}

/// Per-dataset inputs: the truth side of an evaluation
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Dataset label
    pub name: Option<String>,
    /// CAMI read or contig mappings
    #[serde(alias = "truth_mapping", alias = "truth_maps", deserialize_with = "one_or_many")]
    pub truth_map: Vec<PathBuf>,
    /// Folder searched for mappings by sample id
    pub truth_dir: Option<PathBuf>,
    /// Read files of the dataset, used for truth discovery
    #[serde(deserialize_with = "one_or_many")]
    pub reads: Vec<PathBuf>,
    /// Textual `name, value` truth profile
    pub truth_profile: Option<PathBuf>,
}

/// Output key to file path, as written by one tool run
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ToolOutputs(BTreeMap<String, PathBuf>);

impl ToolOutputs {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an output file
    pub fn insert(&mut self, key: OutputKey, path: PathBuf) {
        self.0.insert(key.to_string(), path);
    }

    /// Path of an output, if the run produced it
    pub fn get(&self, key: OutputKey) -> Option<&Path> {
        self.0.get(key.as_ref()).map(|p| p.as_path())
    }

    /// Keys that are not a known [`OutputKey`]
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.0.keys()
            .filter(|k| k.parse::<OutputKey>().is_err())
            .map(|k| k.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(OutputKey, PathBuf)> for ToolOutputs {
    fn from_iter<T: IntoIterator<Item = (OutputKey, PathBuf)>>(iter: T) -> Self {
        let mut outputs = Self::new();
        for (key, path) in iter {
            outputs.insert(key, path);
        }
        outputs
    }
}

/// A single evaluation: one experiment, one dataset, and the outputs of one tool run
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct RunDescriptor {
    /// Label written next to every metric
    pub label: String,
    pub experiment: ExperimentConfig,
    pub dataset: DatasetConfig,
    pub outputs: ToolOutputs,
}

impl RunDescriptor {
    /// The explicit label, or one derived from the tool and dataset names
    pub fn run_label(&self) -> String {
        if !self.label.is_empty() {
            return self.label.clone();
        }
        let tool = self.experiment.tool.as_deref().unwrap_or("run");
        match self.dataset.name.as_deref() {
            Some(dataset) => format!("{tool}_{dataset}"),
            None => tool.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_aliases() {
        let json = r#"{
            "label": "ganon_s0",
            "experiment": {"tax_path": "db/ganon.tax", "db": "db/ganon", "target_tsv": "targets.tsv", "tool": "Ganon"},
            "dataset": {"name": "s0", "truth_mapping": "truth/mapping.tsv", "reads": ["a.fq", "b.fq"]},
            "outputs": {"classify_one": "out/s0.one", "report_reads_tre": "out/s0.tre", "mystery": "x"}
        }"#;
        let descriptor: RunDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.experiment.taxonomy, Some(PathBuf::from("db/ganon.tax")));
        assert_eq!(descriptor.experiment.db_prefix, Some(PathBuf::from("db/ganon")));
        assert_eq!(descriptor.experiment.coverage_targets, Some(PathBuf::from("targets.tsv")));
        assert_eq!(descriptor.experiment.coverage_taxid_column, 1);
        assert_eq!(descriptor.experiment.ranks, default_ranks());
        assert_eq!(descriptor.experiment.tool_kind(), Some(ToolKind::Ganon));
        assert_eq!(descriptor.dataset.truth_map, vec![PathBuf::from("truth/mapping.tsv")]);
        assert_eq!(descriptor.dataset.reads.len(), 2);
        assert_eq!(descriptor.outputs.get(OutputKey::ClassifyOne), Some(Path::new("out/s0.one")));
        assert_eq!(descriptor.outputs.get(OutputKey::ClassifyTsv), None);
        assert_eq!(descriptor.outputs.unknown_keys(), vec!["mystery"]);
        assert_eq!(descriptor.run_label(), "ganon_s0");
    }

    #[test]
    fn test_defaults() {
        let descriptor: RunDescriptor = serde_json::from_str(r#"{"experiment": {"tool": "nope"}, "dataset": {"name": "d"}}"#).unwrap();
        assert_eq!(descriptor.experiment.tool_kind(), None);
        assert!(descriptor.dataset.truth_map.is_empty());
        assert!(descriptor.outputs.is_empty());
        assert_eq!(descriptor.run_label(), "nope_d");
    }

    #[test]
    fn test_tool_outputs() {
        assert!(ToolKind::Bracken.produces(OutputKey::CamiProfileTsv));
        assert!(!ToolKind::Kraken2.produces(OutputKey::BrackenTsv));
        assert_eq!(OutputKey::ReportAbundanceTre.to_string(), "report_abundance_tre");
        assert_eq!("taxor_profile_tsv".parse::<OutputKey>().unwrap(), OutputKey::TaxorProfileTsv);

        let outputs: ToolOutputs = vec![(OutputKey::BrackenTsv, PathBuf::from("b.tsv"))].into_iter().collect();
        assert_eq!(outputs.get(OutputKey::BrackenTsv), Some(Path::new("b.tsv")));
    }
}
