
/// Abundance profile entries and the unresolved mass that goes with them
pub mod abundance;
/// Per-rank sets of taxa a database can report
pub mod coverage;
/// The exact-rank and descendant-aware matching policies
pub mod match_policy;
/// Ordered flat metric results
pub mod metrics_map;
/// Per-read truth and prediction tables
pub mod read_labels;
/// Run descriptors: experiment, dataset, and tool output paths
pub mod run_config;
/// Contains tracker for TP, FP, FN and derived metrics
pub mod summary_metrics;
/// Taxon nodes, the taxid type, and shared constants
pub mod taxon;
