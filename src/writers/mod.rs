/*!
# Writers module
Contains the logic for writing metric outputs.
*/
/// Long-format `run_label, metric, value` summary file
pub mod metrics_summary;
