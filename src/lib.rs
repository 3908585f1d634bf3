/// Abundance profile comparison: distances, presence, and unmapped mass
pub mod abundance_metrics;
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Input resolution and the evaluation entry points
pub mod evaluator;
/// Scientific name and synonym lookup
pub mod name_index;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// Per-read classification scoring
pub mod per_read_metrics;
/// The taxonomy tree and rank mapping
pub mod taxonomy;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
