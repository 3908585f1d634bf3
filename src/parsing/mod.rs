/*!
# Parsing module
Contains the logic for parsing input files into meaningful structs / data.
*/
/// Reference target tables that define database coverage
pub mod coverage_targets;
/// Per-read and abundance outputs of the benchmarked tools
pub mod predictions;
/// Ordered, logged resolution of every evaluation input
pub mod sources;
/// Shared delimited-table reader with per-row error handling
pub mod table_reader;
/// Tab and NCBI pipe taxonomy tables, plus names tables
pub mod taxonomy_tables;
/// CAMI mappings and textual truth profiles
pub mod truth;
