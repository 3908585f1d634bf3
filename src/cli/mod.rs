/*!
# CLI module
Command line interface functionality that is specific to taxbench.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The batch CLI subcommand
pub mod batch;
/// The evaluate CLI subcommand
pub mod evaluate;
