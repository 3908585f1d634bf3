/// Helpers for reading and writing JSON run descriptors and results
pub mod json_io;
/// Helper functions for generating the progress bars
pub mod progress_bar;
