
use std::path::Path;

use crate::data_types::taxon::TaxId;
use crate::parsing::table_reader::{column, for_each_row, table_reader, taxid_column, RowError};

/// Loads a database target table, `reference\ttaxid[\t...]`.
/// Header rows and rows without a valid taxid are skipped.
/// # Arguments
/// * `filename` - the target table
/// * `taxid_index` - 0-based column holding the taxid
/// # Errors
/// * if the file cannot be opened or read
pub fn load_coverage_targets(filename: &Path, taxid_index: usize) -> anyhow::Result<Vec<(String, TaxId)>> {
    let mut reader = table_reader(filename, b'\t', Some(b'#'))?;
    let mut targets = vec![];
    for_each_row(&mut reader, &format!("{filename:?}"), |record| {
        let reference = column(record, 0)?;
        if reference.is_empty() {
            return Err(RowError::Ignored { reason: "empty reference" });
        }
        let taxid = taxid_column(record, taxid_index)?;
        targets.push((reference.to_string(), taxid));
        Ok(())
    })?;
    Ok(targets)
}
