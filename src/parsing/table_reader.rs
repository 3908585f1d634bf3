
use anyhow::Context;
use csv::{ByteRecord, StringRecord};
use log::{debug, trace};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::data_types::taxon::TaxId;

/// Reasons a single row is rejected; the row is skipped and parsing continues
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RowError {
    #[error("row has no column {index}")]
    MissingColumn { index: usize },
    #[error("column {index} is not a taxid: {value:?}")]
    InvalidTaxId { index: usize, value: String },
    #[error("negative taxid {value} is reserved")]
    ReservedTaxId { value: TaxId },
    #[error("column {index} is not a number: {value:?}")]
    InvalidNumber { index: usize, value: String },
    #[error("row ignored: {reason}")]
    Ignored { reason: &'static str },
}

/// Counts of rows handled by [`for_each_row`]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RowStats {
    /// Rows the callback accepted
    pub parsed: u64,
    /// Rows that were rejected or could not be read
    pub skipped: u64,
}

/// Opens a plain or gzip-compressed text file
/// # Arguments
/// * `filename` - the file to open, `.gz` is decompressed on the fly
/// # Errors
/// * if the file does not open
pub fn open_text(filename: &Path) -> anyhow::Result<Box<dyn Read>> {
    let file = File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;
    let reader: Box<dyn Read> = if filename.extension().unwrap_or_default() == "gz" {
        Box::new(flate2::read::MultiGzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Builds a header-less, quote-free table reader that tolerates ragged rows
/// # Arguments
/// * `filename` - the table to open
/// * `delimiter` - column separator, usually tab or pipe
/// * `comment` - lines starting with this byte are ignored
/// # Errors
/// * if the file does not open
pub fn table_reader(filename: &Path, delimiter: u8, comment: Option<u8>) -> anyhow::Result<csv::Reader<Box<dyn Read>>> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false) // headers are detected per format, never skipped blindly
        .quoting(false)
        .flexible(true)
        .comment(comment)
        .trim(csv::Trim::All)
        .from_reader(open_text(filename)?);
    Ok(reader)
}

/// Feeds every row of `reader` to `callback`, skipping rows that the callback rejects.
/// Invalid UTF-8 is replaced rather than dropping the row, so names and masses are never lost silently.
/// # Arguments
/// * `reader` - an open table reader
/// * `label` - name of the input used in log messages
/// * `callback` - row handler
/// # Errors
/// * if the underlying file cannot be read, row-level problems are never errors
pub fn for_each_row<R, F>(reader: &mut csv::Reader<R>, label: &str, mut callback: F) -> anyhow::Result<RowStats>
where
    R: Read,
    F: FnMut(&StringRecord) -> Result<(), RowError>
{
    let mut stats = RowStats::default();
    let mut raw = ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut raw) {
            Ok(true) => {},
            Ok(false) => break,
            Err(e) if e.is_io_error() => {
                return Err(e).with_context(|| format!("Error while reading {label}:"));
            },
            Err(e) => {
                trace!("{label}: skipping unreadable row: {e}");
                stats.skipped += 1;
                continue;
            }
        };

        if std::str::from_utf8(raw.as_slice()).is_err() {
            trace!("{label}: replacing invalid UTF-8 in row {:?}", raw.position().map(|p| p.line()));
        }
        let record = StringRecord::from_byte_record_lossy(std::mem::take(&mut raw));
        match callback(&record) {
            Ok(()) => stats.parsed += 1,
            Err(e) => {
                trace!("{label}: skipping row {:?}: {e}", record.position().map(|p| p.line()));
                stats.skipped += 1;
            }
        }
    }

    debug!("{label}: {} rows parsed, {} rows skipped", stats.parsed, stats.skipped);
    Ok(stats)
}

/// Returns a trimmed column, failing if it is missing
pub fn column(record: &StringRecord, index: usize) -> Result<&str, RowError> {
    record.get(index)
        .map(|s| s.trim())
        .ok_or(RowError::MissingColumn { index })
}

/// Parses a taxid column, rejecting the reserved negative space
pub fn taxid_column(record: &StringRecord, index: usize) -> Result<TaxId, RowError> {
    let value = column(record, index)?;
    parse_taxid(value).map_err(|e| match e {
        RowError::InvalidTaxId { value, .. } => RowError::InvalidTaxId { index, value },
        other => other
    })
}

/// Parses a numeric column
pub fn number_column(record: &StringRecord, index: usize) -> Result<f64, RowError> {
    let value = column(record, index)?;
    value.parse::<f64>()
        .map_err(|_e| RowError::InvalidNumber { index, value: value.to_string() })
}

/// Parses a taxid token; negative values are rejected so they never collide with sentinels
pub fn parse_taxid(value: &str) -> Result<TaxId, RowError> {
    let taxid: TaxId = value.trim().parse()
        .map_err(|_e| RowError::InvalidTaxId { index: 0, value: value.to_string() })?;
    if taxid < 0 {
        Err(RowError::ReservedTaxId { value: taxid })
    } else {
        Ok(taxid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_taxid() {
        assert_eq!(parse_taxid("562"), Ok(562));
        assert_eq!(parse_taxid(" 7 "), Ok(7));
        assert_eq!(parse_taxid("-1"), Err(RowError::ReservedTaxId { value: -1 }));
        assert!(matches!(parse_taxid("abc"), Err(RowError::InvalidTaxId { .. })));
        assert!(matches!(parse_taxid("3.5"), Err(RowError::InvalidTaxId { .. })));
    }

    #[test]
    fn test_for_each_row_skips_bad_rows() {
        let mut tmp = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        writeln!(tmp, "# comment").unwrap();
        writeln!(tmp, "a\t1").unwrap();
        writeln!(tmp, "b\tnot_a_number").unwrap();
        writeln!(tmp, "c").unwrap();
        writeln!(tmp).unwrap();
        writeln!(tmp, "d\t-4").unwrap();
        writeln!(tmp, "e\t\"2\"").unwrap();
        tmp.flush().unwrap();

        let mut reader = table_reader(tmp.path(), b'\t', Some(b'#')).unwrap();
        let mut values = vec![];
        let stats = for_each_row(&mut reader, "test", |record| {
            values.push(taxid_column(record, 1)?);
            Ok(())
        }).unwrap();

        assert_eq!(values, vec![1]);
        assert_eq!(stats, RowStats { parsed: 1, skipped: 4 });
    }

    #[test]
    fn test_invalid_utf8_is_kept() {
        let mut tmp = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        tmp.write_all(b"Esp\xe9cies\t50\nSpeciesA\t50\n").unwrap();
        tmp.flush().unwrap();

        let mut reader = table_reader(tmp.path(), b'\t', None).unwrap();
        let mut names = vec![];
        let stats = for_each_row(&mut reader, "latin1", |record| {
            names.push(column(record, 0)?.to_string());
            Ok(())
        }).unwrap();
        assert_eq!(stats, RowStats { parsed: 2, skipped: 0 });
        assert_eq!(names, vec!["Esp\u{FFFD}cies".to_string(), "SpeciesA".to_string()]);
    }

    #[test]
    fn test_gzip_input() {
        let tmp = tempfile::Builder::new().suffix(".tsv.gz").tempfile().unwrap();
        {
            let mut encoder = flate2::write::GzEncoder::new(tmp.reopen().unwrap(), flate2::Compression::default());
            writeln!(encoder, "x\t10").unwrap();
            writeln!(encoder, "y\t20").unwrap();
            encoder.finish().unwrap();
        }

        let mut reader = table_reader(tmp.path(), b'\t', None).unwrap();
        let mut total = 0.0;
        let stats = for_each_row(&mut reader, "gz", |record| {
            total += number_column(record, 1)?;
            Ok(())
        }).unwrap();
        assert_eq!(stats.parsed, 2);
        assert_eq!(total, 30.0);
    }
}
