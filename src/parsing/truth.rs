
use anyhow::Context;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::data_types::abundance::{AbundanceEntry, AbundanceProfile};
use crate::data_types::read_labels::TruthReads;
use crate::data_types::taxon::TaxId;
use crate::name_index::NameIndex;
use crate::parsing::table_reader::{column, for_each_row, table_reader, taxid_column, RowError};

/// A profile total above this is read as percentages rather than fractions
pub const PERCENTAGE_DETECTION_TOTAL: f64 = 1.5;

/// Truth loaded from CAMI read or contig mappings
#[derive(Clone, Debug, Default)]
pub struct MappingTruth {
    /// `read_id -> taxid`
    pub reads: TruthReads,
    /// `taxid -> read count`, every row counts at least once
    pub counts: BTreeMap<TaxId, u64>,
}

impl MappingTruth {
    /// The read counts as an unranked abundance profile
    pub fn abundance(&self) -> AbundanceProfile {
        let mut profile = AbundanceProfile::new();
        for (&taxid, &count) in self.counts.iter() {
            profile.push(AbundanceEntry::unranked(taxid, count as f64));
        }
        profile
    }
}

/// Loads one or more CAMI mappings, `contig_id, genome_id, taxid, contig_id2, read_count, ...`.
/// Rows with fewer than five columns are skipped; an unreadable read count counts as 1.
/// # Errors
/// * if any of the files cannot be opened or read
pub fn load_cami_mapping(filenames: &[PathBuf]) -> anyhow::Result<MappingTruth> {
    let mut truth = MappingTruth::default();
    for filename in filenames.iter() {
        let mut reader = table_reader(filename, b'\t', Some(b'#'))?;
        let label = format!("{filename:?}");
        for_each_row(&mut reader, &label, |record| {
            let read_id = column(record, 0)?;
            let taxid = taxid_column(record, 2)?;
            let reads = column(record, 4)?
                .parse::<i64>()
                .unwrap_or(1)
                .max(1) as u64;
            truth.reads.insert(read_id.to_string(), taxid);
            *truth.counts.entry(taxid).or_insert(0) += reads;
            Ok(())
        }).with_context(|| format!("Error while loading truth mapping {filename:?}:"))?;
    }
    debug!("Loaded {} truth reads over {} taxa", truth.reads.len(), truth.counts.len());
    Ok(truth)
}

/// A textual `name, value` truth profile, values already converted to fractions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextProfile {
    /// Names with their fractions, in file order
    pub entries: Vec<(String, f64)>,
    /// True if the file was written in percentages
    pub was_percentage: bool,
}

/// Splits a row into name and value; rows without a tab are split at the last whitespace
fn split_name_value(record: &csv::StringRecord) -> Result<(String, String), RowError> {
    if record.len() >= 2 {
        Ok((column(record, 0)?.to_string(), column(record, 1)?.to_string()))
    } else {
        let line = column(record, 0)?;
        line.rsplit_once(char::is_whitespace)
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .ok_or(RowError::MissingColumn { index: 1 })
    }
}

/// Loads a truth profile with an optional header row containing "species".
/// Values are percentages if they add up to more than [`PERCENTAGE_DETECTION_TOTAL`].
/// # Errors
/// * if the file cannot be opened or read
pub fn load_truth_profile(filename: &Path) -> anyhow::Result<TextProfile> {
    let mut reader = table_reader(filename, b'\t', Some(b'#'))?;
    let label = format!("{filename:?}");
    let mut entries = vec![];
    let mut first_row = true;
    for_each_row(&mut reader, &label, |record| {
        let is_first = std::mem::replace(&mut first_row, false);
        let (name, value_text) = split_name_value(record)?;
        let value = match value_text.parse::<f64>() {
            Ok(v) => v,
            Err(_e) if is_first && record.iter().any(|f| f.to_lowercase().contains("species")) => {
                return Err(RowError::Ignored { reason: "header" });
            },
            Err(_e) => return Err(RowError::InvalidNumber { index: 1, value: value_text })
        };
        if name.is_empty() {
            return Err(RowError::Ignored { reason: "empty name" });
        }
        entries.push((name, value));
        Ok(())
    })?;

    let total: f64 = entries.iter().map(|(_n, v)| *v).sum();
    let was_percentage = total > PERCENTAGE_DETECTION_TOTAL;
    if was_percentage {
        for (_name, value) in entries.iter_mut() {
            *value /= 100.0;
        }
    }
    Ok(TextProfile { entries, was_percentage })
}

impl TextProfile {
    /// Resolves every name at `rank` through the name index.
    /// Names that do not resolve keep their mass as unresolved mass.
    pub fn resolve(&self, names: &NameIndex, rank: &str) -> AbundanceProfile {
        let mut profile = AbundanceProfile::new();
        let mut unresolved = vec![];
        for (name, value) in self.entries.iter() {
            match names.taxid_for_name(name, rank) {
                Some(taxid) => profile.push(AbundanceEntry::unranked(taxid, *value)),
                None => {
                    profile.add_unresolved(*value);
                    unresolved.push(name.as_str());
                }
            }
        }
        if !unresolved.is_empty() {
            warn!("{} truth profile names did not resolve to a taxid", unresolved.len());
            debug!("Unresolved names: {unresolved:?}");
        }
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;
    use crate::taxonomy::Taxonomy;
    use std::io::Write;

    #[test]
    fn test_cami_mapping() {
        let truth = load_cami_mapping(&[PathBuf::from("./test_data/truth_mapping.tsv")]).unwrap();
        assert_eq!(truth.reads.len(), 4);
        assert_eq!(truth.reads.get("r1"), Some(&3));
        assert_eq!(truth.reads.get("r4"), Some(&4));
        // r3 has 0 reads and still counts once, r4 has no readable count
        assert_eq!(truth.counts.get(&3), Some(&11));
        assert_eq!(truth.counts.get(&4), Some(&2));

        let profile = truth.abundance();
        assert_eq!(profile.entries().len(), 2);
        assert_approx_eq!(profile.total_mass(), 13.0);
    }

    #[test]
    fn test_missing_mapping_is_error() {
        assert!(load_cami_mapping(&[PathBuf::from("./test_data/does_not_exist.tsv")]).is_err());
    }

    #[test]
    fn test_truth_profile_percentages() {
        let profile = load_truth_profile(&PathBuf::from("./test_data/truth_profile.tsv")).unwrap();
        assert!(profile.was_percentage);
        assert_eq!(profile.entries.len(), 3);
        assert_eq!(profile.entries[0].0, "SpeciesA");
        assert_approx_eq!(profile.entries[0].1, 0.6);

        let taxonomy = Taxonomy::from_tax_table(&PathBuf::from("./test_data/mini.tax")).unwrap();
        let names = NameIndex::from_taxonomy(&taxonomy);
        let resolved = profile.resolve(&names, "species");
        assert_eq!(resolved.entries().len(), 2);
        assert_eq!(resolved.unresolved_count(), 1);
        assert_approx_eq!(resolved.unresolved_mass(), 0.1);
    }

    #[test]
    fn test_latin1_profile_name_counts_as_unresolved() {
        let mut tmp = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        tmp.write_all(b"Esp\xe9cies\t50\nSpeciesA\t50\n").unwrap();
        tmp.flush().unwrap();

        let profile = load_truth_profile(tmp.path()).unwrap();
        assert!(profile.was_percentage);
        assert_eq!(profile.entries.len(), 2);
        assert_approx_eq!(profile.entries[0].1, 0.5);

        let taxonomy = Taxonomy::from_tax_table(&PathBuf::from("./test_data/mini.tax")).unwrap();
        let names = NameIndex::from_taxonomy(&taxonomy);
        let resolved = profile.resolve(&names, "species");
        assert_eq!(resolved.entries().len(), 1);
        assert_eq!(resolved.unresolved_count(), 1);
        assert_approx_eq!(resolved.unresolved_mass(), 0.5);
    }

    #[test]
    fn test_mapping_keeps_rows_with_invalid_utf8() {
        let mut tmp = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        tmp.write_all(b"r\xff1\tg1\t3\tr1\t10\nr2\tg2\t4\tr2\t10\n").unwrap();
        tmp.flush().unwrap();

        let truth = load_cami_mapping(&[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(truth.reads.len(), 2);
        assert_eq!(truth.reads.get("r\u{FFFD}1"), Some(&3));
        assert_eq!(truth.counts.get(&3), Some(&10));
        assert_eq!(truth.counts.get(&4), Some(&10));
    }

    #[test]
    fn test_truth_profile_fractions_without_tabs() {
        let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(tmp, "Species A 0.25").unwrap();
        writeln!(tmp, "SpeciesB 0.75").unwrap();
        tmp.flush().unwrap();

        let profile = load_truth_profile(tmp.path()).unwrap();
        assert!(!profile.was_percentage);
        assert_eq!(profile.entries, vec![("Species A".to_string(), 0.25), ("SpeciesB".to_string(), 0.75)]);
    }
}
