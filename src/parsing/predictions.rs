
use csv::StringRecord;
use log::debug;
use std::path::Path;

use crate::data_types::abundance::{AbundanceEntry, AbundanceProfile};
use crate::data_types::read_labels::{collect_predictions, ReadPrediction, ReadPredictions};
use crate::data_types::run_config::OutputKey;
use crate::data_types::taxon::TaxId;
use crate::parsing::table_reader::{column, for_each_row, number_column, parse_taxid, table_reader, taxid_column, RowError};
use crate::taxonomy::Taxonomy;

/// Shared inputs a parser may need beyond the file itself
#[derive(Clone, Copy, Debug)]
pub struct ParseContext<'a> {
    /// Ranks being evaluated, rank-tagged rows at other ranks are dropped
    pub ranks: &'a [String],
    /// Used to resolve genome file names
    pub taxonomy: &'a Taxonomy,
}

/// One tool output format
pub trait OutputParser {
    /// What one file parses into
    type Output;

    /// Short format name for logging
    fn format_name(&self) -> &'static str;

    /// Parses a file; malformed rows are skipped, only I/O problems are errors
    fn parse(&self, filename: &Path, context: &ParseContext) -> anyhow::Result<Self::Output>;
}

/// Boxed parser for per-read outputs
pub type ReadLabelParser = Box<dyn OutputParser<Output = ReadPredictions> + Send + Sync>;
/// Boxed parser for abundance outputs
pub type AbundanceParser = Box<dyn OutputParser<Output = AbundanceProfile> + Send + Sync>;

/// The per-read parser for an output key, None if the key is not a per-read output
pub fn read_label_parser(key: OutputKey) -> Option<ReadLabelParser> {
    match key {
        OutputKey::ClassifyTsv => Some(Box::new(ClassifyTsvParser)),
        OutputKey::ClassifyOne => Some(Box::new(GanonOneParser)),
        _ => None
    }
}

/// The abundance parser for an output key, None if the key is not an abundance output
pub fn abundance_parser(key: OutputKey) -> Option<AbundanceParser> {
    match key {
        OutputKey::ReportAbundanceTre | OutputKey::ReportReadsTre => Some(Box::new(RankReportParser)),
        OutputKey::ProfileTsv | OutputKey::SylphProfileTsv => Some(Box::new(SylphProfileParser)),
        OutputKey::CamiProfileTsv | OutputKey::TaxorProfileTsv => Some(Box::new(CamiProfileParser)),
        OutputKey::BrackenTsv => Some(Box::new(BrackenParser)),
        OutputKey::ClassifyTsv | OutputKey::ClassifyOne => None
    }
}

/// Reads the taxid from a `taxid[:score]` token; unclassified markers and bad tokens give None
fn token_taxid(token: &str) -> Option<TaxId> {
    let token = token.trim();
    if token.is_empty() || token == "-" || token.eq_ignore_ascii_case("unclassified") {
        return None;
    }
    let taxid_text = token.split(':').next().unwrap_or_default();
    parse_taxid(taxid_text).ok()
}

/// `read_id\t<token>[:score]...`, the first non-empty token is the assignment
pub struct ClassifyTsvParser;

impl OutputParser for ClassifyTsvParser {
    type Output = ReadPredictions;

    fn format_name(&self) -> &'static str {
        "classify TSV"
    }

    fn parse(&self, filename: &Path, _context: &ParseContext) -> anyhow::Result<ReadPredictions> {
        let mut reader = table_reader(filename, b'\t', None)?;
        let mut rows = vec![];
        for_each_row(&mut reader, &format!("{filename:?}"), |record| {
            let read_id = column(record, 0)?;
            if record.len() < 2 {
                return Err(RowError::MissingColumn { index: 1 });
            }
            let taxid = record.iter().skip(1)
                .find(|t| !t.is_empty())
                .and_then(token_taxid);
            rows.push(ReadPrediction::new(read_id.to_string(), taxid));
            Ok(())
        })?;
        Ok(collect_predictions(rows))
    }
}

/// Ganon `.one`, `[H\t]read_id\ttarget[:score]...`; the first all-digit target is the taxid
pub struct GanonOneParser;

impl OutputParser for GanonOneParser {
    type Output = ReadPredictions;

    fn format_name(&self) -> &'static str {
        "ganon one"
    }

    fn parse(&self, filename: &Path, _context: &ParseContext) -> anyhow::Result<ReadPredictions> {
        let mut reader = table_reader(filename, b'\t', Some(b'#'))?;
        let mut rows = vec![];
        for_each_row(&mut reader, &format!("{filename:?}"), |record| {
            if record.len() < 2 {
                return Err(RowError::MissingColumn { index: 1 });
            }
            let first = column(record, 0)?;
            let (read_id, skip) = if first == "H" && record.len() >= 3 {
                (column(record, 1)?, 2)
            } else {
                (first, 1)
            };
            let taxid = record.iter().skip(skip)
                .map(|t| t.split(':').next().unwrap_or_default())
                .find(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|t| parse_taxid(t).ok());
            rows.push(ReadPrediction::new(read_id.to_string(), taxid));
            Ok(())
        })?;
        Ok(collect_predictions(rows))
    }
}

/// Rank report `.tre`, `rank, taxid, lineage, name, ..., count, ...`.
/// The count is the second to last column, read as a float and truncated.
pub struct RankReportParser;

impl OutputParser for RankReportParser {
    type Output = AbundanceProfile;

    fn format_name(&self) -> &'static str {
        "rank report"
    }

    fn parse(&self, filename: &Path, context: &ParseContext) -> anyhow::Result<AbundanceProfile> {
        let mut reader = table_reader(filename, b'\t', Some(b'#'))?;
        let mut profile = AbundanceProfile::new();
        for_each_row(&mut reader, &format!("{filename:?}"), |record| {
            if record.len() < 3 {
                return Err(RowError::MissingColumn { index: 2 });
            }
            let rank = column(record, 0)?;
            if !context.ranks.iter().any(|r| r == rank) {
                return Err(RowError::Ignored { reason: "rank not evaluated" });
            }
            let taxid = taxid_column(record, 1)?;
            let count = number_column(record, record.len() - 2)?.trunc();
            if count <= 0.0 {
                return Err(RowError::Ignored { reason: "non-positive count" });
            }
            profile.push(AbundanceEntry::ranked(taxid, rank, count));
            Ok(())
        })?;
        Ok(profile)
    }
}

/// Finds the index of the first header field matching any of `names`, in order of preference
fn header_index(header: &StringRecord, names: &[&str]) -> Option<usize> {
    names.iter()
        .find_map(|name| header.iter().position(|h| h.eq_ignore_ascii_case(name)))
}

/// Sylph profile with a `Genome_file` and `Sequence_abundance` header; genomes resolve through the file index
pub struct SylphProfileParser;

impl OutputParser for SylphProfileParser {
    type Output = AbundanceProfile;

    fn format_name(&self) -> &'static str {
        "sylph profile"
    }

    fn parse(&self, filename: &Path, context: &ParseContext) -> anyhow::Result<AbundanceProfile> {
        let mut reader = table_reader(filename, b'\t', Some(b'#'))?;
        let mut profile = AbundanceProfile::new();
        let mut columns: Option<(usize, usize)> = None;
        for_each_row(&mut reader, &format!("{filename:?}"), |record| {
            let Some((genome_index, mass_index)) = columns else {
                let genome_index = header_index(record, &["Genome_file"]);
                let mass_index = header_index(record, &["Sequence_abundance", "Taxonomic_abundance"]);
                return match (genome_index, mass_index) {
                    (Some(g), Some(m)) => {
                        columns = Some((g, m));
                        Err(RowError::Ignored { reason: "header" })
                    },
                    _ => Err(RowError::Ignored { reason: "before header" })
                };
            };

            let genome = column(record, genome_index)?;
            let mass = number_column(record, mass_index)?;
            match context.taxonomy.taxid_for_file(genome) {
                Some(taxid) => profile.push(AbundanceEntry::unranked(taxid, mass)),
                None => profile.add_unresolved(mass)
            }
            Ok(())
        })?;

        if profile.unresolved_count() > 0 {
            debug!("{filename:?}: {} genome files did not resolve to a taxid", profile.unresolved_count());
        }
        Ok(profile)
    }
}

/// CAMI profiling format, `@` headers and `TAXID RANK TAXPATH TAXPATHSN PERCENTAGE` rows
pub struct CamiProfileParser;

impl OutputParser for CamiProfileParser {
    type Output = AbundanceProfile;

    fn format_name(&self) -> &'static str {
        "CAMI profile"
    }

    fn parse(&self, filename: &Path, context: &ParseContext) -> anyhow::Result<AbundanceProfile> {
        let mut reader = table_reader(filename, b'\t', Some(b'@'))?;
        let mut profile = AbundanceProfile::new();
        for_each_row(&mut reader, &format!("{filename:?}"), |record| {
            let taxid = taxid_column(record, 0)?;
            let rank = column(record, 1)?.to_lowercase();
            let mass = number_column(record, 4)?;
            if rank.is_empty() {
                profile.push(AbundanceEntry::unranked(taxid, mass));
            } else if context.ranks.contains(&rank) {
                profile.push(AbundanceEntry::ranked(taxid, &rank, mass));
            } else {
                return Err(RowError::Ignored { reason: "rank not evaluated" });
            }
            Ok(())
        })?;
        Ok(profile)
    }
}

/// Converts a bracken level letter into a rank name; empty means species
pub fn bracken_rank(level: &str) -> String {
    match level.trim() {
        "" | "S" => "species".to_string(),
        "D" => "domain".to_string(),
        "P" => "phylum".to_string(),
        "C" => "class".to_string(),
        "O" => "order".to_string(),
        "F" => "family".to_string(),
        "G" => "genus".to_string(),
        other => other.to_lowercase()
    }
}

/// Bracken table, `name taxonomy_id taxonomy_lvl ... new_est_reads ...`.
/// Without a header the taxid, level, and estimate are columns 1, 2, and 5.
pub struct BrackenParser;

impl OutputParser for BrackenParser {
    type Output = AbundanceProfile;

    fn format_name(&self) -> &'static str {
        "bracken"
    }

    fn parse(&self, filename: &Path, context: &ParseContext) -> anyhow::Result<AbundanceProfile> {
        let mut reader = table_reader(filename, b'\t', Some(b'#'))?;
        let mut profile = AbundanceProfile::new();
        // (taxid, level, estimate), None until the first row was seen
        let mut columns: Option<(usize, Option<usize>, usize)> = None;
        for_each_row(&mut reader, &format!("{filename:?}"), |record| {
            let (taxid_index, level_index, est_index) = match columns {
                Some(c) => c,
                None => {
                    let taxid_index = header_index(record, &["taxonomy_id"]);
                    let est_index = header_index(record, &["new_est_reads"]);
                    if let (Some(t), Some(e)) = (taxid_index, est_index) {
                        let level_index = header_index(record, &["taxonomy_lvl", "taxonomy_level"]);
                        columns = Some((t, level_index, e));
                        return Err(RowError::Ignored { reason: "header" });
                    }
                    let fallback = (1, Some(2), 5);
                    columns = Some(fallback);
                    fallback
                }
            };

            let taxid = taxid_column(record, taxid_index)?;
            if taxid == 0 {
                return Err(RowError::Ignored { reason: "taxid 0" });
            }
            let level = level_index
                .and_then(|i| record.get(i))
                .unwrap_or_default();
            let rank = bracken_rank(level);
            if !context.ranks.contains(&rank) {
                return Err(RowError::Ignored { reason: "rank not evaluated" });
            }
            let estimate = number_column(record, est_index)?;
            profile.push(AbundanceEntry::ranked(taxid, &rank, estimate));
            Ok(())
        })?;
        Ok(profile)
    }
}
