
use log::debug;
use std::path::Path;

use crate::data_types::taxon::{TaxId, TaxonNode, FILE_RANK};
use crate::parsing::table_reader::{column, for_each_row, parse_taxid, table_reader, taxid_column, RowError};

/// Contents of a tab-delimited taxonomy table
#[derive(Clone, Debug, Default)]
pub struct TaxTable {
    /// Regular `taxid, parent, rank, [name]` rows in file order
    pub nodes: Vec<TaxonNode>,
    /// `filename, taxid, file` rows in file order
    pub files: Vec<(String, TaxId)>,
}

/// Loads a tab table with rows `taxid\tparent\trank\t[name]`.
/// Rows with rank `file` are read as `filename\ttaxid\tfile` and kept separately.
/// # Arguments
/// * `filename` - the table to load, may be gzipped
/// # Errors
/// * if the file cannot be opened or read
pub fn load_tax_table(filename: &Path) -> anyhow::Result<TaxTable> {
    let mut reader = table_reader(filename, b'\t', Some(b'#'))?;
    let mut table = TaxTable::default();
    let label = format!("{filename:?}");
    for_each_row(&mut reader, &label, |record| {
        let rank = column(record, 2)?;
        if rank == FILE_RANK {
            let file_label = column(record, 0)?;
            if file_label.is_empty() {
                return Err(RowError::Ignored { reason: "empty file label" });
            }
            let taxid = taxid_column(record, 1)?;
            table.files.push((file_label.to_string(), taxid));
        } else {
            let taxid = taxid_column(record, 0)?;
            let parent = taxid_column(record, 1)?;
            let name = record.get(3)
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string());
            table.nodes.push(TaxonNode::new(taxid, parent, rank.to_string(), name));
        }
        Ok(())
    })?;

    debug!("Loaded {} nodes and {} file rows from {filename:?}", table.nodes.len(), table.files.len());
    Ok(table)
}

/// Loads an NCBI style pipe table, `taxid | parent | rank | ...`.
/// Names are never present in this format.
/// # Errors
/// * if the file cannot be opened or read
pub fn load_nodes_dmp(filename: &Path) -> anyhow::Result<Vec<TaxonNode>> {
    let mut reader = table_reader(filename, b'|', None)?;
    let mut nodes = vec![];
    let label = format!("{filename:?}");
    for_each_row(&mut reader, &label, |record| {
        let taxid = taxid_column(record, 0)?;
        let parent = taxid_column(record, 1)?;
        let rank = column(record, 2)?;
        nodes.push(TaxonNode::new(taxid, parent, rank.to_string(), None));
        Ok(())
    })?;
    Ok(nodes)
}

/// The class column of a names table
#[derive(Clone, Debug, Eq, PartialEq, strum_macros::EnumString)]
pub enum NameClass {
    #[strum(serialize = "scientific name")]
    ScientificName,
    #[strum(serialize = "synonym")]
    Synonym,
    #[strum(serialize = "authority")]
    Authority,
    #[strum(serialize = "equivalent name")]
    EquivalentName,
    #[strum(serialize = "genbank synonym")]
    GenbankSynonym,
    #[strum(serialize = "genbank anamorph")]
    GenbankAnamorph,
    #[strum(serialize = "genbank common name")]
    GenbankCommonName,
    #[strum(serialize = "common name")]
    CommonName,
    #[strum(serialize = "includes")]
    Includes,
    /// Anything else, e.g. "type material" or "acronym"
    #[strum(default)]
    Other(String),
}

impl NameClass {
    /// True for the classes that act as alternate spellings of the scientific name
    pub fn is_synonym(&self) -> bool {
        !matches!(self, NameClass::ScientificName | NameClass::Other(_))
    }
}

/// One row of a names table
#[derive(Clone, Debug, PartialEq)]
pub struct NameRow {
    pub taxid: TaxId,
    pub name: String,
    pub unique_name: String,
    pub class: NameClass,
}

/// Loads an NCBI style names table, `taxid | name | unique_name | name_class |`
/// # Errors
/// * if the file cannot be opened or read
pub fn load_names_dmp(filename: &Path) -> anyhow::Result<Vec<NameRow>> {
    let mut reader = table_reader(filename, b'|', None)?;
    let mut rows = vec![];
    let label = format!("{filename:?}");
    for_each_row(&mut reader, &label, |record| {
        let taxid = parse_taxid(column(record, 0)?)?;
        let name = column(record, 1)?;
        if name.is_empty() {
            return Err(RowError::Ignored { reason: "empty name" });
        }
        let unique_name = record.get(2).unwrap_or_default().trim();
        let class_str = column(record, 3)?;
        let class = class_str.parse::<NameClass>()
            .unwrap_or_else(|_e| NameClass::Other(class_str.to_string()));
        rows.push(NameRow {
            taxid,
            name: name.to_string(),
            unique_name: unique_name.to_string(),
            class
        });
        Ok(())
    })?;
    Ok(rows)
}
