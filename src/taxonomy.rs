
/*!
# Taxonomy store
Parent/rank lookups over a taxonomy forest, plus the reference file index that maps genome files onto taxids.
All walks toward the root carry a visited set, so a cyclic table never hangs a lookup.
*/

use log::{debug, warn};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::collections::BTreeSet;
use std::path::Path;

use crate::data_types::coverage::CoverageSet;
use crate::data_types::taxon::{TaxId, TaxonNode};
use crate::parsing::taxonomy_tables::{load_nodes_dmp, load_tax_table};

/// File extensions removed when looking up a reference by its bare name
pub const FASTA_EXTENSIONS: [&str; 6] = [".fna.gz", ".fa.gz", ".fasta.gz", ".fna", ".fa", ".fasta"];

/// Removes one known FASTA extension from the end of a file name
pub fn strip_fasta_extension(name: &str) -> &str {
    FASTA_EXTENSIONS.iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

/// Final path component of a file label, or the label itself
fn base_name(label: &str) -> &str {
    Path::new(label).file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(label)
}

/// Maps reference file labels to taxids.
/// Each label is registered under its full form, its file name, and its file name without FASTA extension.
#[derive(Clone, Debug, Default)]
pub struct FileIndex {
    lookup: HashMap<String, TaxId>,
}

impl FileIndex {
    /// Registers a label; the first registration of any key wins
    pub fn insert(&mut self, label: &str, taxid: TaxId) {
        let base = base_name(label);
        for key in [label, base, strip_fasta_extension(base)] {
            if !key.is_empty() {
                self.lookup.entry(key.to_string()).or_insert(taxid);
            }
        }
    }

    /// Looks up a label by full path, then file name, then file name without FASTA extension
    pub fn lookup(&self, label: &str) -> Option<TaxId> {
        let base = base_name(label);
        [label, base, strip_fasta_extension(base)].into_iter()
            .find_map(|key| self.lookup.get(key).copied())
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

/// Read-only taxonomy forest built once per evaluation
#[derive(Clone, Debug, Default)]
pub struct Taxonomy {
    /// Node lookup by taxid
    nodes: HashMap<TaxId, TaxonNode>,
    /// Reference file labels to taxids
    file_index: FileIndex,
    /// Rows that were dropped because they re-declared a taxid with a different parent or rank
    conflicts: u64,
}

impl Taxonomy {
    /// Builds a taxonomy from nodes in load order.
    /// A taxid that shows up again with a different parent or rank keeps its first definition.
    pub fn from_nodes(nodes: impl IntoIterator<Item = TaxonNode>) -> Self {
        let mut taxonomy = Self::default();
        for node in nodes {
            taxonomy.insert_first(node);
        }
        if taxonomy.conflicts > 0 {
            warn!("Skipped {} conflicting taxonomy rows, the first definition of each taxid was kept", taxonomy.conflicts);
        }
        taxonomy
    }

    /// Loads a tab taxonomy table, including its embedded names and file rows
    /// # Errors
    /// * if the table cannot be opened or read
    pub fn from_tax_table(filename: &Path) -> anyhow::Result<Self> {
        let table = load_tax_table(filename)?;
        let mut taxonomy = Self::from_nodes(table.nodes);
        for (label, taxid) in table.files.iter() {
            taxonomy.add_file(label, *taxid);
        }
        debug!("Taxonomy {filename:?}: {} nodes, {} file keys", taxonomy.len(), taxonomy.file_index.len());
        Ok(taxonomy)
    }

    /// Replaces parent and rank of every taxid in the pipe table, adding unknown taxids.
    /// Names and the file index are kept.
    /// # Errors
    /// * if the table cannot be opened or read
    pub fn apply_nodes_dmp(&mut self, filename: &Path) -> anyhow::Result<()> {
        let nodes = load_nodes_dmp(filename)?;
        let overridden = self.override_structure(Self::from_nodes(nodes));
        debug!("Pipe table {filename:?} overrode {overridden} existing nodes");
        Ok(())
    }

    /// Takes the rank structure of `other` for every taxid it contains, returns how many existing nodes changed source
    pub fn override_structure(&mut self, other: Taxonomy) -> usize {
        let mut overridden = 0;
        for (taxid, node) in other.nodes.into_iter() {
            match self.nodes.get_mut(&taxid) {
                Some(existing) => {
                    existing.set_structure(node.parent(), node.rank().to_string());
                    overridden += 1;
                },
                None => {
                    self.nodes.insert(taxid, node);
                }
            }
        }
        overridden
    }

    /// Registers a reference file label
    pub fn add_file(&mut self, label: &str, taxid: TaxId) {
        self.file_index.insert(label, taxid);
    }

    fn insert_first(&mut self, node: TaxonNode) {
        match self.nodes.get_mut(&node.taxid()) {
            Some(existing) => {
                if existing.parent() != node.parent() || existing.rank() != node.rank() {
                    self.conflicts += 1;
                } else {
                    existing.set_name_if_missing(node.name().map(|n| n.to_string()));
                }
            },
            None => {
                self.nodes.insert(node.taxid(), node);
            }
        }
    }

    /// Iterates from `taxid` (inclusive) toward the root
    pub fn lineage(&self, taxid: TaxId) -> Lineage<'_> {
        Lineage {
            taxonomy: self,
            next: Some(taxid),
            visited: HashSet::default()
        }
    }

    /// Returns the ancestor of `taxid` (possibly itself) that has the given rank.
    /// Missing nodes, roots without that rank, and cycles all give None.
    pub fn rank_of(&self, taxid: TaxId, rank: &str) -> Option<TaxId> {
        self.lineage(taxid)
            .find(|node| node.rank() == rank)
            .map(|node| node.taxid())
    }

    /// True if `ancestor` is on the lineage of `taxid`; every present taxid is its own descendant
    pub fn is_descendant(&self, taxid: TaxId, ancestor: TaxId) -> bool {
        self.lineage(taxid).any(|node| node.taxid() == ancestor)
    }

    /// Returns the nearest node on the lineage of `taxid` (inclusive) that is in `keys`, or `taxid` itself
    pub fn collapse_to(&self, taxid: TaxId, keys: &BTreeSet<TaxId>) -> TaxId {
        self.lineage(taxid)
            .map(|node| node.taxid())
            .find(|t| keys.contains(t))
            .unwrap_or(taxid)
    }

    /// Resolves a reference file label through the file index
    pub fn taxid_for_file(&self, label: &str) -> Option<TaxId> {
        self.file_index.lookup(label)
    }

    // getters
    pub fn get(&self, taxid: TaxId) -> Option<&TaxonNode> {
        self.nodes.get(&taxid)
    }

    pub fn contains(&self, taxid: TaxId) -> bool {
        self.nodes.contains_key(&taxid)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaxonNode> {
        self.nodes.values()
    }

    pub fn file_index(&self) -> &FileIndex {
        &self.file_index
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Walk from a node toward its root. Stops after a root, at a missing parent, or on a revisit.
pub struct Lineage<'a> {
    taxonomy: &'a Taxonomy,
    next: Option<TaxId>,
    visited: HashSet<TaxId>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = &'a TaxonNode;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if !self.visited.insert(current) {
            // cycle
            return None;
        }
        let node = self.taxonomy.nodes.get(&current)?;
        if !node.is_root() {
            self.next = Some(node.parent());
        }
        Some(node)
    }
}

/// Maps taxids onto a rank, optionally restricted to a coverage set
#[derive(Clone, Copy, Debug)]
pub struct RankMapper<'a> {
    taxonomy: &'a Taxonomy,
    coverage: Option<&'a CoverageSet>,
}

impl<'a> RankMapper<'a> {
    /// Constructor
    pub fn new(taxonomy: &'a Taxonomy, coverage: Option<&'a CoverageSet>) -> Self {
        Self { taxonomy, coverage }
    }

    /// Rank ancestor of `taxid`, or None if it has none or the ancestor is not covered
    pub fn map(&self, taxid: TaxId, rank: &str) -> Option<TaxId> {
        let mapped = self.taxonomy.rank_of(taxid, rank)?;
        match self.coverage {
            Some(coverage) if !coverage.contains(rank, mapped) => None,
            _ => Some(mapped)
        }
    }

    /// True if `taxid` is accepted at this rank as-is, which requires it to be covered when coverage is set
    pub fn is_covered(&self, rank: &str, taxid: TaxId) -> bool {
        self.coverage.map(|c| c.contains(rank, taxid)).unwrap_or(true)
    }

    pub fn taxonomy(&self) -> &'a Taxonomy {
        self.taxonomy
    }

    pub fn has_coverage(&self) -> bool {
        self.coverage.is_some()
    }
}
