
/*!
# Name reconciliation
Resolves species names from text profiles to taxids, tolerating synonyms and alternate spellings.
Every name goes through [`canonicalize`] before it is stored or looked up.
*/

use itertools::Itertools;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::data_types::taxon::TaxId;
use crate::parsing::taxonomy_tables::{NameClass, NameRow};
use crate::taxonomy::Taxonomy;

lazy_static! {
    /// Matches one parenthetical group at the end of a name, e.g. " (ATCC 123)" or " (ex (DSM 1))".
    /// One level of nesting is handled; deeper groups are left in place.
    static ref TRAILING_PARENTHETICAL: Regex = Regex::new(r"\s*\((?:[^()]|\([^()]*\))*\)\s*$").unwrap();
}

/// Underscores become spaces and whitespace runs collapse to one space
pub fn canonicalize(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .join(" ")
}

/// Removes a trailing parenthetical group, if there is one
fn strip_parenthetical(name: &str) -> String {
    TRAILING_PARENTHETICAL.replace(name, "").trim().to_string()
}

/// The raw lookup tables built from a names table
#[derive(Clone, Debug, Default)]
pub struct NameMaps {
    /// Primary scientific name of each taxid
    pub taxid_to_sciname: HashMap<TaxId, String>,
    /// Alternate spelling to scientific name
    pub synonym_to_sciname: HashMap<String, String>,
    /// Every scientific name
    pub sciname_set: HashSet<String>,
}

/// Builds the name tables from names rows.
/// The first scientific name per taxid wins, and the first registration of any synonym wins.
/// Each synonym is also registered without its trailing parenthetical and, when it has parentheses, as its first two words.
pub fn build_name_maps(rows: &[NameRow]) -> NameMaps {
    let mut maps = NameMaps::default();
    for row in rows.iter().filter(|r| r.class == NameClass::ScientificName) {
        let name = canonicalize(&row.name);
        maps.taxid_to_sciname.entry(row.taxid).or_insert_with(|| name.clone());
        maps.sciname_set.insert(name);
    }

    for row in rows.iter().filter(|r| r.class.is_synonym()) {
        let Some(sciname) = maps.taxid_to_sciname.get(&row.taxid) else {
            continue;
        };
        let name = canonicalize(&row.name);
        let mut forms = vec![strip_parenthetical(&name)];
        if name.contains('(') {
            forms.push(name.split(' ').take(2).join(" "));
        }
        forms.insert(0, name);

        for form in forms.into_iter().filter(|f| !f.is_empty()) {
            maps.synonym_to_sciname.entry(form).or_insert_with(|| sciname.clone());
        }
    }
    maps
}

/// `(rank, name) -> taxid` lookup with synonym fallback
#[derive(Clone, Debug, Default)]
pub struct NameIndex {
    /// Direct lookup keyed on rank and canonical scientific name
    by_rank: HashMap<(String, String), TaxId>,
    /// The tables this index was built from
    maps: NameMaps,
}

impl NameIndex {
    /// Combines name tables with the taxonomy ranks.
    /// Homonyms at one rank keep the taxid that was registered first.
    pub fn new(maps: NameMaps, taxonomy: &Taxonomy) -> Self {
        let mut by_rank: HashMap<(String, String), TaxId> = HashMap::default();
        // sorted so homonym resolution does not depend on hash order
        for (taxid, name) in maps.taxid_to_sciname.iter().sorted_by_key(|(t, _n)| **t) {
            if let Some(node) = taxonomy.get(*taxid) {
                by_rank.entry((node.rank().to_string(), name.clone())).or_insert(*taxid);
            }
        }
        debug!("Name index: {} ranked names, {} synonyms", by_rank.len(), maps.synonym_to_sciname.len());
        Self { by_rank, maps }
    }

    /// Builds the index from a names table
    pub fn from_rows(rows: &[NameRow], taxonomy: &Taxonomy) -> Self {
        Self::new(build_name_maps(rows), taxonomy)
    }

    /// Builds the index from the names embedded in the taxonomy table; may be empty
    pub fn from_taxonomy(taxonomy: &Taxonomy) -> Self {
        let mut maps = NameMaps::default();
        for node in taxonomy.nodes() {
            if let Some(name) = node.name() {
                let name = canonicalize(name);
                maps.taxid_to_sciname.insert(node.taxid(), name.clone());
                maps.sciname_set.insert(name);
            }
        }
        Self::new(maps, taxonomy)
    }

    /// Looks up a name at a rank; on a miss the name is translated through the synonym table.
    /// Never fails, unknown names give None.
    pub fn taxid_for_name(&self, name: &str, rank: &str) -> Option<TaxId> {
        let name = canonicalize(name);
        let stripped = strip_parenthetical(&name);
        let direct = |n: &str| self.by_rank.get(&(rank.to_string(), n.to_string())).copied();

        direct(&name)
            .or_else(|| {
                [&name, &stripped].into_iter()
                    .filter_map(|candidate| self.maps.synonym_to_sciname.get(candidate.as_str()))
                    .find_map(|sciname| direct(sciname))
            })
            .or_else(|| direct(&stripped))
    }

    /// Scientific name of a taxid, if known
    pub fn scientific_name(&self, taxid: TaxId) -> Option<&str> {
        self.maps.taxid_to_sciname.get(&taxid).map(|s| s.as_str())
    }

    pub fn is_scientific_name(&self, name: &str) -> bool {
        self.maps.sciname_set.contains(&canonicalize(name))
    }

    pub fn is_empty(&self) -> bool {
        self.by_rank.is_empty()
    }
}
