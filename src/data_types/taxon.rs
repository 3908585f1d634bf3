
/// Taxonomy identifier. Real identifiers are never negative; the negative space is reserved for sentinels.
pub type TaxId = i64;

/// Reserved class for "no resolvable taxon" in the UNK-aware metrics.
/// Every parser rejects negative identifiers, so this never collides with a loaded taxid.
pub const UNKNOWN_TAXID: TaxId = -1;

/// Ranks that are evaluated when an experiment does not provide its own list
pub const DEFAULT_RANKS: [&str; 2] = ["species", "genus"];

/// Rank label used by the synthetic taxonomy rows that map a reference file onto a taxid
pub const FILE_RANK: &str = "file";

/// Owned copy of [`DEFAULT_RANKS`], mostly for serde defaults
pub fn default_ranks() -> Vec<String> {
    DEFAULT_RANKS.iter().map(|r| r.to_string()).collect()
}

/// A single node in the taxonomy forest
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaxonNode {
    /// Identifier of this node
    taxid: TaxId,
    /// Identifier of the parent; roots point at themselves
    parent: TaxId,
    /// Rank label, e.g. "species" or "no rank"
    rank: String,
    /// Scientific name if the source table carried one
    name: Option<String>,
}

impl TaxonNode {
    /// Constructor
    pub fn new(taxid: TaxId, parent: TaxId, rank: String, name: Option<String>) -> Self {
        Self {
            taxid, parent, rank, name
        }
    }

    /// Replaces the parent and rank, keeping the name
    pub fn set_structure(&mut self, parent: TaxId, rank: String) {
        self.parent = parent;
        self.rank = rank;
    }

    /// Fills in the name if this node does not have one yet
    pub fn set_name_if_missing(&mut self, name: Option<String>) {
        if self.name.is_none() {
            self.name = name;
        }
    }

    /// Roots are their own parent
    pub fn is_root(&self) -> bool {
        self.parent == self.taxid
    }

    // getters
    pub fn taxid(&self) -> TaxId {
        self.taxid
    }

    pub fn parent(&self) -> TaxId {
        self.parent
    }

    pub fn rank(&self) -> &str {
        &self.rank
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_detection() {
        let root = TaxonNode::new(1, 1, "no rank".to_string(), Some("root".to_string()));
        let child = TaxonNode::new(2, 1, "genus".to_string(), None);
        assert!(root.is_root());
        assert!(!child.is_root());
    }

    #[test]
    fn test_structure_override_keeps_name() {
        let mut node = TaxonNode::new(3, 2, "no rank".to_string(), Some("SpeciesA".to_string()));
        node.set_structure(4, "species".to_string());
        node.set_name_if_missing(Some("Other".to_string()));
        assert_eq!(node.parent(), 4);
        assert_eq!(node.rank(), "species");
        assert_eq!(node.name(), Some("SpeciesA"));
    }

    #[test]
    fn test_default_ranks() {
        assert_eq!(default_ranks(), vec!["species".to_string(), "genus".to_string()]);
        assert!(UNKNOWN_TAXID < 0);
    }
}
