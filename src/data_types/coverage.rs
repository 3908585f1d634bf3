
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::data_types::taxon::TaxId;
use crate::taxonomy::Taxonomy;

/// The taxa a tool's database can possibly report, resolved per evaluated rank
#[derive(Clone, Debug, Default)]
pub struct CoverageSet {
    by_rank: HashMap<String, HashSet<TaxId>>,
}

impl CoverageSet {
    /// Builds the set from the taxids of the reference targets.
    /// # Arguments
    /// * `targets` - taxids of every reference in the database
    /// * `taxonomy` - used to lift each target to the requested ranks
    /// * `ranks` - ranks to populate; targets without an ancestor at a rank are absent at that rank
    pub fn from_targets(targets: &[TaxId], taxonomy: &Taxonomy, ranks: &[String]) -> Self {
        let by_rank = ranks.iter()
            .map(|rank| {
                let covered: HashSet<TaxId> = targets.iter()
                    .filter_map(|&t| taxonomy.rank_of(t, rank))
                    .collect();
                (rank.clone(), covered)
            })
            .collect();
        Self { by_rank }
    }

    /// True if `taxid` is covered at `rank`
    pub fn contains(&self, rank: &str, taxid: TaxId) -> bool {
        self.by_rank.get(rank)
            .is_some_and(|covered| covered.contains(&taxid))
    }

    /// Number of covered taxa at a rank
    pub fn len_at(&self, rank: &str) -> usize {
        self.by_rank.get(rank).map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::taxon::TaxonNode;

    #[test]
    fn test_from_targets() {
        let taxonomy = Taxonomy::from_nodes(vec![
            TaxonNode::new(1, 1, "no rank".to_string(), None),
            TaxonNode::new(2, 1, "genus".to_string(), None),
            TaxonNode::new(3, 2, "species".to_string(), None),
            TaxonNode::new(8, 3, "strain".to_string(), None),
        ]);
        let ranks = vec!["species".to_string(), "genus".to_string()];
        let coverage = CoverageSet::from_targets(&[8, 2, 404], &taxonomy, &ranks);
        assert!(coverage.contains("species", 3));
        assert!(coverage.contains("genus", 2));
        assert!(!coverage.contains("species", 8));
        assert!(!coverage.contains("family", 2));
        assert_eq!(coverage.len_at("species"), 1);
        assert_eq!(coverage.len_at("genus"), 1);
    }
}
