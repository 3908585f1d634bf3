
use rustc_hash::FxHashMap;

use crate::data_types::taxon::TaxId;

/// Truth assignment of every read (or contig) to exactly one taxon
pub type TruthReads = FxHashMap<String, TaxId>;

/// Classifier output per read; None means the read was left unassigned
pub type ReadPredictions = FxHashMap<String, Option<TaxId>>;

/// One parsed row of a per-read classifier output
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadPrediction {
    /// Read identifier as written by the classifier
    pub read_id: String,
    /// Assigned taxon, None if unclassified
    pub taxid: Option<TaxId>,
}

impl ReadPrediction {
    /// Constructor
    pub fn new(read_id: String, taxid: Option<TaxId>) -> Self {
        Self { read_id, taxid }
    }
}

/// Collects prediction rows; a later row for the same read replaces the earlier one
pub fn collect_predictions(rows: impl IntoIterator<Item = ReadPrediction>) -> ReadPredictions {
    rows.into_iter()
        .map(|row| (row.read_id, row.taxid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_predictions() {
        let predictions = collect_predictions(vec![
            ReadPrediction::new("r1".to_string(), Some(3)),
            ReadPrediction::new("r2".to_string(), None),
            ReadPrediction::new("r1".to_string(), Some(5)),
        ]);
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions.get("r1"), Some(&Some(5)));
        assert_eq!(predictions.get("r2"), Some(&None));
    }
}
