
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data_types::match_policy::MatchPolicy;
use crate::data_types::summary_metrics::SummaryMetrics;

/// Version of the metric key layout, bump whenever keys are added, renamed, or change meaning
pub const METRIC_VERSION: f64 = 2.0;
/// Key holding [`METRIC_VERSION`] in every non-empty result
pub const METRIC_VERSION_KEY: &str = "metric_version";

/// The flat metric result of one evaluation.
/// Insertion order is preserved so repeated runs serialize identically.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricsMap {
    values: IndexMap<String, f64>,
}

impl MetricsMap {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, overwriting any previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    /// Adds the precision, recall, and F1 of `summary` under the given policy, family prefix, and rank.
    /// # Arguments
    /// * `policy` - determines the `exact_` prefix
    /// * `family` - family prefix, e.g. `per_read` or `presence`
    /// * `rank` - the rank the counts were collected at
    /// * `unk` - if true, keys get the UNK suffix
    /// * `summary` - the confusion counts
    pub fn insert_scores(&mut self, policy: MatchPolicy, family: &str, rank: &str, unk: bool, summary: &SummaryMetrics) {
        self.insert(policy.metric_key(&format!("{family}_precision"), rank, unk), summary.precision());
        self.insert(policy.metric_key(&format!("{family}_recall"), rank, unk), summary.recall());
        self.insert(policy.metric_key(&format!("{family}_f1"), rank, unk), summary.f1());
    }

    /// Adds the raw TP/FP/FN counts of `summary`
    pub fn insert_counts(&mut self, policy: MatchPolicy, family: &str, rank: &str, unk: bool, summary: &SummaryMetrics) {
        self.insert(policy.metric_key(&format!("{family}_tp"), rank, unk), summary.tp as f64);
        self.insert(policy.metric_key(&format!("{family}_fp"), rank, unk), summary.fp as f64);
        self.insert(policy.metric_key(&format!("{family}_fn"), rank, unk), summary.fn_ as f64);
    }

    /// Moves all values from `other` into this map
    pub fn extend(&mut self, other: MetricsMap) {
        self.values.extend(other.values);
    }

    /// Adds the version marker; callers only do this once some metric was produced
    pub fn stamp_version(&mut self) {
        self.insert(METRIC_VERSION_KEY, METRIC_VERSION);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_and_counts() {
        let mut metrics = MetricsMap::new();
        let summary = SummaryMetrics::new(1, 1, 0);
        metrics.insert_scores(MatchPolicy::ExactRank, "per_read", "species", false, &summary);
        metrics.insert_counts(MatchPolicy::DescendantAware, "per_read", "species", true, &summary);

        assert_eq!(metrics.get("exact_per_read_precision_species"), Some(0.5));
        assert_eq!(metrics.get("exact_per_read_recall_species"), Some(1.0));
        assert_eq!(metrics.get("per_read_tp_species_unk"), Some(1.0));
        assert_eq!(metrics.get("per_read_fn_species_unk"), Some(0.0));
        assert_eq!(metrics.len(), 6);
    }

    #[test]
    fn test_order_and_serialization() {
        let mut metrics = MetricsMap::new();
        metrics.insert("zeta", 1.0);
        metrics.insert("alpha", 2.0);
        metrics.stamp_version();
        let keys: Vec<&str> = metrics.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", METRIC_VERSION_KEY]);

        let json = serde_json::to_string(&metrics).unwrap();
        assert_eq!(json, "{\"zeta\":1.0,\"alpha\":2.0,\"metric_version\":2.0}");
    }
}
