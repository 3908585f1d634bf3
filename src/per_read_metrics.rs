
/*!
# Per-read metrics
Scores per-read classifier assignments against truth labels at each configured rank.
Both matching policies are always computed; the UNK-aware variant is added when enabled or when coverage is configured.
*/

use log::debug;
use strum::IntoEnumIterator;

use crate::data_types::match_policy::MatchPolicy;
use crate::data_types::metrics_map::MetricsMap;
use crate::data_types::read_labels::{ReadPredictions, TruthReads};
use crate::data_types::summary_metrics::{ratio, SummaryMetrics};
use crate::data_types::taxon::{TaxId, UNKNOWN_TAXID};
use crate::evaluator::MetricsConfig;
use crate::taxonomy::RankMapper;

/// Metric family prefix of every per-read key
pub const PER_READ_FAMILY: &str = "per_read";

/// How a single truth-mapped read scored
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadOutcome {
    /// The prediction agrees with truth under the policy
    Match,
    /// The prediction maps to a different taxon at this rank
    Mismatch,
    /// The prediction cannot be mapped to this rank at all
    Unmappable,
    /// The read was not classified
    Missing,
}

impl ReadOutcome {
    /// Adds this outcome to the running counts
    fn record(&self, summary: &mut SummaryMetrics) {
        match self {
            ReadOutcome::Match => summary.add_match(),
            ReadOutcome::Mismatch => summary.add_mismatch(),
            ReadOutcome::Unmappable => summary.add_miss(),
            ReadOutcome::Missing => summary.add_missing(),
        }
    }
}

/// Scores one prediction against the truth's rank ancestor.
/// # Arguments
/// * `mapper` - rank mapping, restricted to the coverage set if one is configured
/// * `policy` - matching policy
/// * `rank` - rank being scored
/// * `truth_ancestor` - the truth's rank ancestor, already known to be mapped
/// * `prediction` - the predicted taxid, None if unclassified
pub fn score_read(mapper: &RankMapper, policy: MatchPolicy, rank: &str, truth_ancestor: TaxId, prediction: Option<TaxId>) -> ReadOutcome {
    let Some(predicted) = prediction else {
        return ReadOutcome::Missing;
    };
    let predicted_ancestor = mapper.map(predicted, rank);
    let is_match = match policy {
        MatchPolicy::DescendantAware => mapper.taxonomy().is_descendant(predicted, truth_ancestor),
        MatchPolicy::ExactRank => predicted_ancestor == Some(truth_ancestor),
    };

    if is_match {
        ReadOutcome::Match
    } else if predicted_ancestor.is_some() {
        ReadOutcome::Mismatch
    } else {
        ReadOutcome::Unmappable
    }
}

/// The label a read gets in the UNK-aware variant; anything unmappable becomes [`UNKNOWN_TAXID`]
fn unk_prediction_label(mapper: &RankMapper, policy: MatchPolicy, rank: &str, truth_label: TaxId, prediction: Option<TaxId>) -> TaxId {
    let Some(predicted) = prediction else {
        return UNKNOWN_TAXID;
    };
    if policy == MatchPolicy::DescendantAware
        && truth_label != UNKNOWN_TAXID
        && mapper.taxonomy().is_descendant(predicted, truth_label) {
        return truth_label;
    }
    mapper.map(predicted, rank).unwrap_or(UNKNOWN_TAXID)
}

/// Computes every per-read metric.
/// # Arguments
/// * `truth` - truth label of every read
/// * `predictions` - classifier output, reads absent here are unclassified
/// * `mapper` - rank mapping with optional coverage restriction
/// * `config` - ranks and UNK switch
pub fn compute_per_read_metrics(truth: &TruthReads, predictions: &ReadPredictions, mapper: &RankMapper, config: &MetricsConfig) -> MetricsMap {
    let mut metrics = MetricsMap::new();
    let total = truth.len() as u64;
    if total == 0 {
        return metrics;
    }

    let predicted_taxid = |read_id: &str| predictions.get(read_id).copied().flatten();
    let classified = truth.keys()
        .filter(|read_id| predicted_taxid(read_id.as_str()).is_some())
        .count() as u64;
    metrics.insert("per_read_classified_rate", ratio(classified, total));
    metrics.insert("per_read_unclassified_rate", ratio(total - classified, total));

    let enable_unk = config.unk_metrics() || mapper.has_coverage();
    for rank in config.ranks().iter() {
        // the rank ancestor of every truth read, None when it is excluded at this rank
        let truth_ancestors: Vec<(Option<TaxId>, Option<TaxId>)> = truth.iter()
            .map(|(read_id, &taxid)| (mapper.map(taxid, rank), predicted_taxid(read_id.as_str())))
            .collect();
        let truth_unmapped = truth_ancestors.iter().filter(|(a, _p)| a.is_none()).count();
        metrics.insert(format!("per_read_truth_unmapped_{rank}"), truth_unmapped as f64);

        for policy in MatchPolicy::iter() {
            let mut summary = SummaryMetrics::default();
            for &(truth_ancestor, prediction) in truth_ancestors.iter() {
                if let Some(ancestor) = truth_ancestor {
                    score_read(mapper, policy, rank, ancestor, prediction).record(&mut summary);
                }
            }
            debug!("Per-read {policy} {rank}: {summary:?}");
            metrics.insert_scores(policy, PER_READ_FAMILY, rank, false, &summary);
            metrics.insert_counts(policy, PER_READ_FAMILY, rank, false, &summary);

            if enable_unk {
                let mut unk_summary = SummaryMetrics::default();
                for &(truth_ancestor, prediction) in truth_ancestors.iter() {
                    let truth_label = truth_ancestor.unwrap_or(UNKNOWN_TAXID);
                    let predicted_label = unk_prediction_label(mapper, policy, rank, truth_label, prediction);
                    if predicted_label == truth_label {
                        unk_summary.add_match();
                    } else {
                        unk_summary.add_miss();
                    }
                }
                metrics.insert_scores(policy, PER_READ_FAMILY, rank, true, &unk_summary);
                metrics.insert_counts(policy, PER_READ_FAMILY, rank, true, &unk_summary);
                metrics.insert(
                    policy.metric_key("per_read_accuracy", rank, true),
                    ratio(unk_summary.tp, total)
                );
            }
        }
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;
    use crate::data_types::coverage::CoverageSet;
    use crate::data_types::taxon::TaxonNode;
    use crate::evaluator::MetricsConfigBuilder;
    use crate::taxonomy::Taxonomy;

    /// root 1; genus A 2 with species A 3; genus B 4 with species B 5; species 6 nested under species 3
    fn fixture_taxonomy() -> Taxonomy {
        let node = |t: TaxId, p: TaxId, r: &str| TaxonNode::new(t, p, r.to_string(), None);
        Taxonomy::from_nodes(vec![
            node(1, 1, "no rank"),
            node(2, 1, "genus"),
            node(3, 2, "species"),
            node(4, 1, "genus"),
            node(5, 4, "species"),
            node(6, 3, "species"),
        ])
    }

    fn truth_of(rows: &[(&str, TaxId)]) -> TruthReads {
        rows.iter().map(|(r, t)| (r.to_string(), *t)).collect()
    }

    fn predictions_of(rows: &[(&str, Option<TaxId>)]) -> ReadPredictions {
        rows.iter().map(|(r, t)| (r.to_string(), *t)).collect()
    }

    #[test]
    fn test_classified_subset() {
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let truth = truth_of(&[("c1", 3), ("c2", 5)]);
        let predictions = predictions_of(&[("c1", Some(3)), ("c2", None)]);
        let metrics = compute_per_read_metrics(&truth, &predictions, &mapper, &MetricsConfig::default());

        assert_approx_eq!(metrics.get("per_read_classified_rate").unwrap(), 0.5);
        assert_approx_eq!(metrics.get("per_read_unclassified_rate").unwrap(), 0.5);
        assert_approx_eq!(metrics.get("per_read_precision_species").unwrap(), 1.0);
        assert_approx_eq!(metrics.get("per_read_recall_species").unwrap(), 0.5);
        assert_approx_eq!(metrics.get("exact_per_read_precision_species").unwrap(), 1.0);
        assert_eq!(metrics.get("per_read_fn_genus"), Some(1.0));
        assert_eq!(metrics.get("per_read_truth_unmapped_species"), Some(0.0));
        assert!(metrics.keys().all(|k| !k.ends_with("_unk")));
    }

    #[test]
    fn test_prediction_above_rank() {
        // c2 is predicted at the genus of its species, which does not count at species under either policy
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let truth = truth_of(&[("c1", 3), ("c2", 3)]);
        let predictions = predictions_of(&[("c1", Some(3)), ("c2", Some(2))]);
        let metrics = compute_per_read_metrics(&truth, &predictions, &mapper, &MetricsConfig::default());

        for key in ["per_read_precision_species", "per_read_recall_species", "exact_per_read_precision_species", "exact_per_read_recall_species"] {
            assert_approx_eq!(metrics.get(key).unwrap(), 0.5);
        }
        // both are right at genus
        assert_approx_eq!(metrics.get("per_read_f1_genus").unwrap(), 1.0);
        assert_approx_eq!(metrics.get("exact_per_read_f1_genus").unwrap(), 1.0);
    }

    #[test]
    fn test_nested_species_divergence() {
        // 6 is a species nested under species 3; its own species ancestor is 6
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let truth = truth_of(&[("c1", 3)]);
        let predictions = predictions_of(&[("c1", Some(6))]);
        let metrics = compute_per_read_metrics(&truth, &predictions, &mapper, &MetricsConfig::default());

        assert_approx_eq!(metrics.get("per_read_precision_species").unwrap(), 1.0);
        assert_eq!(metrics.get("exact_per_read_precision_species"), Some(0.0));
        assert_eq!(metrics.get("exact_per_read_fp_species"), Some(1.0));
        assert_eq!(metrics.get("exact_per_read_fn_species"), Some(0.0));
        assert_eq!(score_read(&mapper, MatchPolicy::ExactRank, "species", 3, Some(6)), ReadOutcome::Mismatch);
        assert_eq!(score_read(&mapper, MatchPolicy::DescendantAware, "species", 3, Some(6)), ReadOutcome::Match);
        assert_eq!(score_read(&mapper, MatchPolicy::ExactRank, "species", 3, Some(77)), ReadOutcome::Unmappable);
        assert_eq!(score_read(&mapper, MatchPolicy::ExactRank, "species", 3, None), ReadOutcome::Missing);
    }

    #[test]
    fn test_unk_variant() {
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        // c3 has no species ancestor, c4 is predicted off-tree
        let truth = truth_of(&[("c1", 3), ("c2", 5), ("c3", 2), ("c4", 5)]);
        let predictions = predictions_of(&[("c1", Some(3)), ("c3", Some(4)), ("c4", Some(999))]);
        let config = MetricsConfigBuilder::default()
            .unk_metrics(true)
            .build().unwrap();
        let metrics = compute_per_read_metrics(&truth, &predictions, &mapper, &config);

        // c1 matches; c2 unclassified vs 5; c3 unknown vs unknown; c4 unknown vs 5
        assert_eq!(metrics.get("per_read_tp_species_unk"), Some(2.0));
        assert_eq!(metrics.get("per_read_fp_species_unk"), Some(2.0));
        assert_eq!(metrics.get("per_read_fn_species_unk"), Some(2.0));
        assert_approx_eq!(metrics.get("per_read_accuracy_species_unk").unwrap(), 0.5);
        assert!(metrics.contains_key("exact_per_read_f1_genus_unk"));

        // the regular variant excludes c3
        assert_eq!(metrics.get("per_read_truth_unmapped_species"), Some(1.0));
        assert_eq!(metrics.get("per_read_tp_species"), Some(1.0));
        assert_eq!(metrics.get("per_read_fn_species"), Some(2.0));
        assert_eq!(metrics.get("per_read_fp_species"), Some(1.0));
    }

    #[test]
    fn test_coverage_excludes_truth_and_enables_unk() {
        let taxonomy = fixture_taxonomy();
        let ranks = vec!["species".to_string(), "genus".to_string()];
        let coverage = CoverageSet::from_targets(&[3], &taxonomy, &ranks);
        let mapper = RankMapper::new(&taxonomy, Some(&coverage));
        let truth = truth_of(&[("c1", 3), ("c2", 5)]);
        let predictions = predictions_of(&[("c1", Some(3)), ("c2", Some(5))]);
        let metrics = compute_per_read_metrics(&truth, &predictions, &mapper, &MetricsConfig::default());

        assert_eq!(metrics.get("per_read_truth_unmapped_species"), Some(1.0));
        assert_approx_eq!(metrics.get("per_read_precision_species").unwrap(), 1.0);
        assert_approx_eq!(metrics.get("per_read_recall_species").unwrap(), 1.0);
        // c2 is unknown on both sides once the uncovered species is dropped
        assert_approx_eq!(metrics.get("exact_per_read_accuracy_species_unk").unwrap(), 1.0);
    }

    #[test]
    fn test_idempotent() {
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let truth = truth_of(&[("c1", 3), ("c2", 5), ("c3", 6), ("c4", 2)]);
        let predictions = predictions_of(&[("c1", Some(6)), ("c2", Some(4)), ("c3", Some(3))]);
        let config = MetricsConfigBuilder::default().unk_metrics(true).build().unwrap();
        let first = compute_per_read_metrics(&truth, &predictions, &mapper, &config);
        let second = compute_per_read_metrics(&truth, &predictions, &mapper, &config);
        assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
    }

    #[test]
    fn test_empty_truth() {
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let metrics = compute_per_read_metrics(&TruthReads::default(), &ReadPredictions::default(), &mapper, &MetricsConfig::default());
        assert!(metrics.is_empty());
    }
}
