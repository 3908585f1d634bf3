
/*!
# Abundance metrics
Compares a predicted abundance profile with the truth profile at each configured rank.

Conventions:
* every distribution is normalized to sum to 100, so L1 is in percentage points (0-200)
* total variation and Bray-Curtis are both L1 / 200; on two distributions with equal totals they coincide
* presence uses the normalized value, a taxon is present if its value is strictly above the threshold
*/

use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use strum::IntoEnumIterator;

use crate::data_types::abundance::AbundanceProfile;
use crate::data_types::match_policy::MatchPolicy;
use crate::data_types::metrics_map::MetricsMap;
use crate::data_types::summary_metrics::SummaryMetrics;
use crate::data_types::taxon::{TaxId, UNKNOWN_TAXID};
use crate::evaluator::MetricsConfig;
use crate::taxonomy::{RankMapper, Taxonomy};

/// `taxid -> mass` at one rank; ordered so sums are reproducible
pub type Distribution = BTreeMap<TaxId, f64>;

/// Every distribution is rescaled to this total
pub const NORMALIZED_TOTAL: f64 = 100.0;

/// One side of the comparison at a single rank
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RankDistribution {
    /// Mass that landed on a taxon at this rank
    pub mapped: Distribution,
    /// Mass that could not be placed at this rank
    pub unmapped_mass: f64,
}

impl RankDistribution {
    pub fn mapped_mass(&self) -> f64 {
        self.mapped.values().sum()
    }

    pub fn total_mass(&self) -> f64 {
        self.mapped_mass() + self.unmapped_mass
    }

    /// Fraction of the mass that is unmapped, 0.0 for an empty side
    pub fn unmapped_ratio(&self) -> f64 {
        let total = self.total_mass();
        if total > 0.0 {
            self.unmapped_mass / total
        } else {
            0.0
        }
    }

    /// Mapped distribution with the unmapped mass added under [`UNKNOWN_TAXID`]
    pub fn with_unknown_bucket(&self) -> Distribution {
        let mut distribution = self.mapped.clone();
        if self.unmapped_mass > 0.0 {
            *distribution.entry(UNKNOWN_TAXID).or_insert(0.0) += self.unmapped_mass;
        }
        distribution
    }
}

/// Places every entry of a profile at `rank`.
/// Entries with an asserted rank only count at that rank, under their own taxid; other entries go through the rank mapper.
/// Mass that cannot be placed, is not covered, or never resolved to a taxid is unmapped.
pub fn distribute_to_rank(profile: &AbundanceProfile, mapper: &RankMapper, rank: &str) -> RankDistribution {
    let mut result = RankDistribution {
        mapped: Distribution::new(),
        unmapped_mass: profile.unresolved_mass()
    };
    for entry in profile.entries().iter() {
        let placed = match entry.rank.as_deref() {
            Some(asserted) if asserted != rank => continue,
            Some(_) => mapper.is_covered(rank, entry.taxid).then_some(entry.taxid),
            None => mapper.map(entry.taxid, rank),
        };
        match placed {
            Some(taxid) => *result.mapped.entry(taxid).or_insert(0.0) += entry.mass,
            None => result.unmapped_mass += entry.mass,
        }
    }
    result
}

/// Rescales a distribution to sum to [`NORMALIZED_TOTAL`]; an empty total is returned unchanged
pub fn normalize(distribution: &Distribution) -> Distribution {
    let total: f64 = distribution.values().sum();
    if total == 0.0 {
        return distribution.clone();
    }
    distribution.iter()
        .map(|(&taxid, &mass)| (taxid, mass * NORMALIZED_TOTAL / total))
        .collect()
}

/// Sorted union of the keys of both distributions
fn key_union(a: &Distribution, b: &Distribution) -> BTreeSet<TaxId> {
    a.keys().chain(b.keys()).copied().collect()
}

/// Sum of absolute differences over the key union
pub fn l1_distance(a: &Distribution, b: &Distribution) -> f64 {
    key_union(a, b).into_iter()
        .map(|taxid| {
            let va = a.get(&taxid).copied().unwrap_or(0.0);
            let vb = b.get(&taxid).copied().unwrap_or(0.0);
            (va - vb).abs()
        })
        .sum()
}

/// Presence/absence confusion over the key union
/// # Arguments
/// * `truth` - normalized truth distribution
/// * `predicted` - normalized predicted distribution
/// * `threshold` - a taxon is present if its value is strictly greater
pub fn presence_confusion(truth: &Distribution, predicted: &Distribution, threshold: f64) -> SummaryMetrics {
    let mut summary = SummaryMetrics::default();
    for taxid in key_union(truth, predicted) {
        let truth_present = truth.get(&taxid).is_some_and(|&v| v > threshold);
        let predicted_present = predicted.get(&taxid).is_some_and(|&v| v > threshold);
        match (truth_present, predicted_present) {
            (true, true) => summary.add_match(),
            (false, true) => summary.add_mismatch(),
            (true, false) => summary.add_missing(),
            (false, false) => {}
        }
    }
    summary
}

/// Moves every predicted taxon onto its nearest ancestor that is a truth key, summing masses that land together
pub fn collapse_onto_truth(predicted: &Distribution, truth: &Distribution, taxonomy: &Taxonomy) -> Distribution {
    let truth_keys: BTreeSet<TaxId> = truth.keys().copied().collect();
    let mut collapsed = Distribution::new();
    for (&taxid, &mass) in predicted.iter() {
        let target = taxonomy.collapse_to(taxid, &truth_keys);
        *collapsed.entry(target).or_insert(0.0) += mass;
    }
    collapsed
}

/// Adds distance and presence metrics for one policy at one rank
fn insert_comparison(metrics: &mut MetricsMap, policy: MatchPolicy, rank: &str, unk: bool, truth: &Distribution, predicted: &Distribution, config: &MetricsConfig) {
    let l1 = l1_distance(truth, predicted);
    // identical under normalized totals, reported separately for downstream consumers
    let tv = l1 / (2.0 * NORMALIZED_TOTAL);
    let bray_curtis = l1 / (2.0 * NORMALIZED_TOTAL);
    metrics.insert(policy.metric_key("abundance_l1", rank, unk), l1);
    metrics.insert(policy.metric_key("abundance_tv", rank, unk), tv);
    metrics.insert(policy.metric_key("abundance_bc", rank, unk), bray_curtis);

    let presence = presence_confusion(truth, predicted, config.presence_threshold());
    metrics.insert_scores(policy, "presence", rank, unk, &presence);
}

/// Compares the truth and predicted profiles at every configured rank, under both policies.
/// The descendant-aware comparison collapses predictions onto truth keys first; the exact one does not.
pub fn compute_abundance_metrics(truth: &AbundanceProfile, predicted: &AbundanceProfile, mapper: &RankMapper, config: &MetricsConfig) -> MetricsMap {
    let mut metrics = MetricsMap::new();
    let enable_unk = config.unk_metrics() || mapper.has_coverage();

    for rank in config.ranks().iter() {
        let truth_rank = distribute_to_rank(truth, mapper, rank);
        let predicted_rank = distribute_to_rank(predicted, mapper, rank);
        if truth_rank.total_mass() == 0.0 && predicted_rank.total_mass() == 0.0 {
            debug!("No abundance mass at {rank}, skipping");
            continue;
        }

        metrics.insert(format!("truth_mapped_mass_{rank}"), truth_rank.mapped_mass());
        metrics.insert(format!("truth_unmapped_mass_{rank}"), truth_rank.unmapped_mass);
        metrics.insert(format!("pred_mapped_mass_{rank}"), predicted_rank.mapped_mass());
        metrics.insert(format!("pred_unmapped_mass_{rank}"), predicted_rank.unmapped_mass);
        metrics.insert(format!("truth_unmapped_ratio_{rank}"), truth_rank.unmapped_ratio());
        metrics.insert(format!("pred_unmapped_ratio_{rank}"), predicted_rank.unmapped_ratio());

        let mut variants: Vec<(bool, Distribution, Distribution)> = vec![];
        if !truth_rank.mapped.is_empty() || !predicted_rank.mapped.is_empty() {
            variants.push((false, truth_rank.mapped.clone(), predicted_rank.mapped.clone()));
        }
        if enable_unk {
            variants.push((true, truth_rank.with_unknown_bucket(), predicted_rank.with_unknown_bucket()));
        }

        for (unk, truth_distribution, predicted_distribution) in variants.into_iter() {
            let truth_norm = normalize(&truth_distribution);
            for policy in MatchPolicy::iter() {
                let predicted_norm = match policy {
                    MatchPolicy::DescendantAware => normalize(&collapse_onto_truth(&predicted_distribution, &truth_distribution, mapper.taxonomy())),
                    MatchPolicy::ExactRank => normalize(&predicted_distribution),
                };
                insert_comparison(&mut metrics, policy, rank, unk, &truth_norm, &predicted_norm, config);
            }
        }
    }

    if !metrics.is_empty() {
        metrics.insert("truth_unresolved_entries", truth.unresolved_count() as f64);
        metrics.insert("pred_unresolved_entries", predicted.unresolved_count() as f64);
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;
    use crate::data_types::abundance::AbundanceEntry;
    use crate::data_types::coverage::CoverageSet;
    use crate::data_types::taxon::TaxonNode;
    use crate::evaluator::MetricsConfigBuilder;

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

    fn profile_of(entries: Vec<AbundanceEntry>) -> AbundanceProfile {
        let mut profile = AbundanceProfile::new();
        for e in entries {
            profile.push(e);
        }
        profile
    }

    fn dist(values: &[(TaxId, f64)]) -> Distribution {
        values.iter().copied().collect()
    }

    #[test]
    fn test_normalize() {
        let n = normalize(&dist(&[(3, 1.0), (5, 3.0)]));
        assert_approx_eq!(n[&3], 25.0);
        assert_approx_eq!(n[&5], 75.0);
        let empty = normalize(&dist(&[(3, 0.0)]));
        assert_eq!(empty, dist(&[(3, 0.0)]));
    }

    #[test]
    fn test_l1_symmetric() {
        let a = dist(&[(1, 10.0), (2, 30.0), (3, 60.0)]);
        let b = dist(&[(2, 45.5), (4, 54.5)]);
        assert_eq!(l1_distance(&a, &b), l1_distance(&b, &a));
        assert_approx_eq!(l1_distance(&a, &b), 10.0 + 15.5 + 60.0 + 54.5);
    }

    #[test]
    fn test_presence_threshold() {
        let truth = dist(&[(1, 50.0), (2, 50.0)]);
        let predicted = dist(&[(1, 99.0), (2, 0.5), (3, 0.5)]);
        assert_eq!(presence_confusion(&truth, &predicted, 0.0), SummaryMetrics::new(2, 1, 0));
        assert_eq!(presence_confusion(&truth, &predicted, 1.0), SummaryMetrics::new(1, 0, 1));
    }

    #[test]
    fn test_unmapped_prediction_scenario() {
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let truth = profile_of(vec![AbundanceEntry::unranked(3, 1.0)]);
        let predicted = profile_of(vec![
            AbundanceEntry::ranked(3, "species", 50.0),
            AbundanceEntry::ranked(999, "species", 50.0),
        ]);
        let metrics = compute_abundance_metrics(&truth, &predicted, &mapper, &MetricsConfig::default());

        assert_approx_eq!(metrics.get("presence_precision_species").unwrap(), 0.5);
        assert_approx_eq!(metrics.get("presence_recall_species").unwrap(), 1.0);
        assert_approx_eq!(metrics.get("abundance_l1_species").unwrap(), 100.0);
        assert_approx_eq!(metrics.get("abundance_bc_species").unwrap(), 0.5);
        assert_approx_eq!(metrics.get("exact_abundance_tv_species").unwrap(), 0.5);
        assert!(metrics.keys().all(|k| !k.ends_with("_unk")));
        // the ranked species rows say nothing about genus
        assert_eq!(metrics.get("pred_mapped_mass_genus"), Some(0.0));
    }

    #[test]
    fn test_identical_distributions() {
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let truth = profile_of(vec![AbundanceEntry::unranked(3, 0.3), AbundanceEntry::unranked(5, 0.7)]);
        let predicted = profile_of(vec![AbundanceEntry::unranked(3, 30.0), AbundanceEntry::unranked(5, 70.0)]);
        let metrics = compute_abundance_metrics(&truth, &predicted, &mapper, &MetricsConfig::default());
        for rank in ["species", "genus"] {
            assert_eq!(metrics.get(&format!("abundance_l1_{rank}")).map(|v| v < 1e-9), Some(true));
            assert_approx_eq!(metrics.get(&format!("presence_f1_{rank}")).unwrap(), 1.0);
            assert_approx_eq!(metrics.get(&format!("exact_presence_f1_{rank}")).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_collapse_onto_truth() {
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let config = MetricsConfigBuilder::default()
            .ranks(vec!["species".to_string()])
            .build().unwrap();
        // 6 is finer than the truth and sits below 3
        let truth = profile_of(vec![AbundanceEntry::unranked(3, 100.0)]);
        let predicted = profile_of(vec![AbundanceEntry::unranked(6, 100.0)]);
        let metrics = compute_abundance_metrics(&truth, &predicted, &mapper, &config);
        assert_eq!(metrics.get("abundance_l1_species"), Some(0.0));
        assert_approx_eq!(metrics.get("exact_abundance_l1_species").unwrap(), 200.0);
        assert_eq!(metrics.get("exact_presence_precision_species"), Some(0.0));
        assert!(!metrics.contains_key("abundance_l1_genus"));

        let collapsed = collapse_onto_truth(&dist(&[(6, 10.0), (3, 5.0), (5, 1.0)]), &dist(&[(3, 1.0)]), &taxonomy);
        assert_eq!(collapsed, dist(&[(3, 15.0), (5, 1.0)]));
    }

    #[test]
    fn test_unknown_bucket() {
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let config = MetricsConfigBuilder::default()
            .ranks(vec!["species".to_string()])
            .unk_metrics(true)
            .build().unwrap();
        let mut truth = profile_of(vec![AbundanceEntry::unranked(3, 80.0)]);
        truth.add_unresolved(20.0);
        let predicted = profile_of(vec![AbundanceEntry::unranked(3, 50.0), AbundanceEntry::unranked(999, 50.0)]);
        let metrics = compute_abundance_metrics(&truth, &predicted, &mapper, &config);

        assert_eq!(metrics.get("abundance_l1_species"), Some(0.0));
        assert_approx_eq!(metrics.get("abundance_l1_species_unk").unwrap(), 60.0);
        assert_approx_eq!(metrics.get("exact_abundance_l1_species_unk").unwrap(), 60.0);
        assert_approx_eq!(metrics.get("presence_f1_species_unk").unwrap(), 1.0);
        assert_approx_eq!(metrics.get("truth_unmapped_ratio_species").unwrap(), 0.2);
        assert_approx_eq!(metrics.get("pred_unmapped_ratio_species").unwrap(), 0.5);
        assert_approx_eq!(metrics.get("pred_unmapped_mass_species").unwrap(), 50.0);
        assert_eq!(metrics.get("truth_unresolved_entries"), Some(1.0));
    }

    #[test]
    fn test_coverage_moves_mass_to_unmapped() {
        let taxonomy = fixture_taxonomy();
        let ranks = vec!["species".to_string()];
        let coverage = CoverageSet::from_targets(&[3], &taxonomy, &ranks);
        let mapper = RankMapper::new(&taxonomy, Some(&coverage));
        let predicted = profile_of(vec![
            AbundanceEntry::ranked(3, "species", 75.0),
            AbundanceEntry::ranked(5, "species", 25.0),
        ]);
        let distribution = distribute_to_rank(&predicted, &mapper, "species");
        assert_eq!(distribution.mapped, dist(&[(3, 75.0)]));
        assert_approx_eq!(distribution.unmapped_mass, 25.0);
        assert_eq!(distribution.with_unknown_bucket(), dist(&[(UNKNOWN_TAXID, 25.0), (3, 75.0)]));
    }

    #[test]
    fn test_empty_profiles() {
        let taxonomy = fixture_taxonomy();
        let mapper = RankMapper::new(&taxonomy, None);
        let metrics = compute_abundance_metrics(&AbundanceProfile::new(), &AbundanceProfile::new(), &mapper, &MetricsConfig::default());
        assert!(metrics.is_empty());
    }
}
