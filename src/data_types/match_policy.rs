
/// How a prediction is compared to the truth at a given rank.
/// Both policies are always reported side by side.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum_macros::Display, strum_macros::EnumIter)]
pub enum MatchPolicy {
    /// Correct if the prediction lies at or below the truth's rank ancestor
    #[strum(serialize = "descendant")]
    DescendantAware,
    /// Correct only if the prediction's own rank ancestor equals the truth's rank ancestor
    #[strum(serialize = "exact")]
    ExactRank,
}

/// Suffix appended to every metric of the UNK-aware variants
pub const UNK_SUFFIX: &str = "_unk";

impl MatchPolicy {
    /// Prefix placed in front of every metric key computed with this policy
    pub fn key_prefix(&self) -> &'static str {
        match self {
            MatchPolicy::DescendantAware => "",
            MatchPolicy::ExactRank => "exact_",
        }
    }

    /// Builds the flat key for a metric family at a rank, e.g. `exact_per_read_recall_genus_unk`
    /// # Arguments
    /// * `family` - the metric family, such as `per_read_precision`
    /// * `rank` - the rank this value was computed at
    /// * `unk` - if true, the key is marked as an UNK-aware value
    pub fn metric_key(&self, family: &str, rank: &str, unk: bool) -> String {
        let suffix = if unk { UNK_SUFFIX } else { "" };
        format!("{}{family}_{rank}{suffix}", self.key_prefix())
    }
}
