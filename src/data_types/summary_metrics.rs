
/// Confusion counts for one rank and one matching policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SummaryMetrics {
    /// Number of predictions that agree with truth
    pub tp: u64,
    /// Number of predictions that disagree with truth
    pub fp: u64,
    /// Number of truth entries that were not recovered
    pub fn_: u64,
}

impl SummaryMetrics {
    /// Constructor
    pub fn new(tp: u64, fp: u64, fn_: u64) -> Self {
        Self {
            tp, fp, fn_
        }
    }

    /// Records an agreement
    pub fn add_match(&mut self) {
        self.tp += 1;
    }

    /// Records a prediction that names the wrong taxon
    pub fn add_mismatch(&mut self) {
        self.fp += 1;
    }

    /// Records a truth entry with no prediction at all
    pub fn add_missing(&mut self) {
        self.fn_ += 1;
    }

    /// Records a prediction that is both wrong and a miss, e.g. an unmappable prediction
    pub fn add_miss(&mut self) {
        self.fp += 1;
        self.fn_ += 1;
    }

    /// TP / (TP + FP), 0.0 when nothing was predicted
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// TP / (TP + FN), 0.0 when there was nothing to find
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// Harmonic mean of precision and recall, 0.0 when both are 0.0
    pub fn f1(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        }
    }
}

/// Division that resolves an empty denominator to 0.0
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    #[test]
    fn test_scores() {
        let summary = SummaryMetrics { tp: 10, fp: 5, fn_: 2 };
        assert_approx_eq!(summary.recall(), 10.0 / 12.0);
        assert_approx_eq!(summary.precision(), 10.0 / 15.0);
        let (p, r) = (10.0 / 15.0, 10.0 / 12.0);
        assert_approx_eq!(summary.f1(), 2.0 * p * r / (p + r));
    }

    #[test]
    fn test_zero_division() {
        let empty = SummaryMetrics::default();
        assert_eq!(empty.precision(), 0.0);
        assert_eq!(empty.recall(), 0.0);
        assert_eq!(empty.f1(), 0.0);

        // only misses, precision and recall are both zero but defined
        let misses = SummaryMetrics::new(0, 3, 3);
        assert_eq!(misses.precision(), 0.0);
        assert_eq!(misses.f1(), 0.0);
    }

    #[test]
    fn test_recorders() {
        let mut summary = SummaryMetrics::default();
        summary.add_match();
        summary.add_mismatch();
        summary.add_missing();
        summary.add_miss();
        assert_eq!(summary, SummaryMetrics::new(1, 2, 2));
    }
}
