
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::data_types::metrics_map::MetricsMap;

/// Accumulates the metrics of one or more runs and writes them in long format
#[derive(Default)]
pub struct MetricsSummaryWriter {
    /// Run label and metrics, in the order they were added
    runs: Vec<(String, MetricsMap)>,
}

/// One row of the summary file
#[derive(Serialize)]
struct MetricsRow<'a> {
    /// Label of the evaluated run
    run_label: &'a str,
    /// Metric key
    metric: &'a str,
    /// Metric value
    value: f64,
}

impl MetricsSummaryWriter {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the metrics of one run
    /// # Arguments
    /// * `run_label` - label written on every row of this run
    /// * `metrics` - the metrics of the run
    pub fn add_run(&mut self, run_label: String, metrics: MetricsMap) {
        self.runs.push((run_label, metrics));
    }

    /// Number of rows that will be written
    pub fn num_rows(&self) -> usize {
        self.runs.iter().map(|(_l, m)| m.len()).sum()
    }

    /// Writes `run_label, metric, value` rows to the given path
    /// # Arguments
    /// * `filename` - the filename for the output (tsv/csv)
    pub fn write_summary(&self, filename: &Path) -> csv::Result<()> {
        // modify the delimiter to "," if it ends with .csv
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;

        for (run_label, metrics) in self.runs.iter() {
            for (metric, value) in metrics.iter() {
                csv_writer.serialize(MetricsRow { run_label, metric, value })?;
            }
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metrics() -> MetricsMap {
        let mut metrics = MetricsMap::new();
        metrics.insert("per_read_precision_species", 1.0);
        metrics.insert("abundance_l1_species", 12.5);
        metrics
    }

    #[test]
    fn test_write_tsv() {
        let folder = tempfile::tempdir().unwrap();
        let out_fn = folder.path().join("summary.tsv");
        let mut writer = MetricsSummaryWriter::new();
        writer.add_run("ganon_s0".to_string(), sample_metrics());
        writer.add_run("empty".to_string(), MetricsMap::new());
        assert_eq!(writer.num_rows(), 2);
        writer.write_summary(&out_fn).unwrap();

        let content = std::fs::read_to_string(&out_fn).unwrap();
        assert_eq!(content, "run_label\tmetric\tvalue\nganon_s0\tper_read_precision_species\t1.0\nganon_s0\tabundance_l1_species\t12.5\n");
    }

    #[test]
    fn test_write_csv() {
        let folder = tempfile::tempdir().unwrap();
        let out_fn = folder.path().join("summary.csv");
        let mut writer = MetricsSummaryWriter::new();
        writer.add_run("r".to_string(), sample_metrics());
        writer.write_summary(&out_fn).unwrap();

        let content = std::fs::read_to_string(&out_fn).unwrap();
        assert!(content.starts_with("run_label,metric,value\n"));
        assert!(content.contains("r,abundance_l1_species,12.5\n"));
    }
}
