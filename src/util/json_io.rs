
use anyhow::Context;
use serde::Deserialize;
use std::io::{BufWriter, Write};
use std::fs::File;
use std::path::Path;

use crate::data_types::run_config::RunDescriptor;
use crate::parsing::table_reader::open_text;

/// Deserializes a JSON file, `.gz` files are decompressed first
/// # Arguments
/// * `filename` - the file path to open and parse
/// # Errors
/// * if the file does not open properly
/// * if the deserialization throws errors
pub fn load_json<T: serde::de::DeserializeOwned>(filename: &Path) -> anyhow::Result<T> {
    let reader = open_text(filename)?;
    serde_json::from_reader(reader)
        .with_context(|| format!("Error while deserializing {filename:?}:"))
}

/// Serializes to pretty JSON, compressing if the path ends in `.gz`
/// # Arguments
/// * `data` - the data in memory
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
/// * if JSON serialization throws errors
pub fn save_json<T: serde::Serialize>(data: &T, out_filename: &Path) -> anyhow::Result<()> {
    let file = File::create(out_filename)
        .with_context(|| format!("Error while creating {out_filename:?}:"))?;
    let sink: Box<dyn Write> = if out_filename.extension().unwrap_or_default() == "gz" {
        Box::new(flate2::write::GzEncoder::new(file, flate2::Compression::best()))
    } else {
        Box::new(file)
    };
    let mut writer = BufWriter::new(sink);
    serde_json::to_writer_pretty(&mut writer, data)
        .with_context(|| format!("Error while serializing {out_filename:?}:"))?;
    writer.flush()
        .with_context(|| format!("Error while flushing output to {out_filename:?}:"))?;
    Ok(())
}

/// A manifest is either a list of runs or a single run
#[derive(Deserialize)]
#[serde(untagged)]
enum Manifest {
    Many(Vec<RunDescriptor>),
    One(Box<RunDescriptor>),
}

/// Loads a batch manifest of run descriptors
/// # Errors
/// * if the file does not open or is not a descriptor or list of descriptors
pub fn load_run_manifest(filename: &Path) -> anyhow::Result<Vec<RunDescriptor>> {
    let manifest: Manifest = load_json(filename)
        .with_context(|| format!("Error while loading run manifest {filename:?}:"))?;
    Ok(match manifest {
        Manifest::Many(runs) => runs,
        Manifest::One(run) => vec![*run],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::data_types::metrics_map::MetricsMap;

    #[test]
    fn test_manifest_forms() {
        let folder = tempfile::tempdir().unwrap();
        let list_fn = folder.path().join("runs.json");
        std::fs::write(&list_fn, r#"[
            {"label": "a", "experiment": {"tax_path": "x.tax"}},
            {"experiment": {"tool": "ganon"}, "dataset": {"name": "s1"}}
        ]"#).unwrap();
        let runs = load_run_manifest(&list_fn).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].experiment.taxonomy, Some(PathBuf::from("x.tax")));
        assert_eq!(runs[1].run_label(), "ganon_s1");

        let single_fn = folder.path().join("run.json");
        std::fs::write(&single_fn, r#"{"label": "solo", "outputs": {"classify_tsv": "c.tsv"}}"#).unwrap();
        let runs = load_run_manifest(&single_fn).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_label(), "solo");

        let bad_fn = folder.path().join("bad.json");
        std::fs::write(&bad_fn, "[1, 2]").unwrap();
        assert!(load_run_manifest(&bad_fn).is_err());
    }

    #[test]
    fn test_gz_round_trip() {
        let folder = tempfile::tempdir().unwrap();
        let out_fn = folder.path().join("metrics.json.gz");
        let mut metrics = MetricsMap::new();
        metrics.insert("per_read_f1_species", 0.75);
        save_json(&metrics, &out_fn).unwrap();
        let loaded: MetricsMap = load_json(&out_fn).unwrap();
        assert_eq!(loaded, metrics);
    }
}
