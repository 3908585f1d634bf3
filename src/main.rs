
use indexmap::IndexMap;
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{LevelFilter, debug, error, info, warn};
use rayon::prelude::*;
use std::time::Instant;

use taxbench::cli::batch::{BatchSettings, check_batch_settings};
use taxbench::cli::core::{Commands, get_cli};
use taxbench::cli::evaluate::{EvaluateSettings, check_evaluate_settings};
use taxbench::data_types::metrics_map::MetricsMap;
use taxbench::evaluator::{evaluate, evaluate_with_sources};
use taxbench::util::json_io::{load_run_manifest, save_json};
use taxbench::util::progress_bar::get_progress_style;
use taxbench::writers::metrics_summary::MetricsSummaryWriter;

/// Sets up logging before we check the other settings
fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

/// Writes the summary table and the JSON output if requested, exits on failure
fn write_outputs<T: serde::Serialize>(summary_writer: &MetricsSummaryWriter, json_data: &T, output_tsv: Option<&std::path::Path>, output_json: Option<&std::path::Path>) {
    if let Some(summary_fn) = output_tsv {
        info!("Saving {} metric rows to {summary_fn:?}...", summary_writer.num_rows());
        if let Err(e) = summary_writer.write_summary(summary_fn) {
            error!("Error while saving summary file: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }

    if let Some(json_fn) = output_json {
        info!("Saving metrics to {json_fn:?}...");
        if let Err(e) = save_json(json_data, json_fn) {
            error!("Error while saving metrics JSON: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    }
}

fn run_evaluate(settings: EvaluateSettings) {
    // start the timer
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_evaluate_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    let descriptor = settings.run_descriptor();
    let run_label = descriptor.run_label();
    info!("Evaluating {run_label:?}...");
    let evaluation = evaluate_with_sources(&descriptor.experiment, &descriptor.dataset, &descriptor.outputs);
    if evaluation.metrics.is_empty() {
        warn!("No metrics were produced, check the resolved inputs above");
    }
    for (metric, value) in evaluation.metrics.iter() {
        debug!("\t{metric}: {value}");
    }

    let mut summary_writer = MetricsSummaryWriter::new();
    summary_writer.add_run(run_label, evaluation.metrics.clone());
    write_outputs(&summary_writer, &evaluation.metrics, settings.output_tsv.as_deref(), settings.output_json.as_deref());

    info!("Evaluation completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn run_batch(settings: BatchSettings) {
    // start the timer
    let start_time = Instant::now();
    init_logging(settings.verbosity);

    let settings = match check_batch_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // set up the number of threads for rayon
    match rayon::ThreadPoolBuilder::new().num_threads(settings.threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };

    info!("Loading run manifest...");
    let runs = match load_run_manifest(&settings.manifest) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while loading run manifest: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    info!("Loaded {} runs.", runs.len());

    // each run builds its own indices, so runs share nothing
    info!("Evaluating runs...");
    let progress = ProgressBar::new(runs.len() as u64).with_style(get_progress_style());
    let results: Vec<(String, MetricsMap)> = runs.into_par_iter()
        .progress_with(progress.clone())
        .map(|run| {
            let run_label = run.run_label();
            debug!("Starting {run_label:?}");
            let metrics = evaluate(&run.experiment, &run.dataset, &run.outputs);
            progress.set_message(run_label.clone());
            (run_label, metrics)
        })
        .collect();
    progress.finish_with_message("done");

    let mut summary_writer = MetricsSummaryWriter::new();
    let mut json_results: IndexMap<String, MetricsMap> = IndexMap::new();
    let total_runs = results.len();
    let mut empty_runs = 0;
    for (run_label, metrics) in results.into_iter() {
        if metrics.is_empty() {
            warn!("Run {run_label:?} produced no metrics");
            empty_runs += 1;
        }
        if json_results.contains_key(&run_label) {
            warn!("Duplicate run label {run_label:?}, the JSON output keeps the last one");
        }
        json_results.insert(run_label.clone(), metrics.clone());
        summary_writer.add_run(run_label, metrics);
    }
    info!("Runs with metrics: {} / {total_runs}", total_runs - empty_runs);

    write_outputs(&summary_writer, &json_results, settings.output_tsv.as_deref(), settings.output_json.as_deref());

    info!("Batch completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Evaluate(settings) => {
            run_evaluate(*settings);
        },
        Commands::Batch(settings) => {
            run_batch(*settings);
        }
    }

    info!("Process finished successfully.");
}
