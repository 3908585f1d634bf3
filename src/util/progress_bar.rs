
use indicatif::{ProgressState, ProgressStyle};

/// Shared progress bar styling for batch evaluations; `{msg}` carries the label of the last finished run
pub fn get_progress_style() -> ProgressStyle {
    ProgressStyle::with_template("[{elapsed_precise}] {bar:40.green/white} {pos}/{len} runs ({percent}); ETA: {eta_precise}; {msg}")
        .unwrap()
        .with_key("percent", |state: &ProgressState, w: &mut dyn std::fmt::Write| write!(w, "{:.1}%", state.fraction()*100.0).unwrap())
        .progress_chars("=>-")
}
