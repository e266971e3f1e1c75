//! Plain-text metrics reports
//!
//! One file per model: `Model: <name>` on the first line, then one
//! `Key: value` line per metric. A reporting side channel, not state.

use crate::error::Result;
use crate::ml::metrics::MetricSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Write the metrics report for a model, creating parent directories
pub fn write_metrics_report(path: &Path, metric_set: &MetricSet) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = String::new();
    let _ = writeln!(out, "Model: {}", metric_set.model);
    for (key, value) in metric_set.entries() {
        let _ = writeln!(out, "{key}: {value}");
    }
    fs::write(path, out)?;
    Ok(())
}
