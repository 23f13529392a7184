//! Batch totals and the JSON report.
//!
//! Totals are summed over successful results only. Savings use the same
//! rounding as per-image percent change, so a batch of one reports the same
//! figure as its single card.

use crate::imaging::{SizeChange, percent_change};
use crate::pipeline::ItemFailure;
use crate::types::CompressedResult;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Aggregate figures for one finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub count: usize,
    pub total_original: u64,
    pub total_compressed: u64,
    /// Rounded percent saved across the batch; negative when it grew.
    pub savings_percent: i64,
}

impl BatchSummary {
    /// Summarize results. `None` for an empty slice.
    pub fn from_results(results: &[CompressedResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        let total_original = results.iter().map(|r| r.original_size).sum();
        let total_compressed = results.iter().map(|r| r.compressed_size).sum();
        Some(Self {
            count: results.len(),
            total_original,
            total_compressed,
            savings_percent: percent_change(total_original, total_compressed),
        })
    }

    pub fn size_change(&self) -> SizeChange {
        SizeChange::from_percent(self.savings_percent)
    }
}

#[derive(Debug, Serialize)]
struct FailureEntry<'a> {
    index: usize,
    name: &'a str,
    reason: String,
}

#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    #[serde(flatten)]
    result: &'a CompressedResult,
    output_name: String,
    percent_change: i64,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    results: Vec<ReportEntry<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<FailureEntry<'a>>,
    summary: Option<BatchSummary>,
}

/// Render the batch as pretty JSON. Payload bytes are never included.
pub fn report_json(
    results: &[CompressedResult],
    failures: &[ItemFailure],
) -> Result<String, serde_json::Error> {
    let names = crate::naming::batch_filenames(
        results
            .iter()
            .map(|r| (r.original_name.as_str(), r.media_type.as_str())),
    );
    let report = Report {
        results: results
            .iter()
            .zip(names)
            .map(|(r, output_name)| ReportEntry {
                result: r,
                output_name,
                percent_change: r.percent_change(),
            })
            .collect(),
        failures: failures
            .iter()
            .map(|f| FailureEntry {
                index: f.index,
                name: &f.name,
                reason: f.error.to_string(),
            })
            .collect(),
        summary: BatchSummary::from_results(results),
    };
    serde_json::to_string_pretty(&report)
}

/// Write the JSON report to `path`.
pub fn write_report(
    path: &Path,
    results: &[CompressedResult],
    failures: &[ItemFailure],
) -> std::io::Result<()> {
    let json = report_json(results, failures)?;
    fs::write(path, json)
}
