//! CLI output formatting.
//!
//! # Result Cards
//!
//! Each compressed image gets a card: positional index and name on the header
//! line, before/after figures as indented context.
//!
//! ```text
//! 001 holiday.png → holiday_compressed.jpeg
//!     Original: 2.4 MB
//!     Compressed: 512 KB
//!     Dimensions: 1200×800
//!     Format: JPEG
//!     60% smaller
//!
//! Total: 1 image, 2.4 MB → 512 KB (79% smaller)
//! ```
//!
//! # Progress
//!
//! ```text
//! Compressing 3 images
//! [1/3] holiday.png 2.4 MB → 512 KB (79% smaller)
//! [2/3] broken.jpg failed
//! [3/3] logo.png 12 KB → 14.5 KB (21% larger)
//! ```
//!
//! # Notices
//!
//! One-line outcomes, with failures marked distinctly from successes:
//!
//! ```text
//! ✓ Loaded 3 images
//! ✗ notes.txt is not an image file (text/plain)
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>` or `String`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::imaging::{Dimensions, SizeChange};
use crate::naming::{batch_filenames, extension_for_media_type};
use crate::pipeline::{PipelineEvent, PlannedItem};
use crate::report::BatchSummary;
use crate::session::SelectionReport;
use crate::types::CompressedResult;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Human-readable byte count: `Bytes`, `KB`, or `MB` in base 1024.
///
/// At most two decimals, trailing zeros dropped.
///
/// ```text
/// 0        → 0 Bytes
/// 1536     → 1.5 KB
/// 10485760 → 10 MB
/// ```
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["Bytes", "KB", "MB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{scaled:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Output format label: the media subtype, uppercased.
fn format_label(media_type: &str) -> String {
    extension_for_media_type(media_type).to_uppercase()
}

fn format_dimensions(width: u32, height: u32) -> String {
    format!("{width}\u{d7}{height}")
}

fn size_line(original: u64, compressed: u64) -> String {
    format!(
        "{} \u{2192} {} ({})",
        format_file_size(original),
        format_file_size(compressed),
        SizeChange::from_sizes(original, compressed)
    )
}

// ============================================================================
// Notices
// ============================================================================

/// Whether a notice reports a success or a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Failure,
}

/// Format a one-line notice. Failures are marked with `✗`, successes with `✓`.
pub fn format_notice(kind: NoticeKind, message: &str) -> String {
    match kind {
        NoticeKind::Success => format!("\u{2713} {message}"),
        NoticeKind::Failure => format!("\u{2717} {message}"),
    }
}

/// Print a notice: successes to stdout, failures to stderr.
pub fn print_notice(kind: NoticeKind, message: &str) {
    let line = format_notice(kind, message);
    match kind {
        NoticeKind::Success => println!("{}", line),
        NoticeKind::Failure => eprintln!("{}", line),
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Notices for a selection: one per rejected file, then the load count.
pub fn format_selection(report: &SelectionReport) -> Vec<(NoticeKind, String)> {
    let mut notices: Vec<(NoticeKind, String)> = report
        .rejected
        .iter()
        .map(|err| (NoticeKind::Failure, err.to_string()))
        .collect();
    if report.replaced() {
        notices.push((
            NoticeKind::Success,
            format!("Loaded {}", plural(report.accepted.len(), "image")),
        ));
    } else {
        notices.push((NoticeKind::Failure, "No valid images selected".to_string()));
    }
    notices
}

pub fn print_selection(report: &SelectionReport) {
    for (kind, message) in format_selection(report) {
        print_notice(kind, &message);
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Format a single pipeline progress event as display lines.
///
/// Failure reasons are not shown here; they go to the log.
pub fn format_pipeline_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::BatchStarted { total, .. } => {
            vec![format!("Compressing {}", plural(*total, "image"))]
        }
        PipelineEvent::ItemDone {
            completed,
            total,
            name,
            original_size,
            compressed_size,
            ..
        } => vec![format!(
            "[{completed}/{total}] {name} {}",
            size_line(*original_size, *compressed_size)
        )],
        PipelineEvent::ItemFailed {
            completed,
            total,
            name,
            ..
        } => vec![format!("[{completed}/{total}] {name} failed")],
        PipelineEvent::BatchFinished { .. } => Vec::new(),
    }
}

// ============================================================================
// Results
// ============================================================================

/// Format result cards, one per compressed image, in batch order.
pub fn format_results(results: &[CompressedResult]) -> Vec<String> {
    let names = batch_filenames(
        results
            .iter()
            .map(|r| (r.original_name.as_str(), r.media_type.as_str())),
    );
    let mut lines = Vec::new();
    for (i, (result, output_name)) in results.iter().zip(names).enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format!(
            "{} {} \u{2192} {}",
            format_index(i + 1),
            result.original_name,
            output_name
        ));
        let ctx = indent(1);
        lines.push(format!("{ctx}Original: {}", format_file_size(result.original_size)));
        lines.push(format!(
            "{ctx}Compressed: {}",
            format_file_size(result.compressed_size)
        ));
        lines.push(format!(
            "{ctx}Dimensions: {}",
            format_dimensions(result.width, result.height)
        ));
        lines.push(format!("{ctx}Format: {}", format_label(&result.media_type)));
        lines.push(format!("{ctx}{}", result.size_change()));
    }
    lines
}

/// Format the batch totals line.
pub fn format_summary(summary: &BatchSummary) -> String {
    format!(
        "Total: {}, {} \u{2192} {} ({})",
        plural(summary.count, "image"),
        format_file_size(summary.total_original),
        format_file_size(summary.total_compressed),
        summary.size_change()
    )
}

/// Print result cards followed by the totals line.
pub fn print_results(results: &[CompressedResult], summary: Option<&BatchSummary>) {
    for line in format_results(results) {
        println!("{}", line);
    }
    if let Some(summary) = summary {
        println!();
        println!("{}", format_summary(summary));
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Format a planned resize: `400×200 → 300×150`.
pub fn format_plan(original: Dimensions, target: Dimensions) -> String {
    format!(
        "{} \u{2192} {}",
        format_dimensions(original.width, original.height),
        format_dimensions(target.width, target.height)
    )
}

/// Format dry-run plans, one line per image.
pub fn format_planned_items(items: &[PlannedItem]) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "{} {} {} as {}",
                format_index(i + 1),
                item.name,
                format_plan(item.original, item.target),
                format_label(&item.media_type)
            )
        })
        .collect()
}

pub fn print_planned_items(items: &[PlannedItem]) {
    for line in format_planned_items(items) {
        println!("{}", line);
    }
}
