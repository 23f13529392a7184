//! The transcode pipeline: decode → plan → rasterize → encode, per image.
//!
//! ## Per-item stages
//!
//! ```text
//! bytes ──decode──▶ raster (w×h) ──plan──▶ target (w'×h')
//!                     │                        │
//!                     └────────rasterize───────┘
//!                                │
//!                           surface (w'×h') ──encode(media type, q/100)──▶ bytes'
//! ```
//!
//! The output media type is the input's declared type when the format is
//! `original`, otherwise the standard type for the requested format.
//!
//! ## Batches
//!
//! [`transcode_batch`] runs items strictly one at a time by default, so the
//! progress counter rises by one per item and at most one decoded raster is
//! alive at a time. With [`RunOptions::parallel`] items run on a bounded
//! rayon pool instead; results are collected by index, so output order always
//! matches input order.
//!
//! ## Failures
//!
//! A decode, rasterize, or encode failure is handled per [`FailurePolicy`]:
//! `Abort` stops the batch and discards what was produced, `Skip` records the
//! failure and keeps going. A [`CancelToken`] is checked between items.

use crate::imaging::{
    BackendError, CompressionSettings, Dimensions, ImageBackend, Raster, plan_dimensions,
};
use crate::types::{CompressedResult, InputImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{name} (item {}) failed: {source}", index + 1)]
    Item {
        index: usize,
        name: String,
        #[source]
        source: BackendError,
    },
    #[error("Run {run_id} cancelled after {completed} of {total} images")]
    Cancelled {
        run_id: u64,
        completed: usize,
        total: usize,
    },
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// What to do when one image in a batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the batch; nothing from this run is kept.
    #[default]
    Abort,
    /// Record the failure and continue with the next image.
    Skip,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Skip => "skip",
        })
    }
}

/// How a batch is executed.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub policy: FailurePolicy,
    pub parallel: bool,
    /// Worker count for parallel runs. Ignored when sequential.
    pub threads: usize,
}

impl RunOptions {
    /// Build RunOptions from the `[processing]` config section.
    pub fn from_config(config: &crate::config::ProcessingConfig) -> Self {
        Self {
            policy: config.on_error,
            parallel: config.parallel,
            threads: crate::config::effective_threads(config),
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::default(),
            parallel: false,
            threads: 1,
        }
    }
}

/// Cooperative cancellation flag for one run, checked between items.
#[derive(Debug, Clone)]
pub struct CancelToken {
    run_id: u64,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Progress events emitted during a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    BatchStarted {
        run_id: u64,
        total: usize,
    },
    ItemDone {
        index: usize,
        /// Items finished so far (successes and failures), 1-based.
        completed: usize,
        total: usize,
        name: String,
        original_size: u64,
        compressed_size: u64,
        width: u32,
        height: u32,
        media_type: String,
    },
    ItemFailed {
        index: usize,
        completed: usize,
        total: usize,
        name: String,
        reason: String,
    },
    BatchFinished {
        run_id: u64,
        succeeded: usize,
        failed: usize,
    },
}

/// An image that failed under [`FailurePolicy::Skip`].
#[derive(Debug)]
pub struct ItemFailure {
    pub index: usize,
    pub name: String,
    pub error: BackendError,
}

/// Everything a finished batch produced.
///
/// Under [`FailurePolicy::Abort`] `failures` is always empty and `results`
/// lines up index-for-index with the inputs.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<CompressedResult>,
    pub failures: Vec<ItemFailure>,
}

fn emit(progress: Option<&Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = progress {
        // A closed receiver only means nobody is watching
        tx.send(event).ok();
    }
}

/// Transcode a single image.
pub fn transcode_one<B: ImageBackend>(
    backend: &B,
    input: &InputImage,
    settings: &CompressionSettings,
) -> Result<CompressedResult, BackendError> {
    let decoded = backend.decode(&input.bytes)?;
    let original = decoded.dimensions();
    let (width, height) = plan_dimensions(original.as_tuple(), settings);
    debug!(
        name = %input.name,
        from = ?original.as_tuple(),
        to = ?(width, height),
        "planned dimensions"
    );

    let surface = backend.rasterize(&decoded, width, height)?;
    drop(decoded);

    let media_type = settings.format.resolve(&input.media_type).to_string();
    let data = backend.encode(&surface, &media_type, settings.quality.hint())?;
    debug!(
        name = %input.name,
        %media_type,
        original = input.size(),
        compressed = data.len(),
        "encoded"
    );

    Ok(CompressedResult {
        compressed_size: data.len() as u64,
        data,
        original_name: input.name.clone(),
        original_size: input.size(),
        original_media_type: input.media_type.clone(),
        media_type,
        width,
        height,
        original_width: original.width,
        original_height: original.height,
    })
}

/// What a transcode would produce, without rasterizing or encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub name: String,
    pub original: Dimensions,
    pub target: Dimensions,
    pub media_type: String,
}

/// Decode and plan a single image. Used for dry runs.
pub fn plan_one<B: ImageBackend>(
    backend: &B,
    input: &InputImage,
    settings: &CompressionSettings,
) -> Result<PlannedItem, BackendError> {
    let original = backend.decode(&input.bytes)?.dimensions();
    Ok(PlannedItem {
        name: input.name.clone(),
        original,
        target: plan_dimensions(original.as_tuple(), settings).into(),
        media_type: settings.format.resolve(&input.media_type).to_string(),
    })
}

fn done_event(
    index: usize,
    completed: usize,
    total: usize,
    result: &CompressedResult,
) -> PipelineEvent {
    PipelineEvent::ItemDone {
        index,
        completed,
        total,
        name: result.original_name.clone(),
        original_size: result.original_size,
        compressed_size: result.compressed_size,
        width: result.width,
        height: result.height,
        media_type: result.media_type.clone(),
    }
}

/// Transcode a batch of images with one settings snapshot.
///
/// Progress events go to `progress` when given; the sender is dropped when the
/// batch ends so a receiving thread can finish.
pub fn transcode_batch<B: ImageBackend>(
    backend: &B,
    inputs: &[InputImage],
    settings: &CompressionSettings,
    options: &RunOptions,
    cancel: &CancelToken,
    progress: Option<Sender<PipelineEvent>>,
) -> Result<BatchOutcome, PipelineError> {
    let total = inputs.len();
    let run_id = cancel.run_id();
    info!(run_id, total, parallel = options.parallel, "batch started");
    emit(progress.as_ref(), PipelineEvent::BatchStarted { run_id, total });

    let outcome = if options.parallel {
        run_parallel(backend, inputs, settings, options, cancel, progress.as_ref())?
    } else {
        run_sequential(backend, inputs, settings, options, cancel, progress.as_ref())?
    };

    info!(
        run_id,
        succeeded = outcome.results.len(),
        failed = outcome.failures.len(),
        "batch finished"
    );
    emit(
        progress.as_ref(),
        PipelineEvent::BatchFinished {
            run_id,
            succeeded: outcome.results.len(),
            failed: outcome.failures.len(),
        },
    );
    Ok(outcome)
}

fn run_sequential<B: ImageBackend>(
    backend: &B,
    inputs: &[InputImage],
    settings: &CompressionSettings,
    options: &RunOptions,
    cancel: &CancelToken,
    progress: Option<&Sender<PipelineEvent>>,
) -> Result<BatchOutcome, PipelineError> {
    let total = inputs.len();
    let mut outcome = BatchOutcome::default();

    for (index, input) in inputs.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                run_id: cancel.run_id(),
                completed: index,
                total,
            });
        }

        match transcode_one(backend, input, settings) {
            Ok(result) => {
                emit(progress, done_event(index, index + 1, total, &result));
                outcome.results.push(result);
            }
            Err(err) => {
                error!(
                    index,
                    name = %input.name,
                    stage = err.stage(),
                    error = %err,
                    "transcode failed"
                );
                emit(
                    progress,
                    PipelineEvent::ItemFailed {
                        index,
                        completed: index + 1,
                        total,
                        name: input.name.clone(),
                        reason: err.to_string(),
                    },
                );
                match options.policy {
                    FailurePolicy::Abort => {
                        return Err(PipelineError::Item {
                            index,
                            name: input.name.clone(),
                            source: err,
                        });
                    }
                    FailurePolicy::Skip => outcome.failures.push(ItemFailure {
                        index,
                        name: input.name.clone(),
                        error: err,
                    }),
                }
            }
        }
    }

    Ok(outcome)
}

fn run_parallel<B: ImageBackend>(
    backend: &B,
    inputs: &[InputImage],
    settings: &CompressionSettings,
    options: &RunOptions,
    cancel: &CancelToken,
    progress: Option<&Sender<PipelineEvent>>,
) -> Result<BatchOutcome, PipelineError> {
    let total = inputs.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.max(1))
        .build()?;
    let completed = AtomicUsize::new(0);
    let aborting = AtomicBool::new(false);

    // One slot per input, collected in input order. `None` means the item was
    // never started because of cancellation or an abort elsewhere.
    let slots: Vec<Option<Result<CompressedResult, BackendError>>> = pool.install(|| {
        inputs
            .par_iter()
            .enumerate()
            .map(|(index, input)| {
                if cancel.is_cancelled() || aborting.load(Ordering::SeqCst) {
                    return None;
                }
                let result = transcode_one(backend, input, settings);
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                match &result {
                    Ok(r) => emit(progress, done_event(index, done, total, r)),
                    Err(err) => {
                        error!(
                            index,
                            name = %input.name,
                            stage = err.stage(),
                            error = %err,
                            "transcode failed"
                        );
                        if options.policy == FailurePolicy::Abort {
                            aborting.store(true, Ordering::SeqCst);
                        }
                        emit(
                            progress,
                            PipelineEvent::ItemFailed {
                                index,
                                completed: done,
                                total,
                                name: input.name.clone(),
                                reason: err.to_string(),
                            },
                        );
                    }
                }
                Some(result)
            })
            .collect()
    });

    let mut outcome = BatchOutcome::default();
    let mut skipped = 0;
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(Ok(result)) => outcome.results.push(result),
            Some(Err(err)) => match options.policy {
                FailurePolicy::Abort => {
                    return Err(PipelineError::Item {
                        index,
                        name: inputs[index].name.clone(),
                        source: err,
                    });
                }
                FailurePolicy::Skip => outcome.failures.push(ItemFailure {
                    index,
                    name: inputs[index].name.clone(),
                    error: err,
                }),
            },
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        return Err(PipelineError::Cancelled {
            run_id: cancel.run_id(),
            completed: total - skipped,
            total,
        });
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{OutputFormat, Quality, ResizeMode};
    use std::sync::mpsc;

    fn input(name: &str, width: u32, height: u32) -> InputImage {
        InputImage::new(name, "image/png", MockBackend::image_bytes(width, height))
    }

    fn broken(name: &str) -> InputImage {
        InputImage::new(name, "image/png", b"not an image".to_vec())
    }

    fn run(
        backend: &MockBackend,
        inputs: &[InputImage],
        settings: &CompressionSettings,
        options: &RunOptions,
    ) -> Result<BatchOutcome, PipelineError> {
        transcode_batch(backend, inputs, settings, options, &CancelToken::new(1), None)
    }

    // =========================================================================
    // transcode_one
    // =========================================================================

    #[test]
    fn transcode_one_runs_stages_in_order() {
        let backend = MockBackend::new();
        let settings = CompressionSettings {
            resize: ResizeMode::Half,
            quality: Quality::new(50),
            ..Default::default()
        };

        let result = transcode_one(&backend, &input("a.png", 200, 100), &settings).unwrap();

        assert_eq!((result.width, result.height), (100, 50));
        assert_eq!((result.original_width, result.original_height), (200, 100));
        assert_eq!(result.media_type, "image/png");
        assert_eq!(result.compressed_size, result.data.len() as u64);
        assert_eq!(
            result.compressed_size,
            MockBackend::encoded_len(100, 50, 50) as u64
        );
        assert_eq!(result.original_size, 7); // "200x100"

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], RecordedOp::Decode(_)));
        assert!(matches!(
            &ops[1],
            RecordedOp::Rasterize {
                width: 100,
                height: 50
            }
        ));
        assert!(matches!(&ops[2], RecordedOp::Encode { quality: 50, .. }));
    }

    #[test]
    fn output_format_overrides_media_type() {
        let backend = MockBackend::new();
        let settings = CompressionSettings {
            format: OutputFormat::Webp,
            ..Default::default()
        };
        let result = transcode_one(&backend, &input("a.png", 10, 10), &settings).unwrap();
        assert_eq!(result.media_type, "image/webp");
        assert_eq!(result.original_media_type, "image/png");
    }

    #[test]
    fn original_format_with_unencodable_type_is_encode_error() {
        let backend = MockBackend::new();
        let gif = InputImage::new("anim.gif", "image/gif", MockBackend::image_bytes(4, 4));
        let err = transcode_one(&backend, &gif, &CompressionSettings::default()).unwrap_err();
        assert!(err.is_encode());
    }

    #[test]
    fn degenerate_target_fails_at_rasterize() {
        let backend = MockBackend::new();
        let settings = CompressionSettings {
            resize: ResizeMode::Half,
            ..Default::default()
        };
        let err = transcode_one(&backend, &input("dot.png", 1, 1), &settings).unwrap_err();
        assert!(matches!(err, BackendError::Rasterize { width: 0, height: 0, .. }));
    }

    #[test]
    fn plan_one_decodes_without_encoding() {
        let backend = MockBackend::new();
        let settings = CompressionSettings {
            resize: ResizeMode::Custom,
            width: Some(300),
            format: OutputFormat::Jpeg,
            ..Default::default()
        };
        let item = plan_one(&backend, &input("wide.png", 400, 200), &settings).unwrap();
        assert_eq!(item.original, Dimensions::from((400, 200)));
        assert_eq!(item.target, Dimensions::from((300, 150)));
        assert_eq!(item.media_type, "image/jpeg");
        assert_eq!(backend.get_operations().len(), 1);
    }

    // =========================================================================
    // transcode_batch, sequential
    // =========================================================================

    #[test]
    fn batch_preserves_length_and_order() {
        let backend = MockBackend::new();
        let inputs = vec![
            input("first.png", 300, 200),
            input("second.png", 10, 10),
            input("third.png", 640, 480),
        ];

        let outcome = run(
            &backend,
            &inputs,
            &CompressionSettings::default(),
            &RunOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.results.len(), inputs.len());
        for (result, input) in outcome.results.iter().zip(&inputs) {
            assert_eq!(result.original_name, input.name);
        }
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn empty_batch_is_empty_outcome() {
        let backend = MockBackend::new();
        let outcome = run(
            &backend,
            &[],
            &CompressionSettings::default(),
            &RunOptions::default(),
        )
        .unwrap();
        assert!(outcome.results.is_empty());
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let backend = MockBackend::new();
        let inputs = vec![input("ok.png", 10, 10), broken("bad.png"), input("never.png", 5, 5)];

        let err = run(
            &backend,
            &inputs,
            &CompressionSettings::default(),
            &RunOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(
            &err,
            PipelineError::Item { index: 1, name, source }
                if name == "bad.png" && source.is_decode()
        ));
        // The third image was never decoded
        let decodes = backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Decode(_)))
            .count();
        assert_eq!(decodes, 2);
    }

    #[test]
    fn skip_policy_isolates_failures() {
        let backend = MockBackend::new();
        let inputs = vec![broken("bad.png"), input("ok.png", 10, 10), broken("worse.png")];
        let options = RunOptions {
            policy: FailurePolicy::Skip,
            ..Default::default()
        };

        let outcome = run(&backend, &inputs, &CompressionSettings::default(), &options).unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].original_name, "ok.png");
        let failed: Vec<(usize, &str)> = outcome
            .failures
            .iter()
            .map(|f| (f.index, f.name.as_str()))
            .collect();
        assert_eq!(failed, vec![(0, "bad.png"), (2, "worse.png")]);
    }

    #[test]
    fn progress_counter_rises_by_one_per_item() {
        let backend = MockBackend::new();
        let inputs = vec![input("a.png", 2, 2), broken("b.png"), input("c.png", 3, 3)];
        let options = RunOptions {
            policy: FailurePolicy::Skip,
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel();

        transcode_batch(
            &backend,
            &inputs,
            &CompressionSettings::default(),
            &options,
            &CancelToken::new(7),
            Some(tx),
        )
        .unwrap();

        let events: Vec<PipelineEvent> = rx.iter().collect();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], PipelineEvent::BatchStarted { run_id: 7, total: 3 });
        let counters: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::ItemDone { completed, .. }
                | PipelineEvent::ItemFailed { completed, .. } => Some(*completed),
                _ => None,
            })
            .collect();
        assert_eq!(counters, vec![1, 2, 3]);
        assert_eq!(
            events[4],
            PipelineEvent::BatchFinished {
                run_id: 7,
                succeeded: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn cancelled_token_stops_before_next_item() {
        let backend = MockBackend::new();
        let inputs = vec![input("a.png", 2, 2), input("b.png", 2, 2)];
        let token = CancelToken::new(3);
        token.cancel();

        let err = transcode_batch(
            &backend,
            &inputs,
            &CompressionSettings::default(),
            &RunOptions::default(),
            &token,
            None,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Cancelled {
                run_id: 3,
                completed: 0,
                total: 2
            }
        ));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn identical_runs_give_identical_metadata() {
        let backend = MockBackend::new();
        let inputs = vec![input("a.png", 400, 200), input("b.png", 33, 77)];
        let settings = CompressionSettings {
            resize: ResizeMode::ThreeQuarters,
            quality: Quality::new(65),
            ..Default::default()
        };

        let first = run(&backend, &inputs, &settings, &RunOptions::default()).unwrap();
        let second = run(&backend, &inputs, &settings, &RunOptions::default()).unwrap();

        let meta = |o: &BatchOutcome| -> Vec<(u32, u32, u64)> {
            o.results
                .iter()
                .map(|r| (r.width, r.height, r.compressed_size))
                .collect()
        };
        assert_eq!(meta(&first), meta(&second));
    }

    // =========================================================================
    // transcode_batch, parallel
    // =========================================================================

    fn parallel(policy: FailurePolicy) -> RunOptions {
        RunOptions {
            policy,
            parallel: true,
            threads: 4,
        }
    }

    #[test]
    fn parallel_matches_sequential_order() {
        let backend = MockBackend::new();
        let inputs: Vec<InputImage> = (1..=16)
            .map(|i| input(&format!("img-{i:02}.png"), i * 10, i * 5))
            .collect();
        let settings = CompressionSettings::default();

        let seq = run(&backend, &inputs, &settings, &RunOptions::default()).unwrap();
        let par = run(&backend, &inputs, &settings, &parallel(FailurePolicy::Abort)).unwrap();

        assert_eq!(seq.results, par.results);
    }

    #[test]
    fn parallel_progress_counter_is_complete() {
        let backend = MockBackend::new();
        let inputs: Vec<InputImage> = (1..=8).map(|i| input(&format!("{i}.png"), i, i)).collect();
        let (tx, rx) = mpsc::channel();

        transcode_batch(
            &backend,
            &inputs,
            &CompressionSettings::default(),
            &parallel(FailurePolicy::Abort),
            &CancelToken::new(1),
            Some(tx),
        )
        .unwrap();

        let mut counters: Vec<usize> = rx
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::ItemDone { completed, .. } => Some(completed),
                _ => None,
            })
            .collect();
        counters.sort_unstable();
        assert_eq!(counters, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn parallel_skip_keeps_input_order() {
        let backend = MockBackend::new();
        let inputs = vec![
            input("a.png", 2, 2),
            broken("b.png"),
            input("c.png", 2, 2),
            input("d.png", 2, 2),
        ];

        let outcome = run(
            &backend,
            &inputs,
            &CompressionSettings::default(),
            &parallel(FailurePolicy::Skip),
        )
        .unwrap();

        let names: Vec<&str> = outcome
            .results
            .iter()
            .map(|r| r.original_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.png", "c.png", "d.png"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 1);
    }

    #[test]
    fn parallel_abort_reports_failure() {
        let backend = MockBackend::new();
        let inputs = vec![input("a.png", 2, 2), broken("b.png")];

        let err = run(
            &backend,
            &inputs,
            &CompressionSettings::default(),
            &parallel(FailurePolicy::Abort),
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::Item { index: 1, .. }));
    }
}
