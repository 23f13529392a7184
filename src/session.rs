//! The session controller: the one owner of selected inputs and their results.
//!
//! ```text
//!   select ──▶ inputs ──run──▶ results ──download──▶ files
//!     ▲           │                │
//!     └─ remove ──┘                └─ summary
//!            reset clears both
//! ```
//!
//! Under the abort policy results line up index-for-index with inputs, so any
//! change to the inputs (a new selection, a removal) drops stale results.
//! Every run gets a fresh run ID and [`CancelToken`]; `reset` cancels the
//! outstanding one.

use crate::imaging::{CompressionSettings, ImageBackend};
use crate::inputs::Candidate;
use crate::naming::batch_filenames;
use crate::pipeline::{
    CancelToken, ItemFailure, PipelineError, PipelineEvent, RunOptions, transcode_batch,
};
use crate::report::BatchSummary;
use crate::types::{CompressedResult, InputImage};
use crate::validation::{ValidationError, validate_candidate};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No item at index {index} (have {len})")]
    NotFound { index: usize, len: usize },
    #[error("No images selected")]
    NoInputs,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a call to [`Session::select`] accepted and rejected.
#[derive(Debug, Default)]
pub struct SelectionReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<ValidationError>,
}

impl SelectionReport {
    /// True when the selection replaced the session's inputs.
    pub fn replaced(&self) -> bool {
        !self.accepted.is_empty()
    }
}

#[derive(Debug)]
pub struct Session {
    inputs: Vec<InputImage>,
    results: Vec<CompressedResult>,
    failures: Vec<ItemFailure>,
    max_file_size: u64,
    next_run: u64,
    current: CancelToken,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(crate::validation::MAX_INPUT_BYTES)
    }
}

impl Session {
    pub fn new(max_file_size: u64) -> Self {
        Self {
            inputs: Vec::new(),
            results: Vec::new(),
            failures: Vec::new(),
            max_file_size,
            next_run: 2,
            current: CancelToken::new(1),
        }
    }

    pub fn inputs(&self) -> &[InputImage] {
        &self.inputs
    }

    pub fn results(&self) -> &[CompressedResult] {
        &self.results
    }

    /// Failures from the last run under the skip policy.
    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    /// Validate and load candidates.
    ///
    /// When at least one is accepted the input batch is replaced wholesale
    /// and previous results are dropped. When none is, the session is left
    /// untouched.
    pub fn select(&mut self, candidates: Vec<Candidate>) -> SelectionReport {
        let mut report = SelectionReport::default();
        let mut accepted = Vec::new();

        for candidate in candidates {
            let checked = validate_candidate(
                &candidate.name,
                &candidate.media_type,
                candidate.size,
                self.max_file_size,
            )
            .and_then(|()| candidate.read());
            match checked {
                Ok(input) => {
                    report.accepted.push(input.name.clone());
                    accepted.push(input);
                }
                Err(err) => {
                    warn!(name = err.name(), error = %err, "rejected");
                    report.rejected.push(err);
                }
            }
        }

        if report.replaced() {
            info!(count = accepted.len(), "selection replaced");
            self.inputs = accepted;
            self.clear_results();
        }
        report
    }

    /// Remove one input. Results are dropped since indices shift.
    pub fn remove(&mut self, index: usize) -> Result<InputImage, SessionError> {
        if index >= self.inputs.len() {
            return Err(SessionError::NotFound {
                index,
                len: self.inputs.len(),
            });
        }
        self.clear_results();
        Ok(self.inputs.remove(index))
    }

    /// A handle that cancels the next run between items.
    ///
    /// Take it before calling [`run`](Self::run) and move it to another
    /// thread to stop a run in flight.
    pub fn cancel_token(&self) -> CancelToken {
        self.current.clone()
    }

    /// Compress every input with one settings snapshot.
    ///
    /// On failure the previous results are gone and the error is returned;
    /// the session stays ready for another run.
    pub fn run<B: ImageBackend>(
        &mut self,
        backend: &B,
        settings: &CompressionSettings,
        options: &RunOptions,
        progress: Option<Sender<PipelineEvent>>,
    ) -> Result<&[CompressedResult], SessionError> {
        if self.inputs.is_empty() {
            return Err(SessionError::NoInputs);
        }
        let settings = settings.clone();
        let token = self.start_run();
        self.clear_results();

        match transcode_batch(backend, &self.inputs, &settings, options, &token, progress) {
            Ok(outcome) => {
                self.results = outcome.results;
                self.failures = outcome.failures;
                Ok(&self.results)
            }
            Err(err) => {
                // Root cause stays in the log; callers show a generic notice
                let stage = match &err {
                    PipelineError::Item { source, .. } => source.stage(),
                    PipelineError::Cancelled { .. } => "cancelled",
                    PipelineError::ThreadPool(_) => "setup",
                };
                warn!(run_id = token.run_id(), stage, error = %err, "run failed");
                Err(err.into())
            }
        }
    }

    /// Hand the current token to a run and line up a fresh one for the next.
    fn start_run(&mut self) -> CancelToken {
        let next = CancelToken::new(self.next_run);
        self.next_run += 1;
        std::mem::replace(&mut self.current, next)
    }

    pub fn result(&self, index: usize) -> Result<&CompressedResult, SessionError> {
        self.results.get(index).ok_or(SessionError::NotFound {
            index,
            len: self.results.len(),
        })
    }

    /// Download filenames for the current results, unique within the batch.
    pub fn output_names(&self) -> Vec<String> {
        batch_filenames(
            self.results
                .iter()
                .map(|r| (r.original_name.as_str(), r.media_type.as_str())),
        )
    }

    /// Write one result into `dir` under the name [`download_all`](Self::download_all)
    /// would give it.
    pub fn download(&self, index: usize, dir: &Path) -> Result<PathBuf, SessionError> {
        let result = self.result(index)?;
        let mut names = self.output_names();
        write_result(result, dir, &names.swap_remove(index))
    }

    /// Write every result into `dir`, in order.
    ///
    /// Results that would share a filename are numbered, so none overwrites
    /// another.
    pub fn download_all(&self, dir: &Path) -> Result<Vec<PathBuf>, SessionError> {
        self.results
            .iter()
            .zip(self.output_names())
            .map(|(r, name)| write_result(r, dir, &name))
            .collect()
    }

    pub fn summary(&self) -> Option<BatchSummary> {
        BatchSummary::from_results(&self.results)
    }

    /// Drop everything and cancel the outstanding run token.
    pub fn reset(&mut self) {
        self.current.cancel();
        self.current = CancelToken::new(self.next_run);
        self.next_run += 1;
        self.inputs.clear();
        self.clear_results();
        info!("session reset");
    }

    fn clear_results(&mut self) {
        self.results.clear();
        self.failures.clear();
    }
}

fn write_result(
    result: &CompressedResult,
    dir: &Path,
    file_name: &str,
) -> Result<PathBuf, SessionError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, &result.data)?;
    debug!(path = %path.display(), bytes = result.data.len(), "written");
    Ok(path)
}
