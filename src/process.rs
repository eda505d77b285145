//! Pipeline orchestrator.
//!
//! Runs one end-to-end pass: validate, prepare the output roots, enumerate
//! sources, build the plan, execute it under the concurrency limit and
//! summarise.
//!
//! ## Run states
//!
//! ```text
//! Idle → ClearingOutput → Enumerating → Building → Executing → Done
//!   └──────────┴──────────────┴────────────┴──────────→ Failed
//! ```
//!
//! `Failed` is reserved for run-level problems: invalid config, a missing or
//! empty input directory, an output root that cannot be reset, or a worker
//! pool that cannot start. A single artifact failing to decode, encode or
//! write never fails the run; it is reported as a
//! [`ProcessEvent::ArtifactFailed`] and counted in the [`RunSummary`].
//!
//! The input directory is checked before anything is cleared, and so are the
//! output names the sources would produce, so neither a typo in `input_dir`
//! nor two sources sharing a base name cost the previous output.
//!
//! Runs are not safe to overlap on the same output root: the clearing step
//! would race the other run's writes. One invocation at a time is the
//! caller's responsibility.
//!
//! ## Output Structure
//!
//! ```text
//! dist/assets/images/
//! ├── images.json             # Only with write_manifest = true
//! ├── dragon-480.webp
//! ├── dragon-480.png
//! ├── ...
//! ├── dragon-20.webp          # Placeholder
//! ├── dragon-original.webp
//! └── dragon-original.png
//! ```

use crate::config::{ConfigError, PipelineConfig};
use crate::executor::{Executor, ExecutorError, TaskFailure};
use crate::fsutil;
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, OutputFormat, Quality, ResizeParams, RustBackend,
};
use crate::plan::{self, Action, ArtifactKind, ClampNotice, FormatPolicy, OutputSpec, Plan, PlanError};
use crate::scan::{self, ScanError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// File name of the optional per-root artifact manifest.
pub const MANIFEST_FILENAME: &str = "images.json";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("Failed to prepare output directory {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Failure of a single artifact. Recovered: logged, counted, skipped.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("source unreadable: {0}")]
    Unreadable(String),
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ClearingOutput,
    Enumerating,
    Building,
    Executing,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::ClearingOutput => "clearing-output",
            RunState::Enumerating => "enumerating",
            RunState::Building => "building",
            RunState::Executing => "executing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Progress events streamed to the CLI while a run executes.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    State(RunState),
    /// Sources enumerated and plan built.
    Planned {
        sources: usize,
        artifacts: usize,
        concurrency: usize,
    },
    Clamped(ClampNotice),
    /// One artifact could not be produced.
    ArtifactFailed(ArtifactFailure),
    /// Every artifact of one source has been attempted.
    SourceFinished {
        file_name: String,
        completed: usize,
        total: usize,
        failed_artifacts: usize,
    },
}

/// Identity and cause of a failed artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactFailure {
    pub source_file: String,
    pub artifact: String,
    pub kind: ArtifactKind,
    pub format: OutputFormat,
    pub root: String,
    pub message: String,
}

/// A successfully written artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducedArtifact {
    #[serde(skip)]
    pub source: usize,
    #[serde(skip)]
    pub source_file: String,
    #[serde(skip)]
    pub root: String,
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

/// End-of-run tally.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub sources: usize,
    pub produced: Vec<ProducedArtifact>,
    pub failures: Vec<ArtifactFailure>,
    pub clamps: Vec<ClampNotice>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.produced.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Run the pipeline with the pure-Rust imaging backend.
pub fn process(
    config: &PipelineConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<RunSummary, ProcessError> {
    process_with_backend(&RustBackend::new(), config, events)
}

/// Run the pipeline with a specific backend (allows testing with a mock).
pub fn process_with_backend(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<RunSummary, ProcessError> {
    PipelineRun::new(backend, config, events).run()
}

/// Enumerate and plan without touching any output directory.
pub fn plan_with_backend(
    backend: &impl ImageBackend,
    config: &PipelineConfig,
) -> Result<Plan, ProcessError> {
    config.validate()?;
    let sources = scan::scan(&config.input_dir)?;
    let plan = plan::build(
        backend,
        sources,
        &config.resolution_matrix(),
        &FormatPolicy::from_config(config),
        &config.outputs,
    )?;
    Ok(plan)
}

/// Ephemeral context for one invocation.
struct PipelineRun<'a, B: ImageBackend> {
    backend: &'a B,
    config: &'a PipelineConfig,
    events: Option<Sender<ProcessEvent>>,
    state: RunState,
}

impl<'a, B: ImageBackend> PipelineRun<'a, B> {
    fn new(backend: &'a B, config: &'a PipelineConfig, events: Option<Sender<ProcessEvent>>) -> Self {
        Self {
            backend,
            config,
            events,
            state: RunState::Idle,
        }
    }

    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching progress.
            tx.send(event).ok();
        }
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!(from = %self.state, to = %next, "run state");
        self.state = next;
        self.emit(ProcessEvent::State(next));
    }

    fn run(mut self) -> Result<RunSummary, ProcessError> {
        match self.execute() {
            Ok(summary) => {
                self.transition(RunState::Done);
                Ok(summary)
            }
            Err(e) => {
                tracing::debug!("run failed: {e}");
                self.transition(RunState::Failed);
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> Result<RunSummary, ProcessError> {
        let config = self.config;
        config.validate()?;
        if !config.input_dir.exists() {
            return Err(ScanError::NotFound(config.input_dir.clone()).into());
        }
        let executor = Executor::new(config.processing.concurrency)?;
        let widths = config.resolution_matrix();
        let policy = FormatPolicy::from_config(config);
        // Listing errors are reported by Enumerating; only collisions matter here.
        if let Ok(listing) = scan::scan(&config.input_dir) {
            plan::check_output_names(&listing, &widths, &policy, &config.outputs)?;
        }

        self.transition(RunState::ClearingOutput);
        for root in &config.outputs {
            let prepared = if config.clear_output {
                fsutil::reset_dir(&root.dir)
            } else {
                fsutil::ensure_dir(&root.dir)
            };
            prepared.map_err(|source| ProcessError::Directory {
                path: root.dir.clone(),
                source,
            })?;
        }

        self.transition(RunState::Enumerating);
        let sources = scan::scan(&config.input_dir)?;

        self.transition(RunState::Building);
        let plan = plan::build(self.backend, sources, &widths, &policy, &config.outputs)?;
        self.emit(ProcessEvent::Planned {
            sources: plan.sources.len(),
            artifacts: plan.specs.len(),
            concurrency: executor.max_in_flight(),
        });
        for notice in &plan.clamps {
            self.emit(ProcessEvent::Clamped(notice.clone()));
        }

        self.transition(RunState::Executing);
        let summary = self.execute_plan(&executor, plan);

        if config.write_manifest {
            write_manifests(config, &summary)?;
        }
        Ok(summary)
    }

    fn execute_plan(&self, executor: &Executor, plan: Plan) -> RunSummary {
        let quality = Quality::new(self.config.images.quality);
        let remaining: Vec<AtomicUsize> = plan
            .specs_per_source()
            .into_iter()
            .map(AtomicUsize::new)
            .collect();
        let failed: Vec<AtomicUsize> = plan.sources.iter().map(|_| AtomicUsize::new(0)).collect();
        let completed = AtomicUsize::new(0);
        let total = plan.sources.len();

        let outcomes = executor.run(
            &plan.specs,
            |spec| produce(self.backend, &plan, spec, quality),
            |index, result| {
                let spec = &plan.specs[index];
                let source = &plan.sources[spec.source];
                if let Err(failure) = result {
                    let failure = artifact_failure(&plan, spec, failure);
                    tracing::debug!(
                        source = %failure.source_file,
                        artifact = %failure.artifact,
                        format = failure.format.label(),
                        root = %failure.root,
                        "artifact failed: {}",
                        failure.message
                    );
                    failed[spec.source].fetch_add(1, Ordering::SeqCst);
                    self.emit(ProcessEvent::ArtifactFailed(failure));
                }
                if remaining[spec.source].fetch_sub(1, Ordering::SeqCst) == 1 {
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.emit(ProcessEvent::SourceFinished {
                        file_name: source.file_name.clone(),
                        completed: done,
                        total,
                        failed_artifacts: failed[spec.source].load(Ordering::SeqCst),
                    });
                }
            },
        );

        let mut summary = RunSummary {
            sources: total,
            clamps: plan.clamps.clone(),
            ..RunSummary::default()
        };
        for outcome in outcomes {
            let spec = &plan.specs[outcome.index];
            match outcome.result {
                Ok(dims) => summary.produced.push(ProducedArtifact {
                    source: spec.source,
                    source_file: plan.sources[spec.source].file_name.clone(),
                    root: spec.root.clone(),
                    file: spec.file_name(),
                    width: dims.width,
                    height: dims.height,
                    format: spec.format,
                }),
                Err(failure) => summary
                    .failures
                    .push(artifact_failure(&plan, spec, &failure)),
            }
        }
        summary
    }
}

/// Produce one artifact; returns the pixel dimensions written.
fn produce(
    backend: &impl ImageBackend,
    plan: &Plan,
    spec: &OutputSpec,
    quality: Quality,
) -> Result<Dimensions, ArtifactError> {
    let source = &plan.sources[spec.source];
    match &spec.action {
        Action::Resize {
            width,
            height,
            blur_sigma,
        } => {
            backend.resize(&ResizeParams {
                source: source.path.clone(),
                output: spec.path.clone(),
                width: *width,
                height: *height,
                format: spec.format,
                quality,
                blur_sigma: *blur_sigma,
            })?;
            Ok(Dimensions::new(*width, *height))
        }
        Action::Copy => {
            backend.copy(&source.path, &spec.path)?;
            source
                .dimensions
                .ok_or_else(|| ArtifactError::Unreadable("dimensions unknown".into()))
        }
        Action::Unreadable(message) => Err(ArtifactError::Unreadable(message.clone())),
    }
}

fn artifact_failure(plan: &Plan, spec: &OutputSpec, failure: &TaskFailure) -> ArtifactFailure {
    ArtifactFailure {
        source_file: plan.sources[spec.source].file_name.clone(),
        artifact: spec.file_name(),
        kind: spec.kind,
        format: spec.format,
        root: spec.root.clone(),
        message: failure.to_string(),
    }
}

/// Per-root manifest: source file name → produced artifacts sorted by name.
pub fn manifest_for_root<'a>(
    summary: &'a RunSummary,
    root: &str,
) -> BTreeMap<&'a str, Vec<&'a ProducedArtifact>> {
    let mut manifest: BTreeMap<&str, Vec<&ProducedArtifact>> = BTreeMap::new();
    for artifact in summary.produced.iter().filter(|a| a.root == root) {
        manifest
            .entry(artifact.source_file.as_str())
            .or_default()
            .push(artifact);
    }
    for artifacts in manifest.values_mut() {
        artifacts.sort_by(|a, b| a.file.cmp(&b.file));
    }
    manifest
}

fn write_manifests(config: &PipelineConfig, summary: &RunSummary) -> Result<(), ProcessError> {
    for root in &config.outputs {
        let path = root.dir.join(MANIFEST_FILENAME);
        let manifest_error = |message: String| ProcessError::Manifest {
            path: path.clone(),
            message,
        };
        let json = serde_json::to_string_pretty(&manifest_for_root(summary, &root.tag))
            .map_err(|e| manifest_error(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| manifest_error(e.to_string()))?;
        tracing::debug!(path = %path.display(), "wrote manifest");
    }
    Ok(())
}
