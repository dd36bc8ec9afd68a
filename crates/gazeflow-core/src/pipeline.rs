//! Sequential pipeline executor.
//!
//! Runs a fixed list of actions against one session directory. Each action
//! is dispatched (once for the session, or once per recording) and then
//! gated on the completion barrier before the next one starts. The first
//! error from a runner or the barrier aborts the run and is returned as is;
//! later actions are never invoked and nothing is retried or rolled back.

use crate::barrier::{Barrier, BarrierOptions};
use crate::config::{Overrides, StudyConfig};
use crate::error::{GazeflowError, Result};
use crate::paths;
use crate::registry::ActionRegistry;
use crate::runner::ActionRunner;
use crate::session::Session;
use crate::state::{FileStateStore, StateStore};
use crate::types::Action;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pipeline {
    /// Marker detection followed by automatic sync point and trial coding.
    AutoCoding,
    /// Everything after coding: sync, mapping, validation, distance, video.
    PostCoding,
}

impl Pipeline {
    pub fn all() -> &'static [Pipeline] {
        &[Pipeline::AutoCoding, Pipeline::PostCoding]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Pipeline::AutoCoding => "auto-coding",
            Pipeline::PostCoding => "post-coding",
        }
    }

    pub fn actions(self) -> &'static [Action] {
        match self {
            Pipeline::AutoCoding => &[
                Action::DetectMarkers,
                Action::AutoCodeSync,
                Action::AutoCodeTrials,
            ],
            Pipeline::PostCoding => &[
                Action::SyncToReference,
                Action::GazeToPlane,
                Action::RunValidation,
                Action::ComputeGazeDistance,
                Action::MakeMappedGazeVideo,
            ],
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Pipeline {
    type Err = GazeflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "auto-coding" | "auto-codes" => Ok(Pipeline::AutoCoding),
            "post-coding" => Ok(Pipeline::PostCoding),
            _ => Err(GazeflowError::UnknownPipeline(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineExecutor
// ---------------------------------------------------------------------------

pub struct PipelineExecutor<'a> {
    registry: &'a ActionRegistry,
    store: &'a dyn StateStore,
    options: BarrierOptions,
    cancel: CancellationToken,
    config_dir: Option<PathBuf>,
    overrides: Overrides,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(registry: &'a ActionRegistry, store: &'a dyn StateStore) -> Self {
        Self {
            registry,
            store,
            options: BarrierOptions::default(),
            cancel: CancellationToken::new(),
            config_dir: None,
            overrides: Overrides::new(),
        }
    }

    pub fn with_barrier_options(mut self, options: BarrierOptions) -> Self {
        self.options = options;
        self
    }

    /// Checked before every action, before every per-recording dispatch and
    /// at each barrier poll.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_config_dir(mut self, config_dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(config_dir.into());
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn run(&self, pipeline: Pipeline, working_dir: &Path, study: &StudyConfig) -> Result<()> {
        let span = tracing::info_span!(
            "pipeline",
            run_id = %Uuid::new_v4(),
            pipeline = %pipeline,
            working_dir = %working_dir.display(),
        );
        let _enter = span.enter();
        self.run_actions(pipeline.actions(), working_dir, study)?;
        tracing::info!("pipeline '{pipeline}' finished");
        Ok(())
    }

    /// Run `actions` in order against the session at `working_dir`.
    pub fn run_actions(
        &self,
        actions: &[Action],
        working_dir: &Path,
        study: &StudyConfig,
    ) -> Result<()> {
        let session = Session::from_definition(&study.session_def, working_dir, self.store)?;
        let rec_names: Vec<String> = session
            .recording_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let barrier = Barrier::new(self.store, self.options).with_cancellation(self.cancel.clone());

        for &action in actions {
            self.check_cancelled(action)?;

            if action.needs_gui() {
                tracing::warn!(
                    action = action.displayable_name(),
                    "action needs a GUI and is skipped"
                );
                continue;
            }

            tracing::info!(action = action.displayable_name(), "running");
            let only_relevant = action == Action::AutoCodeTrials;
            let result = self
                .registry
                .runner(action)
                .and_then(|runner| self.dispatch(runner, action, working_dir, &rec_names, study))
                .and_then(|()| barrier.wait(working_dir, action, only_relevant, study));

            if let Err(e) = result {
                tracing::error!(
                    action = action.displayable_name(),
                    error = %e,
                    "pipeline aborted"
                );
                return Err(e);
            }
        }
        Ok(())
    }

    fn dispatch(
        &self,
        runner: &dyn ActionRunner,
        action: Action,
        working_dir: &Path,
        rec_names: &[String],
        study: &StudyConfig,
    ) -> Result<()> {
        let config_dir = self.config_dir.as_deref();

        if action.is_session_level() {
            return runner.run(working_dir, config_dir, &self.overrides);
        }

        if action == Action::AutoCodeTrials && study.sync_ref_recording.is_none() {
            tracing::warn!(
                action = action.displayable_name(),
                "no sync reference recording configured; nothing to run"
            );
        }

        for rec in rec_names {
            // Trials are coded on the reference recording only; the others
            // derive theirs from it.
            if action == Action::AutoCodeTrials
                && study.sync_ref_recording.as_deref() != Some(rec.as_str())
            {
                continue;
            }
            self.check_cancelled(action)?;
            tracing::debug!(action = action.displayable_name(), recording = %rec, "dispatching");
            runner.run(
                &paths::recording_dir(working_dir, rec),
                config_dir,
                &self.overrides,
            )?;
        }
        Ok(())
    }

    fn check_cancelled(&self, action: Action) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::info!(action = action.displayable_name(), "pipeline cancelled");
            return Err(GazeflowError::Cancelled {
                action: action.displayable_name().to_string(),
            });
        }
        Ok(())
    }
}

/// Run a named pipeline with the commands configured in the study config,
/// the file-backed state store and default barrier settings.
pub fn run_pipeline(pipeline: Pipeline, working_dir: &Path, study: &StudyConfig) -> Result<()> {
    let registry = ActionRegistry::from_study(study);
    PipelineExecutor::new(&registry, &FileStateStore).run(pipeline, working_dir, study)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
