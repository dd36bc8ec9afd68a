//! Completion barrier: block until every relevant entity reports
//! `Completed` for an action, or time out.
//!
//! The work being waited on may run in another process, so the only signal
//! is the persisted state. Every poll reads the state of the relevant
//! entities afresh and nothing else. A state written between two polls is
//! seen at the next one; a status file that fails to parse is treated as
//! pending rather than as an error.
//!
//! `Failed` and `Skipped` do not satisfy the barrier. An entity stuck in one
//! of them keeps the barrier polling until the timeout expires.

use crate::config::StudyConfig;
use crate::error::{GazeflowError, Result};
use crate::state::{Entity, FileStateStore, StateStore};
use crate::types::{Action, State};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(900);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierOptions {
    /// Total time spent sleeping between polls before giving up.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for BarrierOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl BarrierOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Polls a [`StateStore`] on behalf of one pipeline run.
pub struct Barrier<'a> {
    store: &'a dyn StateStore,
    options: BarrierOptions,
    cancel: CancellationToken,
}

impl<'a> Barrier<'a> {
    pub fn new(store: &'a dyn StateStore, options: BarrierOptions) -> Self {
        Self {
            store,
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Block until all entities relevant to `action` are `Completed`.
    ///
    /// For a session-level action that is the session itself. Otherwise it is
    /// every recording in the session, or only the sync reference recording
    /// when `only_relevant` is set.
    pub fn wait(
        &self,
        working_dir: &Path,
        action: Action,
        only_relevant: bool,
        study: &StudyConfig,
    ) -> Result<()> {
        let relevant = relevant_entities(action, only_relevant, study);
        let scope = if only_relevant {
            "the relevant recordings"
        } else {
            "all recordings"
        };
        tracing::info!(
            action = action.displayable_name(),
            entities = relevant.len(),
            "waiting until '{}' is completed for {scope}",
            action.displayable_name()
        );
        if relevant.is_empty() {
            tracing::warn!(
                action = action.displayable_name(),
                "no relevant entities to wait for"
            );
        }

        // A zero interval would never advance the wait clock.
        let step = self.options.poll_interval.max(Duration::from_millis(1));
        let mut waited = Duration::ZERO;

        loop {
            if self.cancel.is_cancelled() {
                return Err(GazeflowError::Cancelled {
                    action: action.displayable_name().to_string(),
                });
            }

            let pending: Vec<(&Entity, Option<State>)> = relevant
                .iter()
                .map(|e| (e, self.read_state(working_dir, e, action)))
                .filter(|(_, s)| *s != Some(State::Completed))
                .collect();

            if pending.is_empty() {
                tracing::info!(
                    action = action.displayable_name(),
                    waited_secs = waited.as_secs_f64(),
                    "'{}' completed for {scope}",
                    action.displayable_name()
                );
                return Ok(());
            }

            for (entity, state) in &pending {
                let state = state.map_or("unreadable", State::displayable_name);
                tracing::debug!(%entity, state, "still waiting");
            }

            if waited >= self.options.timeout {
                return Err(GazeflowError::BarrierTimeout {
                    action: action.displayable_name().to_string(),
                    waited_secs: waited.as_secs_f64(),
                });
            }

            std::thread::sleep(step);
            waited += step;
        }
    }

    /// Fresh read of one entity's state. A status file that cannot be read
    /// right now counts as pending; the next poll tries again.
    fn read_state(&self, working_dir: &Path, entity: &Entity, action: Action) -> Option<State> {
        match self.store.get_state(working_dir, entity, action) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::debug!(%entity, error = %e, "status not readable yet");
                None
            }
        }
    }
}

/// Entities whose state must reach `Completed` for `action`.
pub fn relevant_entities(action: Action, only_relevant: bool, study: &StudyConfig) -> Vec<Entity> {
    if action.is_session_level() {
        return vec![Entity::Session];
    }
    study
        .session_def
        .recordings
        .iter()
        .filter(|r| !only_relevant || study.sync_ref_recording.as_deref() == Some(r.name.as_str()))
        .map(|r| Entity::recording(&r.name))
        .collect()
}

/// Standalone barrier over the file-backed state store, for callers that
/// dispatch actions by other means (a worker pool, another process).
pub fn wait_until_all_done(
    working_dir: &Path,
    action: Action,
    only_relevant: bool,
    options: BarrierOptions,
    study: &StudyConfig,
) -> Result<()> {
    Barrier::new(&FileStateStore, options).wait(working_dir, action, only_relevant, study)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::update_action_state;
    use std::time::Instant;
    use tempfile::TempDir;

    // One "time unit" of the barrier laws.
    const UNIT: Duration = Duration::from_millis(50);

    fn study() -> StudyConfig {
        serde_yaml::from_str(
            "session_def:\n  - {name: A, type: eye_tracker}\n  - {name: B, type: eye_tracker}\n\
             sync_ref_recording: A\n",
        )
        .unwrap()
    }

    fn opts(timeout_units: u32) -> BarrierOptions {
        BarrierOptions::default()
            .with_timeout(UNIT * timeout_units)
            .with_poll_interval(UNIT * 2)
    }

    fn set(dir: &Path, rec: Option<&str>, action: Action, state: State) {
        let wd = match rec {
            Some(r) => dir.join(r),
            None => dir.to_path_buf(),
        };
        update_action_state(&wd, action, state, &study(), &FileStateStore).unwrap();
    }

    #[test]
    fn defaults_match_pipeline_constants() {
        let o = BarrierOptions::default();
        assert_eq!(o.timeout, Duration::from_secs(900));
        assert_eq!(o.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn session_level_action_consults_only_the_session() {
        assert_eq!(
            relevant_entities(Action::RunValidation, false, &study()),
            vec![Entity::Session]
        );
        assert_eq!(
            relevant_entities(Action::SyncToReference, true, &study()),
            vec![Entity::Session]
        );

        // Recordings are irrelevant: the session alone completing satisfies it.
        let dir = TempDir::new().unwrap();
        set(dir.path(), None, Action::SyncToReference, State::Completed);
        wait_until_all_done(dir.path(), Action::SyncToReference, false, opts(4), &study())
            .unwrap();
    }

    #[test]
    fn recording_level_requires_every_recording() {
        assert_eq!(
            relevant_entities(Action::DetectMarkers, false, &study()),
            vec![Entity::recording("A"), Entity::recording("B")]
        );
        let dir = TempDir::new().unwrap();
        set(dir.path(), Some("A"), Action::GazeToPlane, State::Completed);
        let err =
            wait_until_all_done(dir.path(), Action::GazeToPlane, false, opts(2), &study())
                .unwrap_err();
        assert!(matches!(err, GazeflowError::BarrierTimeout { .. }));

        set(dir.path(), Some("B"), Action::GazeToPlane, State::Completed);
        wait_until_all_done(dir.path(), Action::GazeToPlane, false, opts(2), &study()).unwrap();
    }

    #[test]
    fn only_relevant_waits_for_sync_reference_alone() {
        assert_eq!(
            relevant_entities(Action::AutoCodeTrials, true, &study()),
            vec![Entity::recording("A")]
        );
        let dir = TempDir::new().unwrap();
        set(dir.path(), Some("A"), Action::AutoCodeTrials, State::Completed);
        set(dir.path(), Some("B"), Action::AutoCodeTrials, State::Failed);
        wait_until_all_done(dir.path(), Action::AutoCodeTrials, true, opts(4), &study()).unwrap();
    }

    #[test]
    fn only_relevant_without_sync_reference_is_trivially_done() {
        let mut cfg = study();
        cfg.sync_ref_recording = None;
        assert!(relevant_entities(Action::AutoCodeTrials, true, &cfg).is_empty());
        let dir = TempDir::new().unwrap();
        wait_until_all_done(dir.path(), Action::AutoCodeTrials, true, opts(4), &cfg).unwrap();
    }

    #[test]
    fn failed_recording_times_out_after_configured_wait() {
        let dir = TempDir::new().unwrap();
        set(dir.path(), Some("A"), Action::DetectMarkers, State::Completed);
        set(dir.path(), Some("B"), Action::DetectMarkers, State::Failed);

        let start = Instant::now();
        let err = wait_until_all_done(dir.path(), Action::DetectMarkers, false, opts(4), &study())
            .unwrap_err();
        let elapsed = start.elapsed();

        match err {
            GazeflowError::BarrierTimeout { action, waited_secs } => {
                assert_eq!(action, "Detect Markers");
                assert!((waited_secs - (UNIT * 4).as_secs_f64()).abs() < 1e-9);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(elapsed >= UNIT * 4, "timed out early: {elapsed:?}");
        assert!(elapsed < UNIT * 4 + UNIT * 2 * 5, "timed out late: {elapsed:?}");
    }

    #[test]
    fn skipped_session_action_times_out() {
        let dir = TempDir::new().unwrap();
        set(dir.path(), None, Action::RunValidation, State::Skipped);
        let err = wait_until_all_done(dir.path(), Action::RunValidation, false, opts(2), &study())
            .unwrap_err();
        assert!(matches!(err, GazeflowError::BarrierTimeout { .. }));
    }

    #[test]
    fn states_written_by_another_thread_are_seen() {
        let dir = TempDir::new().unwrap();
        let session_dir = dir.path().to_path_buf();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(UNIT);
            set(&session_dir, Some("A"), Action::DetectMarkers, State::Completed);
            set(&session_dir, Some("B"), Action::DetectMarkers, State::Completed);
        });

        let start = Instant::now();
        wait_until_all_done(dir.path(), Action::DetectMarkers, false, opts(40), &study()).unwrap();
        writer.join().unwrap();
        assert!(start.elapsed() < UNIT * 40);
    }

    #[test]
    fn zero_timeout_checks_once() {
        let dir = TempDir::new().unwrap();
        set(dir.path(), Some("A"), Action::ExportTrials, State::Completed);
        set(dir.path(), Some("B"), Action::ExportTrials, State::Completed);
        wait_until_all_done(dir.path(), Action::ExportTrials, false, opts(0), &study()).unwrap();

        let err = wait_until_all_done(dir.path(), Action::GazeToPlane, false, opts(0), &study())
            .unwrap_err();
        assert!(matches!(err, GazeflowError::BarrierTimeout { waited_secs, .. } if waited_secs == 0.0));
    }

    fn write_torn_status(dir: &Path, rec: &str) -> std::path::PathBuf {
        let path = dir.join(rec).join(crate::paths::STATUS_FILE);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "actions: [half-writ").unwrap();
        path
    }

    #[test]
    fn session_level_wait_ignores_recording_status_files() {
        let dir = TempDir::new().unwrap();
        set(dir.path(), None, Action::RunValidation, State::Completed);
        write_torn_status(dir.path(), "B");

        wait_until_all_done(dir.path(), Action::RunValidation, false, opts(2), &study()).unwrap();
    }

    #[test]
    fn unreadable_status_keeps_waiting_until_timeout() {
        let dir = TempDir::new().unwrap();
        write_torn_status(dir.path(), "A");
        set(dir.path(), Some("B"), Action::DetectMarkers, State::Completed);

        let err = wait_until_all_done(dir.path(), Action::DetectMarkers, false, opts(2), &study())
            .unwrap_err();
        assert!(matches!(err, GazeflowError::BarrierTimeout { .. }));
    }

    #[test]
    fn unreadable_status_is_read_again_next_poll() {
        let dir = TempDir::new().unwrap();
        let torn = write_torn_status(dir.path(), "A");
        set(dir.path(), Some("B"), Action::DetectMarkers, State::Completed);

        let session_dir = dir.path().to_path_buf();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(UNIT);
            std::fs::remove_file(&torn).unwrap();
            set(&session_dir, Some("A"), Action::DetectMarkers, State::Completed);
        });

        wait_until_all_done(dir.path(), Action::DetectMarkers, false, opts(40), &study()).unwrap();
        writer.join().unwrap();
    }

    #[test]
    fn cancellation_stops_the_wait() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = Barrier::new(&FileStateStore, opts(40))
            .with_cancellation(token)
            .wait(dir.path(), Action::DetectMarkers, false, &study())
            .unwrap_err();
        assert!(matches!(err, GazeflowError::Cancelled { .. }));
    }
}
