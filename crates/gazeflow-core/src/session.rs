//! Live view of a session and its recordings.
//!
//! A [`Session`] is rebuilt from the study's session definition and the
//! state store every time it is needed. It is a snapshot: callers that wait
//! for other processes must rebuild it to see their writes.

use crate::config::{RecordingDefinition, SessionDefinition, StudyConfig};
use crate::error::{GazeflowError, Result};
use crate::state::{Entity, StateStore};
use crate::types::{Action, RecordingType, State};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Recording {
    pub definition: RecordingDefinition,
    /// States of recording-level actions only.
    pub state: BTreeMap<Action, State>,
}

impl Recording {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn kind(&self) -> RecordingType {
        self.definition.kind
    }

    pub fn state_of(&self, action: Action) -> State {
        self.state.get(&action).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub working_dir: PathBuf,
    /// Recordings in session-definition order.
    pub recordings: Vec<Recording>,
    /// States of session-level actions only.
    pub state: BTreeMap<Action, State>,
}

impl Session {
    pub fn from_definition(
        def: &SessionDefinition,
        working_dir: &Path,
        store: &dyn StateStore,
    ) -> Result<Self> {
        let recordings = def
            .recordings
            .iter()
            .map(|rec_def| {
                let state = store.states(working_dir, &Entity::recording(&rec_def.name))?;
                Ok(Recording {
                    definition: rec_def.clone(),
                    state,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            working_dir: working_dir.to_path_buf(),
            recordings,
            state: store.states(working_dir, &Entity::Session)?,
        })
    }

    pub fn name(&self) -> String {
        self.working_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.working_dir.display().to_string())
    }

    pub fn recording(&self, name: &str) -> Option<&Recording> {
        self.recordings.iter().find(|r| r.name() == name)
    }

    pub fn recording_names(&self) -> Vec<&str> {
        self.recordings.iter().map(|r| r.name()).collect()
    }

    /// State of `action` for `entity` as of when this view was built.
    pub fn state_of(&self, entity: &Entity, action: Action) -> State {
        match entity {
            Entity::Session => self.state.get(&action).copied().unwrap_or_default(),
            Entity::Recording(name) => self
                .recording(name)
                .map(|r| r.state_of(action))
                .unwrap_or_default(),
        }
    }

    /// Every entity `action` applies to, with its current state: the session
    /// alone for session-level actions, otherwise each recording in order.
    pub fn action_states(&self, action: Action) -> Vec<(Entity, State)> {
        if action.is_session_level() {
            return vec![(Entity::Session, self.state_of(&Entity::Session, action))];
        }
        self.recordings
            .iter()
            .map(|r| (Entity::recording(r.name()), r.state_of(action)))
            .collect()
    }
}

/// Record the outcome of `action` for the entity `working_dir` stands for.
///
/// This is the writer side used by action implementations. For a
/// session-level action `working_dir` is the session directory. For a
/// recording-level action it is the recording directory, whose name must be
/// in the session definition and whose parent is the session directory.
pub fn update_action_state(
    working_dir: &Path,
    action: Action,
    state: State,
    study: &StudyConfig,
    store: &dyn StateStore,
) -> Result<()> {
    let (session_dir, entity) = resolve_entity(working_dir, action, study)?;
    store.set_state(&session_dir, &entity, action, state)?;
    tracing::info!(
        action = action.displayable_name(),
        %entity,
        state = state.displayable_name(),
        "action state updated"
    );
    Ok(())
}

/// Map a working directory to the session directory and entity that
/// `action` records its state against.
pub fn resolve_entity(
    working_dir: &Path,
    action: Action,
    study: &StudyConfig,
) -> Result<(PathBuf, Entity)> {
    if action.is_session_level() {
        return Ok((working_dir.to_path_buf(), Entity::Session));
    }
    let name = working_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| GazeflowError::RecordingNotFound(working_dir.display().to_string()))?;
    if study.session_def.get_recording_def(&name).is_none() {
        return Err(GazeflowError::RecordingNotFound(name));
    }
    let session_dir = working_dir
        .parent()
        .ok_or_else(|| GazeflowError::RecordingNotFound(name.clone()))?;
    Ok((session_dir.to_path_buf(), Entity::Recording(name)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FileStateStore;
    use tempfile::TempDir;

    fn study() -> StudyConfig {
        serde_yaml::from_str(
            "session_def:\n  - {name: A, type: eye_tracker}\n  - {name: B, type: camera}\n\
             sync_ref_recording: A\n",
        )
        .unwrap()
    }

    #[test]
    fn fresh_session_is_all_not_run() {
        let dir = TempDir::new().unwrap();
        let cfg = study();
        let session = Session::from_definition(&cfg.session_def, dir.path(), &FileStateStore)
            .unwrap();
        assert_eq!(session.recording_names(), vec!["A", "B"]);
        assert_eq!(session.recording("B").unwrap().kind(), RecordingType::Camera);
        assert!(session.state.values().all(|s| *s == State::NotRun));
        assert_eq!(
            session.state_of(&Entity::recording("A"), Action::DetectMarkers),
            State::NotRun
        );
    }

    #[test]
    fn view_is_a_snapshot() {
        let dir = TempDir::new().unwrap();
        let cfg = study();
        let before = Session::from_definition(&cfg.session_def, dir.path(), &FileStateStore)
            .unwrap();
        update_action_state(
            &dir.path().join("A"),
            Action::DetectMarkers,
            State::Completed,
            &cfg,
            &FileStateStore,
        )
        .unwrap();
        assert_eq!(
            before.state_of(&Entity::recording("A"), Action::DetectMarkers),
            State::NotRun
        );
        let after = Session::from_definition(&cfg.session_def, dir.path(), &FileStateStore)
            .unwrap();
        assert_eq!(
            after.state_of(&Entity::recording("A"), Action::DetectMarkers),
            State::Completed
        );
    }

    #[test]
    fn action_states_follow_granularity() {
        let dir = TempDir::new().unwrap();
        let cfg = study();
        update_action_state(
            dir.path(),
            Action::RunValidation,
            State::Skipped,
            &cfg,
            &FileStateStore,
        )
        .unwrap();
        let session = Session::from_definition(&cfg.session_def, dir.path(), &FileStateStore)
            .unwrap();

        let session_level = session.action_states(Action::RunValidation);
        assert_eq!(session_level, vec![(Entity::Session, State::Skipped)]);

        let rec_level = session.action_states(Action::GazeToPlane);
        assert_eq!(
            rec_level,
            vec![
                (Entity::recording("A"), State::NotRun),
                (Entity::recording("B"), State::NotRun),
            ]
        );
    }

    #[test]
    fn update_unknown_recording_fails() {
        let dir = TempDir::new().unwrap();
        let err = update_action_state(
            &dir.path().join("C"),
            Action::DetectMarkers,
            State::Completed,
            &study(),
            &FileStateStore,
        )
        .unwrap_err();
        assert!(matches!(err, GazeflowError::RecordingNotFound(n) if n == "C"));
    }

    #[test]
    fn resolve_entity_for_session_action() {
        let dir = TempDir::new().unwrap();
        let (session_dir, entity) =
            resolve_entity(dir.path(), Action::SyncToReference, &study()).unwrap();
        assert_eq!(session_dir, dir.path());
        assert_eq!(entity, Entity::Session);
    }
}
