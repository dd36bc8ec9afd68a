//! Persisted action states for sessions and recordings.
//!
//! Every (entity, action) pair has exactly one current [`State`]; a pair
//! that was never written reads as [`State::NotRun`]. States live in small
//! YAML status files next to the data they describe so that a process other
//! than the writer can observe them:
//!
//! - `<session>/gazeflow_status.yaml` for session-level actions
//! - `<session>/<recording>/gazeflow_status.yaml` for recording-level actions
//!
//! Reads always go back to disk. Nothing is cached between calls.

use crate::error::{GazeflowError, Result};
use crate::paths;
use crate::types::{Action, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// The thing an action state belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
    Session,
    Recording(String),
}

impl Entity {
    pub fn recording(name: impl Into<String>) -> Self {
        Entity::Recording(name.into())
    }

    /// Check that `action` applies at this entity's granularity.
    pub fn check_applies(&self, action: Action) -> Result<()> {
        match (self, action.is_session_level()) {
            (Entity::Session, true) | (Entity::Recording(_), false) => Ok(()),
            (_, session_level) => Err(GazeflowError::EntityMismatch {
                action: action.to_string(),
                entity: self.to_string(),
                level: if session_level { "session" } else { "recording" },
            }),
        }
    }

    fn status_path(&self, session_dir: &Path) -> PathBuf {
        match self {
            Entity::Session => paths::session_status_path(session_dir),
            Entity::Recording(name) => paths::recording_status_path(session_dir, name),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Session => f.write_str("session"),
            Entity::Recording(name) => write!(f, "recording '{name}'"),
        }
    }
}

// ---------------------------------------------------------------------------
// StatusFile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub state: State,
    pub updated_at: DateTime<Utc>,
}

/// On-disk layout of one status file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub actions: BTreeMap<Action, StateEntry>,
}

fn default_version() -> u32 {
    1
}

impl Default for StatusFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            actions: BTreeMap::new(),
        }
    }
}

impl StatusFile {
    pub fn load(path: &Path) -> Result<Self> {
        match crate::io::read_if_exists(path)? {
            Some(data) if !data.trim().is_empty() => Ok(serde_yaml::from_str(&data)?),
            _ => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn state(&self, action: Action) -> State {
        self.actions
            .get(&action)
            .map(|e| e.state)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// Read/write access to action states of one session directory.
///
/// Writers are the action implementations. The completion barrier and the
/// session view only read.
pub trait StateStore: Send + Sync {
    /// Most recently persisted state, `NotRun` if never written.
    fn get_state(&self, session_dir: &Path, entity: &Entity, action: Action) -> Result<State>;

    fn set_state(
        &self,
        session_dir: &Path,
        entity: &Entity,
        action: Action,
        state: State,
    ) -> Result<()>;

    /// All states of the actions that apply to `entity`, defaults included.
    fn states(&self, session_dir: &Path, entity: &Entity) -> Result<BTreeMap<Action, State>> {
        let mut out = BTreeMap::new();
        for &action in Action::all() {
            if entity.check_applies(action).is_ok() {
                out.insert(action, self.get_state(session_dir, entity, action)?);
            }
        }
        Ok(out)
    }
}

/// [`StateStore`] backed by YAML status files in the session tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStateStore;

impl StateStore for FileStateStore {
    fn get_state(&self, session_dir: &Path, entity: &Entity, action: Action) -> Result<State> {
        entity.check_applies(action)?;
        let file = StatusFile::load(&entity.status_path(session_dir))?;
        Ok(file.state(action))
    }

    fn set_state(
        &self,
        session_dir: &Path,
        entity: &Entity,
        action: Action,
        state: State,
    ) -> Result<()> {
        entity.check_applies(action)?;
        let path = entity.status_path(session_dir);
        let mut file = StatusFile::load(&path)?;
        file.actions.insert(
            action,
            StateEntry {
                state,
                updated_at: Utc::now(),
            },
        );
        file.save(&path)?;
        tracing::debug!(%entity, %action, %state, "action state written");
        Ok(())
    }

    fn states(&self, session_dir: &Path, entity: &Entity) -> Result<BTreeMap<Action, State>> {
        // One read per entity instead of one per action.
        let file = StatusFile::load(&entity.status_path(session_dir))?;
        Ok(Action::all()
            .iter()
            .copied()
            .filter(|a| entity.check_applies(*a).is_ok())
            .map(|a| (a, file.state(a)))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
