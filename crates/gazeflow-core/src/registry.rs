//! Static action table: metadata plus the runner that performs each action.
//!
//! Built once before a pipeline starts and never mutated afterwards.

use crate::config::StudyConfig;
use crate::error::{GazeflowError, Result};
use crate::runner::{ActionRunner, CommandRunner};
use crate::types::Action;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Metadata for one action, as shown by `gazeflow actions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionInfo {
    pub action: Action,
    pub displayable_name: &'static str,
    pub is_session_level: bool,
    pub needs_gui: bool,
}

impl ActionInfo {
    pub fn of(action: Action) -> Self {
        Self {
            action,
            displayable_name: action.displayable_name(),
            is_session_level: action.is_session_level(),
            needs_gui: action.needs_gui(),
        }
    }

    pub fn all() -> Vec<Self> {
        Action::all().iter().copied().map(Self::of).collect()
    }
}

#[derive(Clone, Default)]
pub struct ActionRegistry {
    runners: HashMap<Action, Arc<dyn ActionRunner>>,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::default()
    }

    /// One [`CommandRunner`] per action with a command in the study config.
    pub fn from_study(study: &StudyConfig) -> Self {
        let mut builder = Self::builder();
        for (&action, cmd) in &study.actions {
            builder = builder.register(action, CommandRunner::new(action, cmd));
        }
        builder.build()
    }

    pub fn runner(&self, action: Action) -> Result<&dyn ActionRunner> {
        self.runners
            .get(&action)
            .map(|r| r.as_ref())
            .ok_or_else(|| GazeflowError::NoRunner(action.to_string()))
    }

    pub fn contains(&self, action: Action) -> bool {
        self.runners.contains_key(&action)
    }

    /// Registered actions in canonical order.
    pub fn actions(&self) -> Vec<Action> {
        Action::all()
            .iter()
            .copied()
            .filter(|a| self.contains(*a))
            .collect()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions())
            .finish()
    }
}

#[derive(Default)]
pub struct ActionRegistryBuilder {
    runners: HashMap<Action, Arc<dyn ActionRunner>>,
}

impl ActionRegistryBuilder {
    /// Register `runner` for `action`, replacing any earlier registration.
    pub fn register(mut self, action: Action, runner: impl ActionRunner + 'static) -> Self {
        self.runners.insert(action, Arc::new(runner));
        self
    }

    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            runners: self.runners,
        }
    }
}
