//! The capability every action implementation provides.
//!
//! The executor only ever sees `dyn ActionRunner`. Concrete work is either a
//! closure registered programmatically or an external program configured in
//! the study config and launched by [`CommandRunner`].
//!
//! # Command protocol
//! - argv: `<command> <args...> <working_dir>`
//! - env: `GAZEFLOW_ACTION` (snake_case action name), `GAZEFLOW_CONFIG_DIR`
//!   (if known), `GAZEFLOW_OVERRIDES` (JSON object, possibly empty)
//! - stdout/stderr are inherited so tool output appears in the terminal
//! - the program writes its own terminal state, e.g. via `gazeflow state set`
//! - a non-zero exit status is an action error

use crate::config::{ActionCommand, Overrides};
use crate::error::{GazeflowError, Result};
use crate::types::Action;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub trait ActionRunner: Send + Sync {
    /// Perform the action for `working_dir` (a session or recording
    /// directory, depending on the action's granularity).
    fn run(&self, working_dir: &Path, config_dir: Option<&Path>, overrides: &Overrides)
        -> Result<()>;
}

impl<F> ActionRunner for F
where
    F: Fn(&Path, Option<&Path>, &Overrides) -> Result<()> + Send + Sync,
{
    fn run(
        &self,
        working_dir: &Path,
        config_dir: Option<&Path>,
        overrides: &Overrides,
    ) -> Result<()> {
        self(working_dir, config_dir, overrides)
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CommandRunner {
    action: Action,
    command: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(action: Action, cmd: &ActionCommand) -> Self {
        Self {
            action,
            command: cmd.command.clone(),
            args: cmd.args.clone(),
        }
    }

    /// Resolve the configured program: paths are used as given, bare names
    /// are looked up on `PATH`.
    fn program(&self) -> Result<PathBuf> {
        let as_path = Path::new(&self.command);
        if as_path.components().count() > 1 {
            return Ok(as_path.to_path_buf());
        }
        which::which(&self.command).map_err(|e| GazeflowError::SpawnFailed {
            program: self.command.clone(),
            reason: e.to_string(),
        })
    }
}

impl ActionRunner for CommandRunner {
    fn run(
        &self,
        working_dir: &Path,
        config_dir: Option<&Path>,
        overrides: &Overrides,
    ) -> Result<()> {
        let program = self.program()?;
        let mut cmd = Command::new(&program);
        cmd.args(&self.args)
            .arg(working_dir)
            .env("GAZEFLOW_ACTION", self.action.as_str())
            .env("GAZEFLOW_OVERRIDES", serde_json::to_string(overrides)?)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = config_dir {
            cmd.env("GAZEFLOW_CONFIG_DIR", dir);
        }

        tracing::debug!(
            program = %program.display(),
            args = ?self.args,
            working_dir = %working_dir.display(),
            "launching action command"
        );

        let status = cmd.status().map_err(|e| GazeflowError::SpawnFailed {
            program: program.display().to_string(),
            reason: e.to_string(),
        })?;

        if !status.success() {
            return Err(GazeflowError::ActionFailed {
                action: self.action.displayable_name().to_string(),
                target: working_dir.display().to_string(),
                reason: format!("'{}' exited with {status}", self.command),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
