use crate::error::{GazeflowError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// File and directory names
// ---------------------------------------------------------------------------

pub const CONFIG_DIR: &str = "config";
pub const STUDY_DEF_FILE: &str = "study_def.yaml";
pub const OVERRIDE_FILE: &str = "study_def_override.yaml";
pub const STATUS_FILE: &str = "gazeflow_status.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn study_def_path(config_dir: &Path) -> PathBuf {
    config_dir.join(STUDY_DEF_FILE)
}

pub fn override_path(dir: &Path) -> PathBuf {
    dir.join(OVERRIDE_FILE)
}

pub fn recording_dir(session_dir: &Path, recording: &str) -> PathBuf {
    session_dir.join(recording)
}

pub fn session_status_path(session_dir: &Path) -> PathBuf {
    session_dir.join(STATUS_FILE)
}

pub fn recording_status_path(session_dir: &Path, recording: &str) -> PathBuf {
    recording_dir(session_dir, recording).join(STATUS_FILE)
}

/// Locate the study config directory for a session or recording directory.
///
/// Walks upward from `working_dir` and returns the first `config/` directory
/// that contains a `study_def.yaml`.
pub fn guess_config_dir(working_dir: &Path) -> Result<PathBuf> {
    let mut dir = Some(working_dir);
    while let Some(d) = dir {
        let candidate = d.join(CONFIG_DIR);
        if study_def_path(&candidate).is_file() {
            return Ok(candidate);
        }
        dir = d.parent();
    }
    Err(GazeflowError::ConfigNotFound(
        working_dir.display().to_string(),
    ))
}

// ---------------------------------------------------------------------------
// Recording name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").unwrap())
}

/// Recording names double as directory names inside the session.
pub fn validate_recording_name(name: &str) -> Result<()> {
    if name.len() > 128 || !name_re().is_match(name) || name == CONFIG_DIR {
        return Err(GazeflowError::InvalidRecordingName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
