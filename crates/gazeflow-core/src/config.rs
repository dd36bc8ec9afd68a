use crate::error::{GazeflowError, Result};
use crate::paths;
use crate::types::{Action, RecordingType};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Session definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RecordingType,
}

/// The recordings every session of the study consists of, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDefinition {
    pub recordings: Vec<RecordingDefinition>,
}

impl SessionDefinition {
    pub fn get_recording_def(&self, name: &str) -> Option<&RecordingDefinition> {
        self.recordings.iter().find(|r| r.name == name)
    }

    pub fn recording_names(&self) -> Vec<&str> {
        self.recordings.iter().map(|r| r.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// ActionCommand
// ---------------------------------------------------------------------------

/// External program that performs an action. The working directory is
/// appended as the last argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCommand {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Caller-supplied settings merged over the study config and handed to every
/// action runner. Keys may be dotted (`a.b`) to reach nested settings.
pub type Overrides = BTreeMap<String, Value>;

/// Parse a `key=value` pair. The value is read as a YAML scalar so that
/// `true`, `3` and `0.5` keep their types.
pub fn parse_override(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| GazeflowError::InvalidOverride(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(GazeflowError::InvalidOverride(raw.to_string()));
    }
    let value = serde_yaml::from_str::<Value>(value)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

// ---------------------------------------------------------------------------
// StudyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default)]
    pub session_def: SessionDefinition,
    /// Recording whose timeline the others are aligned to. Trial episodes
    /// are only coded for this recording.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_ref_recording: Option<String>,
    #[serde(default)]
    pub auto_code_sync_points: bool,
    #[serde(default)]
    pub auto_code_trial_episodes: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<Action, ActionCommand>,
}

impl StudyConfig {
    pub fn load(config_dir: &Path) -> Result<Self> {
        Self::load_with_overrides(config_dir, &[], &Overrides::new())
    }

    /// Load the study config and merge override layers on top of it.
    ///
    /// `override_dirs` are searched for `study_def_override.yaml` in order
    /// (session first, then recording), each layer deep-merged over the
    /// previous one. Caller `overrides` are applied last.
    pub fn load_with_overrides(
        config_dir: &Path,
        override_dirs: &[&Path],
        overrides: &Overrides,
    ) -> Result<Self> {
        let path = paths::study_def_path(config_dir);
        let data = crate::io::read_if_exists(&path)?
            .ok_or_else(|| GazeflowError::ConfigNotFound(config_dir.display().to_string()))?;
        let mut merged: Value = serde_yaml::from_str(&data)?;

        for dir in override_dirs {
            let layer_path = paths::override_path(dir);
            if let Some(layer) = crate::io::read_if_exists(&layer_path)? {
                tracing::debug!(path = %layer_path.display(), "applying study config override");
                merge_values(&mut merged, serde_yaml::from_str(&layer)?);
            }
        }

        for (key, value) in overrides {
            set_dotted(&mut merged, key, value.clone());
        }

        let cfg: StudyConfig = serde_yaml::from_value(merged)?;
        Ok(cfg)
    }

    pub fn command_for(&self, action: Action) -> Option<&ActionCommand> {
        self.actions.get(&action)
    }

    /// Whether the automatic coding behind `action` is switched on. Actions
    /// that are not auto-coding steps are always enabled.
    pub fn auto_coding_enabled(&self, action: Action) -> bool {
        match action {
            Action::AutoCodeSync => self.auto_code_sync_points,
            Action::AutoCodeTrials => self.auto_code_trial_episodes,
            _ => true,
        }
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.session_def.recordings.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "session_def contains no recordings".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for rec in &self.session_def.recordings {
            if paths::validate_recording_name(&rec.name).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("invalid recording name '{}' in session_def", rec.name),
                });
            }
            if !seen.insert(rec.name.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("duplicate recording name '{}' in session_def", rec.name),
                });
            }
        }

        match &self.sync_ref_recording {
            Some(name) if self.session_def.get_recording_def(name).is_none() => {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "sync_ref_recording '{name}' is not a recording in session_def"
                    ),
                });
            }
            None if self.auto_code_trial_episodes => {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: "auto_code_trial_episodes is set but no sync_ref_recording is \
                              configured; trial coding will not run for any recording"
                        .to_string(),
                });
            }
            _ => {}
        }

        for (action, cmd) in &self.actions {
            if cmd.command.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("action '{action}' has an empty command"),
                });
            }
            if action.needs_gui() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "action '{action}' needs a GUI and is skipped by automated pipelines"
                    ),
                });
            }
            if !self.auto_coding_enabled(*action) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "a command is configured for '{action}' but its automatic coding is disabled"
                    ),
                });
            }
        }

        warnings
    }

    /// Fail on the first error-level finding of [`StudyConfig::validate`].
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(GazeflowError::InvalidConfig(w.message)),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// YAML merging
// ---------------------------------------------------------------------------

/// Deep-merge `overlay` into `base`. Mappings merge key by key; any other
/// value in `overlay` replaces the one in `base`.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn set_dotted(root: &mut Value, key: &str, value: Value) {
    let mut current = root;
    let mut parts = key.split('.').peekable();
    while let Some(part) = parts.next() {
        if !current.is_mapping() {
            *current = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(map) = current else {
            return;
        };
        let k = Value::String(part.to_string());
        if parts.peek().is_none() {
            map.insert(k, value);
            return;
        }
        current = map
            .entry(k)
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STUDY: &str = r#"
session_def:
  - name: tobii
    type: eye_tracker
  - name: scene_cam
    type: eye_tracker
sync_ref_recording: tobii
auto_code_trial_episodes: true
actions:
  detect_markers:
    command: python
    args: ["-m", "gazeMapper.process.detect_markers"]
"#;

    fn write_study(dir: &Path, yaml: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(paths::STUDY_DEF_FILE), yaml).unwrap();
    }

    #[test]
    fn parses_study_def() {
        let cfg: StudyConfig = serde_yaml::from_str(STUDY).unwrap();
        assert_eq!(cfg.session_def.recording_names(), vec!["tobii", "scene_cam"]);
        assert_eq!(cfg.sync_ref_recording.as_deref(), Some("tobii"));
        assert!(cfg.auto_code_trial_episodes);
        assert!(!cfg.auto_code_sync_points);
        let cmd = cfg.command_for(Action::DetectMarkers).unwrap();
        assert_eq!(cmd.command, "python");
        assert_eq!(cmd.args.len(), 2);
        assert!(cfg.command_for(Action::GazeToPlane).is_none());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_missing_config() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            StudyConfig::load(dir.path()),
            Err(GazeflowError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn override_layers_apply_in_order() {
        let dir = TempDir::new().unwrap();
        let config_dir = dir.path().join("config");
        write_study(&config_dir, STUDY);

        let session_dir = dir.path().join("sess01");
        let rec_dir = session_dir.join("scene_cam");
        std::fs::create_dir_all(&rec_dir).unwrap();
        std::fs::write(
            paths::override_path(&session_dir),
            "auto_code_sync_points: true\nsync_ref_recording: scene_cam\n",
        )
        .unwrap();
        std::fs::write(
            paths::override_path(&rec_dir),
            "auto_code_sync_points: false\n",
        )
        .unwrap();

        let session_only =
            StudyConfig::load_with_overrides(&config_dir, &[&session_dir], &Overrides::new())
                .unwrap();
        assert!(session_only.auto_code_sync_points);
        assert_eq!(session_only.sync_ref_recording.as_deref(), Some("scene_cam"));

        let both = StudyConfig::load_with_overrides(
            &config_dir,
            &[&session_dir, &rec_dir],
            &Overrides::new(),
        )
        .unwrap();
        assert!(!both.auto_code_sync_points);
        assert_eq!(both.sync_ref_recording.as_deref(), Some("scene_cam"));
    }

    #[test]
    fn caller_overrides_win() {
        let dir = TempDir::new().unwrap();
        write_study(dir.path(), STUDY);
        let mut overrides = Overrides::new();
        let (k, v) = parse_override("auto_code_trial_episodes=false").unwrap();
        overrides.insert(k, v);
        let (k, v) = parse_override("actions.detect_markers.command=detect").unwrap();
        overrides.insert(k, v);

        let cfg = StudyConfig::load_with_overrides(dir.path(), &[], &overrides).unwrap();
        assert!(!cfg.auto_code_trial_episodes);
        let cmd = cfg.command_for(Action::DetectMarkers).unwrap();
        assert_eq!(cmd.command, "detect");
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn parse_override_types() {
        let (k, v) = parse_override("timeout=30").unwrap();
        assert_eq!(k, "timeout");
        assert_eq!(v, Value::Number(30.into()));
        let (_, v) = parse_override("flag=true").unwrap();
        assert_eq!(v, Value::Bool(true));
        let (_, v) = parse_override("name=tobii").unwrap();
        assert_eq!(v, Value::String("tobii".into()));
        assert!(parse_override("novalue").is_err());
        assert!(parse_override("=x").is_err());
    }

    #[test]
    fn validate_unknown_sync_ref() {
        let mut cfg: StudyConfig = serde_yaml::from_str(STUDY).unwrap();
        cfg.sync_ref_recording = Some("nobody".to_string());
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("nobody")));
        assert!(cfg.ensure_valid().is_err());
    }

    #[test]
    fn validate_trials_without_sync_ref_warns() {
        let mut cfg: StudyConfig = serde_yaml::from_str(STUDY).unwrap();
        cfg.sync_ref_recording = None;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| {
            w.level == WarnLevel::Warning && w.message.contains("no sync_ref_recording")
        }));
        cfg.ensure_valid().unwrap();
    }

    #[test]
    fn validate_duplicate_recordings() {
        let yaml = "session_def:\n  - {name: a, type: camera}\n  - {name: a, type: eye_tracker}\n";
        let cfg: StudyConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("duplicate recording name 'a'")));
    }

    #[test]
    fn validate_gui_action_command_warns() {
        let mut cfg: StudyConfig = serde_yaml::from_str(STUDY).unwrap();
        cfg.actions.insert(
            Action::CodeEpisodes,
            ActionCommand {
                command: "coder".to_string(),
                args: vec![],
            },
        );
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("needs a GUI")));
    }

    #[test]
    fn auto_coding_flags() {
        let cfg: StudyConfig = serde_yaml::from_str(STUDY).unwrap();
        assert!(cfg.auto_coding_enabled(Action::AutoCodeTrials));
        assert!(!cfg.auto_coding_enabled(Action::AutoCodeSync));
        assert!(cfg.auto_coding_enabled(Action::GazeToPlane));
    }
}
