use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A processing stage applied to a session or to each of its recordings.
///
/// The set is closed. Granularity and GUI requirement are fixed per variant
/// and never change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Import,
    CodeEpisodes,
    DetectMarkers,
    AutoCodeSync,
    AutoCodeTrials,
    SyncEtToCam,
    GazeToPlane,
    SyncToReference,
    RunValidation,
    ComputeGazeDistance,
    ExportTrials,
    MakeGazeOverlayVideo,
    MakeMappedGazeVideo,
}

impl Action {
    pub fn all() -> &'static [Action] {
        &[
            Action::Import,
            Action::CodeEpisodes,
            Action::DetectMarkers,
            Action::AutoCodeSync,
            Action::AutoCodeTrials,
            Action::SyncEtToCam,
            Action::GazeToPlane,
            Action::SyncToReference,
            Action::RunValidation,
            Action::ComputeGazeDistance,
            Action::ExportTrials,
            Action::MakeGazeOverlayVideo,
            Action::MakeMappedGazeVideo,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Import => "import",
            Action::CodeEpisodes => "code_episodes",
            Action::DetectMarkers => "detect_markers",
            Action::AutoCodeSync => "auto_code_sync",
            Action::AutoCodeTrials => "auto_code_trials",
            Action::SyncEtToCam => "sync_et_to_cam",
            Action::GazeToPlane => "gaze_to_plane",
            Action::SyncToReference => "sync_to_reference",
            Action::RunValidation => "run_validation",
            Action::ComputeGazeDistance => "compute_gaze_distance",
            Action::ExportTrials => "export_trials",
            Action::MakeGazeOverlayVideo => "make_gaze_overlay_video",
            Action::MakeMappedGazeVideo => "make_mapped_gaze_video",
        }
    }

    pub fn displayable_name(self) -> &'static str {
        match self {
            Action::Import => "Import",
            Action::CodeEpisodes => "Code Episodes",
            Action::DetectMarkers => "Detect Markers",
            Action::AutoCodeSync => "Automatically Code Sync Points",
            Action::AutoCodeTrials => "Automatically Code Trials",
            Action::SyncEtToCam => "Sync Eye Tracker Data to Scene Camera",
            Action::GazeToPlane => "Gaze to Plane",
            Action::SyncToReference => "Sync to Reference Recording",
            Action::RunValidation => "Run Validation",
            Action::ComputeGazeDistance => "Compute Gaze Distance",
            Action::ExportTrials => "Export Trials",
            Action::MakeGazeOverlayVideo => "Make Gaze Overlay Video",
            Action::MakeMappedGazeVideo => "Make Mapped Gaze Video",
        }
    }

    /// True when the action runs once for the whole session instead of once
    /// per recording.
    pub fn is_session_level(self) -> bool {
        matches!(
            self,
            Action::SyncToReference
                | Action::RunValidation
                | Action::ComputeGazeDistance
                | Action::MakeMappedGazeVideo
        )
    }

    /// True when the action needs an interactive window and therefore cannot
    /// be driven from an automated pipeline.
    pub fn needs_gui(self) -> bool {
        matches!(self, Action::CodeEpisodes | Action::SyncEtToCam)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = crate::error::GazeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Action::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| crate::error::GazeflowError::UnknownAction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of one action for one session or recording.
///
/// Transitions: `NotRun → Completed | Failed | Skipped`
///
/// Only the action's own execution writes a state. Anything not yet recorded
/// reads as `NotRun`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    NotRun,
    Completed,
    Failed,
    Skipped,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::NotRun => "not_run",
            State::Completed => "completed",
            State::Failed => "failed",
            State::Skipped => "skipped",
        }
    }

    pub fn displayable_name(self) -> &'static str {
        match self {
            State::NotRun => "Not Run",
            State::Completed => "Completed",
            State::Failed => "Failed",
            State::Skipped => "Skipped",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, State::NotRun)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for State {
    type Err = crate::error::GazeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "not_run" => Ok(State::NotRun),
            "completed" => Ok(State::Completed),
            "failed" => Ok(State::Failed),
            "skipped" => Ok(State::Skipped),
            _ => Err(crate::error::GazeflowError::UnknownState(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingType {
    EyeTracker,
    Camera,
}

impl fmt::Display for RecordingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordingType::EyeTracker => "eye_tracker",
            RecordingType::Camera => "camera",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn action_names_parse_back() {
        for action in Action::all() {
            assert_eq!(Action::from_str(action.as_str()).unwrap(), *action);
        }
        assert_eq!(
            Action::from_str("DETECT-MARKERS").unwrap(),
            Action::DetectMarkers
        );
        assert!(Action::from_str("bogus").is_err());
    }

    #[test]
    fn session_level_actions() {
        let session_level: Vec<Action> = Action::all()
            .iter()
            .copied()
            .filter(|a| a.is_session_level())
            .collect();
        assert_eq!(
            session_level,
            vec![
                Action::SyncToReference,
                Action::RunValidation,
                Action::ComputeGazeDistance,
                Action::MakeMappedGazeVideo,
            ]
        );
    }

    #[test]
    fn gui_actions() {
        assert!(Action::CodeEpisodes.needs_gui());
        assert!(Action::SyncEtToCam.needs_gui());
        assert!(!Action::DetectMarkers.needs_gui());
        assert!(!Action::AutoCodeTrials.needs_gui());
    }

    #[test]
    fn only_not_run_is_non_terminal() {
        assert!(!State::NotRun.is_terminal());
        assert!(State::Completed.is_terminal());
        assert!(State::Failed.is_terminal());
        assert!(State::Skipped.is_terminal());
        assert_eq!(State::default(), State::NotRun);
    }

    #[test]
    fn state_yaml_names() {
        let yaml = serde_yaml::to_string(&State::NotRun).unwrap();
        assert_eq!(yaml.trim(), "not_run");
        let parsed: State = serde_yaml::from_str("skipped").unwrap();
        assert_eq!(parsed, State::Skipped);
    }
}
