use thiserror::Error;

#[derive(Debug, Error)]
pub enum GazeflowError {
    #[error("no study config found above {0}: expected config/study_def.yaml")]
    ConfigNotFound(String),

    #[error("invalid study config: {0}")]
    InvalidConfig(String),

    #[error("invalid override '{0}': expected key=value")]
    InvalidOverride(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("unknown state: {0}")]
    UnknownState(String),

    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("invalid recording name '{0}': must be alphanumeric with '-', '_' or '.'")]
    InvalidRecordingName(String),

    #[error("recording not found in session definition: {0}")]
    RecordingNotFound(String),

    #[error("action '{action}' does not apply to {entity}: it is {level}-level")]
    EntityMismatch {
        action: String,
        entity: String,
        level: &'static str,
    },

    #[error("no runner registered for action '{0}'")]
    NoRunner(String),

    #[error("action '{action}' failed for {target}: {reason}")]
    ActionFailed {
        action: String,
        target: String,
        reason: String,
    },

    #[error("timeout: '{action}' not completed after {waited_secs:.1} seconds")]
    BarrierTimeout { action: String, waited_secs: f64 },

    #[error("cancelled while processing '{action}'")]
    Cancelled { action: String },

    #[error("failed to launch '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GazeflowError>;
