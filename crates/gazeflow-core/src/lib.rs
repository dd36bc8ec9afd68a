pub mod barrier;
pub mod config;
pub mod error;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod registry;
pub mod runner;
pub mod session;
pub mod state;
pub mod types;

pub use barrier::{wait_until_all_done, BarrierOptions};
pub use error::{GazeflowError, Result};
pub use pipeline::{run_pipeline, Pipeline, PipelineExecutor};
pub use types::{Action, State};
