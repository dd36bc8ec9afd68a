pub mod actions;
pub mod config;
pub mod run;
pub mod state;
pub mod wait;

use crate::root;
use anyhow::Context;
use clap::Args;
use gazeflow_core::barrier::BarrierOptions;
use gazeflow_core::config::{Overrides, StudyConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Barrier timing flags shared by `run` and `wait`.
#[derive(Args, Debug, Clone)]
pub struct BarrierArgs {
    /// Give up waiting for an action after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = 900.0)]
    pub timeout: f64,

    /// Seconds between state checks while waiting
    #[arg(long, value_name = "SECS", default_value_t = 2.0)]
    pub poll: f64,
}

impl BarrierArgs {
    pub fn options(&self) -> anyhow::Result<BarrierOptions> {
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .with_context(|| format!("invalid --timeout: {}", self.timeout))?;
        let poll = Duration::try_from_secs_f64(self.poll)
            .with_context(|| format!("invalid --poll: {}", self.poll))?;
        Ok(BarrierOptions::default()
            .with_timeout(timeout)
            .with_poll_interval(poll))
    }
}

/// Locate and load the study config for `root`, applying session and
/// recording override files from `override_dirs` and caller overrides.
pub fn load_study(
    root: &Path,
    config_dir: Option<&Path>,
    override_dirs: &[&Path],
    overrides: &Overrides,
) -> anyhow::Result<(PathBuf, StudyConfig)> {
    let config_dir = root::resolve_config_dir(root, config_dir)?;
    let study = StudyConfig::load_with_overrides(&config_dir, override_dirs, overrides)
        .with_context(|| format!("failed to load study config from {}", config_dir.display()))?;
    Ok((config_dir, study))
}
