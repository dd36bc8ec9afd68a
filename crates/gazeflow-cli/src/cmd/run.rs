use super::{load_study, BarrierArgs};
use anyhow::Context;
use gazeflow_core::config::{parse_override, Overrides};
use gazeflow_core::registry::ActionRegistry;
use gazeflow_core::state::FileStateStore;
use gazeflow_core::{Pipeline, PipelineExecutor};
use std::path::Path;

pub fn run(
    root: &Path,
    config_dir: Option<&Path>,
    pipeline: &str,
    barrier: &BarrierArgs,
    raw_overrides: &[String],
) -> anyhow::Result<()> {
    let pipeline: Pipeline = pipeline.parse()?;
    let overrides = raw_overrides
        .iter()
        .map(|raw| parse_override(raw))
        .collect::<Result<Overrides, _>>()?;

    let (config_dir, study) = load_study(root, config_dir, &[root], &overrides)?;
    study.ensure_valid().context("study config is invalid")?;

    let registry = ActionRegistry::from_study(&study);
    PipelineExecutor::new(&registry, &FileStateStore)
        .with_barrier_options(barrier.options()?)
        .with_config_dir(config_dir)
        .with_overrides(overrides)
        .run(pipeline, root, &study)
        .with_context(|| format!("pipeline '{pipeline}' failed"))?;

    println!("Pipeline '{pipeline}' completed.");
    Ok(())
}
