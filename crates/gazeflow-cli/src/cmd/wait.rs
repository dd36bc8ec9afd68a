use super::{load_study, BarrierArgs};
use gazeflow_core::config::Overrides;
use gazeflow_core::{wait_until_all_done, Action};
use std::path::Path;

pub fn run(
    root: &Path,
    config_dir: Option<&Path>,
    action: &str,
    only_relevant: bool,
    barrier: &BarrierArgs,
) -> anyhow::Result<()> {
    let action: Action = action.parse()?;
    let (_, study) = load_study(root, config_dir, &[root], &Overrides::new())?;

    wait_until_all_done(root, action, only_relevant, barrier.options()?, &study)?;

    println!("'{}' completed.", action.displayable_name());
    Ok(())
}
