use super::load_study;
use crate::output::print_json;
use clap::Subcommand;
use gazeflow_core::config::{Overrides, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the study config for common mistakes
    Validate,

    /// Print the effective study config after session overrides
    Show,
}

pub fn run(
    root: &Path,
    config_dir: Option<&Path>,
    subcmd: ConfigSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(root, config_dir, json),
        ConfigSubcommand::Show => show(root, config_dir, json),
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, config_dir: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (_, study) = load_study(root, config_dir, &[root], &Overrides::new())?;
    let warnings = study.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Study config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("study config validation found errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, config_dir: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (config_dir, study) = load_study(root, config_dir, &[root], &Overrides::new())?;
    if json {
        return print_json(&serde_json::json!({
            "config_dir": config_dir,
            "study": study,
        }));
    }
    println!("# {}", config_dir.display());
    print!("{}", serde_yaml::to_string(&study)?);
    Ok(())
}
