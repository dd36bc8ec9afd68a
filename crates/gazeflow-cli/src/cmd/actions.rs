use super::load_study;
use crate::output::{print_json, print_table};
use gazeflow_core::config::Overrides;
use gazeflow_core::registry::ActionInfo;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ActionRow {
    #[serde(flatten)]
    info: ActionInfo,
    command: Option<String>,
}

/// List every action with its metadata, plus the configured command when a
/// study config can be found.
pub fn run(root: &Path, config_dir: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let study = match load_study(root, config_dir, &[root], &Overrides::new()) {
        Ok((_, study)) => Some(study),
        Err(e) => {
            tracing::debug!(error = %format!("{e:#}"), "listing actions without study config");
            None
        }
    };

    let rows: Vec<ActionRow> = ActionInfo::all()
        .into_iter()
        .map(|info| {
            let command = study
                .as_ref()
                .and_then(|s| s.command_for(info.action))
                .map(|c| {
                    std::iter::once(c.command.as_str())
                        .chain(c.args.iter().map(String::as_str))
                        .collect::<Vec<_>>()
                        .join(" ")
                });
            ActionRow { info, command }
        })
        .collect();

    if json {
        return print_json(&rows);
    }

    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.info.action.to_string(),
                r.info.displayable_name.to_string(),
                if r.info.is_session_level { "session" } else { "recording" }.to_string(),
                if r.info.needs_gui { "yes" } else { "no" }.to_string(),
                r.command.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(&["ACTION", "NAME", "LEVEL", "GUI", "COMMAND"], table);
    Ok(())
}
