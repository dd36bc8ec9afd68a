use super::load_study;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use gazeflow_core::config::Overrides;
use gazeflow_core::paths;
use gazeflow_core::session::{self, Session};
use gazeflow_core::state::{Entity, FileStateStore};
use gazeflow_core::{Action, State};
use serde::Serialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum StateSubcommand {
    /// Show every action state for the session and its recordings
    Show,

    /// Record the state of an action
    Set {
        /// Action name (snake_case, e.g. gaze_to_plane)
        action: String,
        /// New state: not_run, completed, failed or skipped
        state: String,
        /// Recording the state belongs to (default: the working directory
        /// is the recording for recording-level actions)
        #[arg(long)]
        recording: Option<String>,
    },
}

#[derive(Serialize)]
struct StateRow {
    action: Action,
    target: String,
    state: State,
}

fn target_name(entity: &Entity) -> String {
    match entity {
        Entity::Session => "session".to_string(),
        Entity::Recording(name) => name.clone(),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    config_dir: Option<&Path>,
    subcmd: StateSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        StateSubcommand::Show => show(root, config_dir, json),
        StateSubcommand::Set {
            action,
            state,
            recording,
        } => set(root, config_dir, &action, &state, recording.as_deref(), json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, config_dir: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let (_, study) = load_study(root, config_dir, &[root], &Overrides::new())?;
    let session = Session::from_definition(&study.session_def, root, &FileStateStore)
        .context("failed to read action states")?;

    let rows: Vec<StateRow> = Action::all()
        .iter()
        .flat_map(|&action| {
            session
                .action_states(action)
                .into_iter()
                .map(move |(entity, state)| StateRow {
                    action,
                    target: target_name(&entity),
                    state,
                })
        })
        .collect();

    if json {
        let value = serde_json::json!({
            "session": session.name(),
            "states": rows,
        });
        return print_json(&value);
    }

    println!("Session: {}", session.name());
    let table = rows
        .iter()
        .map(|r| {
            vec![
                r.action.to_string(),
                r.target.clone(),
                r.state.displayable_name().to_string(),
            ]
        })
        .collect();
    print_table(&["ACTION", "TARGET", "STATE"], table);
    Ok(())
}

// ---------------------------------------------------------------------------
// set
// ---------------------------------------------------------------------------

fn set(
    root: &Path,
    config_dir: Option<&Path>,
    action: &str,
    state: &str,
    recording: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let action: Action = action.parse()?;
    let state: State = state.parse()?;

    if recording.is_some() && action.is_session_level() {
        anyhow::bail!("'{action}' is recorded for the whole session; drop --recording");
    }
    let working_dir = match recording {
        Some(name) => {
            paths::validate_recording_name(name)?;
            paths::recording_dir(root, name)
        }
        None => root.to_path_buf(),
    };
    let (_, study) = load_study(&working_dir, config_dir, &[], &Overrides::new())?;

    let (_, entity) = session::resolve_entity(&working_dir, action, &study)?;
    session::update_action_state(&working_dir, action, state, &study, &FileStateStore)
        .with_context(|| format!("failed to record state of '{action}'"))?;

    if json {
        print_json(&StateRow {
            action,
            target: target_name(&entity),
            state,
        })?;
    } else {
        println!(
            "{}: {} ({entity})",
            action.displayable_name(),
            state.displayable_name()
        );
    }
    Ok(())
}
