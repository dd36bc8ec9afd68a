use anyhow::Context;
use gazeflow_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the session working directory.
///
/// `--root` / `GAZEFLOW_ROOT` wins, otherwise the current directory.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Resolve the study config directory.
///
/// Priority:
/// 1. `--config-dir` flag / `GAZEFLOW_CONFIG_DIR` env var (passed in as `explicit`)
/// 2. Walk upward from `root` looking for `config/study_def.yaml`
pub fn resolve_config_dir(root: &Path, explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    paths::guess_config_dir(root)
        .with_context(|| format!("no study config found above {}", root.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_root(Some(dir.path()));
        assert_eq!(result, dir.path());
    }

    #[test]
    fn explicit_config_dir_wins() {
        let dir = TempDir::new().unwrap();
        let result = resolve_config_dir(dir.path(), Some(Path::new("/elsewhere"))).unwrap();
        assert_eq!(result, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn finds_config_dir_above_session() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config");
        std::fs::create_dir_all(&config).unwrap();
        std::fs::write(config.join("study_def.yaml"), "session_def: []\n").unwrap();
        let session = dir.path().join("data/s01");
        std::fs::create_dir_all(&session).unwrap();

        assert_eq!(resolve_config_dir(&session, None).unwrap(), config);
    }

    #[test]
    fn missing_config_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve_config_dir(dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("no study config found"));
    }
}
