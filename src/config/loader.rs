use crate::config::Config;
use crate::utils::{ensure_dir, get_quip_home};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_quip_home()?.join("config.json"))
}

/// Load the config, falling back to defaults when the file is absent.
/// A present-but-invalid file is an error: silently discarding a config the
/// operator wrote hides typos.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON from {}", path.display()))?;
        return Ok(config);
    }

    Ok(Config::default())
}

pub fn save_config(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    ensure_dir(path.parent().context("Config path has no parent")?)?;

    let content = serde_json::to_string_pretty(config)?;
    crate::utils::atomic_write(path, &content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    // Restrict permissions (best-effort, may fail on Windows)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.bot.bot_name, crate::DEFAULT_BOT_NAME);
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.bot.bot_name = "Alfred".to_string();
        config.gateway.port = 9091;
        save_config(&config, Some(&path)).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.bot.bot_name, "Alfred");
        assert_eq!(loaded.gateway.port, 9091);
    }

    #[test]
    fn test_saved_file_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        save_config(&Config::default(), Some(&path)).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("botName"));
        assert!(raw.contains("historyTurns"));
        assert!(!raw.contains("bot_name"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
