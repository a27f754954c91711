//! Handlers for `skosnav config {path,get,init,export}`.

use std::path::PathBuf;

use skosnav_core::{Error, Result};

use crate::cli::ConfigAction;
use crate::config::SkosnavConfig;

/// Handle a config subcommand.
///
/// Takes the raw `--config` path rather than a loaded config: `path` and
/// `init` have to work before any file exists.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path),
        ConfigAction::Get { key } => {
            let config = SkosnavConfig::load(config_path)?;
            println!("{}", config_value(&config, &key)?);
            Ok(())
        }
        ConfigAction::Init { file, force } => {
            let path = cmd_config_init(file.as_deref(), force)?;
            println!("Config file created at {}", path.display());
            Ok(())
        }
        ConfigAction::Export { docker_env } => {
            let config = SkosnavConfig::load(config_path)?;
            for line in export_lines(&config, docker_env)? {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn cmd_config_path(config_path: Option<&str>) -> Result<()> {
    let path = SkosnavConfig::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory for this platform"))?;
    println!("{}", path.display());
    if !path.exists() {
        eprintln!("(file does not exist; run `skosnav config init` to create it)");
    }
    Ok(())
}

/// Look up a dotted key in the effective configuration.
fn config_value(config: &SkosnavConfig, key: &str) -> Result<String> {
    let root = toml::Value::try_from(config).map_err(|e| Error::config(e.to_string()))?;
    get_nested_value(&root, key)
        .map(format_toml_value)
        .ok_or_else(|| Error::config(format!("Key '{key}' not found in configuration")))
}

/// Write a default config file and return its path.
fn cmd_config_init(file: Option<&str>, force: bool) -> Result<PathBuf> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => SkosnavConfig::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    let toml_str = SkosnavConfig::default().to_toml_string()?;
    std::fs::write(&path, toml_str).map_err(|e| Error::io_with_path(e, &path))?;
    Ok(path)
}

fn export_lines(config: &SkosnavConfig, docker_env: bool) -> Result<Vec<String>> {
    Ok(config
        .to_env_vars()?
        .into_iter()
        .map(|(key, value)| {
            if docker_env {
                format!("--env {key}={value}")
            } else {
                format!("{key}={value}")
            }
        })
        .collect())
}

// ============================================================================
// TOML dotted-key helpers
// ============================================================================

fn get_nested_value<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(value, |current, part| current.as_table()?.get(part))
}

fn format_toml_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            toml::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_config_path_explicit() {
        assert!(cmd_config_path(Some("/explicit/config.toml")).is_ok());
    }

    #[test]
    fn test_config_value_nested_key() {
        let config = SkosnavConfig::default();
        assert_eq!(config_value(&config, "discovery.page_size").unwrap(), "200");
        assert_eq!(config_value(&config, "discovery.orphan_strategy").unwrap(), "auto");
        assert_eq!(config_value(&config, "labels.preferred_language").unwrap(), "en");
    }

    #[test]
    fn test_config_value_missing_key() {
        let config = SkosnavConfig::default();
        let err = config_value(&config, "endpoint.nonexistent").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_cmd_config_init_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("skosnav").join("config.toml");

        let written = cmd_config_init(Some(path.to_str().unwrap()), false).unwrap();
        assert_eq!(written, path);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[endpoint]"));
        assert!(content.contains("[discovery]"));

        // The written file loads back.
        let loaded = SkosnavConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded.discovery.page_size, 200);
    }

    #[test]
    fn test_cmd_config_init_no_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "existing").unwrap();

        let err = cmd_config_init(Some(path.to_str().unwrap()), false).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(cmd_config_init(Some(path.to_str().unwrap()), true).is_ok());
    }

    #[test]
    fn test_export_lines() {
        let config = SkosnavConfig::default();
        let plain = export_lines(&config, false).unwrap();
        assert!(plain.contains(&"SKOSNAV_DISCOVERY_PAGE_SIZE=200".to_string()));
        let docker = export_lines(&config, true).unwrap();
        assert!(docker.iter().all(|l| l.starts_with("--env SKOSNAV_")));
    }

    #[test]
    fn test_get_nested_value() {
        let val: toml::Value = toml::from_str("[endpoint]\ntimeout_ms = 1000").unwrap();
        assert_eq!(
            get_nested_value(&val, "endpoint.timeout_ms"),
            Some(&toml::Value::Integer(1000))
        );
        assert!(get_nested_value(&val, "endpoint.timeout_ms.deeper").is_none());
        assert!(get_nested_value(&val, "nope").is_none());
    }

    #[test]
    fn test_format_toml_value() {
        assert_eq!(format_toml_value(&toml::Value::String("en".into())), "en");
        assert_eq!(format_toml_value(&toml::Value::Boolean(false)), "false");
    }
}
