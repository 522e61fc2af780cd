use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::{info, warn};
use nodeflow::EvalConfig;
use std::fs;
use std::path::{Path, PathBuf};

fn get_config_path() -> Option<PathBuf> {
    ProjectDirs::from("me", "nodeflow", "nodeflow")
        .map(|proj_dirs| proj_dirs.config_dir().join("evaluator.toml"))
}

fn parse_config(toml_str: &str) -> Result<EvalConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Evaluator settings from the user's config dir, defaults if missing or broken.
pub fn load_config() -> EvalConfig {
    if let Some(path) = get_config_path() {
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(toml_str) => match parse_config(&toml_str) {
                    Ok(config) => {
                        info!("Loaded evaluator config from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Failed to parse config file, using defaults: {}", e);
                    }
                },
                Err(e) => {
                    warn!("Failed to read config file, using defaults: {}", e);
                }
            }
        }
    }
    EvalConfig::default()
}

/// Settings from a file named on the command line. Errors are not papered over.
pub fn load_config_from(path: &Path) -> Result<EvalConfig> {
    let toml_str = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&toml_str).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config("max_call_depth = 32\n").unwrap();
        assert_eq!(config.max_call_depth, 32);
        assert!(config.trace_values);
        assert!(config.collect_garbage);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        assert!(parse_config("max_call_depth = \"deep\"").is_err());
    }
}
