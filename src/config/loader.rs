use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{AppError, Context, Result};

use super::{validator, Config};

impl Config {
    /// Load the JSON configuration, falling back to built-in defaults when no file exists.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let Some(found) = search_paths(path).into_iter().find(|candidate| candidate.is_file())
        else {
            info!(
                "No configuration found at {}, using built-in defaults",
                path.display()
            );
            let config = Config::builtin();
            validator::validate_config(&config)?;
            return Ok(config);
        };

        let content = fs::read_to_string(&found)
            .with_context(|| format!("Failed to read config file {}", found.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Failed to load config file {}", found.display()))?;
        info!("Loaded configuration from {}", found.display());
        Ok(config)
    }

    /// Parse, expand `${VAR}` placeholders, and validate a JSON document.
    pub fn from_json(content: &str) -> Result<Self> {
        let mut config: Config =
            serde_json::from_str(content).context("Failed to parse config JSON")?;
        config.expand_placeholders()?;
        validator::validate_config(&config)?;
        Ok(config)
    }

    fn expand_placeholders(&mut self) -> Result<()> {
        self.market.venue = expand_env_vars(&self.market.venue)?;
        self.market.screener = expand_env_vars(&self.market.screener)?;
        self.market.endpoint = expand_env_vars(&self.market.endpoint)?;
        if let Some(webhook) = self.notify.discord_webhook.as_deref() {
            let expanded = expand_env_vars(webhook)?;
            self.notify.discord_webhook = if expanded.trim().is_empty() {
                None
            } else {
                Some(expanded)
            };
        }
        Ok(())
    }
}

fn search_paths(path: &Path) -> Vec<PathBuf> {
    let mut paths = vec![path.to_path_buf()];
    if path.is_relative() {
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            paths.push(dir.join(path));
        }
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(path));
        }
    }
    paths
}

/// Replace every `${NAME}` with the value of the environment variable `NAME`.
pub fn expand_env_vars(value: &str) -> Result<String> {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == '}' {
                    closed = true;
                    break;
                }
                name.push(next);
            }

            if !closed {
                return Err(AppError::message(
                    "Unterminated environment placeholder in config value",
                ));
            }
            if name.is_empty() {
                return Err(AppError::message(
                    "Encountered empty environment placeholder in config value",
                ));
            }

            let resolved = std::env::var(&name).with_context(|| {
                format!("Environment variable {} required by config is not set", name)
            })?;
            result.push_str(&resolved);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
