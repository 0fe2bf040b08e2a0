// ABOUTME: Configuration management for the tagc command line
// ABOUTME: Loads engine settings, initial variables and logging from YAML files and environment variables

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::{CacheMode, EngineConfig};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    /// Initial template variables
    #[serde(default)]
    pub variables: IndexMap<String, serde_json::Value>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file()?,
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let mut config: Config = serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid configuration file {}", config_path.display()))?;
            config.resolve_project_root(&config_path);
            config
        } else {
            Config::default()
        };

        // Merge with environment variables
        config.merge_env()?;
        config.engine.validate()?;

        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Result<PathBuf> {
        let possible_paths = vec![
            PathBuf::from("tagc.yaml"),
            PathBuf::from("tagc.yml"),
            PathBuf::from(".tagc.yaml"),
            PathBuf::from(".tagc.yml"),
        ];

        // Check home directory
        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".tagc").join("config.yaml");
            if home_config.exists() {
                return Ok(home_config);
            }
        }

        // Check current directory
        for path in possible_paths {
            if path.exists() {
                return Ok(path);
            }
        }

        // Return default path (may not exist)
        Ok(PathBuf::from("tagc.yaml"))
    }

    /// A relative project root is taken relative to the configuration file
    fn resolve_project_root(&mut self, config_path: &Path) {
        let project = &self.engine.roots.project;
        if project.is_relative() {
            if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
                self.engine.roots.project = dir.join(project);
            }
        }
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(root) = std::env::var("TAGC_PROJECT_ROOT") {
            self.engine.roots.project = PathBuf::from(root);
        }
        if let Ok(cache) = std::env::var("TAGC_CACHE") {
            self.engine.cache = cache
                .parse::<CacheMode>()
                .map_err(|e| anyhow::anyhow!("TAGC_CACHE: {}", e))?;
        }
        if let Ok(force) = std::env::var("TAGC_FORCE_COMPILE") {
            self.engine.force_compile = parse_flag("TAGC_FORCE_COMPILE", &force)?;
        }
        if let Ok(strict) = std::env::var("TAGC_STRICT_SCOPE") {
            self.engine.strict_var_scope = parse_flag("TAGC_STRICT_SCOPE", &strict)?;
        }

        // Logging configuration
        if let Ok(level) = std::env::var("TAGC_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TAGC_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Merge additional variables into the initial template variables
    pub fn merge_variables(&mut self, vars: IndexMap<String, serde_json::Value>) {
        self.variables.extend(vars);
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("{}: invalid flag value '{}'", name, other)),
    }
}
