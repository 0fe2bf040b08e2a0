// ABOUTME: Engine configuration covering cache mode, error presentation, scoping and storage roots
// ABOUTME: Deserializes from YAML with defaults for every field and validates names and delimiters

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::error::{EngineError, Result};
use crate::parser::is_name;

/// Output caching policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "CacheSetting", into = "CacheSetting")]
pub enum CacheMode {
    #[default]
    Off,
    Forever,
    /// Cached output expires after this many seconds
    Ttl(u64),
}

/// Textual or numeric cache mode as written in configuration files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CacheSetting {
    Named(String),
    Seconds(i64),
}

impl CacheMode {
    pub const MARKER_OFF: i64 = 0;
    pub const MARKER_FOREVER: i64 = -1;

    /// Value returned by compiled artifacts and stored in cache files
    pub fn marker(self) -> i64 {
        match self {
            CacheMode::Off => Self::MARKER_OFF,
            CacheMode::Forever => Self::MARKER_FOREVER,
            CacheMode::Ttl(seconds) => i64::try_from(seconds).unwrap_or(i64::MAX),
        }
    }

    /// Decode a marker, rejecting anything that is not a recognized mode
    pub fn from_marker(marker: i64) -> Option<Self> {
        match marker {
            Self::MARKER_OFF => Some(CacheMode::Off),
            Self::MARKER_FOREVER => Some(CacheMode::Forever),
            seconds if seconds > 0 => u64::try_from(seconds).ok().map(CacheMode::Ttl),
            _ => None,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != CacheMode::Off
    }
}

impl TryFrom<CacheSetting> for CacheMode {
    type Error = String;

    fn try_from(setting: CacheSetting) -> std::result::Result<Self, Self::Error> {
        match setting {
            CacheSetting::Named(name) => name.parse(),
            CacheSetting::Seconds(seconds) => CacheMode::from_marker(seconds)
                .ok_or_else(|| format!("invalid cache mode: {}", seconds)),
        }
    }
}

impl From<CacheMode> for CacheSetting {
    fn from(mode: CacheMode) -> Self {
        match mode {
            CacheMode::Off => CacheSetting::Named("off".to_string()),
            CacheMode::Forever => CacheSetting::Named("forever".to_string()),
            CacheMode::Ttl(_) => CacheSetting::Seconds(mode.marker()),
        }
    }
}

impl std::str::FromStr for CacheMode {
    type Err = String;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        match text.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(CacheMode::Off),
            "forever" => Ok(CacheMode::Forever),
            other => other
                .parse::<i64>()
                .ok()
                .and_then(CacheMode::from_marker)
                .ok_or_else(|| format!("invalid cache mode: {}", text)),
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Off => write!(f, "off"),
            CacheMode::Forever => write!(f, "forever"),
            CacheMode::Ttl(seconds) => write!(f, "{}s", seconds),
        }
    }
}

/// How compile errors are presented before being returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    /// Append to the error log file
    Off,
    #[default]
    Display,
    Cli,
    Raise,
}

/// Audience of error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevMode {
    #[default]
    Engine,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub start: String,
    pub end: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            start: "{".to_string(),
            end: "}".to_string(),
        }
    }
}

/// Storage locations; relative entries live below `project`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roots {
    pub project: PathBuf,
    pub templates: PathBuf,
    pub sub_templates: PathBuf,
    pub compiled: PathBuf,
    pub cache: PathBuf,
    pub logs: PathBuf,
}

impl Default for Roots {
    fn default() -> Self {
        Self {
            project: PathBuf::from("."),
            templates: PathBuf::from("tpl"),
            sub_templates: PathBuf::from("stpl"),
            compiled: PathBuf::from("~tpl_c"),
            cache: PathBuf::from("~cache"),
            logs: PathBuf::from("logs"),
        }
    }
}

impl Roots {
    pub fn with_project(project: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.project.join(&self.templates)
    }

    pub fn sub_templates_dir(&self) -> PathBuf {
        self.project.join(&self.sub_templates)
    }

    pub fn compiled_dir(&self) -> PathBuf {
        self.project.join(&self.compiled)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.project.join(&self.cache)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.project.join(&self.logs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheMode,
    pub debug: DebugMode,
    pub dev_mode: DevMode,
    pub strict_var_scope: bool,
    pub force_compile: bool,
    pub compiler_stamp: bool,
    pub max_error_log_size: u64,
    pub delimiters: Delimiters,
    pub system_var: String,
    /// Resource dsn to provider kind
    pub resources: IndexMap<String, String>,
    pub language: Option<String>,
    pub roots: Roots,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut resources = IndexMap::new();
        resources.insert("file".to_string(), "file".to_string());

        Self {
            cache: CacheMode::Off,
            debug: DebugMode::Display,
            dev_mode: DevMode::Engine,
            strict_var_scope: true,
            force_compile: true,
            compiler_stamp: true,
            max_error_log_size: 100_000,
            delimiters: Delimiters::default(),
            system_var: "cte".to_string(),
            resources,
            language: None,
            roots: Roots::default(),
        }
    }
}

impl EngineConfig {
    pub fn for_project(project: impl Into<PathBuf>) -> Self {
        Self {
            roots: Roots::with_project(project),
            ..Self::default()
        }
    }

    /// Check names and delimiters, normalizing resource dsn names to lowercase
    pub fn validate(&mut self) -> Result<()> {
        if !is_name(&self.system_var) {
            return Err(EngineError::InvalidConfig {
                message: format!("invalid system variable name: {}", self.system_var),
            });
        }

        if self.delimiters.start.is_empty() || self.delimiters.end.is_empty() {
            return Err(EngineError::InvalidConfig {
                message: "tag delimiters cannot be empty".to_string(),
            });
        }

        if let Some(language) = &self.language {
            if language.is_empty() || language.contains(['/', '\\', '.']) {
                return Err(EngineError::InvalidConfig {
                    message: format!("invalid language: {}", language),
                });
            }
        }

        let mut normalized = IndexMap::new();
        for (dsn, kind) in self.resources.drain(..) {
            let dsn = dsn.to_ascii_lowercase();
            if !is_name(&dsn) {
                return Err(EngineError::InvalidConfig {
                    message: format!("invalid resource name: {}", dsn),
                });
            }
            if normalized.insert(dsn.clone(), kind).is_some() {
                return Err(EngineError::InvalidConfig {
                    message: format!("resource name {} is already associated", dsn),
                });
            }
        }
        self.resources = normalized;

        Ok(())
    }

    /// Associate a resource dsn with a provider kind
    pub fn set_resource_assoc(&mut self, dsn: &str, kind: &str) -> Result<()> {
        let dsn = dsn.to_ascii_lowercase();
        if !is_name(&dsn) {
            return Err(EngineError::InvalidConfig {
                message: format!("invalid resource name: {}", dsn),
            });
        }
        if self.resources.contains_key(&dsn) {
            return Err(EngineError::InvalidConfig {
                message: format!("resource name {} is already associated", dsn),
            });
        }
        self.resources.insert(dsn, kind.to_string());
        Ok(())
    }

    /// Whether a variable name refers to the system variable
    pub fn is_system_var(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.system_var)
    }
}
