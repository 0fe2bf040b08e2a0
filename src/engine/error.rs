// ABOUTME: Error types for the compile and cache pipeline
// ABOUTME: Wraps compile, render, plugin and resource failures alongside artifact and cache IO errors

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Compile error: {0}")]
    Compile(#[from] crate::compiler::TemplateError),

    #[error("Render error: {0}")]
    Render(#[from] crate::template::RenderError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] crate::plugins::PluginError),

    #[error("Resource error: {0}")]
    Resource(#[from] crate::resource::ResourceError),

    #[error("Template not found: {template} ({path:?})")]
    TemplateNotFound { template: String, path: PathBuf },

    #[error("Invalid variable name: {name}")]
    InvalidVariableName { name: String },

    #[error("Variable name is reserved for system use: {name}")]
    ReservedVariableName { name: String },

    #[error("Invalid cache mode: {value}")]
    InvalidCacheMode { value: i64 },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Inconsistent compiled artifact {path:?}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("Invalid cache file {path:?}: {reason}")]
    InvalidCacheFile { path: PathBuf, reason: String },

    #[error("Directory not writable: {path:?} - {source}")]
    NotWritable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error log size exceeded: {path:?} is {size} bytes (max {max})")]
    LogSizeExceeded { path: PathBuf, size: u64, max: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl EngineError {
    /// The compile error behind this failure, if any
    pub fn template_error(&self) -> Option<&crate::compiler::TemplateError> {
        match self {
            EngineError::Compile(error) => Some(error),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
