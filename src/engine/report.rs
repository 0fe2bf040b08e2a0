// ABOUTME: Error presentation for compile failures before they are returned to the caller
// ABOUTME: Displays, prints to stderr or appends to the error log depending on the debug mode

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::error;

use super::config::{DebugMode, DevMode, EngineConfig};
use super::error::{EngineError, Result};
use crate::compiler::TemplateError;

pub const ERROR_LOG_FILE: &str = "tagc_error.log";

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    debug: DebugMode,
    dev_mode: DevMode,
    log_path: PathBuf,
    max_log_size: u64,
}

impl ErrorReporter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            debug: config.debug,
            dev_mode: config.dev_mode,
            log_path: config.roots.logs_dir().join(ERROR_LOG_FILE),
            max_log_size: config.max_error_log_size,
        }
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }

    /// Key and value pairs describing the failure for the configured audience
    pub fn details(&self, template: &str, err: &TemplateError) -> Vec<(&'static str, String)> {
        let mut details = vec![
            ("template", template.to_string()),
            ("line", err.line().to_string()),
        ];
        match self.dev_mode {
            DevMode::Template => {
                details.push(("message", err.root_cause().to_string()));
            }
            DevMode::Engine => {
                details.push(("kind", format!("{:?}", err.kind())));
                let trace = err.resource_trace();
                if !trace.is_empty() {
                    details.push(("included from", trace.join(" > ")));
                }
                details.push(("message", err.to_string()));
            }
        }
        details
    }

    /// Present a compile error; only a failing log write produces an error
    pub fn report(&self, template: &str, err: &TemplateError) -> Result<()> {
        error!(
            template = template,
            line = err.line(),
            kind = ?err.kind(),
            "Template compilation failed: {}",
            err
        );

        let details = self.details(template, err);
        match self.debug {
            DebugMode::Raise => Ok(()),
            DebugMode::Display => {
                println!("Template error in {}", template);
                for (key, value) in &details {
                    println!("  {}: {}", key, value);
                }
                Ok(())
            }
            DebugMode::Cli => {
                eprintln!("tagc error");
                for (key, value) in &details {
                    eprintln!("  {}: {}", key, value);
                }
                Ok(())
            }
            DebugMode::Off => self.append_log(&details),
        }
    }

    fn append_log(&self, details: &[(&'static str, String)]) -> Result<()> {
        if let Ok(meta) = fs::metadata(&self.log_path) {
            if meta.len() > self.max_log_size {
                return Err(EngineError::LogSizeExceeded {
                    path: self.log_path.clone(),
                    size: meta.len(),
                    max: self.max_log_size,
                });
            }
        }

        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent).map_err(|source| EngineError::NotWritable {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let line = details
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect::<Vec<_>>()
            .join(" | ");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|source| EngineError::NotWritable {
                path: self.log_path.clone(),
                source,
            })?;
        writeln!(file, "[{}] {}", Utc::now().to_rfc3339(), line)?;
        Ok(())
    }
}
