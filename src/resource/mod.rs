// ABOUTME: Resource provider contract and the registry building providers by kind
// ABOUTME: Providers fetch raw content for `@dsn[path]` references along with its render mode

pub mod file;

pub use file::FileProvider;

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::engine::config::{Delimiters, EngineConfig};

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("resource not found: {path}")]
    NotFound { path: String },

    #[error("invalid resource path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("cannot read resource {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ResourceError>;

/// How fetched content is used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Compiled as a sub-template
    Template,
    /// Inserted verbatim
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceData {
    pub content: String,
    pub render_mode: RenderMode,
    /// Tag delimiters overriding the configured ones
    pub delimiters: Option<Delimiters>,
}

pub trait ResourceProvider {
    fn load(&self, path: &str) -> Result<ResourceData>;
}

type ProviderFactory = Box<dyn Fn(&EngineConfig) -> Box<dyn ResourceProvider>>;

/// Constructors for resource providers keyed by provider kind
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register("file", |config: &EngineConfig| {
            Box::new(FileProvider::new(config.roots.sub_templates_dir())) as Box<dyn ResourceProvider>
        });

        registry
    }

    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(&EngineConfig) -> Box<dyn ResourceProvider> + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    /// Build a provider of the given kind, if one is registered
    pub fn create(&self, kind: &str, config: &EngineConfig) -> Option<Box<dyn ResourceProvider>> {
        self.factories.get(kind).map(|factory| factory(config))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
