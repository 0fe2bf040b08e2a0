// ABOUTME: Main library module for the tagc template compiler
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod compiler;
pub mod engine;
pub mod expression;
pub mod parser;
pub mod plugins;
pub mod resource;
pub mod tag;
pub mod template;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use compiler::{ErrorKind, TemplateError};
pub use engine::{CacheMode, Engine, EngineConfig, EngineError};
pub use plugins::{Modifier, ModifierRegistry};
pub use resource::{RenderMode, ResourceData, ResourceProvider};
pub use template::{Artifact, SharedValue, TemplateObject, Value, Variables};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
