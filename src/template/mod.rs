// ABOUTME: Runtime side of the template language: values, variables, compiled programs and execution
// ABOUTME: Compiled artifacts are plain data executed against the initial variable environment

pub mod context;
pub mod error;
pub mod executor;
pub mod program;
pub mod value;

pub use context::{PluginStore, SharedValue, Variables};
pub use error::{RenderError, Result};
pub use executor::Executor;
pub use program::Artifact;
pub use value::{Number, TemplateObject, Value};
