// ABOUTME: Template compiler turning tag-language source into an executable program
// ABOUTME: Hosts the driver, compile environment, process tracking, alias scopes and plugin checks

pub mod driver;
pub mod environment;
pub mod error;
pub mod plugins;
pub mod process;
pub mod scope;

pub use driver::compile;
pub use environment::CompileEnvironment;
pub use error::{ErrorKind, Result, TemplateError};
pub use plugins::PluginManager;
pub use process::{Creator, ProcessHandle, ProcessKind, ProcessManager};
pub use scope::VariableRegistry;
