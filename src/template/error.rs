// ABOUTME: Error types for compiled template execution
// ABOUTME: Defines the runtime failures raised while a compiled program renders

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("cannot call method '{method}' on {type_name}")]
    NotAnObject { method: String, type_name: String },

    #[error("method '{method}' failed: {reason}")]
    MethodFailed { method: String, reason: String },

    #[error("unknown modifier plugin: {name}")]
    UnknownModifier { name: String },

    #[error("modifier plugin '{name}' failed: {reason}")]
    ModifierFailed { name: String, reason: String },

    #[error("wrong number of arguments for {function}: expected {expected}, got {actual}")]
    Arity {
        function: String,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, RenderError>;
