// ABOUTME: Error types for template compilation
// ABOUTME: Defines the parsing, contextual, existence, process and recursion failures with their source lines

use thiserror::Error;

/// Classification of a compile failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parsing,
    Contextual,
    Existence,
    Process,
    Recursion,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("line {line}: parse error: {message}")]
    Parsing { line: u32, message: String },

    #[error("line {line}: {message}")]
    Contextual { line: u32, message: String },

    #[error("line {line}: {message}")]
    Existence { line: u32, message: String },

    #[error("line {line}: variable {name} not found: {reason}")]
    VariableNotFound {
        line: u32,
        name: String,
        reason: String,
    },

    #[error("line {line}: process error: {message}")]
    Process { line: u32, message: String },

    #[error("line {line}: recursion detected: {resource} already opened")]
    Recursion { line: u32, resource: String },

    #[error("in {resource} (included at line {line}): {source}")]
    Included {
        resource: String,
        line: u32,
        source: Box<TemplateError>,
    },
}

impl TemplateError {
    pub fn parsing(line: u32, message: impl Into<String>) -> Self {
        TemplateError::Parsing {
            line,
            message: message.into(),
        }
    }

    pub fn contextual(line: u32, message: impl Into<String>) -> Self {
        TemplateError::Contextual {
            line,
            message: message.into(),
        }
    }

    pub fn existence(line: u32, message: impl Into<String>) -> Self {
        TemplateError::Existence {
            line,
            message: message.into(),
        }
    }

    pub fn process(line: u32, message: impl Into<String>) -> Self {
        TemplateError::Process {
            line,
            message: message.into(),
        }
    }

    /// Wrap an error raised while compiling an included resource
    pub fn in_resource(self, resource: impl Into<String>, line: u32) -> Self {
        TemplateError::Included {
            resource: resource.into(),
            line,
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TemplateError::Parsing { .. } => ErrorKind::Parsing,
            TemplateError::Contextual { .. } => ErrorKind::Contextual,
            TemplateError::Existence { .. } | TemplateError::VariableNotFound { .. } => {
                ErrorKind::Existence
            }
            TemplateError::Process { .. } => ErrorKind::Process,
            TemplateError::Recursion { .. } => ErrorKind::Recursion,
            TemplateError::Included { source, .. } => source.kind(),
        }
    }

    /// Line in the template where the failure originated
    pub fn line(&self) -> u32 {
        match self {
            TemplateError::Parsing { line, .. }
            | TemplateError::Contextual { line, .. }
            | TemplateError::Existence { line, .. }
            | TemplateError::VariableNotFound { line, .. }
            | TemplateError::Process { line, .. }
            | TemplateError::Recursion { line, .. } => *line,
            TemplateError::Included { source, .. } => source.line(),
        }
    }

    /// Chain of included resources leading to the failure, outermost first
    pub fn resource_trace(&self) -> Vec<&str> {
        let mut trace = Vec::new();
        let mut current = self;
        while let TemplateError::Included {
            resource, source, ..
        } = current
        {
            trace.push(resource.as_str());
            current = source;
        }
        trace
    }

    /// The innermost error without inclusion wrappers
    pub fn root_cause(&self) -> &TemplateError {
        match self {
            TemplateError::Included { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the failure aborts the whole compile rather than the current expression
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Process | ErrorKind::Recursion)
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_line_survive_inclusion() {
        let inner = TemplateError::Recursion {
            line: 3,
            resource: "file[a.tpl]".to_string(),
        };
        let wrapped = inner
            .in_resource("file[b.tpl]", 7)
            .in_resource("file[a.tpl]", 1);

        assert_eq!(wrapped.kind(), ErrorKind::Recursion);
        assert_eq!(wrapped.line(), 3);
        assert!(wrapped.is_fatal());
        assert_eq!(wrapped.resource_trace(), vec!["file[a.tpl]", "file[b.tpl]"]);
        assert!(matches!(wrapped.root_cause(), TemplateError::Recursion { .. }));
    }

    #[test]
    fn test_variable_not_found_is_existence() {
        let error = TemplateError::VariableNotFound {
            line: 2,
            name: "userVar".to_string(),
            reason: "not passed in".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::Existence);
        assert!(!error.is_fatal());
        assert_eq!(
            error.to_string(),
            "line 2: variable userVar not found: not passed in"
        );
    }
}
