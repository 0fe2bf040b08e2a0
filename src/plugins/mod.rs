// ABOUTME: Modifier plugin contract and the registry of available modifiers
// ABOUTME: Registers the built-in value transforms and accepts custom ones by name

pub mod modifiers;

use std::collections::HashMap;
use thiserror::Error;

use crate::template::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    #[error("unknown modifier plugin: {name}")]
    UnknownModifier { name: String },

    #[error("missing required modifier plugin argument: {position}")]
    MissingArgument { name: String, position: usize },

    #[error("too many arguments for modifier plugin {name}: expected at most {expected}, got {actual}")]
    TooManyArguments {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid argument for modifier plugin {name}: {reason}")]
    InvalidArgument { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, PluginError>;

/// A named value transform applied with `|name:arg:arg`
pub trait Modifier {
    fn name(&self) -> &'static str;

    /// Ordered arguments; `None` marks a required one, `Some` carries the default
    fn arg_format(&self) -> Vec<Option<Value>>;

    fn apply(&self, target: &Value, args: &[Value]) -> Result<Value>;
}

pub struct ModifierRegistry {
    modifiers: HashMap<String, Box<dyn Modifier>>,
}

impl ModifierRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            modifiers: HashMap::new(),
        };

        registry.register(Box::new(modifiers::DefaultModifier));
        registry.register(Box::new(modifiers::LowerModifier));
        registry.register(Box::new(modifiers::UpperModifier));
        registry.register(Box::new(modifiers::CapitalizeModifier));
        registry.register(Box::new(modifiers::EscapeModifier));
        registry.register(Box::new(modifiers::TruncateModifier));
        registry.register(Box::new(modifiers::DateFormatModifier));

        registry
    }

    pub fn register(&mut self, modifier: Box<dyn Modifier>) {
        let name = modifier.name().to_ascii_lowercase();
        self.modifiers.insert(name, modifier);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Modifier> {
        self.modifiers
            .get(&name.to_ascii_lowercase())
            .map(|modifier| modifier.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Look up a modifier and apply it to already evaluated arguments
    pub fn apply(&self, name: &str, target: &Value, args: &[Value]) -> Result<Value> {
        match self.get(name) {
            Some(modifier) => modifier.apply(target, args),
            None => Err(PluginError::UnknownModifier {
                name: name.to_string(),
            }),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modifiers.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ModifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reverse;

    impl Modifier for Reverse {
        fn name(&self) -> &'static str {
            "reverse"
        }

        fn arg_format(&self) -> Vec<Option<Value>> {
            Vec::new()
        }

        fn apply(&self, target: &Value, _args: &[Value]) -> Result<Value> {
            Ok(Value::from(target.to_output().chars().rev().collect::<String>()))
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ModifierRegistry::new();
        for name in ["default", "lower", "upper", "capitalize", "escape", "truncate", "date_format"] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(registry.contains("UPPER"));
    }

    #[test]
    fn test_custom_modifier() {
        let mut registry = ModifierRegistry::new();
        registry.register(Box::new(Reverse));
        let value = registry.apply("reverse", &Value::from("abc"), &[]).unwrap();
        assert_eq!(value, Value::from("cba"));
    }

    #[test]
    fn test_unknown_modifier() {
        let registry = ModifierRegistry::new();
        let err = registry.apply("nope", &Value::Null, &[]).unwrap_err();
        assert_eq!(
            err,
            PluginError::UnknownModifier {
                name: "nope".to_string()
            }
        );
    }
}
