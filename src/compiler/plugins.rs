// ABOUTME: Compile-time modifier plugin manager validating calls against the registry
// ABOUTME: Pads missing arguments with plugin defaults and records which modifiers a program uses

use std::collections::BTreeSet;

use super::error::{Result, TemplateError};
use crate::plugins::{ModifierRegistry, PluginError};
use crate::template::program::{Expr, Scalar};
use crate::template::Value;

pub struct PluginManager<'a> {
    registry: &'a ModifierRegistry,
    used: BTreeSet<String>,
}

impl<'a> PluginManager<'a> {
    pub fn new(registry: &'a ModifierRegistry) -> Self {
        Self {
            registry,
            used: BTreeSet::new(),
        }
    }

    /// Validate a modifier call and complete its arguments with defaults
    pub fn prepare(&mut self, name: &str, args: Vec<Expr>, line: u32) -> Result<Vec<Expr>> {
        let args = self.pad(name, args, line, |default| Expr::Literal {
            value: Scalar::from_value(default),
        })?;
        self.used.insert(name.to_ascii_lowercase());
        Ok(args)
    }

    /// Apply a modifier during compile-time evaluation
    pub fn apply(&self, name: &str, target: &Value, args: Vec<Value>, line: u32) -> Result<Value> {
        let args = self.pad(name, args, line, Value::clone)?;
        self.registry
            .apply(name, target, &args)
            .map_err(|error| plugin_error(error, line))
    }

    /// Modifiers referenced so far, sorted by name
    pub fn used(&self) -> Vec<String> {
        self.used.iter().cloned().collect()
    }

    fn pad<T>(
        &self,
        name: &str,
        mut args: Vec<T>,
        line: u32,
        convert: impl Fn(&Value) -> T,
    ) -> Result<Vec<T>> {
        let modifier = self.registry.get(name).ok_or_else(|| {
            plugin_error(
                PluginError::UnknownModifier {
                    name: name.to_string(),
                },
                line,
            )
        })?;

        let format = modifier.arg_format();
        if args.len() > format.len() {
            return Err(plugin_error(
                PluginError::TooManyArguments {
                    name: name.to_string(),
                    expected: format.len(),
                    actual: args.len(),
                },
                line,
            ));
        }

        for (position, default) in format.iter().enumerate().skip(args.len()) {
            match default {
                Some(default) => args.push(convert(default)),
                None => {
                    return Err(plugin_error(
                        PluginError::MissingArgument {
                            name: name.to_string(),
                            position: position + 1,
                        },
                        line,
                    ))
                }
            }
        }

        Ok(args)
    }
}

fn plugin_error(error: PluginError, line: u32) -> TemplateError {
    match error {
        PluginError::UnknownModifier { .. } => TemplateError::existence(line, error.to_string()),
        other => TemplateError::contextual(line, other.to_string()),
    }
}
