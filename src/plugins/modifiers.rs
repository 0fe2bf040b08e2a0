// ABOUTME: Built-in modifier plugins for text case, escaping, truncation, defaults and dates
// ABOUTME: Each modifier declares its argument defaults and transforms a single target value

use chrono::DateTime;
use std::fmt::Write;

use super::{Modifier, PluginError, Result};
use crate::template::Value;

/// Replaces an empty target with the argument
pub struct DefaultModifier;

impl Modifier for DefaultModifier {
    fn name(&self) -> &'static str {
        "default"
    }

    fn arg_format(&self) -> Vec<Option<Value>> {
        vec![Some(Value::from(""))]
    }

    fn apply(&self, target: &Value, args: &[Value]) -> Result<Value> {
        if target.is_empty_value() {
            Ok(args.first().cloned().unwrap_or_default())
        } else {
            Ok(target.clone())
        }
    }
}

pub struct LowerModifier;

impl Modifier for LowerModifier {
    fn name(&self) -> &'static str {
        "lower"
    }

    fn arg_format(&self) -> Vec<Option<Value>> {
        Vec::new()
    }

    fn apply(&self, target: &Value, _args: &[Value]) -> Result<Value> {
        Ok(Value::from(target.to_output().to_lowercase()))
    }
}

pub struct UpperModifier;

impl Modifier for UpperModifier {
    fn name(&self) -> &'static str {
        "upper"
    }

    fn arg_format(&self) -> Vec<Option<Value>> {
        Vec::new()
    }

    fn apply(&self, target: &Value, _args: &[Value]) -> Result<Value> {
        Ok(Value::from(target.to_output().to_uppercase()))
    }
}

/// Uppercases the first letter of every word
pub struct CapitalizeModifier;

impl Modifier for CapitalizeModifier {
    fn name(&self) -> &'static str {
        "capitalize"
    }

    fn arg_format(&self) -> Vec<Option<Value>> {
        Vec::new()
    }

    fn apply(&self, target: &Value, _args: &[Value]) -> Result<Value> {
        let text = target.to_output();
        let mut output = String::with_capacity(text.len());
        let mut word_start = true;

        for c in text.chars() {
            if word_start && c.is_alphabetic() {
                output.extend(c.to_uppercase());
            } else {
                output.push(c);
            }
            word_start = c.is_whitespace();
        }

        Ok(Value::from(output))
    }
}

/// HTML-escapes the target
pub struct EscapeModifier;

impl Modifier for EscapeModifier {
    fn name(&self) -> &'static str {
        "escape"
    }

    fn arg_format(&self) -> Vec<Option<Value>> {
        Vec::new()
    }

    fn apply(&self, target: &Value, _args: &[Value]) -> Result<Value> {
        let text = target.to_output();
        let mut output = String::with_capacity(text.len());

        for c in text.chars() {
            match c {
                '&' => output.push_str("&amp;"),
                '<' => output.push_str("&lt;"),
                '>' => output.push_str("&gt;"),
                '"' => output.push_str("&quot;"),
                '\'' => output.push_str("&#039;"),
                other => output.push(other),
            }
        }

        Ok(Value::from(output))
    }
}

/// Shortens the target to a maximum length, suffix included
pub struct TruncateModifier;

impl Modifier for TruncateModifier {
    fn name(&self) -> &'static str {
        "truncate"
    }

    fn arg_format(&self) -> Vec<Option<Value>> {
        vec![Some(Value::Int(80)), Some(Value::from("..."))]
    }

    fn apply(&self, target: &Value, args: &[Value]) -> Result<Value> {
        let length = args.first().map(Value::to_int).unwrap_or(80);
        let length = usize::try_from(length).map_err(|_| PluginError::InvalidArgument {
            name: self.name().to_string(),
            reason: format!("length must not be negative, got {}", length),
        })?;
        let suffix = args.get(1).map(Value::to_output).unwrap_or_default();

        let text = target.to_output();
        if text.chars().count() <= length {
            return Ok(Value::from(text));
        }

        let keep = length.saturating_sub(suffix.chars().count());
        let mut output: String = text.chars().take(keep).collect();
        output.push_str(&suffix);
        Ok(Value::from(output))
    }
}

/// Formats a unix timestamp with a strftime-style pattern
pub struct DateFormatModifier;

impl Modifier for DateFormatModifier {
    fn name(&self) -> &'static str {
        "date_format"
    }

    fn arg_format(&self) -> Vec<Option<Value>> {
        vec![Some(Value::from("%Y-%m-%d %H:%M:%S"))]
    }

    fn apply(&self, target: &Value, args: &[Value]) -> Result<Value> {
        let timestamp = target.to_int();
        let date = DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
            PluginError::InvalidArgument {
                name: self.name().to_string(),
                reason: format!("timestamp out of range: {}", timestamp),
            }
        })?;

        let format = args
            .first()
            .map(Value::to_output)
            .unwrap_or_else(|| "%Y-%m-%d %H:%M:%S".to_string());

        let mut output = String::new();
        write!(output, "{}", date.format(&format)).map_err(|_| PluginError::InvalidArgument {
            name: self.name().to_string(),
            reason: format!("invalid date format: {}", format),
        })?;

        Ok(Value::from(output))
    }
}
