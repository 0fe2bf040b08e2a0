// ABOUTME: Literal recognizers for numbers, booleans, quoted strings and bare attribute words
// ABOUTME: Double-quoted strings holding tags are compiled as inline templates when used

use super::{ExprKind, Expression};
use crate::compiler::driver;
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::compiler::process::{Creator, ProcessKind, FLAG_VARS_CHECKED};
use crate::engine::config::Delimiters;
use crate::parser::TagCursor;
use crate::tag::INLINE_TAGS;
use crate::template::program::Expr;
use crate::template::{Number, Value};

/// Double-quoted string, possibly containing inline tags
#[derive(Debug, Clone, PartialEq)]
pub struct ParseableString {
    pub text: String,
    /// Contains an unescaped start delimiter
    pub dynamic: bool,
    /// Handed to an included template as a parameter
    pub passed_in: bool,
}

impl ParseableString {
    /// Build from the content between the quotes
    pub fn new(inner: &str, start_delimiter: &str) -> Self {
        let dynamic = has_unescaped(inner, start_delimiter);
        let mut text = String::with_capacity(inner.len());
        let mut chars = inner.chars().peekable();
        while let Some(c) = chars.next() {
            let next = chars.peek().copied();
            match (c, next) {
                ('\\', Some('"' | '\\')) => {
                    if let Some(escaped) = chars.next() {
                        text.push(escaped);
                    }
                }
                ('\\', Some(next)) if start_delimiter.starts_with(next) => {}
                _ => text.push(c),
            }
        }

        Self {
            text,
            dynamic,
            passed_in: false,
        }
    }

    fn inline<T>(
        &self,
        env: &mut CompileEnvironment,
        line: u32,
        run: impl FnOnce(&mut CompileEnvironment, &str, &Delimiters) -> Result<T>,
    ) -> Result<T> {
        let handle = env.enter(ProcessKind::Inline, Creator::new("string", line))?;
        if self.passed_in {
            env.processes.set_flag(FLAG_VARS_CHECKED);
        }

        let delimiters = env.config.delimiters.clone();
        let output = run(env, &self.text, &delimiters)?;
        env.terminate(handle);
        env.leave(handle)?;
        Ok(output)
    }

    pub fn compile(&self, env: &mut CompileEnvironment, line: u32) -> Result<Expr> {
        if !self.dynamic {
            return Ok(Expr::text(self.text.clone()));
        }
        self.inline(env, line, |env, source, delimiters| {
            driver::compile_concat(env, source, delimiters, line, INLINE_TAGS)
        })
    }

    pub fn evaluate(&self, env: &mut CompileEnvironment, line: u32) -> Result<Value> {
        if !self.dynamic {
            return Ok(Value::from(self.text.as_str()));
        }
        self.inline(env, line, |env, source, delimiters| {
            driver::evaluate_source(env, source, delimiters, line, INLINE_TAGS)
        })
        .map(Value::from)
    }
}

fn has_unescaped(text: &str, delimiter: &str) -> bool {
    text.match_indices(delimiter)
        .any(|(index, _)| !text[..index].ends_with('\\'))
}

fn strip_slashes(inner: &str) -> String {
    let mut text = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                text.push(escaped);
            }
        } else {
            text.push(c);
        }
    }
    text
}

fn quoted<'a>(cursor: &'a TagCursor, quote: char) -> Option<&'a str> {
    let text = cursor.text()?;
    (text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote))
        .then(|| &text[1..text.len() - 1])
}

pub fn parse_number(text: &str) -> Option<Number> {
    text.parse::<i64>()
        .map(Number::Int)
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(Number::Float))
}

pub fn recognize_number(
    cursor: &mut TagCursor,
    _env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    let Some(token) = cursor.current().filter(|token| token.is_number()) else {
        return Ok(None);
    };
    let number = parse_number(&token.text).ok_or_else(|| {
        TemplateError::parsing(token.line, format!("invalid number '{}'", token.text))
    })?;
    let line = token.line;
    cursor.advance();
    Ok(Some(Expression::new(line, ExprKind::Number(number))))
}

pub fn recognize_bool(
    cursor: &mut TagCursor,
    _env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    let value = match cursor.text().map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "yes" | "on" | "1") => true,
        Some("false" | "no" | "off" | "0") => false,
        _ => return Ok(None),
    };
    let line = cursor.current_line();
    cursor.advance();
    Ok(Some(Expression::new(line, ExprKind::Bool(value))))
}

/// Single-quoted string, never parsed for tags
pub fn recognize_string(
    cursor: &mut TagCursor,
    _env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    let Some(inner) = quoted(cursor, '\'') else {
        return Ok(None);
    };
    let text = strip_slashes(inner);
    let line = cursor.current_line();
    cursor.advance();
    Ok(Some(Expression::new(line, ExprKind::Str(text))))
}

pub fn recognize_parseable(
    cursor: &mut TagCursor,
    env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    let Some(inner) = quoted(cursor, '"') else {
        return Ok(None);
    };
    let parseable = ParseableString::new(inner, &env.config.delimiters.start);
    let line = cursor.current_line();
    cursor.advance();
    Ok(Some(Expression::new(line, ExprKind::Parseable(parseable))))
}

/// Unquoted identifier list such as `index,size`, only where no `=` follows
pub fn recognize_bare_word(
    cursor: &mut TagCursor,
    _env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    let Some(token) = cursor.current().filter(|token| token.is_identifier()) else {
        return Ok(None);
    };
    if cursor.peek().is_some_and(|next| next.text == "=") {
        return Ok(None);
    }

    let line = token.line;
    let mut words = token.text.clone();
    cursor.advance();
    while cursor.at(",") {
        let start = cursor.position();
        cursor.advance();
        match cursor.current().filter(|token| token.is_identifier()) {
            Some(token) => {
                words.push(',');
                words.push_str(&token.text);
                cursor.advance();
            }
            None => {
                cursor.restore(start);
                break;
            }
        }
    }

    Ok(Some(Expression::new(line, ExprKind::BareWord(words))))
}
