// ABOUTME: `name=value` attribute lists of structural tags and print parameters
// ABOUTME: Values are parsed as expressions and read back at compile time through typed helpers

use indexmap::IndexMap;

use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::expression::{ExprKind, Expression, Mapper};
use crate::parser::{is_name, TagCursor, Token};
use crate::template::Number;

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub line: u32,
    pub value: Expression,
}

impl Attribute {
    /// Identifier-shaped string such as a loop id or alias name
    pub fn identifier(&self, env: &mut CompileEnvironment) -> Result<String> {
        let text = match &self.value.kind {
            ExprKind::BareWord(_) | ExprKind::Str(_) | ExprKind::Parseable(_) => {
                self.value.evaluate(env)?.to_output()
            }
            _ => String::new(),
        };
        if !is_name(&text) {
            return Err(TemplateError::contextual(
                self.line,
                format!("{}-attribute must be an identifier", self.name),
            ));
        }
        Ok(text)
    }

    pub fn integer(&self, env: &mut CompileEnvironment) -> Result<i64> {
        let value = self.value.evaluate(env)?;
        match value.as_number() {
            Some(Number::Int(i)) => Ok(i),
            _ => Err(TemplateError::contextual(
                self.line,
                format!("{}-attribute must be an integer", self.name),
            )),
        }
    }

    /// Comma-separated words
    pub fn list(&self, env: &mut CompileEnvironment) -> Result<Vec<String>> {
        let text = self.value.evaluate(env)?.to_output();
        Ok(text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn starts_attribute(cursor: &TagCursor) -> bool {
    cursor.current().is_some_and(Token::is_identifier) && cursor.peek().is_some_and(|t| t.text == "=")
}

/// `-` glued to a number, accepted only as a whole attribute value
fn negative_number(cursor: &mut TagCursor) -> Option<Expression> {
    if !cursor.at("-") {
        return None;
    }
    let start = cursor.position();
    let line = cursor.current_line();
    cursor.advance();

    let number = match cursor.current() {
        Some(token) if cursor.glued() && token.is_number() => {
            crate::expression::literal::parse_number(&token.text)
        }
        _ => None,
    };
    match number {
        Some(number) => {
            cursor.advance();
            if !cursor.is_finished() && !starts_attribute(cursor) {
                cursor.restore(start);
                return None;
            }
            let negated = match number {
                Number::Int(i) => Number::Int(-i),
                Number::Float(f) => Number::Float(-f),
            };
            Some(Expression::new(line, ExprKind::Number(negated)))
        }
        None => {
            cursor.restore(start);
            None
        }
    }
}

/// Parse attributes until the end of the tag
pub fn parse(
    cursor: &mut TagCursor,
    env: &mut CompileEnvironment,
) -> Result<IndexMap<String, Attribute>> {
    let mut attributes = IndexMap::new();

    while let Some(token) = cursor.current().cloned() {
        if !token.is_identifier() {
            return Err(TemplateError::parsing(
                token.line,
                format!("invalid attribute syntax near '{}'", token.text),
            ));
        }
        let name = token.text.to_ascii_lowercase();
        cursor.advance();
        if !cursor.at("=") {
            return Err(TemplateError::parsing(
                token.line,
                format!("missing '=' after attribute '{}'", name),
            ));
        }
        cursor.advance();

        let value = match negative_number(cursor) {
            Some(value) => value,
            None => Mapper::ATTRIBUTE
                .parse(cursor, env, &starts_attribute)?
                .into_expression()?,
        };

        if attributes.contains_key(&name) {
            return Err(TemplateError::contextual(
                token.line,
                format!("{}-attribute already exists", name),
            ));
        }
        attributes.insert(
            name.clone(),
            Attribute {
                name,
                line: token.line,
                value,
            },
        );
    }

    Ok(attributes)
}
