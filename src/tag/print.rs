// ABOUTME: Print tags writing the value of an expression, like `{$user.name|upper}`
// ABOUTME: A printed resource may take trailing `name=value` parameters for the included template

use super::{attribute, Emitted};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::expression::{ExprKind, Mapper};
use crate::parser::{TagCursor, Token, TokenPattern};

/// Function phrases that can open a print expression
const PREFIX_FUNCTIONS: &[&str] = &["isset", "strlen", "count", "length", "size"];

fn starts_expression(cursor: &TagCursor) -> bool {
    let Some(token) = cursor.current() else {
        return false;
    };
    matches!(token.text.as_str(), "$" | "@" | "(")
        || token.is_number()
        || token.text.starts_with('\'')
        || token.text.starts_with('"')
        || PREFIX_FUNCTIONS.contains(&token.text.as_str())
}

fn at_parameter(cursor: &TagCursor) -> bool {
    cursor.current().is_some_and(Token::is_identifier) && cursor.peek().is_some_and(|t| t.text == "=")
}

pub fn open(cursor: &mut TagCursor, env: &mut CompileEnvironment) -> Result<Option<Emitted>> {
    cursor.tokenize(TokenPattern::Base)?;
    if !starts_expression(cursor) {
        return Ok(None);
    }

    let mut expr = Mapper::PRINT
        .parse(cursor, env, &at_parameter)?
        .into_expression()?;
    if cursor.is_finished() {
        return Ok(Some(Emitted::Print(expr)));
    }

    let line = cursor.current_line();
    let params = attribute::parse(cursor, env)?;
    match &mut expr.kind {
        ExprKind::Resource(resource) if expr.parens == 0 => {
            for (name, param) in params {
                resource.set_param(&name, param.value, param.line)?;
            }
        }
        _ => {
            return Err(TemplateError::contextual(
                line,
                "parameters are only accepted after a resource reference",
            ))
        }
    }

    Ok(Some(Emitted::Print(expr)))
}
