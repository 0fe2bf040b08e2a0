// ABOUTME: Comment tags of the form `{* ... *}` which produce no output
// ABOUTME: Accepted in every compile mode, including inline strings

use super::Emitted;
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::parser::TagCursor;

pub fn open(cursor: &mut TagCursor, _env: &mut CompileEnvironment) -> Result<Option<Emitted>> {
    if !cursor.begins_with("*") {
        return Ok(None);
    }

    let content = cursor.raw().trim();
    if content.len() < 2 || !cursor.ends_with("*") {
        return Err(TemplateError::parsing(cursor.line(), "invalid comment syntax"));
    }
    Ok(Some(Emitted::Nothing))
}
