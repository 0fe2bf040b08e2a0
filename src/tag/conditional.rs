// ABOUTME: `{if}` / `{elseif}` / `{else}` / `{/if}` conditional blocks
// ABOUTME: Conditions are parsed with the extended conditional token pattern

use super::{Block, Emitted, Step};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::compiler::process::{Creator, ProcessHandle, ProcessKind};
use crate::expression::Mapper;
use crate::parser::{TagCursor, TokenPattern};
use crate::template::program::{Branch, Expr, Node};

#[derive(Debug)]
pub struct IfBlock {
    handle: ProcessHandle,
    branches: Vec<Branch>,
    /// Condition of the branch being filled, none once `else` was seen
    pending: Option<Expr>,
    body: Vec<Node>,
}

impl IfBlock {
    pub fn handle(&self) -> ProcessHandle {
        self.handle
    }

    pub fn on_tag(&mut self, cursor: &mut TagCursor, env: &mut CompileEnvironment) -> Result<Step> {
        if cursor.is_word("/if") {
            return Ok(Step::Close);
        }

        if cursor.starts_with_word("elseif") {
            let Some(previous) = self.pending.take() else {
                return Err(TemplateError::contextual(
                    cursor.line(),
                    "elseif is not allowed after else",
                ));
            };
            self.finish_branch(previous);
            self.pending = Some(condition(cursor, env)?);
            return Ok(Step::Handled);
        }

        if cursor.is_word("else") {
            let Some(previous) = self.pending.take() else {
                return Err(TemplateError::contextual(
                    cursor.line(),
                    "else is already defined for this if",
                ));
            };
            self.finish_branch(previous);
            return Ok(Step::Handled);
        }

        Ok(Step::Pass)
    }

    fn finish_branch(&mut self, condition: Expr) {
        self.branches.push(Branch {
            condition,
            body: std::mem::take(&mut self.body),
        });
    }

    pub fn body_mut(&mut self) -> &mut Vec<Node> {
        &mut self.body
    }

    pub fn close(mut self, env: &mut CompileEnvironment) -> Result<Vec<Node>> {
        env.terminate(self.handle);
        env.leave(self.handle)?;

        let otherwise = match self.pending.take() {
            Some(condition) => {
                self.finish_branch(condition);
                None
            }
            None => Some(self.body),
        };
        Ok(vec![Node::If {
            branches: self.branches,
            otherwise,
        }])
    }
}

/// Compile the condition following the leading keyword
fn condition(cursor: &mut TagCursor, env: &mut CompileEnvironment) -> Result<Expr> {
    cursor.tokenize(TokenPattern::Conditional)?;
    cursor.advance();
    if cursor.is_finished() {
        return Err(TemplateError::parsing(cursor.line(), "missing condition"));
    }

    let context = Mapper::CONDITION.parse(cursor, env, &|_| false)?;
    context.into_expression()?.compile(env)
}

pub fn open(cursor: &mut TagCursor, env: &mut CompileEnvironment) -> Result<Option<Emitted>> {
    if !cursor.starts_with_word("if") {
        return Ok(None);
    }

    let condition = condition(cursor, env)?;
    let handle = env.enter(ProcessKind::Block, Creator::new("if", cursor.line()))?;
    Ok(Some(Emitted::Open(Block::If(IfBlock {
        handle,
        branches: Vec::new(),
        pending: Some(condition),
        body: Vec::new(),
    }))))
}
