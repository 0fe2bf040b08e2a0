// ABOUTME: `{literal}` blocks whose inner tags are copied to the output untouched
// ABOUTME: Only the matching `{/literal}` tag ends the block

use super::{Emitted, Step};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::Result;
use crate::compiler::process::{Creator, ProcessHandle, ProcessKind};
use crate::parser::TagCursor;
use crate::template::program::Node;

#[derive(Debug)]
pub struct LiteralBlock {
    handle: ProcessHandle,
    body: Vec<Node>,
}

impl LiteralBlock {
    pub fn handle(&self) -> ProcessHandle {
        self.handle
    }

    pub fn on_tag(&mut self, cursor: &TagCursor) -> Step {
        if cursor.is_word("/literal") {
            Step::Close
        } else {
            Step::Verbatim
        }
    }

    pub fn body_mut(&mut self) -> &mut Vec<Node> {
        &mut self.body
    }

    pub fn close(self, env: &mut CompileEnvironment) -> Result<Vec<Node>> {
        env.terminate(self.handle);
        env.leave(self.handle)?;
        Ok(self.body)
    }
}

pub fn open(cursor: &mut TagCursor, env: &mut CompileEnvironment) -> Result<Option<Emitted>> {
    if !cursor.is_word("literal") {
        return Ok(None);
    }
    let handle = env.enter(ProcessKind::Block, Creator::new("literal", cursor.line()))?;
    Ok(Some(Emitted::Open(super::Block::Literal(LiteralBlock {
        handle,
        body: Vec::new(),
    }))))
}
