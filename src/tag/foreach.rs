// ABOUTME: `{foreach}` loops over list items or map entries with item and key aliases
// ABOUTME: Aliases live in the current scope for the block and the previous bindings come back on close

use super::attribute;
use super::section::{check_known, loop_properties, loop_source, required};
use super::{Block, Emitted, Step};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::compiler::process::{Creator, ProcessHandle, ProcessKind};
use crate::expression::{Component, ExprKind, Expression, Target, Variable};
use crate::parser::{TagCursor, TokenPattern};
use crate::template::program::{ForeachLoop, LoopKind, Node, Root};

/// Alias bound by the loop and the association it shadows
#[derive(Debug)]
struct Binding {
    name: String,
    previous: Option<Expression>,
}

#[derive(Debug)]
pub struct ForeachBlock {
    handle: ProcessHandle,
    plan: ForeachLoop,
    bindings: Vec<Binding>,
}

impl ForeachBlock {
    pub fn handle(&self) -> ProcessHandle {
        self.handle
    }

    pub fn on_tag(&mut self, cursor: &TagCursor) -> Result<Step> {
        if cursor.is_word("/foreach") {
            return Ok(Step::Close);
        }
        if cursor.is_word("foreachelse") {
            if self.plan.otherwise.is_some() {
                return Err(TemplateError::contextual(
                    cursor.line(),
                    "foreachelse is already defined for this foreach",
                ));
            }
            self.plan.otherwise = Some(Vec::new());
            return Ok(Step::Handled);
        }
        Ok(Step::Pass)
    }

    pub fn body_mut(&mut self) -> &mut Vec<Node> {
        match &mut self.plan.otherwise {
            Some(otherwise) => otherwise,
            None => &mut self.plan.body,
        }
    }

    pub fn close(self, env: &mut CompileEnvironment) -> Result<Vec<Node>> {
        for binding in self.bindings.into_iter().rev() {
            env.variables.restore(&binding.name, binding.previous);
        }
        env.close_loop(&self.plan.id);
        env.terminate(self.handle);
        env.leave(self.handle)?;
        Ok(vec![Node::Foreach(self.plan)])
    }
}

fn loop_alias(unit: u32, id: &str, field: &str, line: u32) -> Expression {
    Expression::new(
        line,
        ExprKind::Variable(Variable {
            name: field.to_string(),
            target: Target::Path(Root::Foreach {
                unit,
                id: id.to_string(),
            }),
            components: vec![Component::Key(field.to_string())],
        }),
    )
}

pub fn open(cursor: &mut TagCursor, env: &mut CompileEnvironment) -> Result<Option<Emitted>> {
    if !cursor.starts_with_word("foreach") {
        return Ok(None);
    }
    let line = cursor.line();

    cursor.tokenize(TokenPattern::Base)?;
    cursor.advance();
    let attributes = attribute::parse(cursor, env)?;
    check_known(
        "foreach",
        &attributes,
        &["id", "source", "item", "key", "enable"],
    )?;

    let id = required(&attributes, "id", line)?.identifier(env)?;
    let source = loop_source(required(&attributes, "source", line)?, env)?;
    let enable = loop_properties(attributes.get("enable"), env)?;

    let mut aliases = Vec::new();
    for field in ["item", "key"] {
        if let Some(attribute) = attributes.get(field) {
            let name = attribute.identifier(env)?;
            if env.is_system_var(&name) {
                return Err(TemplateError::contextual(
                    attribute.line,
                    format!("{}-attribute cannot use the system variable name", field),
                ));
            }
            aliases.push((name, field));
        }
    }

    env.open_loop(LoopKind::Foreach, &id, line)?;
    let unit = env.current_unit();

    let bindings = aliases
        .into_iter()
        .map(|(name, field)| {
            let previous = env
                .variables
                .associate(&name, loop_alias(unit, &id, field, line));
            Binding { name, previous }
        })
        .collect();

    let handle = env.enter(ProcessKind::Block, Creator::new("foreach", line))?;
    Ok(Some(Emitted::Open(Block::Foreach(ForeachBlock {
        handle,
        plan: ForeachLoop {
            unit,
            id,
            source,
            enable,
            body: Vec::new(),
            otherwise: None,
        },
        bindings,
    }))))
}
