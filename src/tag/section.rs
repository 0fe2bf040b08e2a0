// ABOUTME: `{section}` loops over a collection with start, step and max controls
// ABOUTME: Registers the loop id for `$cte.section.<id>` access and supports `{sectionelse}`

use indexmap::IndexMap;

use super::attribute::{self, Attribute};
use super::{Block, Emitted, Step};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::compiler::process::{Creator, ProcessHandle, ProcessKind};
use crate::expression::ExprKind;
use crate::parser::{TagCursor, TokenPattern};
use crate::template::program::{Expr, LoopKind, LoopProperty, Node, SectionLoop};

#[derive(Debug)]
pub struct SectionBlock {
    handle: ProcessHandle,
    plan: SectionLoop,
}

impl SectionBlock {
    pub fn handle(&self) -> ProcessHandle {
        self.handle
    }

    pub fn on_tag(&mut self, cursor: &TagCursor) -> Result<Step> {
        if cursor.is_word("/section") {
            return Ok(Step::Close);
        }
        if cursor.is_word("sectionelse") {
            if self.plan.otherwise.is_some() {
                return Err(TemplateError::contextual(
                    cursor.line(),
                    "sectionelse is already defined for this section",
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
        env.close_loop(&self.plan.id);
        env.terminate(self.handle);
        env.leave(self.handle)?;
        Ok(vec![Node::Section(self.plan)])
    }
}

/// Reject attributes outside `allowed`
pub(super) fn check_known(
    tag: &str,
    attributes: &IndexMap<String, Attribute>,
    allowed: &[&str],
) -> Result<()> {
    match attributes
        .values()
        .find(|attribute| !allowed.contains(&attribute.name.as_str()))
    {
        Some(unknown) => Err(TemplateError::contextual(
            unknown.line,
            format!("unknown attribute '{}' for {}", unknown.name, tag),
        )),
        None => Ok(()),
    }
}

pub(super) fn required<'a>(
    attributes: &'a IndexMap<String, Attribute>,
    name: &str,
    line: u32,
) -> Result<&'a Attribute> {
    attributes
        .get(name)
        .ok_or_else(|| TemplateError::contextual(line, format!("missing {}-attribute", name)))
}

/// Compile a loop source, which must be a variable or a resource
pub(super) fn loop_source(attribute: &Attribute, env: &mut CompileEnvironment) -> Result<Expr> {
    let value = &attribute.value;
    let accepted = value.parens == 0
        && matches!(
            value.kind,
            ExprKind::Variable(_) | ExprKind::Resource(_) | ExprKind::Modifier(_)
        );
    if !accepted {
        return Err(TemplateError::contextual(
            attribute.line,
            "source-attribute must be a variable or resource",
        ));
    }
    value.compile(env)
}

pub(super) fn loop_properties(
    attribute: Option<&Attribute>,
    env: &mut CompileEnvironment,
) -> Result<Vec<LoopProperty>> {
    let Some(attribute) = attribute else {
        return Ok(Vec::new());
    };

    let mut properties = Vec::new();
    for name in attribute.list(env)? {
        let property = LoopProperty::parse(&name.to_ascii_lowercase()).ok_or_else(|| {
            TemplateError::contextual(attribute.line, format!("unknown loop property '{}'", name))
        })?;
        if !properties.contains(&property) {
            properties.push(property);
        }
    }
    Ok(properties)
}

pub fn open(cursor: &mut TagCursor, env: &mut CompileEnvironment) -> Result<Option<Emitted>> {
    if !cursor.starts_with_word("section") {
        return Ok(None);
    }
    let line = cursor.line();

    cursor.tokenize(TokenPattern::Base)?;
    cursor.advance();
    let attributes = attribute::parse(cursor, env)?;
    check_known(
        "section",
        &attributes,
        &["id", "source", "start", "step", "max", "enable"],
    )?;

    let id = required(&attributes, "id", line)?.identifier(env)?;
    let source = loop_source(required(&attributes, "source", line)?, env)?;

    let start = match attributes.get("start") {
        Some(attribute) => attribute.integer(env)?,
        None => 0,
    };
    let step = match attributes.get("step") {
        Some(attribute) => attribute.integer(env)?,
        None => 1,
    };
    if step <= 0 {
        return Err(TemplateError::contextual(line, "step-attribute must be positive"));
    }
    let max = match attributes.get("max") {
        Some(attribute) => attribute.integer(env)?,
        None => -1,
    };
    let enable = loop_properties(attributes.get("enable"), env)?;

    env.open_loop(LoopKind::Section, &id, line)?;
    let unit = env.current_unit();
    let handle = env.enter(ProcessKind::Block, Creator::new("section", line))?;

    Ok(Some(Emitted::Open(Block::Section(SectionBlock {
        handle,
        plan: SectionLoop {
            unit,
            id,
            source,
            start,
            step,
            max: (max >= 0).then_some(max),
            enable,
            body: Vec::new(),
            otherwise: None,
        },
    }))))
}
