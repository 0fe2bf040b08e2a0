// ABOUTME: Arena-backed expression context reduced by priority-ordered integration
// ABOUTME: Integrators detach their neighbouring operands until a single expression remains

use std::collections::BTreeMap;

use super::{ExprKind, Expression, Priority};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::template::program::Expr;
use crate::template::Value;

type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    expr: Option<Expression>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    line: u32,
    slots: Vec<Slot>,
    first: Option<NodeId>,
    last: Option<NodeId>,
    integrators: BTreeMap<Priority, Vec<NodeId>>,
    resolved: bool,
    compiled: Option<Expr>,
}

impl Context {
    pub fn new(line: u32) -> Self {
        Self {
            line,
            slots: Vec::new(),
            first: None,
            last: None,
            integrators: BTreeMap::new(),
            resolved: false,
            compiled: None,
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Append an expression; integrators are queued by priority in insertion order
    pub fn push(&mut self, expr: Expression) {
        let id = self.slots.len();
        if let Some(priority) = expr.priority().filter(|_| !expr.is_integrated()) {
            self.integrators.entry(priority).or_default().push(id);
        }

        self.slots.push(Slot {
            expr: Some(expr),
            prev: self.last,
            next: None,
        });
        match self.last {
            Some(last) => self.slots[last].next = Some(id),
            None => self.first = Some(id),
        }
        self.last = Some(id);
        self.resolved = false;
        self.compiled = None;
    }

    /// Live expressions in link order
    pub fn iter(&self) -> impl Iterator<Item = &Expression> {
        let mut cursor = self.first;
        std::iter::from_fn(move || {
            let id = cursor?;
            cursor = self.slots[id].next;
            self.slots[id].expr.as_ref()
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    /// Run integration once; later calls are no-ops
    pub fn resolve(&mut self) -> Result<()> {
        if self.resolved {
            return Ok(());
        }

        let queued = std::mem::take(&mut self.integrators);
        for (_, ids) in queued.into_iter().rev() {
            for id in ids {
                self.integrate(id)?;
            }
        }

        match self.len() {
            1 => {
                self.resolved = true;
                Ok(())
            }
            0 => Err(TemplateError::contextual(self.line, "empty expression")),
            _ => {
                let line = self.iter().nth(1).map_or(self.line, |expr| expr.line);
                Err(TemplateError::contextual(line, "syntax error"))
            }
        }
    }

    /// The single expression left after integration
    pub fn single(&self) -> Option<&Expression> {
        if self.resolved {
            self.iter().next()
        } else {
            None
        }
    }

    /// Resolve and hand out the remaining expression
    pub fn into_expression(mut self) -> Result<Expression> {
        self.resolve()?;
        let id = self
            .first
            .ok_or_else(|| TemplateError::contextual(self.line, "empty expression"))?;
        self.slots[id]
            .expr
            .take()
            .ok_or_else(|| TemplateError::contextual(self.line, "empty expression"))
    }

    /// Resolve and compile, memoizing the result
    pub fn compile(&mut self, env: &mut CompileEnvironment) -> Result<Expr> {
        self.resolve()?;
        if let Some(compiled) = &self.compiled {
            return Ok(compiled.clone());
        }

        let compiled = match self.single() {
            Some(expr) => expr.compile(env)?,
            None => return Err(TemplateError::contextual(self.line, "empty expression")),
        };
        self.compiled = Some(compiled.clone());
        Ok(compiled)
    }

    pub fn evaluate(&mut self, env: &mut CompileEnvironment) -> Result<Value> {
        self.resolve()?;
        match self.single() {
            Some(expr) => expr.evaluate(env),
            None => Err(TemplateError::contextual(self.line, "empty expression")),
        }
    }

    fn integrate(&mut self, id: NodeId) -> Result<()> {
        let Some(mut expr) = self.slots[id].expr.take() else {
            return Ok(());
        };

        if let ExprKind::Group(inner) = &mut expr.kind {
            let inner = std::mem::replace(inner.as_mut(), Context::new(expr.line));
            let mut replacement = inner.into_expression()?;
            replacement.parens += expr.parens + 1;
            self.slots[id].expr = Some(replacement);
            return Ok(());
        }

        let result = match expr.kind {
            ExprKind::Modifier(_) => super::operator::integrate_modifier(self, id, &mut expr),
            ExprKind::Function(_) => super::function::integrate(self, id, &mut expr),
            ExprKind::Not(_) => super::operator::integrate_not(self, id, &mut expr),
            ExprKind::Logical(_) | ExprKind::Comparison(_) | ExprKind::Arithmetic(_) => {
                super::operator::integrate_binary(self, id, &mut expr)
            }
            _ => Ok(()),
        };

        self.slots[id].expr = Some(expr);
        result
    }

    /// The neighbour on one side of an expression
    pub(crate) fn neighbor(&self, id: NodeId, side: Side) -> Option<&Expression> {
        let slot = &self.slots[id];
        let neighbor = match side {
            Side::Left => slot.prev,
            Side::Right => slot.next,
        }?;
        self.slots[neighbor].expr.as_ref()
    }

    /// Detach the neighbour on one side, which must exist and be a finished operand
    pub(crate) fn take_operand(
        &mut self,
        id: NodeId,
        side: Side,
        line: u32,
        operator: &str,
    ) -> Result<Expression> {
        let slot = &self.slots[id];
        let neighbor = match side {
            Side::Left => slot.prev,
            Side::Right => slot.next,
        }
        .ok_or_else(|| {
            TemplateError::contextual(
                line,
                format!("missing {} operand for '{}'", side.as_str(), operator),
            )
        })?;

        if let Some(expr) = &self.slots[neighbor].expr {
            if expr.is_pending() {
                return Err(TemplateError::contextual(
                    line,
                    format!(
                        "unexpected {} as {} operand of '{}'",
                        expr.describe(),
                        side.as_str(),
                        operator
                    ),
                ));
            }
        }

        self.detach(neighbor)
            .ok_or_else(|| TemplateError::contextual(line, "corrupted expression context"))
    }

    fn detach(&mut self, id: NodeId) -> Option<Expression> {
        let (prev, next) = (self.slots[id].prev, self.slots[id].next);
        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.first = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.last = prev,
        }
        self.slots[id].prev = None;
        self.slots[id].next = None;
        self.slots[id].expr.take()
    }
}
