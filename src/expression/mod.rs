// ABOUTME: Expression tagged union built by the mapper and reduced inside a Context
// ABOUTME: Compiles resolved expressions into program expressions or evaluates them at compile time

pub mod context;
pub mod function;
pub mod literal;
pub mod mapper;
pub mod operator;
pub mod resource;
pub mod variable;

pub use context::Context;
pub use function::Function;
pub use literal::ParseableString;
pub use mapper::{Mapper, Recognizer};
pub use operator::{Binary, ModifierCall};
pub use resource::Resource;
pub use variable::{Component, Target, Variable};

use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::template::program::{ArithOp, CompareOp, Expr, LogicOp, Scalar};
use crate::template::{Number, Value};

/// Operand type bits checked by function-like operators
pub const TYPE_VAR: u8 = 1;
pub const TYPE_NUM: u8 = 2;
pub const TYPE_STR: u8 = 4;

/// Integration order of integrators, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Logical = 1,
    LogicalNot = 2,
    Compare = 3,
    Arithmetic = 4,
    Function = 5,
    Modifier = 6,
    Parenthesis = 7,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub line: u32,
    /// Number of parentheses wrapped around this expression
    pub parens: u32,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Bool(bool),
    Number(Number),
    Str(String),
    Parseable(ParseableString),
    /// Unquoted identifier list accepted as an attribute value
    BareWord(String),
    Variable(Variable),
    Resource(Resource),
    Group(Box<Context>),
    Modifier(ModifierCall),
    Function(Function),
    Not(Option<Box<Expression>>),
    Logical(Binary<LogicOp>),
    Comparison(Binary<CompareOp>),
    Arithmetic(Binary<ArithOp>),
}

impl Expression {
    pub fn new(line: u32, kind: ExprKind) -> Self {
        Self {
            line,
            parens: 0,
            kind,
        }
    }

    pub fn priority(&self) -> Option<Priority> {
        match &self.kind {
            ExprKind::Group(_) => Some(Priority::Parenthesis),
            ExprKind::Modifier(_) => Some(Priority::Modifier),
            ExprKind::Function(_) => Some(Priority::Function),
            ExprKind::Arithmetic(_) => Some(Priority::Arithmetic),
            ExprKind::Comparison(_) => Some(Priority::Compare),
            ExprKind::Not(_) => Some(Priority::LogicalNot),
            ExprKind::Logical(_) => Some(Priority::Logical),
            _ => None,
        }
    }

    /// Whether an integrator has consumed its operands
    pub fn is_integrated(&self) -> bool {
        match &self.kind {
            ExprKind::Group(_) => false,
            ExprKind::Modifier(call) => call.target.is_some(),
            ExprKind::Function(function) => function.is_integrated(),
            ExprKind::Not(operand) => operand.is_some(),
            ExprKind::Logical(binary) => binary.is_integrated(),
            ExprKind::Comparison(binary) => binary.is_integrated(),
            ExprKind::Arithmetic(binary) => binary.is_integrated(),
            _ => true,
        }
    }

    /// An integrator still waiting for its operands
    pub fn is_pending(&self) -> bool {
        self.priority().is_some() && !self.is_integrated()
    }

    pub fn is_grouped(&self) -> bool {
        self.parens > 0
    }

    /// Operand type bits for function-like operators
    pub fn type_bits(&self) -> u8 {
        match &self.kind {
            ExprKind::Variable(_) | ExprKind::Modifier(_) | ExprKind::Function(_) => TYPE_VAR,
            ExprKind::Resource(_) => TYPE_VAR,
            ExprKind::Number(_) | ExprKind::Arithmetic(_) => TYPE_NUM,
            ExprKind::Str(_) | ExprKind::Parseable(_) => TYPE_STR,
            _ => 0,
        }
    }

    /// Short name used in error messages
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            ExprKind::Bool(_) => "boolean",
            ExprKind::Number(_) => "number",
            ExprKind::Str(_) | ExprKind::Parseable(_) => "string",
            ExprKind::BareWord(_) => "word",
            ExprKind::Variable(_) => "variable",
            ExprKind::Resource(_) => "resource",
            ExprKind::Group(_) => "group",
            ExprKind::Modifier(_) => "modifier",
            ExprKind::Function(_) => "function",
            ExprKind::Not(_) => "logical not",
            ExprKind::Logical(_) => "logical operator",
            ExprKind::Comparison(_) => "comparison",
            ExprKind::Arithmetic(_) => "arithmetic operator",
        }
    }

    /// Flag content handed to an included template as a parameter
    pub fn mark_passed_in(&mut self) {
        if let ExprKind::Parseable(parseable) = &mut self.kind {
            parseable.passed_in = true;
        }
    }

    pub fn compile(&self, env: &mut CompileEnvironment) -> Result<Expr> {
        match &self.kind {
            ExprKind::Bool(b) => Ok(Expr::Literal {
                value: Scalar::Bool(*b),
            }),
            ExprKind::Number(Number::Int(i)) => Ok(Expr::Literal {
                value: Scalar::Int(*i),
            }),
            ExprKind::Number(Number::Float(f)) => Ok(Expr::Literal {
                value: Scalar::Float(*f),
            }),
            ExprKind::Str(text) | ExprKind::BareWord(text) => Ok(Expr::text(text.clone())),
            ExprKind::Parseable(parseable) => parseable.compile(env, self.line),
            ExprKind::Variable(variable) => variable.compile(env),
            ExprKind::Resource(resource) => resource.compile(env, self.line),
            ExprKind::Group(_) => Err(self.unresolved()),
            ExprKind::Modifier(call) => call.compile(env, self.line),
            ExprKind::Function(function) => function.compile(env, self.line),
            ExprKind::Not(Some(operand)) => Ok(Expr::Not {
                operand: Box::new(operand.compile(env)?),
            }),
            ExprKind::Logical(binary) => {
                let (left, right) = binary.compile_operands(env, self.line)?;
                Ok(Expr::Logical {
                    op: binary.op,
                    left,
                    right,
                })
            }
            ExprKind::Comparison(binary) => {
                let (left, right) = binary.compile_operands(env, self.line)?;
                Ok(Expr::Compare {
                    op: binary.op,
                    left,
                    right,
                })
            }
            ExprKind::Arithmetic(binary) => {
                let (left, right) = binary.compile_operands(env, self.line)?;
                Ok(Expr::Arith {
                    op: binary.op,
                    left,
                    right,
                })
            }
            ExprKind::Not(None) => Err(self.unresolved()),
        }
    }

    /// Compute the value at compile time against the initial variables
    pub fn evaluate(&self, env: &mut CompileEnvironment) -> Result<Value> {
        match &self.kind {
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Number(number) => Ok(number.into_value()),
            ExprKind::Str(text) | ExprKind::BareWord(text) => Ok(Value::from(text.as_str())),
            ExprKind::Parseable(parseable) => parseable.evaluate(env, self.line),
            ExprKind::Variable(variable) => variable.evaluate(env, self.line),
            ExprKind::Resource(resource) => resource.evaluate(env, self.line),
            ExprKind::Modifier(call) => call.evaluate(env, self.line),
            ExprKind::Function(function) => function.evaluate(env, self.line),
            ExprKind::Not(Some(operand)) => Ok(Value::Bool(!operand.evaluate(env)?.is_truthy())),
            ExprKind::Logical(binary) => {
                let (left, right) = binary.operands(self.line)?;
                let left = left.evaluate(env)?.is_truthy();
                let value = match binary.op {
                    LogicOp::And => left && right.evaluate(env)?.is_truthy(),
                    LogicOp::Or => left || right.evaluate(env)?.is_truthy(),
                };
                Ok(Value::Bool(value))
            }
            ExprKind::Comparison(binary) => {
                let (left, right) = binary.operands(self.line)?;
                let (left, right) = (left.evaluate(env)?, right.evaluate(env)?);
                Ok(Value::Bool(binary.op.apply(&left, &right)))
            }
            ExprKind::Arithmetic(binary) => {
                let (left, right) = binary.operands(self.line)?;
                let (left, right) = (left.evaluate(env)?, right.evaluate(env)?);
                binary
                    .op
                    .apply(&left, &right)
                    .map_err(|error| TemplateError::contextual(self.line, error.to_string()))
            }
            ExprKind::Group(_) | ExprKind::Not(None) => Err(self.unresolved()),
        }
    }

    fn unresolved(&self) -> TemplateError {
        TemplateError::contextual(
            self.line,
            format!("unresolved {} in expression", self.describe()),
        )
    }
}
