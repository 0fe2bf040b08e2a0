// ABOUTME: Serializable compiled program produced by the compiler and stored as the compiled artifact
// ABOUTME: Defines nodes, expressions, storage roots and the semantics of operators and builtin functions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{RenderError, Result};
use super::value::{Number, Value};

/// A compiled template as written to the compiled-artifact path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub template: String,
    /// Cache-mode marker returned by execution
    pub cache_mode: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp: Option<CompilerStamp>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompilerStamp {
    pub version: String,
    pub compiled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Text {
        text: String,
    },
    Print {
        expr: Expr,
    },
    If {
        branches: Vec<Branch>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Vec<Node>>,
    },
    Section(SectionLoop),
    Foreach(ForeachLoop),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionLoop {
    pub unit: u32,
    pub id: String,
    pub source: Expr,
    pub start: i64,
    pub step: i64,
    /// Maximum number of iterations, unlimited when absent
    pub max: Option<i64>,
    pub enable: Vec<LoopProperty>,
    pub body: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Vec<Node>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForeachLoop {
    pub unit: u32,
    pub id: String,
    pub source: Expr,
    pub enable: Vec<LoopProperty>,
    pub body: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Vec<Node>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    Section,
    Foreach,
}

impl LoopKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopKind::Section => "section",
            LoopKind::Foreach => "foreach",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoopProperty {
    First,
    Last,
    Size,
    Index,
    Iteration,
}

impl LoopProperty {
    pub const ALL: [LoopProperty; 5] = [
        LoopProperty::First,
        LoopProperty::Last,
        LoopProperty::Size,
        LoopProperty::Index,
        LoopProperty::Iteration,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoopProperty::First => "first",
            LoopProperty::Last => "last",
            LoopProperty::Size => "size",
            LoopProperty::Index => "index",
            LoopProperty::Iteration => "iteration",
        }
    }
}

/// Literal constant embedded in a program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Embed a value as a constant; collections and objects are embedded as their printed text
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(*b),
            Value::Int(i) => Scalar::Int(*i),
            Value::Float(f) => Scalar::Float(*f),
            Value::Str(s) => Scalar::Str(s.clone()),
            other => Scalar::Str(other.to_output()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::Int(*i),
            Scalar::Float(f) => Value::Float(*f),
            Scalar::Str(s) => Value::Str(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Scalar,
    },
    Path {
        root: Root,
        segments: Vec<Segment>,
    },
    /// Current position of an active loop, used by `[id]` keys
    LoopIndex {
        kind: LoopKind,
        unit: u32,
        id: String,
    },
    /// Current unix time, read when the program runs
    Now,
    Concat {
        parts: Vec<Expr>,
    },
    Not {
        operand: Box<Expr>,
    },
    Logical {
        op: LogicOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Builtin,
        args: Vec<Expr>,
    },
    Modify {
        instance: Root,
        target: Box<Expr>,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn text(text: impl Into<String>) -> Self {
        Expr::Literal {
            value: Scalar::Str(text.into()),
        }
    }
}

/// Storage a compiled path starts from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "root", rename_all = "snake_case")]
pub enum Root {
    User { name: String },
    Section { unit: u32, id: String },
    Foreach { unit: u32, id: String },
    Plugin { unit: u32, name: String },
    Modifier { name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "segment", rename_all = "snake_case")]
pub enum Segment {
    Key { name: String },
    Index { index: i64 },
    Dynamic { key: Expr },
    Property { name: String },
    Method { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicOp::And => "&&",
            LogicOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Identical,
    NotIdentical,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Identical => "===",
            CompareOp::NotIdentical => "!==",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }

    pub fn apply(self, left: &Value, right: &Value) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};

        match self {
            CompareOp::Eq => left.loose_eq(right),
            CompareOp::Ne => !left.loose_eq(right),
            CompareOp::Identical => left.strict_eq(right),
            CompareOp::NotIdentical => !left.strict_eq(right),
            CompareOp::Lt => left.compare(right) == Some(Less),
            CompareOp::Gt => left.compare(right) == Some(Greater),
            CompareOp::Le => matches!(left.compare(right), Some(Less | Equal)),
            CompareOp::Ge => matches!(left.compare(right), Some(Greater | Equal)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }

    pub fn apply(self, left: &Value, right: &Value) -> Result<Value> {
        let (l, r) = (left.to_number(), right.to_number());

        let value = match self {
            ArithOp::Rem => {
                let divisor = right.to_int();
                if divisor == 0 {
                    return Err(RenderError::DivisionByZero);
                }
                Value::Int(left.to_int().wrapping_rem(divisor))
            }
            ArithOp::Div => {
                if r.as_f64() == 0.0 {
                    return Err(RenderError::DivisionByZero);
                }
                match (l, r) {
                    (Number::Int(a), Number::Int(b)) if a.checked_rem(b) == Some(0) => {
                        Value::Int(a.wrapping_div(b))
                    }
                    _ => Value::Float(l.as_f64() / r.as_f64()),
                }
            }
            _ => match (l, r) {
                (Number::Int(a), Number::Int(b)) => {
                    let checked = match self {
                        ArithOp::Add => a.checked_add(b),
                        ArithOp::Sub => a.checked_sub(b),
                        _ => a.checked_mul(b),
                    };
                    match checked {
                        Some(i) => Value::Int(i),
                        None => Value::Float(self.apply_float(a as f64, b as f64)),
                    }
                }
                _ => Value::Float(self.apply_float(l.as_f64(), r.as_f64())),
            },
        };

        Ok(value)
    }

    fn apply_float(self, a: f64, b: f64) -> f64 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
        }
    }
}

/// Fixed set of function-like operators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    IsSet,
    IsEmpty,
    StrLen,
    Count,
    IsEven,
    IsDivisibleBy,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::IsSet => "isset",
            Builtin::IsEmpty => "empty",
            Builtin::StrLen => "strlen",
            Builtin::Count => "count",
            Builtin::IsEven => "even",
            Builtin::IsDivisibleBy => "divisible by",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::IsDivisibleBy => 2,
            _ => 1,
        }
    }

    pub fn apply(self, args: &[Value]) -> Result<Value> {
        if args.len() != self.arity() {
            return Err(RenderError::Arity {
                function: self.name().to_string(),
                expected: self.arity(),
                actual: args.len(),
            });
        }

        let value = match self {
            Builtin::IsSet => Value::Bool(!args[0].is_null()),
            Builtin::IsEmpty => Value::Bool(args[0].is_empty_value()),
            Builtin::StrLen => Value::from(args[0].to_output().chars().count()),
            Builtin::Count => Value::from(args[0].count()),
            Builtin::IsEven => Value::Bool(args[0].to_int() % 2 == 0),
            Builtin::IsDivisibleBy => {
                let divisor = args[1].to_int();
                if divisor == 0 {
                    return Err(RenderError::DivisionByZero);
                }
                Value::Bool(args[0].to_int().wrapping_rem(divisor) == 0)
            }
        };

        Ok(value)
    }
}
