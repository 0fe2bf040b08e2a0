// ABOUTME: Function-like operators written as words, such as `isset $x` or `$n is not div by 3`
// ABOUTME: Phrases are looked up in a word trie and take typed operands from either side

use super::context::{Context, Side};
use super::{ExprKind, Expression, TYPE_NUM, TYPE_STR, TYPE_VAR};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::parser::{AssocNode, TagCursor};
use crate::template::program::{Builtin, Expr};
use crate::template::Value;

const VAR: u8 = TYPE_VAR;
const VAR_NUM: u8 = TYPE_VAR | TYPE_NUM;
const VAR_STR: u8 = TYPE_VAR | TYPE_STR;

/// Builtin behind a phrase and the operand types it accepts on each side; zero means no operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub builtin: Builtin,
    pub negate: bool,
    pub left: u8,
    pub right: u8,
}

impl Signature {
    fn operand_count(self) -> usize {
        usize::from(self.left != 0) + usize::from(self.right != 0)
    }

    fn symbol(self) -> String {
        if self.negate {
            format!("not {}", self.builtin.name())
        } else {
            self.builtin.name().to_string()
        }
    }
}

const fn leaf(builtin: Builtin, negate: bool, left: u8, right: u8) -> AssocNode<Signature> {
    AssocNode {
        value: Some(Signature {
            builtin,
            negate,
            left,
            right,
        }),
        children: &[],
    }
}

const NOT_FORMS: &[(&str, AssocNode<Signature>)] = &[
    ("set", leaf(Builtin::IsSet, true, VAR, 0)),
    ("empty", leaf(Builtin::IsEmpty, true, VAR, 0)),
    ("even", leaf(Builtin::IsEven, true, VAR_NUM, 0)),
    (
        "div",
        AssocNode {
            value: None,
            children: &[("by", leaf(Builtin::IsDivisibleBy, true, VAR_NUM, VAR_NUM))],
        },
    ),
    (
        "divisible",
        AssocNode {
            value: None,
            children: &[("by", leaf(Builtin::IsDivisibleBy, true, VAR_NUM, VAR_NUM))],
        },
    ),
];

const IS_FORMS: &[(&str, AssocNode<Signature>)] = &[
    ("set", leaf(Builtin::IsSet, false, VAR, 0)),
    ("empty", leaf(Builtin::IsEmpty, false, VAR, 0)),
    ("even", leaf(Builtin::IsEven, false, VAR_NUM, 0)),
    (
        "div",
        AssocNode {
            value: None,
            children: &[("by", leaf(Builtin::IsDivisibleBy, false, VAR_NUM, VAR_NUM))],
        },
    ),
    (
        "divisible",
        AssocNode {
            value: None,
            children: &[("by", leaf(Builtin::IsDivisibleBy, false, VAR_NUM, VAR_NUM))],
        },
    ),
    (
        "not",
        AssocNode {
            value: None,
            children: NOT_FORMS,
        },
    ),
];

static FUNCTIONS: AssocNode<Signature> = AssocNode {
    value: None,
    children: &[
        ("isset", leaf(Builtin::IsSet, false, 0, VAR)),
        ("strlen", leaf(Builtin::StrLen, false, 0, VAR_STR)),
        ("count", leaf(Builtin::Count, false, 0, VAR)),
        ("set", leaf(Builtin::IsSet, false, VAR, 0)),
        ("empty", leaf(Builtin::IsEmpty, false, VAR, 0)),
        (
            "length",
            AssocNode {
                value: Some(Signature {
                    builtin: Builtin::StrLen,
                    negate: false,
                    left: VAR_STR,
                    right: 0,
                }),
                children: &[("of", leaf(Builtin::StrLen, false, 0, VAR_STR))],
            },
        ),
        (
            "size",
            AssocNode {
                value: Some(Signature {
                    builtin: Builtin::Count,
                    negate: false,
                    left: VAR,
                    right: 0,
                }),
                children: &[("of", leaf(Builtin::Count, false, 0, VAR))],
            },
        ),
        (
            "div",
            AssocNode {
                value: None,
                children: &[("by", leaf(Builtin::IsDivisibleBy, false, VAR_NUM, VAR_NUM))],
            },
        ),
        ("even", leaf(Builtin::IsEven, false, VAR_NUM, 0)),
        (
            "not",
            AssocNode {
                value: None,
                children: NOT_FORMS,
            },
        ),
        (
            "is",
            AssocNode {
                value: None,
                children: IS_FORMS,
            },
        ),
    ],
};

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub signature: Signature,
    /// Operands in left-to-right order once integrated
    pub args: Vec<Expression>,
}

impl Function {
    pub fn new(signature: Signature) -> Self {
        Self {
            signature,
            args: Vec::new(),
        }
    }

    pub fn is_integrated(&self) -> bool {
        self.args.len() == self.signature.operand_count()
    }

    pub fn compile(&self, env: &mut CompileEnvironment, line: u32) -> Result<Expr> {
        if !self.is_integrated() {
            return Err(TemplateError::contextual(
                line,
                format!("missing operand for '{}'", self.signature.symbol()),
            ));
        }

        let args = self
            .args
            .iter()
            .map(|arg| arg.compile(env))
            .collect::<Result<Vec<_>>>()?;
        let call = Expr::Call {
            function: self.signature.builtin,
            args,
        };

        if self.signature.negate {
            Ok(Expr::Not {
                operand: Box::new(call),
            })
        } else {
            Ok(call)
        }
    }

    pub fn evaluate(&self, env: &mut CompileEnvironment, line: u32) -> Result<Value> {
        let args = self
            .args
            .iter()
            .map(|arg| arg.evaluate(env))
            .collect::<Result<Vec<_>>>()?;
        let value = self
            .signature
            .builtin
            .apply(&args)
            .map_err(|error| TemplateError::contextual(line, error.to_string()))?;

        if self.signature.negate {
            Ok(Value::Bool(!value.is_truthy()))
        } else {
            Ok(value)
        }
    }
}

fn check_type(operand: &Expression, mask: u8, side: &str, symbol: &str) -> Result<()> {
    if operand.type_bits() & mask != 0 {
        return Ok(());
    }
    Err(TemplateError::contextual(
        operand.line,
        format!(
            "invalid {} operand for '{}': {}",
            side,
            symbol,
            operand.describe()
        ),
    ))
}

pub(crate) fn integrate(ctx: &mut Context, id: usize, expr: &mut Expression) -> Result<()> {
    let line = expr.line;
    let ExprKind::Function(function) = &mut expr.kind else {
        return Ok(());
    };
    let signature = function.signature;
    let symbol = signature.symbol();

    let mut args = Vec::with_capacity(signature.operand_count());
    if signature.left != 0 {
        let operand = ctx.take_operand(id, Side::Left, line, &symbol)?;
        check_type(&operand, signature.left, "left", &symbol)?;
        args.push(operand);
    }
    if signature.right != 0 {
        let operand = ctx.take_operand(id, Side::Right, line, &symbol)?;
        check_type(&operand, signature.right, "right", &symbol)?;
        args.push(operand);
    }

    function.args = args;
    Ok(())
}

pub fn recognize(
    cursor: &mut TagCursor,
    _env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    let line = cursor.current_line();
    Ok(cursor
        .map_assoc(&FUNCTIONS)
        .map(|signature| Expression::new(line, ExprKind::Function(Function::new(signature)))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TokenPattern;

    fn lookup(raw: &str) -> Option<Signature> {
        let mut cursor = TagCursor::new(raw, 1);
        cursor.tokenize(TokenPattern::Conditional).unwrap();
        cursor.map_assoc(&FUNCTIONS)
    }

    #[test]
    fn test_phrase_lookup() {
        let signature = lookup("is not div by 3").unwrap();
        assert_eq!(signature.builtin, Builtin::IsDivisibleBy);
        assert!(signature.negate);
        assert_eq!(signature.left, VAR_NUM);

        let signature = lookup("size of $x").unwrap();
        assert_eq!(signature.builtin, Builtin::Count);
        assert_eq!((signature.left, signature.right), (0, VAR));

        let signature = lookup("length").unwrap();
        assert_eq!((signature.left, signature.right), (VAR_STR, 0));

        assert!(lookup("not $x").is_none());
        assert!(lookup("is $x").is_none());
    }

    #[test]
    fn test_failed_lookup_leaves_cursor() {
        let mut cursor = TagCursor::new("not $x", 1);
        cursor.tokenize(TokenPattern::Conditional).unwrap();
        assert!(cursor.map_assoc(&FUNCTIONS).is_none());
        assert_eq!(cursor.text(), Some("not"));
    }

    #[test]
    fn test_type_check_rejects_string_for_even() {
        let mut ctx = Context::new(1);
        ctx.push(Expression::new(1, ExprKind::Str("x".to_string())));
        ctx.push(Expression::new(
            1,
            ExprKind::Function(Function::new(lookup("even").unwrap())),
        ));
        let err = ctx.into_expression().unwrap_err();
        assert!(err.to_string().contains("invalid left operand for 'even': string"));
    }

    #[test]
    fn test_integrates_both_sides() {
        let mut ctx = Context::new(1);
        ctx.push(Expression::new(1, ExprKind::Number(crate::template::Number::Int(9))));
        ctx.push(Expression::new(
            1,
            ExprKind::Function(Function::new(lookup("div by").unwrap())),
        ));
        ctx.push(Expression::new(1, ExprKind::Number(crate::template::Number::Int(3))));
        let expr = ctx.into_expression().unwrap();
        match expr.kind {
            ExprKind::Function(function) => {
                assert!(function.is_integrated());
                assert_eq!(function.args.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
