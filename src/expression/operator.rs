// ABOUTME: Binary operators, logical not and modifier calls together with their integration rules
// ABOUTME: Recognizes operator tokens and checks which neighbours each operator accepts as operands

use super::context::{Context, Side};
use super::mapper::Mapper;
use super::{ExprKind, Expression};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::parser::TagCursor;
use crate::template::program::{ArithOp, CompareOp, Expr, LogicOp, Root};
use crate::template::Value;

/// Binary operator with the operands it takes during integration
#[derive(Debug, Clone, PartialEq)]
pub struct Binary<Op> {
    pub op: Op,
    pub left: Option<Box<Expression>>,
    pub right: Option<Box<Expression>>,
}

impl<Op> Binary<Op> {
    pub fn new(op: Op) -> Self {
        Self {
            op,
            left: None,
            right: None,
        }
    }

    pub fn is_integrated(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }

    pub fn operands(&self, line: u32) -> Result<(&Expression, &Expression)> {
        match (&self.left, &self.right) {
            (Some(left), Some(right)) => Ok((left, right)),
            _ => Err(TemplateError::contextual(line, "operator without operands")),
        }
    }

    pub fn compile_operands(
        &self,
        env: &mut CompileEnvironment,
        line: u32,
    ) -> Result<(Box<Expr>, Box<Expr>)> {
        let (left, right) = self.operands(line)?;
        Ok((Box::new(left.compile(env)?), Box::new(right.compile(env)?)))
    }

    fn fill(&mut self, left: Expression, right: Expression) {
        self.left = Some(Box::new(left));
        self.right = Some(Box::new(right));
    }
}

/// `|name:arg:arg` applied to the expression on its left
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub target: Option<Box<Expression>>,
}

impl ModifierCall {
    fn target(&self, line: u32) -> Result<&Expression> {
        self.target.as_deref().ok_or_else(|| {
            TemplateError::contextual(line, format!("modifier '{}' without target", self.name))
        })
    }

    pub fn compile(&self, env: &mut CompileEnvironment, line: u32) -> Result<Expr> {
        let target = self.target(line)?.compile(env)?;
        let args = self
            .args
            .iter()
            .map(|arg| arg.compile(env))
            .collect::<Result<Vec<_>>>()?;
        let args = env.modifiers.prepare(&self.name, args, line)?;

        Ok(Expr::Modify {
            instance: Root::Modifier {
                name: self.name.to_ascii_lowercase(),
            },
            target: Box::new(target),
            args,
        })
    }

    pub fn evaluate(&self, env: &mut CompileEnvironment, line: u32) -> Result<Value> {
        let target = self.target(line)?.evaluate(env)?;
        let args = self
            .args
            .iter()
            .map(|arg| arg.evaluate(env))
            .collect::<Result<Vec<_>>>()?;
        env.modifiers.apply(&self.name, &target, args, line)
    }
}

fn logical_operand(expr: &Expression) -> bool {
    expr.is_grouped()
        || matches!(
            expr.kind,
            ExprKind::Variable(_)
                | ExprKind::Logical(_)
                | ExprKind::Not(_)
                | ExprKind::Function(_)
                | ExprKind::Arithmetic(_)
                | ExprKind::Comparison(_)
                | ExprKind::Bool(_)
                | ExprKind::Modifier(_)
        )
}

fn comparison_operand(expr: &Expression) -> bool {
    expr.is_grouped()
        || matches!(
            expr.kind,
            ExprKind::Variable(_)
                | ExprKind::Bool(_)
                | ExprKind::Number(_)
                | ExprKind::Str(_)
                | ExprKind::Parseable(_)
                | ExprKind::Arithmetic(_)
                | ExprKind::Function(_)
                | ExprKind::Modifier(_)
                | ExprKind::Resource(_)
        )
}

fn arithmetic_operand(expr: &Expression) -> bool {
    expr.is_grouped()
        || matches!(
            expr.kind,
            ExprKind::Variable(_)
                | ExprKind::Number(_)
                | ExprKind::Arithmetic(_)
                | ExprKind::Function(_)
                | ExprKind::Modifier(_)
        )
}

fn modifier_target(expr: &Expression) -> bool {
    expr.is_grouped()
        || matches!(
            expr.kind,
            ExprKind::Variable(_)
                | ExprKind::Bool(_)
                | ExprKind::Number(_)
                | ExprKind::Str(_)
                | ExprKind::Parseable(_)
                | ExprKind::Resource(_)
                | ExprKind::Modifier(_)
        )
}

fn not_operand(expr: &Expression) -> bool {
    expr.is_grouped()
        || matches!(
            expr.kind,
            ExprKind::Variable(_) | ExprKind::Function(_) | ExprKind::Modifier(_) | ExprKind::Bool(_)
        )
}

fn check_operand(
    operand: &Expression,
    allowed: fn(&Expression) -> bool,
    side: &str,
    operator: &str,
) -> Result<()> {
    if allowed(operand) {
        return Ok(());
    }
    Err(TemplateError::contextual(
        operand.line,
        format!(
            "invalid {} operand for '{}': {}",
            side,
            operator,
            operand.describe()
        ),
    ))
}

pub(crate) fn integrate_binary(ctx: &mut Context, id: usize, expr: &mut Expression) -> Result<()> {
    let (symbol, allowed): (&str, fn(&Expression) -> bool) = match &expr.kind {
        ExprKind::Logical(binary) => (binary.op.symbol(), logical_operand),
        ExprKind::Comparison(binary) => (binary.op.symbol(), comparison_operand),
        ExprKind::Arithmetic(binary) => (binary.op.symbol(), arithmetic_operand),
        _ => return Ok(()),
    };

    let left = ctx.take_operand(id, Side::Left, expr.line, symbol)?;
    check_operand(&left, allowed, "left", symbol)?;
    let right = ctx.take_operand(id, Side::Right, expr.line, symbol)?;
    check_operand(&right, allowed, "right", symbol)?;

    match &mut expr.kind {
        ExprKind::Logical(binary) => binary.fill(left, right),
        ExprKind::Comparison(binary) => binary.fill(left, right),
        ExprKind::Arithmetic(binary) => binary.fill(left, right),
        _ => {}
    }
    Ok(())
}

pub(crate) fn integrate_not(ctx: &mut Context, id: usize, expr: &mut Expression) -> Result<()> {
    if let Some(left) = ctx.neighbor(id, Side::Left) {
        if !matches!(left.kind, ExprKind::Logical(_)) {
            return Err(TemplateError::contextual(
                expr.line,
                format!("unexpected {} before '!'", left.describe()),
            ));
        }
    }

    let operand = ctx.take_operand(id, Side::Right, expr.line, "!")?;
    check_operand(&operand, not_operand, "right", "!")?;
    expr.kind = ExprKind::Not(Some(Box::new(operand)));
    Ok(())
}

pub(crate) fn integrate_modifier(
    ctx: &mut Context,
    id: usize,
    expr: &mut Expression,
) -> Result<()> {
    let ExprKind::Modifier(call) = &mut expr.kind else {
        return Ok(());
    };
    let symbol = format!("|{}", call.name);
    let target = ctx.take_operand(id, Side::Left, expr.line, &symbol)?;
    check_operand(&target, modifier_target, "left", &symbol)?;
    call.target = Some(Box::new(target));
    Ok(())
}

/// `|name` followed by `:`-separated arguments
pub fn recognize_modifier(
    cursor: &mut TagCursor,
    env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    if !cursor.at("|") {
        return Ok(None);
    }
    let line = cursor.current_line();
    cursor.advance();

    let name = match cursor.current() {
        Some(token) if cursor.glued() && token.is_identifier() => token.text.clone(),
        _ => return Err(TemplateError::parsing(line, "missing modifier name after '|'")),
    };
    cursor.advance();

    let mut args = Vec::new();
    while cursor.at(":") {
        cursor.advance();
        let arg = Mapper::MODIFIER_ARG.map(cursor, env)?.ok_or_else(|| {
            TemplateError::parsing(
                cursor.current_line(),
                format!("invalid argument for modifier '{}'", name),
            )
        })?;
        args.push(arg);
    }

    Ok(Some(Expression::new(
        line,
        ExprKind::Modifier(ModifierCall {
            name,
            args,
            target: None,
        }),
    )))
}

fn operator_token<Op: Copy>(
    cursor: &mut TagCursor,
    table: &[(&str, Op)],
) -> Option<(Op, u32)> {
    let text = cursor.text()?;
    let op = table
        .iter()
        .find(|(symbol, _)| symbol.eq_ignore_ascii_case(text))
        .map(|(_, op)| *op)?;
    let line = cursor.current_line();
    cursor.advance();
    Some((op, line))
}

const COMPARISONS: &[(&str, CompareOp)] = &[
    ("==", CompareOp::Eq),
    ("eq", CompareOp::Eq),
    ("!=", CompareOp::Ne),
    ("ne", CompareOp::Ne),
    ("===", CompareOp::Identical),
    ("!==", CompareOp::NotIdentical),
    ("<", CompareOp::Lt),
    ("lt", CompareOp::Lt),
    (">", CompareOp::Gt),
    ("gt", CompareOp::Gt),
    ("<=", CompareOp::Le),
    ("le", CompareOp::Le),
    (">=", CompareOp::Ge),
    ("ge", CompareOp::Ge),
];

const LOGICALS: &[(&str, LogicOp)] = &[
    ("&&", LogicOp::And),
    ("and", LogicOp::And),
    ("||", LogicOp::Or),
    ("or", LogicOp::Or),
];

const ARITHMETICS: &[(&str, ArithOp)] = &[
    ("+", ArithOp::Add),
    ("-", ArithOp::Sub),
    ("*", ArithOp::Mul),
    ("/", ArithOp::Div),
    ("%", ArithOp::Rem),
];

pub fn recognize_comparison(
    cursor: &mut TagCursor,
    _env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    Ok(operator_token(cursor, COMPARISONS)
        .map(|(op, line)| Expression::new(line, ExprKind::Comparison(Binary::new(op)))))
}

pub fn recognize_logical(
    cursor: &mut TagCursor,
    _env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    Ok(operator_token(cursor, LOGICALS)
        .map(|(op, line)| Expression::new(line, ExprKind::Logical(Binary::new(op)))))
}

pub fn recognize_arithmetic(
    cursor: &mut TagCursor,
    _env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    Ok(operator_token(cursor, ARITHMETICS)
        .map(|(op, line)| Expression::new(line, ExprKind::Arithmetic(Binary::new(op)))))
}

pub fn recognize_not(
    cursor: &mut TagCursor,
    _env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    if !(cursor.at("!") || cursor.at_word("not")) {
        return Ok(None);
    }
    let line = cursor.current_line();
    cursor.advance();
    Ok(Some(Expression::new(line, ExprKind::Not(None))))
}
