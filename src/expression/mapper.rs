// ABOUTME: Mapper trying an ordered list of recognizers against the tag cursor
// ABOUTME: Each tag context uses its own recognizer set; the first match wins

use super::context::Context;
use super::{function, literal, operator, resource, variable, ExprKind, Expression};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::parser::TagCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognizer {
    Number,
    Bool,
    Str,
    Parseable,
    BareWord,
    Variable,
    Resource,
    Modifier,
    Parenthesis,
    Function,
    Comparison,
    LogicalNot,
    Logical,
    Arithmetic,
}

/// Ordered recognizer set for one kind of tag content
#[derive(Debug, Clone, Copy)]
pub struct Mapper {
    recognizers: &'static [Recognizer],
}

impl Mapper {
    /// Print tags
    pub const PRINT: Mapper = Mapper {
        recognizers: &[
            Recognizer::Number,
            Recognizer::Str,
            Recognizer::Parseable,
            Recognizer::Variable,
            Recognizer::Resource,
            Recognizer::Modifier,
            Recognizer::Parenthesis,
            Recognizer::Arithmetic,
            Recognizer::Function,
        ],
    };

    /// `if` and `elseif` conditions
    pub const CONDITION: Mapper = Mapper {
        recognizers: &[
            Recognizer::Number,
            Recognizer::Str,
            Recognizer::Parseable,
            Recognizer::Bool,
            Recognizer::Variable,
            Recognizer::Resource,
            Recognizer::Modifier,
            Recognizer::Parenthesis,
            Recognizer::Function,
            Recognizer::Comparison,
            Recognizer::LogicalNot,
            Recognizer::Logical,
            Recognizer::Arithmetic,
        ],
    };

    /// Attribute values of block tags and print parameters
    pub const ATTRIBUTE: Mapper = Mapper {
        recognizers: &[
            Recognizer::Number,
            Recognizer::Bool,
            Recognizer::Str,
            Recognizer::Parseable,
            Recognizer::Variable,
            Recognizer::Resource,
            Recognizer::Modifier,
            Recognizer::Parenthesis,
            Recognizer::Arithmetic,
            Recognizer::BareWord,
        ],
    };

    /// Method call arguments
    pub const ARGUMENT: Mapper = Mapper {
        recognizers: &[
            Recognizer::Number,
            Recognizer::Bool,
            Recognizer::Str,
            Recognizer::Parseable,
            Recognizer::Variable,
            Recognizer::Modifier,
            Recognizer::Parenthesis,
            Recognizer::Arithmetic,
        ],
    };

    /// Modifier arguments, a single operand each
    pub const MODIFIER_ARG: Mapper = Mapper {
        recognizers: &[
            Recognizer::Number,
            Recognizer::Str,
            Recognizer::Parseable,
            Recognizer::Bool,
            Recognizer::Variable,
        ],
    };

    /// Map the expression at the cursor; the cursor is untouched when nothing matches
    pub fn map(
        &self,
        cursor: &mut TagCursor,
        env: &mut CompileEnvironment,
    ) -> Result<Option<Expression>> {
        if cursor.is_finished() {
            return Ok(None);
        }

        for recognizer in self.recognizers {
            let found = match recognizer {
                Recognizer::Number => literal::recognize_number(cursor, env)?,
                Recognizer::Bool => literal::recognize_bool(cursor, env)?,
                Recognizer::Str => literal::recognize_string(cursor, env)?,
                Recognizer::Parseable => literal::recognize_parseable(cursor, env)?,
                Recognizer::BareWord => literal::recognize_bare_word(cursor, env)?,
                Recognizer::Variable => variable::recognize(cursor, env)?,
                Recognizer::Resource => resource::recognize(cursor, env)?,
                Recognizer::Modifier => operator::recognize_modifier(cursor, env)?,
                Recognizer::Parenthesis => self.group(cursor, env)?,
                Recognizer::Function => function::recognize(cursor, env)?,
                Recognizer::Comparison => operator::recognize_comparison(cursor, env)?,
                Recognizer::LogicalNot => operator::recognize_not(cursor, env)?,
                Recognizer::Logical => operator::recognize_logical(cursor, env)?,
                Recognizer::Arithmetic => operator::recognize_arithmetic(cursor, env)?,
            };
            if found.is_some() {
                return Ok(found);
            }
        }

        Ok(None)
    }

    /// Map expressions into a context until the tag ends or `stop` matches
    pub fn parse(
        &self,
        cursor: &mut TagCursor,
        env: &mut CompileEnvironment,
        stop: &dyn Fn(&TagCursor) -> bool,
    ) -> Result<Context> {
        let mut context = Context::new(cursor.current_line());

        while !cursor.is_finished() && !stop(cursor) {
            match self.map(cursor, env)? {
                Some(expr) => context.push(expr),
                None => {
                    let line = cursor.current_line();
                    return Err(match cursor.text() {
                        Some(")") => TemplateError::parsing(line, "unbalanced parentheses"),
                        Some(text) => {
                            TemplateError::parsing(line, format!("unknown identifier '{}'", text))
                        }
                        None => TemplateError::parsing(line, "unexpected end of tag"),
                    });
                }
            }
        }

        Ok(context)
    }

    fn group(
        &self,
        cursor: &mut TagCursor,
        env: &mut CompileEnvironment,
    ) -> Result<Option<Expression>> {
        if !cursor.at("(") {
            return Ok(None);
        }
        let line = cursor.current_line();
        cursor.advance();

        let inner = self.parse(cursor, env, &|c: &TagCursor| c.at(")"))?;
        if !cursor.at(")") {
            return Err(TemplateError::parsing(line, "unbalanced parentheses"));
        }
        cursor.advance();

        Ok(Some(Expression::new(line, ExprKind::Group(Box::new(inner)))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::EngineConfig;
    use crate::plugins::ModifierRegistry;
    use crate::resource::ProviderRegistry;
    use crate::template::program::{ArithOp, LogicOp};
    use crate::template::{Number, Variables};
    use crate::expression::Binary;
    use crate::parser::TokenPattern;

    struct Fixture {
        config: EngineConfig,
        values: Variables,
        modifiers: ModifierRegistry,
        providers: ProviderRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: EngineConfig::default(),
                values: Variables::new(),
                modifiers: ModifierRegistry::new(),
                providers: ProviderRegistry::new(),
            }
        }

        fn parse(&self, mapper: Mapper, raw: &str) -> Result<Expression> {
            let mut env =
                CompileEnvironment::new(&self.config, &self.values, &self.modifiers, &self.providers);
            let mut cursor = TagCursor::new(raw, 1);
            cursor.tokenize(TokenPattern::Conditional)?;
            mapper.parse(&mut cursor, &mut env, &|_| false)?.into_expression()
        }
    }

    #[test]
    fn test_arithmetic_with_groups() {
        let fixture = Fixture::new();
        let expr = fixture.parse(Mapper::PRINT, "(1 + 2) * 3").unwrap();
        match expr.kind {
            ExprKind::Arithmetic(Binary { op, left, .. }) => {
                assert_eq!(op, ArithOp::Mul);
                assert_eq!(left.map(|l| l.parens), Some(1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_condition_with_words() {
        let fixture = Fixture::new();
        let expr = fixture
            .parse(Mapper::CONDITION, "$a is even and not $b")
            .unwrap();
        assert!(matches!(
            expr.kind,
            ExprKind::Logical(Binary {
                op: LogicOp::And,
                ..
            })
        ));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let fixture = Fixture::new();
        let err = fixture.parse(Mapper::PRINT, "(1 + 2").unwrap_err();
        assert!(err.to_string().contains("unbalanced parentheses"));

        let err = fixture.parse(Mapper::PRINT, "1 + 2)").unwrap_err();
        assert!(err.to_string().contains("unbalanced parentheses"));
    }

    #[test]
    fn test_unknown_identifier() {
        let fixture = Fixture::new();
        let err = fixture.parse(Mapper::PRINT, "1 + #").unwrap_err();
        assert!(err.to_string().contains("unknown identifier '#'"));
    }

    #[test]
    fn test_number_literal() {
        let fixture = Fixture::new();
        let expr = fixture.parse(Mapper::PRINT, "42").unwrap();
        assert_eq!(expr.kind, ExprKind::Number(Number::Int(42)));
    }

    #[test]
    fn test_map_leaves_cursor_on_miss() {
        let fixture = Fixture::new();
        let mut env = CompileEnvironment::new(
            &fixture.config,
            &fixture.values,
            &fixture.modifiers,
            &fixture.providers,
        );
        let mut cursor = TagCursor::new("# 1", 1);
        cursor.tokenize(TokenPattern::Base).unwrap();
        assert!(Mapper::PRINT.map(&mut cursor, &mut env).unwrap().is_none());
        assert_eq!(cursor.text(), Some("#"));
    }
}
