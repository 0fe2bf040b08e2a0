// ABOUTME: Variable registry holding one alias scope per template compilation unit
// ABOUTME: Associates names with already built expressions for parameters and loop-bound names

use std::collections::HashMap;

use crate::expression::Expression;

#[derive(Debug, Default)]
struct Scope {
    aliases: HashMap<String, Expression>,
}

#[derive(Debug, Default)]
pub struct VariableRegistry {
    scopes: Vec<Scope>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Alias `name` in the current scope, returning the association it replaces
    pub fn associate(&mut self, name: &str, expression: Expression) -> Option<Expression> {
        self.scopes
            .last_mut()
            .and_then(|scope| scope.aliases.insert(name.to_string(), expression))
    }

    /// Put back an association saved by `associate`
    pub fn restore(&mut self, name: &str, previous: Option<Expression>) {
        if let Some(scope) = self.scopes.last_mut() {
            match previous {
                Some(expression) => {
                    scope.aliases.insert(name.to_string(), expression);
                }
                None => {
                    scope.aliases.remove(name);
                }
            }
        }
    }

    /// Alias of `name` in the current scope only
    pub fn resolve(&self, name: &str) -> Option<&Expression> {
        self.scopes
            .last()
            .and_then(|scope| scope.aliases.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{ExprKind, Expression};
    use crate::template::Number;

    fn number(n: i64) -> Expression {
        Expression::new(1, ExprKind::Number(Number::Int(n)))
    }

    #[test]
    fn test_associate_and_restore() {
        let mut registry = VariableRegistry::new();
        registry.push_scope();

        assert!(registry.associate("item", number(1)).is_none());
        let previous = registry.associate("item", number(2));
        assert_eq!(previous, Some(number(1)));
        assert_eq!(registry.resolve("item"), Some(&number(2)));

        registry.restore("item", previous);
        assert_eq!(registry.resolve("item"), Some(&number(1)));
        registry.restore("item", None);
        assert!(registry.resolve("item").is_none());
    }

    #[test]
    fn test_resolution_sees_current_scope_only() {
        let mut registry = VariableRegistry::new();
        registry.push_scope();
        registry.associate("title", number(1));

        registry.push_scope();
        assert!(registry.resolve("title").is_none());

        registry.pop_scope();
        assert!(registry.resolve("title").is_some());
    }

    #[test]
    fn test_no_scope_is_a_no_op() {
        let mut registry = VariableRegistry::new();
        assert!(registry.associate("x", number(1)).is_none());
        assert!(registry.resolve("x").is_none());
    }
}
