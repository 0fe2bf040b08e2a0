// ABOUTME: Variable references with keys, dynamic keys, loop indexes, properties and method calls
// ABOUTME: Resolves system variables, scope aliases and strict-scope checks when a reference is mapped

use chrono::Utc;

use super::mapper::Mapper;
use super::{ExprKind, Expression};
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::compiler::process::{FLAG_VARS_CHECKED, PID_ROOT};
use crate::parser::TagCursor;
use crate::template::program::{Expr, LoopKind, Root, Scalar, Segment};
use crate::template::Value;

/// Where a variable reference reads from
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Path(Root),
    /// Current unix time
    Now,
    /// Engine version
    Version,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Key(String),
    Index(i64),
    Dynamic(Box<Expression>),
    /// `[id]` naming an active section or foreach
    LoopIndex {
        kind: LoopKind,
        unit: u32,
        id: String,
    },
    Property(String),
    Method {
        name: String,
        args: Vec<Expression>,
    },
}

impl Component {
    fn is_call(&self) -> bool {
        matches!(self, Component::Property(_) | Component::Method { .. })
    }

    fn static_key(&self) -> Option<String> {
        match self {
            Component::Key(key) => Some(key.clone()),
            Component::Index(index) => Some(index.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub target: Target,
    pub components: Vec<Component>,
}

impl Variable {
    pub fn compile(&self, env: &mut CompileEnvironment) -> Result<Expr> {
        let root = match &self.target {
            Target::Now => return Ok(Expr::Now),
            Target::Version => {
                return Ok(Expr::Literal {
                    value: Scalar::Str(crate::VERSION.to_string()),
                })
            }
            Target::Path(root) => root.clone(),
        };

        let mut segments = Vec::with_capacity(self.components.len());
        for component in &self.components {
            let segment = match component {
                Component::Key(name) => Segment::Key { name: name.clone() },
                Component::Index(index) => Segment::Index { index: *index },
                Component::Dynamic(key) => Segment::Dynamic {
                    key: key.compile(env)?,
                },
                Component::LoopIndex { kind, unit, id } => Segment::Dynamic {
                    key: Expr::LoopIndex {
                        kind: *kind,
                        unit: *unit,
                        id: id.clone(),
                    },
                },
                Component::Property(name) => Segment::Property { name: name.clone() },
                Component::Method { name, args } => Segment::Method {
                    name: name.clone(),
                    args: args
                        .iter()
                        .map(|arg| arg.compile(env))
                        .collect::<Result<Vec<_>>>()?,
                },
            };
            segments.push(segment);
        }

        Ok(Expr::Path { root, segments })
    }

    /// Read the value from the initial variables during compilation
    pub fn evaluate(&self, env: &mut CompileEnvironment, line: u32) -> Result<Value> {
        let mut value = match &self.target {
            Target::Now => return Ok(Value::Int(Utc::now().timestamp())),
            Target::Version => return Ok(Value::from(crate::VERSION)),
            Target::Path(Root::User { name }) => env.values.get(name).ok_or_else(|| {
                TemplateError::existence(line, format!("variable {} does not exist", name))
            })?,
            Target::Path(_) => return Err(runtime_only(line)),
        };

        for component in &self.components {
            value = match component {
                Component::Key(key) => value.key(key),
                Component::Index(index) => value.key_by(&Value::Int(*index)),
                Component::Dynamic(key) => {
                    let key = key.evaluate(env)?;
                    value.key_by(&key)
                }
                Component::LoopIndex { .. } => return Err(runtime_only(line)),
                Component::Property(name) => value.property(name),
                Component::Method { name, args } => {
                    let args = args
                        .iter()
                        .map(|arg| arg.evaluate(env))
                        .collect::<Result<Vec<_>>>()?;
                    value
                        .call_method(name, &args)
                        .map_err(|error| TemplateError::contextual(line, error.to_string()))?
                }
            };
        }

        Ok(value)
    }
}

fn runtime_only(line: u32) -> TemplateError {
    TemplateError::contextual(
        line,
        "runtime variables cannot be evaluated during compilation",
    )
}

/// `$name` followed by any number of access components
pub fn recognize(
    cursor: &mut TagCursor,
    env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    if !cursor.at("$") {
        return Ok(None);
    }
    let start = cursor.position();
    let line = cursor.current_line();
    cursor.advance();

    let name = match cursor.current() {
        Some(token) if cursor.glued() && token.is_identifier() => token.text.clone(),
        _ => {
            cursor.restore(start);
            return Ok(None);
        }
    };
    cursor.advance();

    let components = parse_components(cursor, env)?;
    resolve(env, name, components, line).map(Some)
}

fn parse_components(
    cursor: &mut TagCursor,
    env: &mut CompileEnvironment,
) -> Result<Vec<Component>> {
    let mut components = Vec::new();
    let mut called = false;

    loop {
        let line = cursor.current_line();
        if cursor.glued_at(".") || cursor.glued_at("[") {
            if called {
                return Err(TemplateError::parsing(
                    line,
                    "no keys after a method or property call",
                ));
            }
        }

        if cursor.glued_at(".") {
            cursor.advance();
            let token = match cursor.current() {
                Some(token) if cursor.glued() => token.clone(),
                _ => return Err(TemplateError::parsing(line, "missing key after '.'")),
            };
            if token.is_identifier() {
                components.push(Component::Key(token.text));
            } else if token.is_number() {
                // `1.2` arrives as one number token
                for part in token.text.split('.') {
                    components.push(Component::Index(parse_index(part, line)?));
                }
            } else {
                return Err(TemplateError::parsing(
                    line,
                    format!("invalid key '{}'", token.text),
                ));
            }
            cursor.advance();
        } else if cursor.glued_at("[") {
            cursor.advance();
            components.push(bracket_key(cursor, env, line)?);
            cursor.expect("]")?;
        } else if cursor.glued_at("->") {
            cursor.advance();
            let name = match cursor.current() {
                Some(token) if cursor.glued() && token.is_identifier() => token.text.clone(),
                _ => return Err(TemplateError::parsing(line, "missing name after '->'")),
            };
            cursor.advance();

            if cursor.glued_at("(") {
                cursor.advance();
                let args = parse_arguments(cursor, env)?;
                components.push(Component::Method { name, args });
            } else {
                components.push(Component::Property(name));
            }
            called = true;
        } else {
            break;
        }
    }

    Ok(components)
}

fn parse_index(text: &str, line: u32) -> Result<i64> {
    text.parse()
        .map_err(|_| TemplateError::parsing(line, format!("invalid index '{}'", text)))
}

fn bracket_key(
    cursor: &mut TagCursor,
    env: &mut CompileEnvironment,
    line: u32,
) -> Result<Component> {
    if cursor.at("$") {
        let key = recognize(cursor, env)?
            .ok_or_else(|| TemplateError::parsing(line, "invalid dynamic key"))?;
        return Ok(Component::Dynamic(Box::new(key)));
    }

    let token = cursor
        .current()
        .cloned()
        .ok_or_else(|| TemplateError::parsing(line, "missing key inside '[]'"))?;

    let component = if token.is_number() {
        Component::Index(parse_index(&token.text, line)?)
    } else if token.is_identifier() {
        let kind = env.active_loop(&token.text).ok_or_else(|| {
            TemplateError::existence(line, format!("invalid section id: {}", token.text))
        })?;
        Component::LoopIndex {
            kind,
            unit: env.current_unit(),
            id: token.text,
        }
    } else {
        return Err(TemplateError::parsing(
            line,
            format!("invalid key '{}' inside '[]'", token.text),
        ));
    };

    cursor.advance();
    Ok(component)
}

/// Comma-separated method arguments up to the closing parenthesis
fn parse_arguments(
    cursor: &mut TagCursor,
    env: &mut CompileEnvironment,
) -> Result<Vec<Expression>> {
    let mut args = Vec::new();
    if cursor.at(")") {
        cursor.advance();
        return Ok(args);
    }

    loop {
        let context = Mapper::ARGUMENT.parse(cursor, env, &|c: &TagCursor| {
            c.at(",") || c.at(")")
        })?;
        args.push(context.into_expression()?);

        if cursor.at(",") {
            cursor.advance();
        } else {
            cursor.expect(")")?;
            return Ok(args);
        }
    }
}

/// Turn a parsed reference into an expression bound to its storage
fn resolve(
    env: &CompileEnvironment,
    name: String,
    components: Vec<Component>,
    line: u32,
) -> Result<Expression> {
    if env.is_system_var(&name) {
        return system_variable(env, name, components, line);
    }

    if let Some(alias) = env.variables.resolve(&name) {
        return transplant(alias.clone(), components, line);
    }

    let strict = env.config.strict_var_scope
        && env.current_unit() != PID_ROOT
        && !env.processes.has_flag(FLAG_VARS_CHECKED);
    if strict {
        return Err(TemplateError::VariableNotFound {
            line,
            name,
            reason: "only parameters passed to an included template are visible".to_string(),
        });
    }

    Ok(Expression::new(
        line,
        ExprKind::Variable(Variable {
            target: Target::Path(Root::User { name: name.clone() }),
            name,
            components,
        }),
    ))
}

/// Append the reference's components to an aliased expression
fn transplant(mut alias: Expression, components: Vec<Component>, line: u32) -> Result<Expression> {
    alias.line = line;
    if components.is_empty() {
        return Ok(alias);
    }

    match &mut alias.kind {
        ExprKind::Variable(variable) if matches!(variable.target, Target::Path(_)) => {
            let after_call = variable.components.last().is_some_and(Component::is_call);
            if after_call && components.first().is_some_and(|c| !c.is_call()) {
                return Err(TemplateError::parsing(
                    line,
                    "no keys after a method or property call",
                ));
            }
            variable.components.extend(components);
            Ok(alias)
        }
        _ => Err(TemplateError::contextual(
            line,
            "undefined keys and/or properties",
        )),
    }
}

fn system_variable(
    env: &CompileEnvironment,
    name: String,
    components: Vec<Component>,
    line: u32,
) -> Result<Expression> {
    let mut rest = components.into_iter();
    let mut static_key = |what: &str| -> Result<String> {
        match rest.next() {
            Some(component) => component.static_key().ok_or_else(|| {
                TemplateError::contextual(
                    line,
                    format!("only static keys allowed for ${} {}", name, what),
                )
            }),
            None => Err(TemplateError::contextual(
                line,
                format!("missing required key(s) for ${}", name),
            )),
        }
    };

    let key = static_key("names")?.to_ascii_lowercase();
    let (target, needs_more) = match key.as_str() {
        "now" | "time" => (Target::Now, false),
        "version" => (Target::Version, false),
        "plugin" => {
            let plugin = static_key("plugin names")?;
            let root = Root::Plugin {
                unit: env.current_unit(),
                name: plugin,
            };
            (Target::Path(root), true)
        }
        "section" | "foreach" => {
            let kind = if key == "section" {
                LoopKind::Section
            } else {
                LoopKind::Foreach
            };
            let id = static_key("ids")?;
            if env.active_loop(&id) != Some(kind) {
                return Err(TemplateError::existence(
                    line,
                    format!("invalid {} id: {}", kind.as_str(), id),
                ));
            }
            let unit = env.current_unit();
            let root = match kind {
                LoopKind::Section => Root::Section { unit, id },
                LoopKind::Foreach => Root::Foreach { unit, id },
            };
            (Target::Path(root), true)
        }
        other => {
            return Err(TemplateError::existence(
                line,
                format!("unknown system variable ${}.{}", name, other),
            ))
        }
    };

    let components: Vec<Component> = rest.collect();
    if needs_more && components.is_empty() {
        return Err(TemplateError::contextual(
            line,
            format!("missing required key(s) for ${}.{}", name, key),
        ));
    }
    if !needs_more && !components.is_empty() {
        return Err(TemplateError::contextual(
            line,
            format!("${}.{} takes no keys", name, key),
        ));
    }

    Ok(Expression::new(
        line,
        ExprKind::Variable(Variable {
            name,
            target,
            components,
        }),
    ))
}
