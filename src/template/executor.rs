// ABOUTME: Program executor rendering compiled artifacts against the initial variables
// ABOUTME: Tracks section and foreach loop state and applies builtins and modifier plugins

use chrono::Utc;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::debug;

use super::context::{PluginStore, Variables};
use super::error::{RenderError, Result};
use super::program::{
    Artifact, Expr, ForeachLoop, LogicOp, LoopKind, LoopProperty, Node, Root, SectionLoop, Segment,
};
use super::value::Value;
use crate::plugins::{ModifierRegistry, PluginError};

type LoopKey = (LoopKind, u32, String);

/// Live state of one running loop
#[derive(Debug)]
struct LoopFrame {
    position: i64,
    state: Value,
}

/// Loop counters shared by sections and foreach loops
struct Progress {
    index: i64,
    iteration: usize,
    size: usize,
}

impl Progress {
    fn properties(&self, enable: &[LoopProperty]) -> IndexMap<String, Value> {
        let mut state = IndexMap::new();
        for property in enable {
            let value = match property {
                LoopProperty::First => Value::Bool(self.iteration == 1),
                LoopProperty::Last => Value::Bool(self.iteration == self.size),
                LoopProperty::Size => Value::from(self.size),
                LoopProperty::Index => Value::Int(self.index),
                LoopProperty::Iteration => Value::from(self.iteration),
            };
            state.insert(property.as_str().to_string(), value);
        }
        state
    }
}

pub struct Executor<'a> {
    variables: &'a Variables,
    plugins: &'a PluginStore,
    modifiers: &'a ModifierRegistry,
    loops: HashMap<LoopKey, LoopFrame>,
}

impl<'a> Executor<'a> {
    pub fn new(
        variables: &'a Variables,
        plugins: &'a PluginStore,
        modifiers: &'a ModifierRegistry,
    ) -> Self {
        Self {
            variables,
            plugins,
            modifiers,
            loops: HashMap::new(),
        }
    }

    /// Render an artifact, returning its output and cache-mode marker
    pub fn execute(&mut self, artifact: &Artifact) -> Result<(String, i64)> {
        if let Some(missing) = artifact
            .modifiers
            .iter()
            .find(|name| !self.modifiers.contains(name))
        {
            return Err(RenderError::UnknownModifier {
                name: missing.clone(),
            });
        }

        debug!("Executing {}", artifact.template);
        self.loops.clear();
        let mut output = String::new();
        self.render(&artifact.body, &mut output)?;
        Ok((output, artifact.cache_mode))
    }

    fn render(&mut self, nodes: &[Node], output: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text { text } => output.push_str(text),
                Node::Print { expr } => output.push_str(&self.eval(expr)?.to_output()),
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = None;
                    for branch in branches {
                        if self.eval(&branch.condition)?.is_truthy() {
                            taken = Some(&branch.body);
                            break;
                        }
                    }
                    if let Some(body) = taken.or(otherwise.as_ref()) {
                        self.render(body, output)?;
                    }
                }
                Node::Section(section) => self.section(section, output)?,
                Node::Foreach(foreach) => self.foreach(foreach, output)?,
            }
        }
        Ok(())
    }

    fn section(&mut self, section: &SectionLoop, output: &mut String) -> Result<()> {
        let source = self.eval(&section.source)?;
        let count = match &source {
            Value::List(_) | Value::Map(_) => i64::try_from(source.count()).unwrap_or(i64::MAX),
            _ => 0,
        };

        let start = if section.start < 0 {
            count.saturating_add(section.start).max(0)
        } else {
            section.start.min(count)
        };
        let step = section.step.max(1);
        let limit = section
            .max
            .and_then(|max| usize::try_from(max).ok())
            .unwrap_or(usize::MAX);

        let first = Some(start).filter(|index| *index < count);
        let positions: Vec<i64> = std::iter::successors(first, |index| {
            index.checked_add(step).filter(|next| *next < count)
        })
        .take(limit)
        .collect();

        if positions.is_empty() {
            if let Some(otherwise) = &section.otherwise {
                self.render(otherwise, output)?;
            }
            return Ok(());
        }

        let key = (LoopKind::Section, section.unit, section.id.clone());
        let previous = self.loops.remove(&key);
        for (offset, index) in positions.iter().enumerate() {
            let progress = Progress {
                index: *index,
                iteration: offset + 1,
                size: positions.len(),
            };
            self.loops.insert(
                key.clone(),
                LoopFrame {
                    position: *index,
                    state: Value::Map(progress.properties(&section.enable)),
                },
            );
            self.render(&section.body, output)?;
        }
        self.restore(key, previous);
        Ok(())
    }

    fn foreach(&mut self, foreach: &ForeachLoop, output: &mut String) -> Result<()> {
        let entries: Vec<(Value, Value)> = match self.eval(&foreach.source)? {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(position, item)| (Value::from(position), item))
                .collect(),
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| (Value::Str(key), item))
                .collect(),
            _ => Vec::new(),
        };

        if entries.is_empty() {
            if let Some(otherwise) = &foreach.otherwise {
                self.render(otherwise, output)?;
            }
            return Ok(());
        }

        let key = (LoopKind::Foreach, foreach.unit, foreach.id.clone());
        let previous = self.loops.remove(&key);
        let size = entries.len();
        for (position, (entry_key, item)) in entries.into_iter().enumerate() {
            let index = i64::try_from(position).unwrap_or(i64::MAX);
            let progress = Progress {
                index,
                iteration: position + 1,
                size,
            };
            let mut state = progress.properties(&foreach.enable);
            state.insert("item".to_string(), item);
            state.insert("key".to_string(), entry_key);
            self.loops.insert(
                key.clone(),
                LoopFrame {
                    position: index,
                    state: Value::Map(state),
                },
            );
            self.render(&foreach.body, output)?;
        }
        self.restore(key, previous);
        Ok(())
    }

    fn restore(&mut self, key: LoopKey, previous: Option<LoopFrame>) {
        match previous {
            Some(frame) => {
                self.loops.insert(key, frame);
            }
            None => {
                self.loops.remove(&key);
            }
        }
    }

    fn root(&self, root: &Root) -> Value {
        match root {
            Root::User { name } => self.variables.get(name).unwrap_or_default(),
            Root::Section { unit, id } => self.loop_state(LoopKind::Section, *unit, id),
            Root::Foreach { unit, id } => self.loop_state(LoopKind::Foreach, *unit, id),
            Root::Plugin { unit, name } => self.plugins.get(*unit, name),
            Root::Modifier { .. } => Value::Null,
        }
    }

    fn loop_state(&self, kind: LoopKind, unit: u32, id: &str) -> Value {
        self.loops
            .get(&(kind, unit, id.to_string()))
            .map(|frame| frame.state.clone())
            .unwrap_or_default()
    }

    fn eval(&self, expr: &Expr) -> Result<Value> {
        let value = match expr {
            Expr::Literal { value } => value.to_value(),
            Expr::Path { root, segments } => {
                let mut value = self.root(root);
                for segment in segments {
                    value = match segment {
                        Segment::Key { name } => value.key(name),
                        Segment::Index { index } => value.key_by(&Value::Int(*index)),
                        Segment::Dynamic { key } => value.key_by(&self.eval(key)?),
                        Segment::Property { name } => value.property(name),
                        Segment::Method { name, args } => {
                            let args = self.eval_all(args)?;
                            value.call_method(name, &args)?
                        }
                    };
                }
                value
            }
            Expr::LoopIndex { kind, unit, id } => self
                .loops
                .get(&(*kind, *unit, id.clone()))
                .map_or(Value::Null, |frame| Value::Int(frame.position)),
            Expr::Now => Value::Int(Utc::now().timestamp()),
            Expr::Concat { parts } => {
                let mut text = String::new();
                for part in parts {
                    text.push_str(&self.eval(part)?.to_output());
                }
                Value::Str(text)
            }
            Expr::Not { operand } => Value::Bool(!self.eval(operand)?.is_truthy()),
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?.is_truthy();
                let result = match op {
                    LogicOp::And => left && self.eval(right)?.is_truthy(),
                    LogicOp::Or => left || self.eval(right)?.is_truthy(),
                };
                Value::Bool(result)
            }
            Expr::Compare { op, left, right } => {
                Value::Bool(op.apply(&self.eval(left)?, &self.eval(right)?))
            }
            Expr::Arith { op, left, right } => op.apply(&self.eval(left)?, &self.eval(right)?)?,
            Expr::Call { function, args } => function.apply(&self.eval_all(args)?)?,
            Expr::Modify {
                instance,
                target,
                args,
            } => {
                let name = match instance {
                    Root::Modifier { name } => name.as_str(),
                    _ => "",
                };
                let target = self.eval(target)?;
                let args = self.eval_all(args)?;
                self.modifiers
                    .apply(name, &target, &args)
                    .map_err(|error| match error {
                        PluginError::UnknownModifier { name } => {
                            RenderError::UnknownModifier { name }
                        }
                        other => RenderError::ModifierFailed {
                            name: name.to_string(),
                            reason: other.to_string(),
                        },
                    })?
            }
        };
        Ok(value)
    }

    fn eval_all(&self, exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::program::{Branch, CompareOp, Scalar};

    fn artifact(body: Vec<Node>) -> Artifact {
        Artifact {
            template: "test.tpl".to_string(),
            cache_mode: 0,
            stamp: None,
            modifiers: Vec::new(),
            body,
        }
    }

    fn user(name: &str) -> Expr {
        Expr::Path {
            root: Root::User {
                name: name.to_string(),
            },
            segments: Vec::new(),
        }
    }

    fn run(body: Vec<Node>, variables: &Variables) -> Result<String> {
        let plugins = PluginStore::new();
        let modifiers = ModifierRegistry::new();
        let mut executor = Executor::new(variables, &plugins, &modifiers);
        executor.execute(&artifact(body)).map(|(output, _)| output)
    }

    fn section(enable: Vec<LoopProperty>, start: i64, step: i64, max: Option<i64>) -> Node {
        Node::Section(SectionLoop {
            unit: 1,
            id: "i".to_string(),
            source: user("list"),
            start,
            step,
            max,
            enable,
            body: vec![Node::Print {
                expr: Expr::LoopIndex {
                    kind: LoopKind::Section,
                    unit: 1,
                    id: "i".to_string(),
                },
            }],
            otherwise: Some(vec![Node::Text {
                text: "none".to_string(),
            }]),
        })
    }

    fn letters() -> Variables {
        let mut variables = Variables::new();
        variables.set("list", vec!["a", "b", "c", "d", "e"]);
        variables
    }

    #[test]
    fn test_section_start_step_max() {
        let variables = letters();
        assert_eq!(run(vec![section(Vec::new(), 0, 1, None)], &variables).unwrap(), "01234");
        assert_eq!(run(vec![section(Vec::new(), 1, 2, None)], &variables).unwrap(), "13");
        assert_eq!(run(vec![section(Vec::new(), -2, 1, None)], &variables).unwrap(), "34");
        assert_eq!(run(vec![section(Vec::new(), 0, 1, Some(2))], &variables).unwrap(), "01");
        assert_eq!(run(vec![section(Vec::new(), 9, 1, None)], &variables).unwrap(), "none");
    }

    #[test]
    fn test_section_extreme_bounds() {
        let variables = letters();
        let render = |start, step, max| {
            run(vec![section(Vec::new(), start, step, max)], &variables)
        };
        assert_eq!(render(0, i64::MAX, None).unwrap(), "0");
        assert_eq!(render(3, i64::MAX - 1, None).unwrap(), "3");
        assert_eq!(render(-9, 1, None).unwrap(), "01234");
        assert_eq!(render(i64::MIN, 2, None).unwrap(), "024");
        assert_eq!(render(i64::MAX, 1, None).unwrap(), "none");
        assert_eq!(render(0, 1, Some(i64::MAX)).unwrap(), "01234");
        assert_eq!(render(0, 1, Some(-1)).unwrap(), "01234");
    }

    #[test]
    fn test_section_properties() {
        let variables = letters();
        let node = Node::Section(SectionLoop {
            unit: 1,
            id: "i".to_string(),
            source: user("list"),
            start: 0,
            step: 2,
            max: None,
            enable: vec![LoopProperty::First, LoopProperty::Last, LoopProperty::Size],
            body: vec![Node::Print {
                expr: Expr::Path {
                    root: Root::Section {
                        unit: 1,
                        id: "i".to_string(),
                    },
                    segments: vec![
                        Segment::Key {
                            name: "size".to_string(),
                        },
                    ],
                },
            }],
            otherwise: None,
        });
        assert_eq!(run(vec![node], &variables).unwrap(), "333");
    }

    #[test]
    fn test_foreach_over_map() {
        let mut variables = Variables::new();
        let mut map = IndexMap::new();
        map.insert("x".to_string(), Value::Int(1));
        map.insert("y".to_string(), Value::Int(2));
        variables.set("map", map);

        let field = |name: &str| Expr::Path {
            root: Root::Foreach {
                unit: 1,
                id: "f".to_string(),
            },
            segments: vec![Segment::Key {
                name: name.to_string(),
            }],
        };
        let node = Node::Foreach(ForeachLoop {
            unit: 1,
            id: "f".to_string(),
            source: user("map"),
            enable: vec![LoopProperty::Iteration],
            body: vec![
                Node::Print { expr: field("key") },
                Node::Print { expr: field("item") },
                Node::Print {
                    expr: field("iteration"),
                },
            ],
            otherwise: None,
        });
        assert_eq!(run(vec![node], &variables).unwrap(), "x11y22");
    }

    #[test]
    fn test_if_and_compare() {
        let mut variables = Variables::new();
        variables.set("a", 5);
        let node = Node::If {
            branches: vec![Branch {
                condition: Expr::Compare {
                    op: CompareOp::Gt,
                    left: Box::new(user("a")),
                    right: Box::new(Expr::Literal {
                        value: Scalar::Int(3),
                    }),
                },
                body: vec![Node::Text {
                    text: "big".to_string(),
                }],
            }],
            otherwise: Some(vec![Node::Text {
                text: "small".to_string(),
            }]),
        };
        assert_eq!(run(vec![node], &variables).unwrap(), "big");
    }

    #[test]
    fn test_modifier_call() {
        let mut variables = Variables::new();
        variables.set("name", "ada");
        let node = Node::Print {
            expr: Expr::Modify {
                instance: Root::Modifier {
                    name: "upper".to_string(),
                },
                target: Box::new(user("name")),
                args: Vec::new(),
            },
        };
        assert_eq!(run(vec![node], &variables).unwrap(), "ADA");
    }

    #[test]
    fn test_missing_modifier_rejected_before_rendering() {
        let variables = Variables::new();
        let plugins = PluginStore::new();
        let modifiers = ModifierRegistry::new();
        let mut program = artifact(Vec::new());
        program.modifiers = vec!["shout".to_string()];
        let err = Executor::new(&variables, &plugins, &modifiers)
            .execute(&program)
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::UnknownModifier {
                name: "shout".to_string()
            }
        );
    }

    #[test]
    fn test_now_is_read_at_runtime() {
        let variables = Variables::new();
        let output = run(vec![Node::Print { expr: Expr::Now }], &variables).unwrap();
        let stamp: i64 = output.parse().unwrap();
        assert!(stamp >= Utc::now().timestamp() - 5);
    }
}
