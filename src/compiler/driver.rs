// ABOUTME: Compiler driver walking template source, dispatching tags and assembling output
// ABOUTME: Produces program nodes, a concatenation expression or evaluated text depending on the mode

use chrono::Utc;
use tracing::{debug, info};

use super::environment::CompileEnvironment;
use super::error::{Result, TemplateError};
use super::process::{Creator, ProcessKind};
use crate::engine::config::Delimiters;
use crate::expression::{ExprKind, Expression};
use crate::parser::{Chunk, Scanner, TagCursor};
use crate::tag::{Block, Emitted, Step, TagFn, TEMPLATE_TAGS};
use crate::template::program::{Artifact, CompilerStamp, Expr, Node};

/// Where compiled output goes
enum Sink {
    /// Statements of a template body
    Nodes(Vec<Node>),
    /// Parts of a concatenation expression
    Parts(Vec<Expr>),
    /// Text computed at compile time
    Text(String),
}

impl Sink {
    fn is_statements(&self) -> bool {
        matches!(self, Sink::Nodes(_))
    }
}

fn push_text(body: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text { text: last }) = body.last_mut() {
        last.push_str(text);
    } else {
        body.push(Node::Text {
            text: text.to_string(),
        });
    }
}

struct Driver<'s> {
    tags: &'s [TagFn],
    delimiters: &'s Delimiters,
    frames: Vec<Block>,
    sink: Sink,
}

impl<'s> Driver<'s> {
    fn text(&mut self, text: &str) {
        if let Some(frame) = self.frames.last_mut() {
            push_text(frame.body_mut(), text);
            return;
        }
        match &mut self.sink {
            Sink::Nodes(nodes) => push_text(nodes, text),
            Sink::Parts(parts) => parts.push(Expr::text(text)),
            Sink::Text(output) => output.push_str(text),
        }
    }

    fn tag(&mut self, env: &mut CompileEnvironment, content: &str, line: u32) -> Result<()> {
        let mut cursor = TagCursor::new(content, line);

        if let Some(frame) = self.frames.last_mut() {
            match frame.on_tag(&mut cursor, env)? {
                Step::Pass => {}
                Step::Handled => return Ok(()),
                Step::Close => return self.close_innermost(env),
                Step::Verbatim => {
                    let raw = format!("{}{}{}", self.delimiters.start, content, self.delimiters.end);
                    push_text(frame.body_mut(), &raw);
                    return Ok(());
                }
            }
        }

        // An outer block's end tag force-closes the blocks opened inside it
        if let Some(index) = self.frames.iter().rposition(|frame| frame.is_end_tag(&cursor)) {
            let inner = self.frames[index + 1..].first().map(Block::handle);
            if let Some(inner) = inner {
                env.leave(inner)?;
            }
        }

        for tag in self.tags {
            if let Some(emitted) = tag(&mut cursor, env)? {
                return self.emit(env, emitted, line);
            }
        }

        let content = content.trim();
        let message = if content.starts_with('/') {
            format!("unexpected closing tag '{}'", content)
        } else {
            format!("unrecognized tag '{}'", content)
        };
        Err(TemplateError::parsing(line, message))
    }

    fn emit(&mut self, env: &mut CompileEnvironment, emitted: Emitted, line: u32) -> Result<()> {
        match emitted {
            Emitted::Nothing => Ok(()),
            Emitted::Open(block) => {
                if !self.sink.is_statements() {
                    return Err(TemplateError::contextual(
                        line,
                        "invalid context, cannot exist inline",
                    ));
                }
                self.frames.push(block);
                Ok(())
            }
            Emitted::Print(expr) => self.print(env, expr),
        }
    }

    fn print(&mut self, env: &mut CompileEnvironment, expr: Expression) -> Result<()> {
        if self.sink.is_statements() {
            let nodes = match &expr.kind {
                ExprKind::Resource(resource) if expr.parens == 0 => {
                    resource.compile_nodes(env, expr.line)?
                }
                _ => vec![Node::Print {
                    expr: expr.compile(env)?,
                }],
            };
            let body = match self.frames.last_mut() {
                Some(frame) => frame.body_mut(),
                None => match &mut self.sink {
                    Sink::Nodes(nodes) => nodes,
                    _ => return Ok(()),
                },
            };
            for node in nodes {
                match node {
                    Node::Text { text } => push_text(body, &text),
                    other => body.push(other),
                }
            }
            return Ok(());
        }

        match &mut self.sink {
            Sink::Parts(parts) => parts.push(expr.compile(env)?),
            Sink::Text(output) => output.push_str(&expr.evaluate(env)?.to_output()),
            Sink::Nodes(_) => {}
        }
        Ok(())
    }

    fn close_innermost(&mut self, env: &mut CompileEnvironment) -> Result<()> {
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        let nodes = frame.close(env)?;

        let body = match self.frames.last_mut() {
            Some(parent) => parent.body_mut(),
            None => match &mut self.sink {
                Sink::Nodes(nodes) => nodes,
                _ => return Ok(()),
            },
        };
        for node in nodes {
            match node {
                Node::Text { text } => push_text(body, &text),
                other => body.push(other),
            }
        }
        Ok(())
    }

    fn run(
        mut self,
        env: &mut CompileEnvironment,
        source: &str,
        first_line: u32,
    ) -> Result<Sink> {
        let delimiters = self.delimiters;
        let scanner = Scanner::new(source, &delimiters.start, &delimiters.end, first_line);
        for chunk in scanner {
            match chunk? {
                Chunk::Text { text, .. } => self.text(text),
                Chunk::Tag { content, line } => self.tag(env, content, line)?,
            }
        }

        if let Some(outermost) = self.frames.first() {
            env.leave(outermost.handle())?;
        }
        Ok(self.sink)
    }
}

fn drive(
    env: &mut CompileEnvironment,
    source: &str,
    delimiters: &Delimiters,
    first_line: u32,
    tags: &[TagFn],
    sink: Sink,
) -> Result<Sink> {
    let driver = Driver {
        tags,
        delimiters,
        frames: Vec::new(),
        sink,
    };
    driver.run(env, source, first_line)
}

/// Compile source into program statements
pub fn compile_statements(
    env: &mut CompileEnvironment,
    source: &str,
    delimiters: &Delimiters,
    first_line: u32,
    tags: &[TagFn],
) -> Result<Vec<Node>> {
    match drive(env, source, delimiters, first_line, tags, Sink::Nodes(Vec::new()))? {
        Sink::Nodes(nodes) => Ok(nodes),
        _ => Ok(Vec::new()),
    }
}

/// Compile source into one expression concatenating its text and prints
pub fn compile_concat(
    env: &mut CompileEnvironment,
    source: &str,
    delimiters: &Delimiters,
    first_line: u32,
    tags: &[TagFn],
) -> Result<Expr> {
    match drive(env, source, delimiters, first_line, tags, Sink::Parts(Vec::new()))? {
        Sink::Parts(parts) => Ok(Expr::Concat { parts }),
        _ => Ok(Expr::text("")),
    }
}

/// Render source at compile time against the initial variables
pub fn evaluate_source(
    env: &mut CompileEnvironment,
    source: &str,
    delimiters: &Delimiters,
    first_line: u32,
    tags: &[TagFn],
) -> Result<String> {
    match drive(env, source, delimiters, first_line, tags, Sink::Text(String::new()))? {
        Sink::Text(text) => Ok(text),
        _ => Ok(String::new()),
    }
}

/// Compile a whole template inside a root process
pub fn compile(env: &mut CompileEnvironment, template: &str, source: &str) -> Result<Artifact> {
    info!("Compiling template {}", template);
    let handle = env.enter(ProcessKind::Root, Creator::new(template, 1))?;

    let delimiters = env.config.delimiters.clone();
    let body = compile_statements(env, source, &delimiters, 1, TEMPLATE_TAGS)?;
    env.terminate(handle);
    env.leave(handle)?;

    let stamp = env.config.compiler_stamp.then(|| CompilerStamp {
        version: crate::VERSION.to_string(),
        compiled_at: Utc::now(),
    });
    let modifiers = env.modifiers.used();
    debug!(
        "Compiled {} into {} nodes using modifiers {:?}",
        template,
        body.len(),
        modifiers
    );

    Ok(Artifact {
        template: template.to_string(),
        cache_mode: env.config.cache.marker(),
        stamp,
        modifiers,
        body,
    })
}
