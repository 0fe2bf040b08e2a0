// ABOUTME: Resource references like `@file[header.tpl]` loaded through the dsn's provider
// ABOUTME: Template resources are included as external sub-templates with their own parameter scope

use indexmap::IndexMap;
use tracing::debug;

use super::{ExprKind, Expression};
use crate::compiler::driver;
use crate::compiler::environment::CompileEnvironment;
use crate::compiler::error::{Result, TemplateError};
use crate::compiler::process::{Creator, ProcessKind};
use crate::engine::config::Delimiters;
use crate::parser::TagCursor;
use crate::resource::{RenderMode, ResourceData, ResourceError};
use crate::tag::TEMPLATE_TAGS;
use crate::template::program::{Expr, Node};
use crate::template::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub dsn: String,
    pub path: String,
    pub data: ResourceData,
    /// Parameters aliased inside the included template
    pub params: IndexMap<String, Expression>,
}

impl Resource {
    pub fn label(&self) -> String {
        format!("{}[{}]", self.dsn, self.path)
    }

    pub fn is_template(&self) -> bool {
        self.data.render_mode == RenderMode::Template
    }

    pub fn set_param(&mut self, name: &str, value: Expression, line: u32) -> Result<()> {
        if !self.is_template() {
            return Err(TemplateError::contextual(
                line,
                "template parameters not accepted for non-template data",
            ));
        }
        if self.params.contains_key(name) {
            return Err(TemplateError::contextual(
                line,
                format!("parameter already set: {}", name),
            ));
        }
        self.params.insert(name.to_string(), value);
        Ok(())
    }

    /// Compile the content as an included template inside its own process and scope
    fn include<T>(
        &self,
        env: &mut CompileEnvironment,
        line: u32,
        run: impl FnOnce(&mut CompileEnvironment, &str, &Delimiters) -> Result<T>,
    ) -> Result<T> {
        let label = self.label();
        debug!("Including resource {} at line {}", label, line);

        let handle = env.enter(ProcessKind::External, Creator::new(label.clone(), line))?;
        env.open_resource(&self.dsn, &self.path, line)?;

        for (name, param) in &self.params {
            let mut param = param.clone();
            param.mark_passed_in();
            env.variables.associate(name, param);
        }

        let delimiters = self
            .data
            .delimiters
            .clone()
            .unwrap_or_else(|| env.config.delimiters.clone());
        let output = run(env, &self.data.content, &delimiters);
        env.close_resource(&self.dsn, &self.path);
        let output = output.map_err(|error| error.in_resource(label.clone(), line))?;

        env.terminate(handle);
        env.leave(handle)
            .map_err(|error| error.in_resource(label, line))?;
        Ok(output)
    }

    /// Statements for a resource printed at template level
    pub fn compile_nodes(&self, env: &mut CompileEnvironment, line: u32) -> Result<Vec<Node>> {
        if !self.is_template() {
            return Ok(vec![Node::Text {
                text: self.data.content.clone(),
            }]);
        }
        self.include(env, line, |env, source, delimiters| {
            driver::compile_statements(env, source, delimiters, 1, TEMPLATE_TAGS)
        })
    }

    /// Expression yielding the rendered resource
    pub fn compile(&self, env: &mut CompileEnvironment, line: u32) -> Result<Expr> {
        if !self.is_template() {
            return Ok(Expr::text(self.data.content.clone()));
        }
        self.include(env, line, |env, source, delimiters| {
            driver::compile_concat(env, source, delimiters, 1, TEMPLATE_TAGS)
        })
    }

    pub fn evaluate(&self, env: &mut CompileEnvironment, line: u32) -> Result<Value> {
        if !self.is_template() {
            return Ok(Value::from(self.data.content.as_str()));
        }
        self.include(env, line, |env, source, delimiters| {
            driver::evaluate_source(env, source, delimiters, 1, TEMPLATE_TAGS)
        })
        .map(Value::from)
    }
}

fn load_error(error: ResourceError, label: &str, line: u32) -> TemplateError {
    match error {
        ResourceError::NotFound { .. } => {
            TemplateError::existence(line, format!("resource {} not found", label))
        }
        other => TemplateError::existence(line, format!("resource {}: {}", label, other)),
    }
}

/// `@dsn[path]`; the content is loaded as soon as the reference is mapped
pub fn recognize(
    cursor: &mut TagCursor,
    env: &mut CompileEnvironment,
) -> Result<Option<Expression>> {
    if !cursor.at("@") {
        return Ok(None);
    }
    let start = cursor.position();
    let line = cursor.current_line();
    cursor.advance();

    let dsn = match cursor.current() {
        Some(token) if cursor.glued() && token.is_identifier() => token.text.to_ascii_lowercase(),
        _ => {
            cursor.restore(start);
            return Ok(None);
        }
    };
    cursor.advance();

    if !cursor.glued_at("[") {
        return Err(TemplateError::parsing(
            line,
            format!("missing resource path for @{}", dsn),
        ));
    }
    cursor.advance();
    let path = cursor
        .take_raw_until("]")
        .ok_or_else(|| TemplateError::parsing(line, "unterminated resource path"))?
        .trim()
        .to_string();
    cursor.expect("]")?;
    if path.is_empty() {
        return Err(TemplateError::parsing(line, "empty resource path"));
    }

    let label = format!("{}[{}]", dsn, path);
    let handler = env.resource_handler(&dsn, line)?;
    let data = handler
        .load(&path)
        .map_err(|error| load_error(error, &label, line))?;

    Ok(Some(Expression::new(
        line,
        ExprKind::Resource(Resource {
            dsn,
            path,
            data,
            params: IndexMap::new(),
        }),
    )))
}
