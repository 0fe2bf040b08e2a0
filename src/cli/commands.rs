// ABOUTME: Command implementations for the tagc CLI
// ABOUTME: Handles the render, compile, check and clear-cache commands

use anyhow::{Context, Result};
use glob_match::glob_match;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::args::Args;
use super::config::Config;
use crate::engine::{CacheMode, Engine};
use crate::template::Value;

/// Build an engine seeded with the configured variables
pub fn build_engine(config: &Config) -> Result<Engine> {
    let mut engine = Engine::new(config.engine.clone())?;
    for (name, value) in &config.variables {
        engine
            .create_var(name, Value::from(value.clone()))
            .with_context(|| format!("Invalid variable '{}'", name))?;
    }
    Ok(engine)
}

/// Read variables from a YAML or JSON file holding a mapping
pub fn load_variables_file(path: &Path) -> Result<IndexMap<String, serde_json::Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read variables file {}", path.display()))?;
    let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
    let variables = if is_json {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };
    Ok(variables)
}

/// Render a template to stdout
pub fn render_template(
    template: String,
    vars: Vec<String>,
    vars_file: Option<PathBuf>,
    cache: Option<String>,
    force: bool,
    config: &Config,
) -> Result<()> {
    let mut config = config.clone();

    if let Some(path) = vars_file {
        let variables = load_variables_file(&path)?;
        info!("Loaded {} variables from {}", variables.len(), path.display());
        config.merge_variables(variables);
    }

    let overrides = Args::parse_variables(&vars)?
        .into_iter()
        .map(|(key, value)| (key, serde_json::Value::String(value)))
        .collect();
    config.merge_variables(overrides);

    if let Some(cache) = cache {
        config.engine.cache = cache
            .parse::<CacheMode>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }

    let mut engine = build_engine(&config)?;
    if force {
        engine.set_force_compile(true);
    }

    engine
        .display(&template)
        .with_context(|| format!("Failed to render {}", template))?;
    Ok(())
}

/// Compile a template, optionally printing the artifact
pub fn compile_template(template: String, emit: bool, config: &Config) -> Result<()> {
    let engine = build_engine(config)?;
    let artifact = engine
        .compile(&template)
        .with_context(|| format!("Failed to compile {}", template))?;

    if emit {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
    } else {
        println!("✓ Compiled {} ({} nodes)", template, artifact.body.len());
    }
    Ok(())
}

/// Compile every template under the template root that matches the pattern
pub fn check_templates(pattern: String, config: &Config) -> Result<()> {
    let engine = build_engine(config)?;
    let root = config.engine.roots.templates_dir();
    info!("Checking templates in {} matching {}", root.display(), pattern);

    let mut templates: Vec<String> = WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(&root)
                .ok()
                .map(|relative| relative.to_string_lossy().replace('\\', "/"))
        })
        .filter(|relative| glob_match(&pattern, relative))
        .collect();
    templates.sort();

    let mut failures = 0;
    for template in &templates {
        match engine.compile(template) {
            Ok(_) => println!("✓ {}", template),
            Err(e) => {
                failures += 1;
                warn!("Template {} failed to compile", template);
                println!("✗ {}: {}", template, e);
            }
        }
    }

    println!(
        "Checked {} templates, {} failed",
        templates.len(),
        failures
    );
    if failures > 0 {
        return Err(anyhow::anyhow!("{} templates failed to compile", failures));
    }
    Ok(())
}

/// Remove cached output
pub fn clear_cache(template: Option<String>, config: &Config) -> Result<()> {
    let engine = build_engine(config)?;
    match template {
        Some(template) => {
            if engine.clear_cache(&template)? {
                println!("Cleared cached output of {}", template);
            } else {
                println!("No cached output for {}", template);
            }
        }
        None => {
            let removed = engine.clear_all_cache()?;
            println!("Cleared {} cached outputs", removed);
        }
    }
    Ok(())
}
