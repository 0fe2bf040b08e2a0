// ABOUTME: Template engine front door running the compile/cache pipeline for named templates
// ABOUTME: Holds configuration, initial variables, plugin data and the modifier and provider registries

pub mod cache;
pub mod config;
pub mod error;
pub mod report;

pub use cache::{CachedOutput, TemplatePaths};
pub use config::{CacheMode, DebugMode, Delimiters, DevMode, EngineConfig, Roots};
pub use error::{EngineError, Result};
pub use report::ErrorReporter;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::compiler::process::PID_ROOT;
use crate::compiler::CompileEnvironment;
use crate::plugins::{Modifier, ModifierRegistry};
use crate::resource::{ProviderRegistry, ResourceProvider};
use crate::template::{Artifact, Executor, PluginStore, SharedValue, Value, Variables};

static VARIABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z_][a-z0-9_]*$").expect("valid variable name pattern"));

pub struct Engine {
    config: EngineConfig,
    variables: Variables,
    plugin_data: PluginStore,
    modifiers: ModifierRegistry,
    providers: ProviderRegistry,
    reporter: ErrorReporter,
}

impl Engine {
    pub fn new(mut config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let reporter = ErrorReporter::new(&config);
        Ok(Self {
            config,
            variables: Variables::new(),
            plugin_data: PluginStore::new(),
            modifiers: ModifierRegistry::new(),
            providers: ProviderRegistry::new(),
            reporter,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    fn check_var_name(&self, name: &str) -> Result<()> {
        if !VARIABLE_NAME.is_match(name) {
            return Err(EngineError::InvalidVariableName {
                name: name.to_string(),
            });
        }
        if self.config.is_system_var(name) {
            return Err(EngineError::ReservedVariableName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Store a copy of a value as a template variable
    pub fn create_var(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.check_var_name(name)?;
        self.variables.set(name, value);
        Ok(())
    }

    /// Expose a live shared value; templates see its contents at render time
    pub fn register_var(&mut self, name: &str, value: SharedValue) -> Result<()> {
        self.check_var_name(name)?;
        self.variables.share(name, value);
        Ok(())
    }

    /// Set the cache mode from its marker: -1 forever, 0 off, positive seconds
    pub fn set_cache(&mut self, marker: i64) -> Result<()> {
        self.config.cache =
            CacheMode::from_marker(marker).ok_or(EngineError::InvalidCacheMode { value: marker })?;
        Ok(())
    }

    pub fn set_force_compile(&mut self, force: bool) {
        self.config.force_compile = force;
    }

    /// Seed plugin-instance storage of the root template
    pub fn set_plugin_data(&mut self, name: &str, value: impl Into<Value>) {
        self.plugin_data.set(PID_ROOT, name, value);
    }

    pub fn register_modifier(&mut self, modifier: Box<dyn Modifier>) {
        debug!("Registering modifier plugin {}", modifier.name());
        self.modifiers.register(modifier);
    }

    /// Register a provider kind and associate a resource dsn with it
    pub fn register_provider<F>(&mut self, dsn: &str, kind: &str, factory: F) -> Result<()>
    where
        F: Fn(&EngineConfig) -> Box<dyn ResourceProvider> + 'static,
    {
        self.config.set_resource_assoc(dsn, kind)?;
        self.providers.register(kind, factory);
        Ok(())
    }

    /// Remove the cached output of one template, reporting whether it existed
    pub fn clear_cache(&self, template: &str) -> Result<bool> {
        let paths = TemplatePaths::for_template(&self.config, template)?;
        let removed = cache::remove(&paths.cache)?;
        debug!("Clearing cache for {}: removed={}", template, removed);
        Ok(removed)
    }

    /// Remove every cached output, returning how many files were deleted
    pub fn clear_all_cache(&self) -> Result<usize> {
        let root = self.config.roots.cache_dir();
        if !root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        info!("Cleared {} cached outputs from {:?}", removed, root);
        Ok(removed)
    }

    /// Compile a template from source and store its artifact
    pub fn compile(&self, template: &str) -> Result<Artifact> {
        let paths = TemplatePaths::for_template(&self.config, template)?;
        self.compile_paths(template, &paths)
    }

    fn compile_paths(&self, template: &str, paths: &TemplatePaths) -> Result<Artifact> {
        if !paths.source.is_file() {
            return Err(EngineError::TemplateNotFound {
                template: template.to_string(),
                path: paths.source.clone(),
            });
        }
        let source = fs::read_to_string(&paths.source)?;

        let mut env =
            CompileEnvironment::new(&self.config, &self.variables, &self.modifiers, &self.providers);
        let artifact = match crate::compiler::compile(&mut env, template, &source) {
            Ok(artifact) => artifact,
            Err(err) => {
                self.reporter.report(template, &err)?;
                return Err(err.into());
            }
        };

        cache::write_artifact(&paths.artifact, &artifact)?;
        info!("Compiled {} to {:?}", template, paths.artifact);
        Ok(artifact)
    }

    /// Load the artifact, recompiling when forced, missing, stale or built for another cache mode
    fn artifact(&self, template: &str, paths: &TemplatePaths, force: bool) -> Result<Artifact> {
        if force || self.config.force_compile || cache::is_stale(paths) {
            return self.compile_paths(template, paths);
        }

        let artifact = cache::read_artifact(&paths.artifact)?;
        if artifact.cache_mode != self.config.cache.marker() {
            debug!(
                "Artifact for {} was compiled with cache mode {}, recompiling",
                template, artifact.cache_mode
            );
            return self.compile_paths(template, paths);
        }
        debug!("Using compiled artifact {:?}", paths.artifact);
        Ok(artifact)
    }

    fn execute(&self, artifact: &Artifact, paths: &TemplatePaths) -> Result<(String, CacheMode)> {
        let mut executor = Executor::new(&self.variables, &self.plugin_data, &self.modifiers);
        let (output, marker) = executor.execute(artifact)?;
        let mode = CacheMode::from_marker(marker).ok_or_else(|| EngineError::InvalidArtifact {
            path: paths.artifact.clone(),
            reason: format!("unrecognized cache mode marker {}", marker),
        })?;
        Ok((output, mode))
    }

    /// Render a template through the compile and cache pipeline
    pub fn fetch(&self, template: &str) -> Result<String> {
        let paths = TemplatePaths::for_template(&self.config, template)?;
        let mode = self.config.cache;

        if !mode.is_enabled() {
            let artifact = self.artifact(template, &paths, false)?;
            return self.execute(&artifact, &paths).map(|(output, _)| output);
        }

        let mut force = false;
        if let Some(cached) = cache::read_cached(&paths.cache)? {
            if cached.cache_mode != mode.marker() {
                debug!("Cache mode of {} changed, discarding cached output", template);
                cache::remove(&paths.cache)?;
                force = true;
            } else {
                match mode {
                    CacheMode::Ttl(seconds) => {
                        let age = Utc::now().signed_duration_since(cached.created_at);
                        if age.num_seconds() <= i64::try_from(seconds).unwrap_or(i64::MAX) {
                            debug!("Cache hit for {}", template);
                            return Ok(cached.output);
                        }
                        debug!("Cached output of {} expired", template);
                    }
                    _ => {
                        debug!("Cache hit for {}", template);
                        return Ok(cached.output);
                    }
                }
            }
        } else {
            debug!("Cache miss for {}", template);
        }

        let artifact = self.artifact(template, &paths, force)?;
        let (output, artifact_mode) = self.execute(&artifact, &paths)?;
        if artifact_mode != mode {
            warn!(
                "Artifact for {} reports cache mode {} instead of {}",
                template, artifact_mode, mode
            );
        }

        cache::write_cached(
            &paths.cache,
            &CachedOutput {
                cache_mode: artifact_mode.marker(),
                created_at: Utc::now(),
                output: output.clone(),
            },
        )?;
        Ok(output)
    }

    /// Render a template and write it to stdout
    pub fn display(&self, template: &str) -> Result<()> {
        let output = self.fetch(template)?;
        print!("{}", output);
        Ok(())
    }
}
