// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Lays out temporary template projects and builds engines over them

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use tagc::engine::{CacheMode, DebugMode, Engine, EngineConfig};

pub struct TestProject {
    pub temp_dir: TempDir,
    config: EngineConfig,
}

impl TestProject {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = EngineConfig::for_project(temp_dir.path());
        config.debug = DebugMode::Raise;
        Self { temp_dir, config }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn with_strict_scope(mut self, strict: bool) -> Self {
        self.config.strict_var_scope = strict;
        self
    }

    pub fn with_force_compile(mut self, force: bool) -> Self {
        self.config.force_compile = force;
        self
    }

    pub fn configure(mut self, apply: impl FnOnce(&mut EngineConfig)) -> Self {
        apply(&mut self.config);
        self
    }

    /// Write a template below the template root
    pub fn template(self, name: &str, source: &str) -> Self {
        write_file(&self.config.roots.templates_dir().join(name), source);
        self
    }

    /// Write a file below the sub-template root used by `@file[...]`
    pub fn sub_template(self, name: &str, source: &str) -> Self {
        write_file(&self.config.roots.sub_templates_dir().join(name), source);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.config.clone()).expect("Failed to build engine")
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.config
            .roots
            .compiled_dir()
            .join(name.replace(".tpl", ".json"))
    }

    pub fn cache_path(&self, name: &str) -> PathBuf {
        self.config
            .roots
            .cache_dir()
            .join(name.replace('/', "%").replace(".tpl", ".json"))
    }

    /// Write a config file pointing at this project
    pub fn write_config(&self, extra: &str) -> PathBuf {
        let path = self.path().join("tagc.yaml");
        let contents = format!(
            "engine:\n  debug: raise\n  roots:\n    project: {}\n{}",
            self.path().display(),
            extra
        );
        fs::write(&path, contents).expect("Failed to write config");
        path
    }
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create directory");
    }
    fs::write(path, contents).expect("Failed to write file");
}

/// Render one template source with the given variables
pub fn render(source: &str, vars: &[(&str, tagc::Value)]) -> Result<String, tagc::EngineError> {
    let project = TestProject::new().template("test.tpl", source);
    let mut engine = project.engine();
    for (name, value) in vars {
        engine.create_var(name, value.clone())?;
    }
    engine.fetch("test.tpl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_layout() {
        let project = TestProject::new()
            .template("index.tpl", "hi")
            .sub_template("part.tpl", "part");
        assert!(project.path().join("tpl/index.tpl").is_file());
        assert!(project.path().join("stpl/part.tpl").is_file());
        assert_eq!(
            project.cache_path("blog/post.tpl"),
            project.path().join("~cache/blog%post.json")
        );
    }
}
