// ABOUTME: Compiled-artifact and cached-output file handling for the compile/cache pipeline
// ABOUTME: Computes storage paths, checks staleness and writes files through temporary renames

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::config::EngineConfig;
use super::error::{EngineError, Result};
use crate::template::Artifact;

const SOURCE_EXTENSION: &str = ".tpl";
const STORED_EXTENSION: &str = ".json";

/// Rendered output stored for a template while caching is enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedOutput {
    pub cache_mode: i64,
    pub created_at: DateTime<Utc>,
    pub output: String,
}

/// Files belonging to one template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePaths {
    pub source: PathBuf,
    pub artifact: PathBuf,
    pub cache: PathBuf,
}

fn swap_extension(name: &str) -> String {
    match name.strip_suffix(SOURCE_EXTENSION) {
        Some(stem) => format!("{}{}", stem, STORED_EXTENSION),
        None => format!("{}{}", name, STORED_EXTENSION),
    }
}

fn check_identifier(template: &str) -> Result<&Path> {
    let path = Path::new(template);
    let escapes = template.trim().is_empty()
        || path
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(EngineError::TemplateNotFound {
            template: template.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(path)
}

impl TemplatePaths {
    pub fn for_template(config: &EngineConfig, template: &str) -> Result<Self> {
        let relative = check_identifier(template)?;

        let mut compiled_root = config.roots.compiled_dir();
        let mut cache_root = config.roots.cache_dir();
        if let Some(language) = &config.language {
            compiled_root.push(language);
            cache_root.push(language);
        }

        let flattened = template.replace(['/', '\\'], "%");
        Ok(Self {
            source: config.roots.templates_dir().join(relative),
            artifact: compiled_root.join(swap_extension(template)),
            cache: cache_root.join(swap_extension(&flattened)),
        })
    }
}

fn modified(path: &Path) -> Option<std::time::SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Whether the compiled artifact is missing or older than its source
pub fn is_stale(paths: &TemplatePaths) -> bool {
    match (modified(&paths.source), modified(&paths.artifact)) {
        (Some(source), Some(artifact)) => artifact < source,
        _ => true,
    }
}

/// Write a file by renaming a uniquely named temporary file into place
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|source| EngineError::NotWritable {
        path: parent.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&temp, contents).map_err(|source| EngineError::NotWritable {
        path: temp.clone(),
        source,
    })?;
    if let Err(source) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(EngineError::NotWritable {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!("Wrote {:?}", path);
    Ok(())
}

pub fn write_artifact(path: &Path, artifact: &Artifact) -> Result<()> {
    let json = serde_json::to_string_pretty(artifact)?;
    write_atomic(path, &json)
}

pub fn read_artifact(path: &Path) -> Result<Artifact> {
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|error| EngineError::InvalidArtifact {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

pub fn write_cached(path: &Path, cached: &CachedOutput) -> Result<()> {
    let json = serde_json::to_string(cached)?;
    write_atomic(path, &json)
}

/// Read a cached output, `None` when no cache file exists
pub fn read_cached(path: &Path) -> Result<Option<CachedOutput>> {
    if !path.is_file() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|error| EngineError::InvalidCacheFile {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })
}

/// Remove a file, reporting whether it existed
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_swap_and_flatten() {
        let config = EngineConfig::for_project("/site");
        let paths = TemplatePaths::for_template(&config, "blog/post.tpl").unwrap();
        assert_eq!(paths.source, PathBuf::from("/site/tpl/blog/post.tpl"));
        assert_eq!(paths.artifact, PathBuf::from("/site/~tpl_c/blog/post.json"));
        assert_eq!(paths.cache, PathBuf::from("/site/~cache/blog%post.json"));

        let plain = TemplatePaths::for_template(&config, "feed.xml").unwrap();
        assert_eq!(plain.artifact, PathBuf::from("/site/~tpl_c/feed.xml.json"));
    }

    #[test]
    fn test_language_subdirectory() {
        let mut config = EngineConfig::for_project("/site");
        config.language = Some("de".to_string());
        let paths = TemplatePaths::for_template(&config, "index.tpl").unwrap();
        assert_eq!(paths.artifact, PathBuf::from("/site/~tpl_c/de/index.json"));
        assert_eq!(paths.cache, PathBuf::from("/site/~cache/de/index.json"));
    }

    #[test]
    fn test_escaping_identifier_rejected() {
        let config = EngineConfig::for_project("/site");
        assert!(TemplatePaths::for_template(&config, "../secret.tpl").is_err());
        assert!(TemplatePaths::for_template(&config, "/etc/passwd").is_err());
        assert!(TemplatePaths::for_template(&config, " ").is_err());
    }

    #[test]
    fn test_atomic_write_and_cached_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/page.json");
        let cached = CachedOutput {
            cache_mode: -1,
            created_at: Utc::now(),
            output: "hello".to_string(),
        };
        write_cached(&path, &cached).unwrap();
        assert_eq!(read_cached(&path).unwrap(), Some(cached));

        let leftovers = fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(leftovers, 1);

        assert!(remove(&path).unwrap());
        assert!(!remove(&path).unwrap());
        assert_eq!(read_cached(&path).unwrap(), None);
    }

    #[test]
    fn test_staleness() {
        let dir = TempDir::new().unwrap();
        let paths = TemplatePaths {
            source: dir.path().join("a.tpl"),
            artifact: dir.path().join("a.json"),
            cache: dir.path().join("cache.json"),
        };
        fs::write(&paths.source, "x").unwrap();
        assert!(is_stale(&paths));
        fs::write(&paths.artifact, "{}").unwrap();
        assert!(!is_stale(&paths));
    }
}
