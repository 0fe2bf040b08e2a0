// ABOUTME: File-system resource provider reading sub-templates below a root directory
// ABOUTME: Renders .tpl files as templates, passes other files through and rejects escaping paths

use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::{RenderMode, ResourceData, ResourceError, ResourceProvider, Result};

#[derive(Debug, Clone)]
pub struct FileProvider {
    root: PathBuf,
}

impl FileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim());
        if relative.as_os_str().is_empty() {
            return Err(ResourceError::InvalidPath {
                path: path.to_string(),
                reason: "empty path".to_string(),
            });
        }

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(ResourceError::InvalidPath {
                        path: path.to_string(),
                        reason: "path escapes the resource root".to_string(),
                    })
                }
            }
        }

        Ok(self.root.join(relative))
    }
}

impl ResourceProvider for FileProvider {
    fn load(&self, path: &str) -> Result<ResourceData> {
        let full_path = self.resolve(path)?;
        if !full_path.is_file() {
            return Err(ResourceError::NotFound {
                path: path.to_string(),
            });
        }

        debug!("Loading file resource: {:?}", full_path);
        let content = std::fs::read_to_string(&full_path).map_err(|source| ResourceError::Io {
            path: full_path.clone(),
            source,
        })?;

        let render_mode = match full_path.extension().and_then(|ext| ext.to_str()) {
            Some("tpl") => RenderMode::Template,
            _ => RenderMode::PassThrough,
        };

        Ok(ResourceData {
            content,
            render_mode,
            delimiters: None,
        })
    }
}
