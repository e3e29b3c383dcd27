//! Script directory definition source.

use std::path::{Path, PathBuf};

use familiar_api::{DefinitionDocument, DefinitionSource, SourceError};
use tracing::{info, warn};

/// Script written into an empty scripts directory.
pub const DEFAULT_SCRIPT: &str = include_str!("../scripts/default.lua");
pub const DEFAULT_SCRIPT_NAME: &str = "default.lua";

/// Reads every `*.lua` file of a directory, in case-insensitive name order.
#[derive(Debug, Clone)]
pub struct ScriptDirectory {
    root: PathBuf,
    write_default: bool,
}

impl ScriptDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_default: true,
        }
    }

    /// Whether a missing directory or default script is created on read.
    pub fn write_default(mut self, enabled: bool) -> Self {
        self.write_default = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory and `default.lua` if either is missing.
    pub fn ensure_default(&self) -> Result<(), SourceError> {
        let io = |path: &Path| {
            let path = path.display().to_string();
            move |source| SourceError::Io { path, source }
        };

        std::fs::create_dir_all(&self.root).map_err(io(&self.root))?;
        let default = self.root.join(DEFAULT_SCRIPT_NAME);
        if !default.exists() {
            std::fs::write(&default, DEFAULT_SCRIPT).map_err(io(&default))?;
            info!("Wrote default script to {}", default.display());
        }
        Ok(())
    }

    fn script_paths(&self) -> Result<Vec<PathBuf>, SourceError> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| SourceError::Io {
            path: self.root.display().to_string(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .map(|e| e.eq_ignore_ascii_case("lua"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort_by_key(|path| file_name(path).to_lowercase());
        Ok(paths)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

impl DefinitionSource for ScriptDirectory {
    fn describe(&self) -> String {
        format!("scripts in {}", self.root.display())
    }

    fn documents(&self) -> Result<Vec<DefinitionDocument>, SourceError> {
        if self.write_default {
            self.ensure_default()?;
        }

        let mut documents = Vec::new();
        for path in self.script_paths()? {
            match std::fs::read_to_string(&path) {
                Ok(contents) => documents.push(DefinitionDocument::new(file_name(&path), contents)),
                Err(e) => warn!("Failed to read {}: {e}", path.display()),
            }
        }
        Ok(documents)
    }
}
