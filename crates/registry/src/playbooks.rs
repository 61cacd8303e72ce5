//! Playbook document resolution.
//!
//! A playbook library is a flat directory of documents named `<id>.yaml`
//! (or `.yml`/`.json`). Resolution parses the document and applies the
//! structural checks every runnable playbook must pass before the engine
//! sees it.

use std::path::{Path, PathBuf};

use tally_types::{EngineError, PlaybookSpec};
use tracing::debug;

/// Document extensions probed in order.
const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Resolves playbook documents by id from a directory.
#[derive(Debug, Clone)]
pub struct PlaybookLibrary {
    root: PathBuf,
}

impl PlaybookLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PlaybookLibrary { root: root.into() }
    }

    /// Lists the ids of every document under the root, sorted.
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| EXTENSIONS.contains(&ext))
            })
            .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Loads and structurally validates the playbook named `playbook_id`.
    pub fn resolve(&self, playbook_id: &str) -> Result<PlaybookSpec, EngineError> {
        let path = EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{playbook_id}.{ext}")))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| EngineError::PlaybookNotFound(playbook_id.to_string()))?;

        let text = std::fs::read_to_string(&path).map_err(|error| EngineError::MalformedPlaybook {
            id: playbook_id.to_string(),
            detail: format!("cannot read {}: {error}", path.display()),
        })?;
        let spec = parse_playbook(&path, &text).map_err(|detail| EngineError::MalformedPlaybook {
            id: playbook_id.to_string(),
            detail,
        })?;
        check_structure(playbook_id, &spec)?;

        debug!(playbook = %playbook_id, path = %path.display(), steps = spec.steps.len(), "resolved playbook");
        Ok(spec)
    }
}

fn parse_playbook(path: &Path, text: &str) -> Result<PlaybookSpec, String> {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    if is_json {
        serde_json::from_str(text).map_err(|error| format!("invalid playbook JSON: {error}"))
    } else {
        serde_yaml::from_str(text).map_err(|error| format!("invalid playbook YAML: {error}"))
    }
}

/// Structural checks beyond what deserialization enforces.
fn check_structure(playbook_id: &str, spec: &PlaybookSpec) -> Result<(), EngineError> {
    let malformed = |detail: String| EngineError::MalformedPlaybook {
        id: playbook_id.to_string(),
        detail,
    };

    if spec.id != playbook_id {
        return Err(malformed(format!(
            "document declares id '{}' but was resolved as '{playbook_id}'",
            spec.id
        )));
    }
    if spec.version.trim().is_empty() {
        return Err(malformed("missing version".into()));
    }
    if spec.steps.is_empty() {
        return Err(malformed("playbook declares no steps".into()));
    }

    let mut seen = std::collections::HashSet::new();
    for step in &spec.steps {
        if step.id.trim().is_empty() {
            return Err(malformed("step with empty id".into()));
        }
        if step.model.trim().is_empty() {
            return Err(malformed(format!("step '{}' names no model", step.id)));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(malformed(format!("duplicate step id '{}'", step.id)));
        }
    }
    Ok(())
}
