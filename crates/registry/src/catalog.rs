//! Filesystem model catalog.
//!
//! Each model occupies one subdirectory of the catalog root named after its
//! id, holding a `manifest.yaml` (or `.yml`/`.json`) and a `logic.calc`
//! payload. Loading re-reads the filesystem every time; the orchestrator
//! calls once per executed step and authors expect edits to take effect
//! without a restart.

use std::path::{Path, PathBuf};

use tally_engine::ModelLoader;
use tally_types::{EngineError, LoadedModel, ModelManifest};
use tracing::debug;

/// Manifest file names probed in order.
const MANIFEST_NAMES: [&str; 3] = ["manifest.yaml", "manifest.yml", "manifest.json"];

/// File name of the logic payload inside a model directory.
pub const LOGIC_FILE: &str = "logic.calc";

/// Loads model bundles from a directory tree.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    root: PathBuf,
}

impl ModelCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ModelCatalog { root: root.into() }
    }

    /// Lists the ids of every model directory under the root, sorted.
    ///
    /// A missing root is an empty catalog, not an error.
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        ids.sort();
        ids
    }

    fn manifest_path(&self, dir: &Path) -> Option<PathBuf> {
        MANIFEST_NAMES.iter().map(|name| dir.join(name)).find(|path| path.is_file())
    }
}

impl ModelLoader for ModelCatalog {
    fn load(&self, model_id: &str) -> Result<LoadedModel, EngineError> {
        let dir = self.root.join(model_id);
        if !dir.is_dir() {
            return Err(EngineError::ModelNotFound(model_id.to_string()));
        }

        let manifest_path = self.manifest_path(&dir).ok_or_else(|| EngineError::MalformedModel {
            id: model_id.to_string(),
            detail: "no manifest.yaml, manifest.yml, or manifest.json in model directory".into(),
        })?;
        let manifest_text = std::fs::read_to_string(&manifest_path).map_err(|error| EngineError::MalformedModel {
            id: model_id.to_string(),
            detail: format!("cannot read {}: {error}", manifest_path.display()),
        })?;
        let manifest: ModelManifest = parse_manifest(&manifest_path, &manifest_text).map_err(|detail| EngineError::MalformedModel {
            id: model_id.to_string(),
            detail,
        })?;
        if manifest.id != model_id {
            return Err(EngineError::MalformedModel {
                id: model_id.to_string(),
                detail: format!("manifest declares id '{}' but lives in directory '{model_id}'", manifest.id),
            });
        }

        let logic_path = dir.join(LOGIC_FILE);
        let logic = std::fs::read_to_string(&logic_path).map_err(|error| EngineError::MalformedModel {
            id: model_id.to_string(),
            detail: format!("cannot read {}: {error}", logic_path.display()),
        })?;
        if logic.trim().is_empty() {
            return Err(EngineError::MalformedModel {
                id: model_id.to_string(),
                detail: format!("{LOGIC_FILE} is empty"),
            });
        }

        debug!(model = %model_id, manifest = %manifest_path.display(), "loaded model bundle");
        Ok(LoadedModel { manifest, logic })
    }
}

fn parse_manifest(path: &Path, text: &str) -> Result<ModelManifest, String> {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    if is_json {
        serde_json::from_str(text).map_err(|error| format!("invalid manifest JSON: {error}"))
    } else {
        serde_yaml::from_str(text).map_err(|error| format!("invalid manifest YAML: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_model(root: &Path, id: &str, manifest: &str, logic: &str) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).expect("create model dir");
        std::fs::write(dir.join("manifest.yaml"), manifest).expect("write manifest");
        std::fs::write(dir.join(LOGIC_FILE), logic).expect("write logic");
    }

    #[test]
    fn loads_a_yaml_model_bundle() {
        let root = TempDir::new().expect("tempdir");
        write_model(
            root.path(),
            "double",
            "id: double\ninputs:\n  value:\n    type: number\n",
            "compute { return { \"doubled\": inputs.value * 2 } }",
        );

        let catalog = ModelCatalog::new(root.path());
        let model = catalog.load("double").expect("load");
        assert_eq!(model.manifest.id, "double");
        assert!(model.logic.contains("compute"));
        assert_eq!(catalog.list(), vec!["double".to_string()]);
    }

    #[test]
    fn missing_directory_is_not_found_but_missing_files_are_malformed() {
        let root = TempDir::new().expect("tempdir");
        let catalog = ModelCatalog::new(root.path());
        assert!(matches!(catalog.load("ghost"), Err(EngineError::ModelNotFound(id)) if id == "ghost"));

        std::fs::create_dir(root.path().join("empty")).expect("create dir");
        let error = catalog.load("empty").expect_err("no manifest");
        assert!(matches!(&error, EngineError::MalformedModel { id, .. } if id == "empty"));
        assert!(error.to_string().contains("no manifest"));
    }

    #[test]
    fn manifest_id_must_match_the_directory_name() {
        let root = TempDir::new().expect("tempdir");
        write_model(root.path(), "double", "id: triple\n", "compute { return {} }");

        let catalog = ModelCatalog::new(root.path());
        let error = catalog.load("double").expect_err("id mismatch");
        assert!(error.to_string().contains("'triple'"));
    }

    #[test]
    fn unparsable_manifest_and_blank_logic_are_malformed() {
        let root = TempDir::new().expect("tempdir");
        write_model(root.path(), "broken", "id: [unclosed\n", "compute { return {} }");
        let catalog = ModelCatalog::new(root.path());
        let error = catalog.load("broken").expect_err("bad yaml");
        assert!(error.to_string().contains("invalid manifest YAML"));

        write_model(root.path(), "hollow", "id: hollow\n", "   \n");
        let error = catalog.load("hollow").expect_err("blank logic");
        assert!(error.to_string().contains("logic.calc is empty"));
    }

    #[test]
    fn json_manifests_parse_too() {
        let root = TempDir::new().expect("tempdir");
        let dir = root.path().join("sum");
        std::fs::create_dir_all(&dir).expect("create dir");
        std::fs::write(
            dir.join("manifest.json"),
            r#"{"id": "sum", "inputs": {"a": {"type": "number"}}}"#,
        )
        .expect("write manifest");
        std::fs::write(dir.join(LOGIC_FILE), "compute { return { \"s\": inputs.a } }").expect("write logic");

        let catalog = ModelCatalog::new(root.path());
        let model = catalog.load("sum").expect("load");
        assert!(model.manifest.inputs.contains_key("a"));
    }
}
