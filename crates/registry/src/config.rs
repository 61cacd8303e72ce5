//! Registry root resolution.

use std::{env, path::PathBuf};

use crate::{catalog::ModelCatalog, playbooks::PlaybookLibrary};

/// Environment variable overriding the models root directory.
pub const MODELS_DIR_ENV: &str = "TALLY_MODELS_DIR";

/// Environment variable overriding the playbooks root directory.
pub const PLAYBOOKS_DIR_ENV: &str = "TALLY_PLAYBOOKS_DIR";

/// Filesystem roots the registry reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Directory containing one subdirectory per model.
    pub models_root: PathBuf,
    /// Directory containing one document per playbook.
    pub playbooks_root: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            models_root: PathBuf::from("models"),
            playbooks_root: PathBuf::from("playbooks"),
        }
    }
}

impl RegistryConfig {
    /// Resolves roots from the environment, falling back to `./models` and
    /// `./playbooks`.
    pub fn from_env() -> Self {
        RegistryConfig {
            models_root: root_from(env::var(MODELS_DIR_ENV).ok().as_deref(), "models"),
            playbooks_root: root_from(env::var(PLAYBOOKS_DIR_ENV).ok().as_deref(), "playbooks"),
        }
    }

    /// Model catalog rooted at the configured models directory.
    pub fn model_catalog(&self) -> ModelCatalog {
        ModelCatalog::new(&self.models_root)
    }

    /// Playbook library rooted at the configured playbooks directory.
    pub fn playbook_library(&self) -> PlaybookLibrary {
        PlaybookLibrary::new(&self.playbooks_root)
    }
}

/// An absent or blank override keeps the fallback root.
fn root_from(raw: Option<&str>, fallback: &str) -> PathBuf {
    match raw {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_relative_roots() {
        let config = RegistryConfig::default();
        assert_eq!(config.models_root, PathBuf::from("models"));
        assert_eq!(config.playbooks_root, PathBuf::from("playbooks"));
    }

    #[test]
    fn root_overrides_are_honored() {
        assert_eq!(root_from(Some("/srv/tally/models"), "models"), PathBuf::from("/srv/tally/models"));
        assert_eq!(root_from(Some("relative/dir"), "playbooks"), PathBuf::from("relative/dir"));
    }

    #[test]
    fn absent_or_blank_overrides_keep_the_fallback() {
        assert_eq!(root_from(None, "models"), PathBuf::from("models"));
        assert_eq!(root_from(Some(""), "models"), PathBuf::from("models"));
        assert_eq!(root_from(Some("   "), "playbooks"), PathBuf::from("playbooks"));
    }
}
