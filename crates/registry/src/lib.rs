//! Registry crate for locating playbook documents and model bundles.
//!
//! Playbooks and models live as plain files under two configurable roots.
//! The [`ModelCatalog`] implements the engine's `ModelLoader` seam, the
//! [`PlaybookLibrary`] resolves playbook documents by id, and the
//! [`ManifestValidator`] checks resolved step inputs against a model's
//! declared schema.

pub mod catalog;
pub mod config;
pub mod playbooks;
pub mod validate;

pub use catalog::ModelCatalog;
pub use config::RegistryConfig;
pub use playbooks::PlaybookLibrary;
pub use validate::ManifestValidator;
