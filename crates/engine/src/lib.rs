//! # Tally Engine
//!
//! Core execution engine for financial playbooks. A playbook is an ordered
//! list of steps, each invoking a declarative model whose logic payload runs
//! inside an isolated, capability-restricted sandbox. The engine owns:
//!
//! - the [`sandbox`] that interprets logic payloads with no host escape
//!   hatches and a per-phase wall-clock budget,
//! - the hand-written [`expr`] arithmetic and [`condition`] comparison
//!   grammars evaluated over intake fields,
//! - the [`resolve`] layer that turns step input bindings (literals, field
//!   references, derived expressions) into concrete values, and
//! - the [`orchestrator`] that drives steps sequentially and assembles the
//!   run report.
//!
//! Model storage and manifest validation live behind the [`ModelLoader`] and
//! [`InputValidator`] traits so the engine stays independent of where models
//! come from.

pub mod condition;
pub mod config;
pub mod expr;
pub mod orchestrator;
pub mod resolve;
pub mod sandbox;

pub use condition::evaluate_condition;
pub use config::EngineConfig;
pub use expr::evaluate_expression;
pub use orchestrator::{InputValidator, ModelLoader, PlaybookRunner};
pub use resolve::resolve_step_inputs;
pub use sandbox::Sandbox;
