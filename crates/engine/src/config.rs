//! Engine configuration.

use std::time::Duration;

use tracing::warn;

use crate::sandbox::Sandbox;

/// Environment variable overriding the sandbox budget, in milliseconds.
pub const SANDBOX_BUDGET_ENV: &str = "TALLY_SANDBOX_BUDGET_MS";

/// Default per-phase sandbox budget in milliseconds.
pub const DEFAULT_SANDBOX_BUDGET_MS: u64 = 5000;

/// Tunable knobs for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Wall-clock budget for each sandbox phase, in milliseconds.
    pub sandbox_budget_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sandbox_budget_ms: DEFAULT_SANDBOX_BUDGET_MS,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the environment, falling back to defaults.
    ///
    /// An unparseable or zero `TALLY_SANDBOX_BUDGET_MS` keeps the default
    /// and logs a warning instead of failing the run.
    pub fn from_env() -> Self {
        let raw = std::env::var(SANDBOX_BUDGET_ENV).ok();
        EngineConfig {
            sandbox_budget_ms: budget_from(raw.as_deref()),
        }
    }

    /// Builds a sandbox honoring this configuration.
    pub fn sandbox(&self) -> Sandbox {
        Sandbox::with_budget(Duration::from_millis(self.sandbox_budget_ms))
    }
}

/// Applies an override value to the budget; absent or blank keeps the
/// default silently, anything unparseable or zero warns and keeps it.
fn budget_from(raw: Option<&str>) -> u64 {
    let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
        return DEFAULT_SANDBOX_BUDGET_MS;
    };
    match text.parse::<u64>() {
        Ok(budget) if budget > 0 => budget,
        _ => {
            warn!(value = %text, "ignoring invalid {SANDBOX_BUDGET_ENV}");
            DEFAULT_SANDBOX_BUDGET_MS
        }
    }
}
