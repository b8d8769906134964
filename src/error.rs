//! Error taxonomy for simulation runs.
//!
//! Everything that can abort a run before or during execution is a
//! `SimError`. Log-sink failures are deliberately NOT represented here:
//! the event log swallows them (see `report::EventLog`), because log
//! streaming is best-effort and must never influence simulation state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed or inconsistent configuration, detected before any state
    /// is advanced. Fail fast with the diagnostic.
    #[error("configuration error: {0}")]
    Config(String),

    /// A bundle endpoint or plan entry references a node name that is not
    /// part of the scenario.
    #[error("unknown node '{name}' referenced by {role}")]
    UnknownNode { name: String, role: String },

    /// The position oracle raised for a `(node, t)` pair. Surfaced as a
    /// configuration error: the run aborts.
    #[error("position oracle failed for node '{node}' at t={t}: {reason}")]
    PositionOracle { node: String, t: f64, reason: String },

    /// The contact plan could not be read, parsed, or violates its
    /// ordering/shape invariants.
    #[error("contact plan error: {0}")]
    ContactPlan(String),

    /// A timestamp in a configuration or plan file was not valid RFC 3339.
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    /// Scenario file was not valid JSON for the expected schema.
    #[error("scenario parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SimError {
    /// Shorthand for `SimError::Config` with formatted diagnostics.
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Config(msg.into())
    }
}
