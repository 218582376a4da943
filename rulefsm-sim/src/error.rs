//! Simulation error types.

use crate::config::ConfigError;
use rulefsm_core::FsmError;
use thiserror::Error;

/// Errors from building or running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("object '{object}': {source}")]
    Fsm {
        object: String,
        #[source]
        source: FsmError,
    },

    #[error("object not found: {object}")]
    UnknownObject { object: String },

    #[error("property '{property}' not found in object '{object}'")]
    UnknownProperty { object: String, property: String },

    #[error("event at {at} for '{object}.{property}' cannot be applied: {reason}")]
    InvalidEvent {
        at: i64,
        object: String,
        property: String,
        reason: String,
    },
}
