//! Core error types.

use thiserror::Error;

/// Errors from compiling, binding and configuring a machine.
///
/// Every variant names the owning host object and the text that caused it so
/// the faulty specification string can be located.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FsmError {
    #[error("finite state machine in '{object}' rule '{text}' is invalid: {reason}")]
    Grammar {
        object: String,
        text: String,
        reason: String,
    },

    #[error("finite state machine in '{object}' spec '{text}' uses invalid state '{state}'")]
    UnknownState {
        object: String,
        text: String,
        state: String,
    },

    #[error("finite state machine in '{object}' test '{text}' refers to {reason} '{name}'")]
    UnboundOperand {
        object: String,
        text: String,
        name: String,
        reason: String,
    },

    #[error("finite state machine variable '{property}' is not defined in the object '{object}'")]
    UnknownProperty { object: String, property: String },

    #[error("finite state machine requires state variable '{object}.{property}' be an enumeration, found {found}")]
    NotEnumerated {
        object: String,
        property: String,
        found: String,
    },

    #[error("finite state machine requires state variable '{object}.{property}' to have two or more distinct states, found {n_states}")]
    TooFewStates {
        object: String,
        property: String,
        n_states: usize,
    },

    #[error("finite state machine in '{object}' hold '{text}' uses duration unit '{unit}', which cannot be converted to seconds")]
    UnitConversion {
        object: String,
        text: String,
        unit: String,
    },

    #[error("finite state machine in '{object}' is not bound to a state variable")]
    NotBound { object: String },

    #[error("finite state machine in '{object}' configuration '{text}': '{directive}' is not recognized")]
    UnknownDirective {
        object: String,
        text: String,
        directive: String,
    },

    #[error("finite state machine in '{object}': external machine '{text}' is not supported")]
    ExternalUnsupported { object: String, text: String },

    #[error("finite state machine in '{object}' value '{text}' is not a number")]
    InvalidValue { object: String, text: String },
}

impl FsmError {
    /// Returns an error code suitable for diagnostics and host-side reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            FsmError::Grammar { .. } => "GRAMMAR_ERROR",
            FsmError::UnknownState { .. } => "UNKNOWN_STATE",
            FsmError::UnboundOperand { .. } => "UNBOUND_OPERAND",
            FsmError::UnknownProperty { .. } => "UNKNOWN_PROPERTY",
            FsmError::NotEnumerated { .. } => "NOT_ENUMERATED",
            FsmError::TooFewStates { .. } => "TOO_FEW_STATES",
            FsmError::UnitConversion { .. } => "UNIT_CONVERSION",
            FsmError::NotBound { .. } => "NOT_BOUND",
            FsmError::UnknownDirective { .. } => "BAD_REQUEST",
            FsmError::ExternalUnsupported { .. } => "UNSUPPORTED",
            FsmError::InvalidValue { .. } => "BAD_REQUEST",
        }
    }

    /// Returns whether the error was raised while binding to a state variable.
    pub fn is_bind_error(&self) -> bool {
        matches!(
            self,
            FsmError::UnknownProperty { .. }
                | FsmError::NotEnumerated { .. }
                | FsmError::TooFewStates { .. }
        )
    }
}
