//! String form of a machine.
//!
//! A machine can be configured from one string of `;`-separated directives,
//! each `param[:value]`:
//!
//! - `value:N` - set the machine's observed value
//! - `state:NAME` - bind to the enumerated property `NAME`
//! - `rule:FROM->TO=TESTS` - add a transition rule
//! - `hold:STATE=DURATION[UNIT]` - set a state's minimum dwell
//! - `reset` - return to state 0
//! - `clear` - drop all compiled state
//! - `external:SPEC` - recognized, not supported
//!
//! A string that starts with a digit is a plain value. Directives run in
//! order, so `state` must precede `rule` and `hold`.
//!
//! Example: `state:status; rule:OFF->ON=$timer>=5; hold:ON=10`

use crate::clock::Timestamp;
use crate::error::FsmError;
use crate::machine::Machine;
use std::fmt;

impl Machine {
    /// Applies a configuration string. Stops at the first failing directive;
    /// directives before it stay applied.
    pub fn configure(&mut self, text: &str, now: Timestamp) -> Result<(), FsmError> {
        if text.trim_start().starts_with(|c: char| c.is_ascii_digit()) {
            let value = self.parse_value(text.trim())?;
            self.set_value(value);
            return Ok(());
        }

        for segment in text.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (param, value) = match segment.split_once(':') {
                Some((param, value)) => (param.trim(), value.trim()),
                None => (segment, "1"),
            };

            let result = match param {
                "value" => self.parse_value(value).map(|v| self.set_value(v)),
                "state" => self.bind(value),
                "reset" => {
                    self.reset(now);
                    Ok(())
                }
                "clear" => {
                    self.clear();
                    Ok(())
                }
                "rule" => self.add_rule(value),
                "hold" => self.add_hold(value),
                "external" => Err(FsmError::ExternalUnsupported {
                    object: self.name(),
                    text: value.to_string(),
                }),
                _ => Err(FsmError::UnknownDirective {
                    object: self.name(),
                    text: text.to_string(),
                    directive: param.to_string(),
                }),
            };

            if let Err(e) = result {
                tracing::error!("unable to apply '{}' to finite state machine: {}", segment, e);
                return Err(e);
            }
        }

        Ok(())
    }

    /// Renders the machine's observed value.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn parse_value(&self, text: &str) -> Result<f64, FsmError> {
        text.parse().map_err(|_| FsmError::InvalidValue {
            object: self.name(),
            text: text.to_string(),
        })
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}
