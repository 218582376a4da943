//! Transition trace.

use rulefsm_core::{Machine, StateHooks, Timestamp};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A machine observed entering a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub time: Timestamp,
    pub object: String,
    pub property: String,
    pub state: String,
}

/// Shared log of state entries.
pub type TraceLog = Rc<RefCell<Vec<TraceRecord>>>;

/// Hooks that record every state entry of one machine.
pub struct TraceHooks {
    object: String,
    clock: Rc<Cell<Timestamp>>,
    log: TraceLog,
}

impl TraceHooks {
    pub fn new(object: impl Into<String>, clock: Rc<Cell<Timestamp>>, log: TraceLog) -> Self {
        Self {
            object: object.into(),
            clock,
            log,
        }
    }
}

impl StateHooks for TraceHooks {
    fn on_entry(&self, machine: &Machine) {
        let record = TraceRecord {
            time: self.clock.get(),
            object: self.object.clone(),
            property: machine.property_name().unwrap_or_default().to_string(),
            state: machine.current_state_name().unwrap_or("?").to_string(),
        };
        tracing::debug!(
            "{} {}.{} entered {}",
            record.time,
            record.object,
            record.property,
            record.state
        );
        self.log.borrow_mut().push(record);
    }

    fn on_exit(&self, machine: &Machine) {
        tracing::trace!(
            "{} {} leaving {} after {}s",
            self.clock.get(),
            self.object,
            machine.current_state_name().unwrap_or("?"),
            machine.elapsed()
        );
    }
}
