//! Machine registry.
//!
//! Owns every machine of a simulation in registration order. The host's
//! discrete-event loop calls `init_all` once before the first step and then
//! `tick_all` at every step, using the returned time to schedule its next
//! advance.

use crate::clock::Timestamp;
use crate::host::HostContext;
use crate::machine::Machine;
use std::fmt;
use std::rc::Rc;

/// Stable handle to a registered machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(usize);

impl MachineId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fsm#{}", self.0)
    }
}

/// Append-only collection of machines.
#[derive(Debug, Default)]
pub struct Registry {
    machines: Vec<Machine>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unbound machine for `context` and registers it.
    pub fn create(&mut self, context: Rc<dyn HostContext>) -> MachineId {
        self.register(Machine::new(context))
    }

    pub fn register(&mut self, machine: Machine) -> MachineId {
        let id = MachineId(self.machines.len());
        self.machines.push(machine);
        id
    }

    pub fn get(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(id.0)
    }

    pub fn get_mut(&mut self, id: MachineId) -> Option<&mut Machine> {
        self.machines.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Machines in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (MachineId, &Machine)> {
        self.machines
            .iter()
            .enumerate()
            .map(|(i, m)| (MachineId(i), m))
    }

    /// Initializes every machine before the first tick.
    pub fn init_all(&mut self, now: Timestamp) {
        for machine in &mut self.machines {
            machine.init(now);
        }
        tracing::debug!(
            "initialized {} finite state machines at {}",
            self.machines.len(),
            now
        );
    }

    /// Ticks every machine and returns the earliest wake time.
    pub fn tick_all(&mut self, now: Timestamp) -> Timestamp {
        self.machines
            .iter_mut()
            .map(|machine| machine.tick(now))
            .min()
            .unwrap_or(Timestamp::NEVER)
    }
}
