//! Machine binding, evaluation and lifecycle.
//!
//! A machine is bound to one enumerated property of its host object. Binding
//! sizes the rule graph, hold table and hook table from the property's
//! keyword table. Each tick then:
//!
//! 1. refreshes the dwell timer,
//! 2. returns early while a hold (dwell obligation) is still open,
//! 3. evaluates the candidates for the current state and fires a transition,
//! 4. runs `on_entry` when the state value changed, `on_during` otherwise,
//! 5. reports when it next needs to be woken.

use crate::clock::Timestamp;
use crate::compiler::RuleCompiler;
use crate::error::FsmError;
use crate::host::{keyword_value, DiscreteProperty, HostContext, Keyword, Property};
use crate::operand::Frame;
use crate::rule::{Outcome, RuleGraph, Side};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Keyword values above this are not part of the reachable state space.
pub const MAX_STATES: i64 = 256;

/// What to do with the remaining candidates once one has fired in a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPolicy {
    /// Stop at the first satisfied candidate.
    #[default]
    FirstMatch,
    /// Keep evaluating the origin state's candidates; a later satisfied
    /// candidate fires again and overwrites the target.
    Exhaustive,
}

/// Per-machine evaluation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineOptions {
    pub scan: ScanPolicy,
    /// Scheduler granularity in seconds; wake times are rounded up to it.
    pub granularity: i64,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            scan: ScanPolicy::FirstMatch,
            granularity: 1,
        }
    }
}

/// Side effects attached to a state.
///
/// All methods default to no-ops so a device only implements what it needs.
pub trait StateHooks {
    /// Runs on the tick the machine is first observed in the state.
    fn on_entry(&self, _machine: &Machine) {}

    /// Runs just before a transition out of the state is written.
    fn on_exit(&self, _machine: &Machine) {}

    /// Runs on every tick the machine stays in the state.
    fn on_during(&self, _machine: &Machine) {}
}

/// Compiled state owned by a bound machine.
struct Program {
    property_name: String,
    property: Rc<dyn DiscreteProperty>,
    keywords: Vec<Keyword>,
    rules: RuleGraph,
    holds: Vec<f64>,
    hooks: Vec<Option<Rc<dyn StateHooks>>>,
}

impl Program {
    fn n_states(&self) -> usize {
        self.rules.n_states()
    }

    fn state_name(&self, index: usize) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| k.value >= 0 && k.value as usize == index)
            .map(|k| k.name.as_str())
    }
}

enum Binding {
    Unbound,
    Bound(Box<Program>),
}

/// A rule-driven finite state machine.
pub struct Machine {
    context: Rc<dyn HostContext>,
    options: MachineOptions,
    binding: Binding,
    /// Last observed state value.
    value: f64,
    entry_time: Timestamp,
    hold_until: Timestamp,
    elapsed: f64,
}

impl Machine {
    /// Creates an unbound machine owned by `context`.
    pub fn new(context: Rc<dyn HostContext>) -> Self {
        Self {
            context,
            options: MachineOptions::default(),
            binding: Binding::Unbound,
            value: 0.0,
            entry_time: Timestamp::ZERO,
            hold_until: Timestamp::ZERO,
            elapsed: 0.0,
        }
    }

    pub fn with_options(mut self, options: MachineOptions) -> Self {
        self.options = options;
        self
    }

    // =========================================================================
    // Binding and compilation
    // =========================================================================

    /// Binds the machine to an enumerated property of its host object.
    ///
    /// On failure an existing binding is left as it was.
    pub fn bind(&mut self, property_name: &str) -> Result<(), FsmError> {
        let object = self.context.name();

        let property = match self.context.property(property_name) {
            Some(Property::Discrete(property)) => property,
            Some(other) => {
                return Err(FsmError::NotEnumerated {
                    object,
                    property: property_name.to_string(),
                    found: other.kind().to_string(),
                })
            }
            None => {
                return Err(FsmError::UnknownProperty {
                    object,
                    property: property_name.to_string(),
                })
            }
        };

        let keywords = property.keywords().to_vec();
        let mut n_states = 0usize;
        for keyword in &keywords {
            if keyword.value < 0 {
                tracing::warn!(
                    "finite state machine will ignore state '{}' with negative value {} of state variable '{}.{}'",
                    keyword.name,
                    keyword.value,
                    object,
                    property_name
                );
            } else if keyword.value > MAX_STATES {
                tracing::warn!(
                    "finite state machine will ignore state '{}' of state variable '{}.{}' with value larger than {}",
                    keyword.name,
                    object,
                    property_name,
                    MAX_STATES
                );
            } else {
                n_states = n_states.max(keyword.value as usize + 1);
            }
        }

        if n_states < 2 {
            return Err(FsmError::TooFewStates {
                object,
                property: property_name.to_string(),
                n_states,
            });
        }

        self.binding = Binding::Bound(Box::new(Program {
            property_name: property_name.to_string(),
            property,
            keywords,
            rules: RuleGraph::with_states(n_states),
            holds: vec![0.0; n_states],
            hooks: vec![None; n_states],
        }));

        tracing::debug!(
            "finite state machine in '{}' bound to '{}' with {} states",
            object,
            property_name,
            n_states
        );
        Ok(())
    }

    /// Compiles a transition rule and adds it as a new alternative for its
    /// origin state. A failed rule leaves earlier rules untouched.
    pub fn add_rule(&mut self, spec: &str) -> Result<(), FsmError> {
        let Binding::Bound(program) = &mut self.binding else {
            return Err(FsmError::NotBound {
                object: self.context.name(),
            });
        };
        let (from, candidate) =
            RuleCompiler::new(self.context.as_ref(), &program.keywords, program.n_states())
                .compile_transition(spec)?;
        program.rules.push(from, candidate);
        Ok(())
    }

    /// Compiles a hold specification and sets that state's minimum dwell.
    pub fn add_hold(&mut self, spec: &str) -> Result<(), FsmError> {
        let Binding::Bound(program) = &mut self.binding else {
            return Err(FsmError::NotBound {
                object: self.context.name(),
            });
        };
        let (state, seconds) =
            RuleCompiler::new(self.context.as_ref(), &program.keywords, program.n_states())
                .compile_hold(spec)?;
        program.holds[state] = seconds;
        Ok(())
    }

    /// Attaches hooks to a state, replacing any previous ones.
    pub fn set_hooks(&mut self, state: &str, hooks: Rc<dyn StateHooks>) -> Result<(), FsmError> {
        let Binding::Bound(program) = &mut self.binding else {
            return Err(FsmError::NotBound {
                object: self.context.name(),
            });
        };
        let index = keyword_value(&program.keywords, state)
            .filter(|v| *v >= 0 && (*v as usize) < program.n_states())
            .ok_or_else(|| FsmError::UnknownState {
                object: self.context.name(),
                text: state.to_string(),
                state: state.to_string(),
            })?;
        program.hooks[index as usize] = Some(hooks);
        Ok(())
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluates the machine at `now` with no look-ahead limit.
    pub fn tick(&mut self, now: Timestamp) -> Timestamp {
        self.tick_until(now, Timestamp::NEVER)
    }

    /// Evaluates the machine at `now`; `horizon` is the time the caller
    /// intends to advance to next.
    ///
    /// Returns the next time the machine needs to run, or `NEVER`.
    pub fn tick_until(&mut self, now: Timestamp, horizon: Timestamp) -> Timestamp {
        let current = match &self.binding {
            Binding::Bound(program) => program.property.get(),
            Binding::Unbound => return Timestamp::NEVER,
        };

        self.elapsed = now.seconds_since(self.entry_time);

        if now < self.hold_until && self.hold_until < horizon {
            return self.hold_until;
        }
        self.hold_until = Timestamp::NEVER;

        match self.state_index(current) {
            Some(state) => self.process_rules(state, now),
            None => {
                tracing::warn!(
                    "finite state machine in '{}' has state value {} outside its {} states; rules skipped",
                    self.context.name(),
                    current,
                    self.n_states()
                );
            }
        }

        let observed = match &self.binding {
            Binding::Bound(program) => program.property.get() as f64,
            Binding::Unbound => return Timestamp::NEVER,
        };

        if observed == self.value {
            if let Some(hooks) = self.state().and_then(|s| self.hooks_for(s)) {
                hooks.on_during(self);
            }
        } else {
            self.value = observed;
            if let Some(hooks) = self.state().and_then(|s| self.hooks_for(s)) {
                hooks.on_entry(self);
            }
        }

        self.hold_until.soften(self.options.granularity)
    }

    fn process_rules(&mut self, state: usize, now: Timestamp) {
        let count = self
            .program()
            .map(|p| p.rules.candidates(state).len())
            .unwrap_or(0);

        for index in 0..count {
            if let Some(to) = self.satisfied_target(state, index) {
                self.fire(state, to, now);
                if self.options.scan == ScanPolicy::FirstMatch {
                    break;
                }
            }
        }
    }

    /// Target of candidate `index` for `state` if its whole chain holds.
    fn satisfied_target(&self, state: usize, index: usize) -> Option<usize> {
        let program = self.program()?;
        let candidate = program.rules.candidates(state).get(index)?;
        let frame = Frame {
            elapsed: self.elapsed,
            state: self.value,
        };

        match candidate.evaluate(&frame) {
            Ok(()) => Some(candidate.to),
            Err((test, Outcome::Unresolved(side))) => {
                let comparison = &candidate.tests[test];
                let operand = match side {
                    Side::Lhs => &comparison.lhs,
                    Side::Rhs => &comparison.rhs,
                };
                tracing::warn!(
                    "finite state machine in '{}' test '{}' could not read '{}'; {}->{} not taken",
                    self.context.name(),
                    comparison,
                    operand,
                    program.state_name(state).unwrap_or("?"),
                    program.state_name(candidate.to).unwrap_or("?")
                );
                None
            }
            Err(_) => None,
        }
    }

    fn fire(&mut self, from: usize, to: usize, now: Timestamp) {
        if let Some(hooks) = self.hooks_for(from) {
            hooks.on_exit(self);
        }

        let hold = self
            .program()
            .and_then(|p| p.holds.get(to).copied())
            .unwrap_or(0.0);
        self.entry_time = now;
        self.hold_until = now.after(hold);

        if let Some(program) = self.program() {
            program.property.set(to as i64);
            tracing::debug!(
                "finite state machine in '{}' {}->{} at {} (hold until {})",
                self.context.name(),
                program.state_name(from).unwrap_or("?"),
                program.state_name(to).unwrap_or("?"),
                now,
                self.hold_until
            );
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Restarts the dwell timer and captures the current state value.
    pub fn init(&mut self, now: Timestamp) {
        self.hold_until = Timestamp::NEVER;
        self.entry_time = now;
        self.elapsed = 0.0;
        if let Some(observed) = self.program().map(|p| p.property.get()) {
            self.value = observed as f64;
        }
    }

    /// Returns a bound machine to state 0 and restarts its dwell timer.
    pub fn reset(&mut self, now: Timestamp) {
        let Some(program) = self.program() else {
            tracing::warn!(
                "reset of finite state machine in '{}': state machine is not programmed",
                self.context.name()
            );
            return;
        };
        program.property.set(0);
        self.value = 0.0;
        self.entry_time = now;
        self.hold_until = Timestamp::NEVER;
        self.elapsed = 0.0;
    }

    /// Drops all compiled state. The machine keeps its host object and its
    /// registry slot and behaves as if never bound.
    pub fn clear(&mut self) {
        self.binding = Binding::Unbound;
        self.value = 0.0;
        self.entry_time = Timestamp::ZERO;
        self.hold_until = Timestamp::ZERO;
        self.elapsed = 0.0;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn context(&self) -> &Rc<dyn HostContext> {
        &self.context
    }

    /// Diagnostic name of the owning host object.
    pub fn name(&self) -> String {
        self.context.name()
    }

    pub fn options(&self) -> MachineOptions {
        self.options
    }

    pub fn set_options(&mut self, options: MachineOptions) {
        self.options = options;
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    /// Name of the bound state variable.
    pub fn property_name(&self) -> Option<&str> {
        self.program().map(|p| p.property_name.as_str())
    }

    /// Number of reachable states; 0 when unbound.
    pub fn n_states(&self) -> usize {
        self.program().map(Program::n_states).unwrap_or(0)
    }

    /// Last observed state value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Overrides the last observed state value.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// Last observed state as an index, if it is a valid state.
    pub fn state(&self) -> Option<usize> {
        if self.value.fract() != 0.0 {
            return None;
        }
        self.state_index(self.value as i64)
    }

    pub fn state_name(&self, index: usize) -> Option<&str> {
        self.program().and_then(|p| p.state_name(index))
    }

    pub fn current_state_name(&self) -> Option<&str> {
        self.state().and_then(|s| self.state_name(s))
    }

    pub fn entry_time(&self) -> Timestamp {
        self.entry_time
    }

    /// End of the current dwell obligation, `NEVER` if none.
    pub fn hold_until(&self) -> Timestamp {
        self.hold_until
    }

    /// Seconds spent in the current state as of the last tick.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of candidate transitions out of `state`.
    pub fn rule_count(&self, state: usize) -> usize {
        self.program()
            .map(|p| p.rules.candidates(state).len())
            .unwrap_or(0)
    }

    /// Number of candidate transitions across all states.
    pub fn total_rules(&self) -> usize {
        self.program().map(|p| p.rules.len()).unwrap_or(0)
    }

    pub fn has_rules(&self) -> bool {
        self.program().is_some_and(|p| !p.rules.is_empty())
    }

    /// Minimum dwell configured for `state`, in seconds.
    pub fn hold(&self, state: usize) -> Option<f64> {
        self.program().and_then(|p| p.holds.get(state).copied())
    }

    fn program(&self) -> Option<&Program> {
        match &self.binding {
            Binding::Bound(program) => Some(program),
            Binding::Unbound => None,
        }
    }

    fn state_index(&self, value: i64) -> Option<usize> {
        let n_states = self.n_states();
        (value >= 0 && (value as usize) < n_states).then_some(value as usize)
    }

    fn hooks_for(&self, state: usize) -> Option<Rc<dyn StateHooks>> {
        self.program()
            .and_then(|p| p.hooks.get(state))
            .and_then(|h| h.clone())
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("object", &self.context.name())
            .field("property", &self.property_name())
            .field("n_states", &self.n_states())
            .field("rules", &self.total_rules())
            .field("value", &self.value)
            .field("entry_time", &self.entry_time)
            .field("hold_until", &self.hold_until)
            .finish()
    }
}
