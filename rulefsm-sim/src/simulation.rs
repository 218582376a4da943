//! Discrete-event simulation loop.
//!
//! Builds in-memory host objects and their machines from a [`Config`], then
//! steps the clock from `start` to `stop`. Each step applies due external
//! events, ticks every machine, and advances to the earliest of the next
//! event, the earliest machine wake-up and `now + max_step`.

use crate::config::{ClockConfig, Config, EventConfig, ObjectConfig, PropertyConfig};
use crate::error::SimError;
use crate::trace::{TraceHooks, TraceLog, TraceRecord};
use rulefsm_core::{HostContext, Machine, MachineId, MemoryObject, Property, Registry, Timestamp};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Final state of one machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineSummary {
    pub object: String,
    pub property: Option<String>,
    pub state: Option<String>,
    pub value: f64,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub start: Timestamp,
    pub stop: Timestamp,
    pub steps: u64,
    pub transitions: Vec<TraceRecord>,
    pub machines: Vec<MachineSummary>,
}

/// A configured simulation.
pub struct Simulation {
    clock_config: ClockConfig,
    clock: Rc<Cell<Timestamp>>,
    registry: Registry,
    objects: HashMap<String, Rc<MemoryObject>>,
    events: Vec<EventConfig>,
    trace: TraceLog,
}

impl Simulation {
    /// Builds objects and machines. Any machine that fails to configure
    /// fails the build, naming its object.
    pub fn from_config(config: &Config) -> Result<Self, SimError> {
        config.validate()?;

        let clock = Rc::new(Cell::new(Timestamp::new(config.clock.start)));
        let trace: TraceLog = Rc::new(RefCell::new(Vec::new()));
        let mut registry = Registry::new();
        let mut objects = HashMap::new();

        for object_config in &config.objects {
            let object = Rc::new(build_object(object_config));

            for spec in &object_config.machines {
                let mut machine = Machine::new(object.clone()).with_options(config.engine);
                machine
                    .configure(spec, clock.get())
                    .map_err(|source| SimError::Fsm {
                        object: object_config.name.clone(),
                        source,
                    })?;

                if machine.is_bound() {
                    if !machine.has_rules() {
                        tracing::warn!(
                            "machine '{}' in object '{}' has no transition rules",
                            spec,
                            object_config.name
                        );
                    }
                    let hooks = Rc::new(TraceHooks::new(
                        object_config.name.clone(),
                        clock.clone(),
                        trace.clone(),
                    ));
                    let states: Vec<String> = (0..machine.n_states())
                        .filter_map(|s| machine.state_name(s).map(str::to_string))
                        .collect();
                    for state in &states {
                        machine
                            .set_hooks(state, hooks.clone())
                            .map_err(|source| SimError::Fsm {
                                object: object_config.name.clone(),
                                source,
                            })?;
                    }
                } else {
                    tracing::warn!(
                        "machine '{}' in object '{}' has no state variable and will stay idle",
                        spec,
                        object_config.name
                    );
                }

                registry.register(machine);
            }

            objects.insert(object_config.name.clone(), object);
        }

        let mut events = config.events.clone();
        events.sort_by_key(|e| e.at);
        for event in &events {
            let object = objects
                .get(&event.object)
                .ok_or_else(|| SimError::UnknownObject {
                    object: event.object.clone(),
                })?;
            match object.property(&event.property) {
                Some(Property::Numeric(_)) | Some(Property::Discrete(_)) => {}
                Some(other) => {
                    return Err(SimError::InvalidEvent {
                        at: event.at,
                        object: event.object.clone(),
                        property: event.property.clone(),
                        reason: format!("{} property is not settable", other.kind()),
                    })
                }
                None => {
                    return Err(SimError::UnknownProperty {
                        object: event.object.clone(),
                        property: event.property.clone(),
                    })
                }
            }
        }

        tracing::info!(
            "simulation built: {} objects, {} machines, {} rules, {} events",
            objects.len(),
            registry.len(),
            registry.iter().map(|(_, m)| m.total_rules()).sum::<usize>(),
            events.len()
        );

        Ok(Self {
            clock_config: config.clock.clone(),
            clock,
            registry,
            objects,
            events,
            trace,
        })
    }

    /// Runs from `start` to `stop`.
    pub fn run(&mut self) -> Result<Report, SimError> {
        let start = Timestamp::new(self.clock_config.start);
        let stop = Timestamp::new(self.clock_config.stop);
        let mut now = start;
        let mut next_event = 0;
        let mut steps = 0u64;

        self.clock.set(now);
        self.registry.init_all(now);

        loop {
            while let Some(event) = self.events.get(next_event) {
                if event.at > now.as_secs() {
                    break;
                }
                self.apply_event(event)?;
                next_event += 1;
            }

            self.clock.set(now);
            let wake = self.registry.tick_all(now);
            steps += 1;

            let mut next = Timestamp::new(now.as_secs().saturating_add(self.clock_config.max_step));
            if let Some(event) = self.events.get(next_event) {
                next = next.min(Timestamp::new(event.at));
            }
            if wake > now {
                next = next.min(wake);
            }

            if next > stop {
                break;
            }
            now = next;
        }

        let transitions = self.trace.borrow().clone();
        tracing::info!(
            "simulation finished: {} steps, {} state entries",
            steps,
            transitions.len()
        );

        Ok(Report {
            start,
            stop,
            steps,
            transitions,
            machines: self.summaries(),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.registry.get(id)
    }

    pub fn object(&self, name: &str) -> Option<&Rc<MemoryObject>> {
        self.objects.get(name)
    }

    fn apply_event(&self, event: &EventConfig) -> Result<(), SimError> {
        let object = self
            .objects
            .get(&event.object)
            .ok_or_else(|| SimError::UnknownObject {
                object: event.object.clone(),
            })?;

        let applied = match object.property(&event.property) {
            Some(Property::Discrete(_)) => object.set_enum(&event.property, event.value as i64),
            _ => object.set_element(&event.property, event.index, event.value),
        };

        if !applied {
            return Err(SimError::InvalidEvent {
                at: event.at,
                object: event.object.clone(),
                property: event.property.clone(),
                reason: format!("element {} does not exist", event.index),
            });
        }

        tracing::debug!(
            "{} set {}.{}[{}] = {}",
            event.at,
            event.object,
            event.property,
            event.index,
            event.value
        );
        Ok(())
    }

    fn summaries(&self) -> Vec<MachineSummary> {
        self.registry
            .iter()
            .map(|(_, machine)| MachineSummary {
                object: machine.name(),
                property: machine.property_name().map(str::to_string),
                state: machine.current_state_name().map(str::to_string),
                value: machine.value(),
            })
            .collect()
    }
}

fn build_object(config: &ObjectConfig) -> MemoryObject {
    config
        .properties
        .iter()
        .fold(MemoryObject::new(&config.name), |object, (name, property)| {
            match property {
                PropertyConfig::Enumeration { keywords, value } => object.with_enumeration(
                    name,
                    keywords.iter().map(|(k, v)| (k.clone(), *v)),
                    *value,
                ),
                PropertyConfig::Double { value } => object.with_double(name, *value),
                PropertyConfig::DoubleArray { values } => object.with_array(name, values.clone()),
                PropertyConfig::Text { .. } => object.with_other(name, "string"),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEATER: &str = r#"
clock:
  start: 0
  stop: 3600
  max_step: 300
objects:
  - name: heater1
    properties:
      mode: { type: enumeration, keywords: { OFF: 0, ON: 1 } }
      temp: { type: double, value: 50 }
    machines:
      - "state:mode; rule:OFF->ON=temp<45; rule:ON->OFF=temp>55; hold:ON=10min"
events:
  - { at: 600, object: heater1, property: temp, value: 40 }
  - { at: 900, object: heater1, property: temp, value: 60 }
"#;

    fn build(yaml: &str) -> Result<Simulation, SimError> {
        Simulation::from_config(&Config::from_yaml(yaml).unwrap())
    }

    #[test]
    fn test_heater_cycle() {
        let mut sim = build(HEATER).unwrap();
        let report = sim.run().unwrap();

        let entries: Vec<(i64, &str)> = report
            .transitions
            .iter()
            .map(|r| (r.time.as_secs(), r.state.as_str()))
            .collect();
        // Turns on when the temperature drops; the 10 minute hold keeps it on
        // past the 900s recovery, so it turns off at the hold expiry.
        assert_eq!(entries, vec![(600, "ON"), (1200, "OFF")]);

        assert_eq!(report.machines.len(), 1);
        assert_eq!(report.machines[0].state.as_deref(), Some("OFF"));
        assert_eq!(sim.object("heater1").unwrap().enum_name("mode"), Some("OFF"));
    }

    #[test]
    fn test_steps_follow_events_and_wakes() {
        let mut sim = build(HEATER).unwrap();
        let report = sim.run().unwrap();
        // 0, 300, 600 (event), 900 (event), 1200 (hold), then every 300s to 3600.
        assert_eq!(report.steps, 13);
    }

    #[test]
    fn test_bad_rule_names_object() {
        let yaml = r#"
objects:
  - name: pump7
    properties:
      mode: { type: enumeration, keywords: { OFF: 0, ON: 1 } }
    machines:
      - "state:mode; rule:OFF->ON=pressure>3"
"#;
        let err = build(yaml).err().unwrap();
        assert!(matches!(err, SimError::Fsm { ref object, .. } if object == "pump7"));
        assert!(err.to_string().contains("pressure"));
    }

    #[test]
    fn test_unknown_event_target() {
        let yaml = r#"
objects:
  - name: a
    properties:
      x: { type: double }
      note: { type: text }
events:
  - { at: 1, object: b, property: x, value: 1 }
"#;
        assert!(matches!(build(yaml).err().unwrap(), SimError::UnknownObject { .. }));

        let yaml = yaml.replace("object: b, property: x", "object: a, property: y");
        assert!(matches!(build(&yaml).err().unwrap(), SimError::UnknownProperty { .. }));

        let yaml = yaml.replace("property: y", "property: note");
        assert!(matches!(build(&yaml).err().unwrap(), SimError::InvalidEvent { .. }));
    }

    #[test]
    fn test_idle_machine_is_registered() {
        let yaml = r#"
clock: { start: 0, stop: 10, max_step: 5 }
objects:
  - name: a
    machines: [ "value:3" ]
"#;
        let mut sim = build(yaml).unwrap();
        assert_eq!(sim.registry().len(), 1);
        let report = sim.run().unwrap();
        assert_eq!(report.machines[0].value, 3.0);
        assert!(report.transitions.is_empty());
    }

    #[test]
    fn test_negative_start() {
        let yaml = r#"
clock: { start: -100, stop: 0, max_step: 50 }
objects:
  - name: lamp
    properties:
      mode: { type: enumeration, keywords: { OFF: 0, ON: 1 } }
    machines:
      - "state:mode; rule:OFF->ON=$timer>=5; rule:ON->OFF=$timer>=0; hold:ON=10"
"#;
        let mut sim = build(yaml).unwrap();
        let report = sim.run().unwrap();
        let entries: Vec<(i64, &str)> = report
            .transitions
            .iter()
            .map(|r| (r.time.as_secs(), r.state.as_str()))
            .collect();
        assert_eq!(entries[0], (-50, "ON"));
        assert_eq!(entries[1], (-40, "OFF"));
    }

    #[test]
    fn test_report_serializes() {
        let mut sim = build(HEATER).unwrap();
        let report = sim.run().unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["transitions"][0]["state"], "ON");
        assert_eq!(json["transitions"][0]["time"], 600);
    }
}
