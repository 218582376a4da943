//! # rulefsm-sim
//!
//! Discrete-event driver for rulefsm machines.
//!
//! A simulation is described by a YAML [`Config`]: a clock window, engine
//! options, host objects with their properties and machine strings, and
//! timed external property changes. [`Simulation::run`] steps the clock and
//! returns a [`Report`] with every state entry observed.

pub mod config;
pub mod error;
pub mod simulation;
pub mod trace;

pub use config::{ClockConfig, Config, ConfigError, EventConfig, ObjectConfig, PropertyConfig};
pub use error::SimError;
pub use simulation::{MachineSummary, Report, Simulation};
pub use trace::{TraceHooks, TraceLog, TraceRecord};
