//! # rulefsm-core
//!
//! Rule-compiled finite state machine engine.
//!
//! This crate provides:
//! - A compiler for textual transition rules and hold (dwell) specifications
//! - Binding of machines to enumerated host properties
//! - Per-tick evaluation with AND/OR rule semantics and dwell debounce
//! - Entry, exit and during hooks per state
//! - A registry that initializes and ticks all machines of a simulation
//!
//! ```
//! use rulefsm_core::{Machine, MemoryObject, Timestamp};
//! use std::rc::Rc;
//!
//! let switch = Rc::new(
//!     MemoryObject::new("switch").with_enumeration("status", [("OFF", 0), ("ON", 1)], 0),
//! );
//! let mut machine = Machine::new(switch.clone());
//! machine
//!     .configure("state:status; rule:OFF->ON=$timer>=5; hold:ON=10", Timestamp::ZERO)
//!     .unwrap();
//! machine.init(Timestamp::ZERO);
//!
//! assert_eq!(machine.tick(Timestamp::new(5)), Timestamp::new(15));
//! assert_eq!(switch.enum_name("status"), Some("ON"));
//! ```

pub mod clock;
pub mod compiler;
pub mod convert;
pub mod error;
pub mod host;
pub mod machine;
pub mod memory;
pub mod operand;
pub mod registry;
pub mod rule;
pub mod units;

pub use clock::Timestamp;
pub use compiler::RuleCompiler;
pub use error::FsmError;
pub use host::{DiscreteProperty, HostContext, Keyword, NumericProperty, Property};
pub use machine::{Machine, MachineOptions, ScanPolicy, StateHooks, MAX_STATES};
pub use memory::MemoryObject;
pub use operand::Operand;
pub use registry::{MachineId, Registry};
pub use rule::{CandidateTransition, Comparator, Comparison, RuleGraph};
pub use units::{TimeUnits, UnitConverter};
