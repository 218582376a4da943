//! Host capabilities consumed by the engine.
//!
//! The engine never owns device state. A host object exposes named
//! properties through [`HostContext`]; the machine keeps shared handles to
//! the properties it compiled against and reads them on every tick.

use crate::units::{TimeUnits, UnitConverter};
use std::fmt;
use std::rc::Rc;

/// One entry of an enumerated property's keyword table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub name: String,
    pub value: i64,
}

impl Keyword {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A discrete (enumerated) property the machine is bound to.
pub trait DiscreteProperty {
    /// Current discrete value.
    fn get(&self) -> i64;

    /// Writes a new discrete value.
    fn set(&self, value: i64);

    /// Legal values and their names.
    fn keywords(&self) -> &[Keyword];
}

/// A live numeric property, optionally an array.
pub trait NumericProperty {
    /// Reads element `index` (0 for scalars). `None` when out of range.
    fn read(&self, index: usize) -> Option<f64>;

    /// Number of readable elements, if fixed. `None` leaves index checks
    /// to `read`.
    fn elements(&self) -> Option<usize> {
        None
    }
}

/// A resolved host property.
#[derive(Clone)]
pub enum Property {
    Discrete(Rc<dyn DiscreteProperty>),
    Numeric(Rc<dyn NumericProperty>),
    /// Any other property type; carries the host's type name for diagnostics.
    Other(String),
}

impl Property {
    /// Host type name, used in diagnostics.
    pub fn kind(&self) -> &str {
        match self {
            Property::Discrete(_) => "enumeration",
            Property::Numeric(_) => "double",
            Property::Other(name) => name,
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Property({})", self.kind())
    }
}

/// The object that owns a machine's properties.
pub trait HostContext {
    /// Diagnostic name of the object.
    fn name(&self) -> String;

    /// Resolves a property by name.
    fn property(&self, name: &str) -> Option<Property>;

    /// Unit conversion used for hold durations.
    fn units(&self) -> &dyn UnitConverter {
        &TimeUnits
    }
}

/// Looks up a keyword value by name.
pub fn keyword_value(keywords: &[Keyword], name: &str) -> Option<i64> {
    keywords.iter().find(|k| k.name == name).map(|k| k.value)
}
