//! In-memory host objects.
//!
//! A `MemoryObject` is a named bag of `Cell`-backed properties that satisfies
//! [`HostContext`]. Drivers and tests build one, hand it to a machine, and
//! then mutate inputs between ticks through the setters.

use crate::host::{DiscreteProperty, HostContext, Keyword, NumericProperty, Property};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// An enumerated property.
#[derive(Debug)]
pub struct EnumCell {
    value: Cell<i64>,
    keywords: Vec<Keyword>,
}

impl EnumCell {
    pub fn new(keywords: Vec<Keyword>, value: i64) -> Self {
        Self {
            value: Cell::new(value),
            keywords,
        }
    }
}

impl DiscreteProperty for EnumCell {
    fn get(&self) -> i64 {
        self.value.get()
    }

    fn set(&self, value: i64) {
        self.value.set(value);
    }

    fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }
}

/// A scalar or array of doubles.
#[derive(Debug)]
pub struct NumericCells {
    values: Vec<Cell<f64>>,
}

impl NumericCells {
    pub fn scalar(value: f64) -> Self {
        Self {
            values: vec![Cell::new(value)],
        }
    }

    pub fn array(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().map(Cell::new).collect(),
        }
    }

    pub fn set(&self, index: usize, value: f64) -> bool {
        match self.values.get(index) {
            Some(cell) => {
                cell.set(value);
                true
            }
            None => false,
        }
    }
}

impl NumericProperty for NumericCells {
    fn read(&self, index: usize) -> Option<f64> {
        self.values.get(index).map(Cell::get)
    }

    fn elements(&self) -> Option<usize> {
        Some(self.values.len())
    }
}

/// A host object held entirely in memory.
#[derive(Default)]
pub struct MemoryObject {
    name: String,
    enums: HashMap<String, Rc<EnumCell>>,
    numbers: HashMap<String, Rc<NumericCells>>,
    sources: HashMap<String, Rc<dyn NumericProperty>>,
    others: HashMap<String, String>,
}

impl MemoryObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds an enumerated property with the given keyword table and value.
    pub fn with_enumeration<K, I>(
        mut self,
        name: impl Into<String>,
        keywords: I,
        value: i64,
    ) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, i64)>,
    {
        let keywords = keywords
            .into_iter()
            .map(|(k, v)| Keyword::new(k, v))
            .collect();
        self.enums
            .insert(name.into(), Rc::new(EnumCell::new(keywords, value)));
        self
    }

    pub fn with_double(mut self, name: impl Into<String>, value: f64) -> Self {
        self.numbers
            .insert(name.into(), Rc::new(NumericCells::scalar(value)));
        self
    }

    pub fn with_array(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.numbers
            .insert(name.into(), Rc::new(NumericCells::array(values)));
        self
    }

    /// Adds a caller-supplied numeric source.
    pub fn with_source(
        mut self,
        name: impl Into<String>,
        source: Rc<dyn NumericProperty>,
    ) -> Self {
        self.sources.insert(name.into(), source);
        self
    }

    /// Adds a property of a type the engine cannot read (e.g. a string).
    pub fn with_other(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.others.insert(name.into(), type_name.into());
        self
    }

    /// Sets element 0 of a numeric property.
    pub fn set_double(&self, name: &str, value: f64) -> bool {
        self.set_element(name, 0, value)
    }

    pub fn set_element(&self, name: &str, index: usize, value: f64) -> bool {
        self.numbers
            .get(name)
            .map(|cells| cells.set(index, value))
            .unwrap_or(false)
    }

    pub fn get_double(&self, name: &str) -> Option<f64> {
        self.numbers.get(name).and_then(|cells| cells.read(0))
    }

    pub fn get_enum(&self, name: &str) -> Option<i64> {
        self.enums.get(name).map(|cell| cell.get())
    }

    pub fn set_enum(&self, name: &str, value: i64) -> bool {
        match self.enums.get(name) {
            Some(cell) => {
                cell.set(value);
                true
            }
            None => false,
        }
    }

    /// Name of the keyword for the current value of an enumerated property.
    pub fn enum_name(&self, name: &str) -> Option<&str> {
        let cell = self.enums.get(name)?;
        let value = cell.get();
        cell.keywords
            .iter()
            .find(|k| k.value == value)
            .map(|k| k.name.as_str())
    }
}

impl HostContext for MemoryObject {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn property(&self, name: &str) -> Option<Property> {
        if let Some(cell) = self.enums.get(name) {
            return Some(Property::Discrete(cell.clone()));
        }
        if let Some(cells) = self.numbers.get(name) {
            return Some(Property::Numeric(cells.clone()));
        }
        if let Some(source) = self.sources.get(name) {
            return Some(Property::Numeric(source.clone()));
        }
        self.others
            .get(name)
            .map(|type_name| Property::Other(type_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryObject {
        MemoryObject::new("heater")
            .with_enumeration("mode", [("OFF", 0), ("ON", 1)], 0)
            .with_double("temp", 20.0)
            .with_array("setpoint", vec![18.0, 22.0])
            .with_other("label", "char32")
    }

    #[test]
    fn test_property_kinds() {
        let obj = sample();
        assert_eq!(obj.property("mode").unwrap().kind(), "enumeration");
        assert_eq!(obj.property("temp").unwrap().kind(), "double");
        assert_eq!(obj.property("label").unwrap().kind(), "char32");
        assert!(obj.property("missing").is_none());
    }

    #[test]
    fn test_numeric_setters() {
        let obj = sample();
        assert!(obj.set_double("temp", 25.0));
        assert_eq!(obj.get_double("temp"), Some(25.0));
        assert!(obj.set_element("setpoint", 1, 23.0));
        assert!(!obj.set_element("setpoint", 2, 23.0));
        assert!(!obj.set_double("mode", 1.0));

        match obj.property("setpoint").unwrap() {
            Property::Numeric(source) => {
                assert_eq!(source.elements(), Some(2));
                assert_eq!(source.read(1), Some(23.0));
                assert_eq!(source.read(2), None);
            }
            other => panic!("unexpected property {:?}", other),
        }
    }

    #[test]
    fn test_enum_shared_through_handle() {
        let obj = sample();
        let handle = match obj.property("mode").unwrap() {
            Property::Discrete(handle) => handle,
            other => panic!("unexpected property {:?}", other),
        };
        handle.set(1);
        assert_eq!(obj.get_enum("mode"), Some(1));
        assert_eq!(obj.enum_name("mode"), Some("ON"));
    }
}
