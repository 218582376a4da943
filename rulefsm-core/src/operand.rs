//! Comparison operands.
//!
//! An operand token is one of:
//!
//! - `$timer` - seconds the machine has spent in its current state
//! - `$state` - the machine's current state value
//! - a number literal, e.g. `5`, `-2.5`, `1e3`
//! - `name` - a numeric property of the host object
//! - `name#KEYWORD` - element `KEYWORD` of a numeric array property, where
//!   the index is the keyword's value in the bound state variable
//!
//! Tokens are resolved once when a rule is compiled. Only property reads
//! remain dynamic.

use crate::error::FsmError;
use crate::host::{keyword_value, HostContext, Keyword, NumericProperty, Property};
use std::fmt;
use std::rc::Rc;

/// A resolved operand.
#[derive(Clone)]
pub enum Operand {
    Literal(f64),
    DwellTimer,
    CurrentState,
    Property {
        name: String,
        index: usize,
        source: Rc<dyn NumericProperty>,
    },
}

/// Per-tick values an operand may read from its machine.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub elapsed: f64,
    pub state: f64,
}

impl Operand {
    /// Resolves a token against the host object and the bound keyword table.
    ///
    /// `test` is the full test text, used for diagnostics.
    pub fn resolve(
        token: &str,
        context: &dyn HostContext,
        keywords: &[Keyword],
        test: &str,
    ) -> Result<Self, FsmError> {
        match token {
            "$timer" => return Ok(Operand::DwellTimer),
            "$state" => return Ok(Operand::CurrentState),
            _ => {}
        }

        let first = token.chars().next().ok_or_else(|| FsmError::Grammar {
            object: context.name(),
            text: test.to_string(),
            reason: "missing operand".to_string(),
        })?;

        if first == '$' {
            return Err(FsmError::UnboundOperand {
                object: context.name(),
                text: test.to_string(),
                name: token.to_string(),
                reason: "unknown machine variable".to_string(),
            });
        }

        if !first.is_ascii_alphabetic() {
            return token
                .parse::<f64>()
                .map(Operand::Literal)
                .map_err(|_| FsmError::Grammar {
                    object: context.name(),
                    text: test.to_string(),
                    reason: format!("invalid number '{}'", token),
                });
        }

        let (name, index) = match token.split_once('#') {
            Some((name, keyword)) => {
                let index = keyword_value(keywords, keyword)
                    .filter(|v| *v >= 0)
                    .ok_or_else(|| FsmError::UnknownState {
                        object: context.name(),
                        text: test.to_string(),
                        state: keyword.to_string(),
                    })?;
                (name, index as usize)
            }
            None => (token, 0),
        };

        match context.property(name) {
            Some(Property::Numeric(source)) => match source.elements() {
                Some(len) if index >= len => Err(FsmError::UnboundOperand {
                    object: context.name(),
                    text: test.to_string(),
                    name: token.to_string(),
                    reason: format!("element {} of {}-element property", index, len),
                }),
                _ => Ok(Operand::Property {
                    name: name.to_string(),
                    index,
                    source,
                }),
            },
            Some(other) => Err(FsmError::UnboundOperand {
                object: context.name(),
                text: test.to_string(),
                name: name.to_string(),
                reason: format!("{} property", other.kind()),
            }),
            None => Err(FsmError::UnboundOperand {
                object: context.name(),
                text: test.to_string(),
                name: name.to_string(),
                reason: "non-existent property".to_string(),
            }),
        }
    }

    /// Reads the operand's current value. `None` if a property read fails.
    pub fn value(&self, frame: &Frame) -> Option<f64> {
        match self {
            Operand::Literal(v) => Some(*v),
            Operand::DwellTimer => Some(frame.elapsed),
            Operand::CurrentState => Some(frame.state),
            Operand::Property { index, source, .. } => source.read(*index),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::DwellTimer => write!(f, "$timer"),
            Operand::CurrentState => write!(f, "$state"),
            Operand::Property { name, index, .. } if *index == 0 => write!(f, "{}", name),
            Operand::Property { name, index, .. } => write!(f, "{}[{}]", name, index),
        }
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operand({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryObject;

    fn host() -> MemoryObject {
        MemoryObject::new("tank")
            .with_enumeration("mode", [("IDLE", 0), ("FILL", 1), ("DRAIN", 3)], 0)
            .with_double("level", 0.4)
            .with_array("limits", vec![0.1, 0.2, 0.3, 0.9])
            .with_other("label", "char32")
    }

    fn keywords() -> Vec<Keyword> {
        vec![
            Keyword::new("IDLE", 0),
            Keyword::new("FILL", 1),
            Keyword::new("DRAIN", 3),
        ]
    }

    fn frame() -> Frame {
        Frame {
            elapsed: 12.0,
            state: 1.0,
        }
    }

    #[test]
    fn test_machine_variables() {
        let obj = host();
        let timer = Operand::resolve("$timer", &obj, &keywords(), "t").unwrap();
        let state = Operand::resolve("$state", &obj, &keywords(), "t").unwrap();
        assert_eq!(timer.value(&frame()), Some(12.0));
        assert_eq!(state.value(&frame()), Some(1.0));
    }

    #[test]
    fn test_literals() {
        let obj = host();
        for (token, expected) in [("5", 5.0), ("-2.5", -2.5), ("+3", 3.0), (".5", 0.5)] {
            let op = Operand::resolve(token, &obj, &keywords(), "t").unwrap();
            assert_eq!(op.value(&frame()), Some(expected), "token {}", token);
        }
        assert!(matches!(
            Operand::resolve("1.2.3", &obj, &keywords(), "t"),
            Err(FsmError::Grammar { .. })
        ));
    }

    #[test]
    fn test_property_reference_is_live() {
        let obj = host();
        let op = Operand::resolve("level", &obj, &keywords(), "level>0.5").unwrap();
        assert_eq!(op.value(&frame()), Some(0.4));
        obj.set_double("level", 0.7);
        assert_eq!(op.value(&frame()), Some(0.7));
    }

    #[test]
    fn test_keyword_index() {
        let obj = host();
        let op = Operand::resolve("limits#DRAIN", &obj, &keywords(), "t").unwrap();
        assert_eq!(op.to_string(), "limits[3]");
        assert_eq!(op.value(&frame()), Some(0.9));
    }

    #[test]
    fn test_keyword_index_past_end() {
        let obj = MemoryObject::new("tank")
            .with_array("limits", vec![0.1, 0.2])
            .with_double("level", 0.4);
        let err =
            Operand::resolve("limits#DRAIN", &obj, &keywords(), "level<limits#DRAIN").unwrap_err();
        assert!(matches!(err, FsmError::UnboundOperand { ref name, .. } if name == "limits#DRAIN"));
        assert!(err.to_string().contains("element 3"));

        let err = Operand::resolve("level#FILL", &obj, &keywords(), "level#FILL>0").unwrap_err();
        assert_eq!(err.error_code(), "UNBOUND_OPERAND");

        // Sources without a fixed length are checked on read.
        let obj = MemoryObject::new("tank").with_source("far", Rc::new(ScalarSource));
        let op = Operand::resolve("far#DRAIN", &obj, &keywords(), "far#DRAIN>0").unwrap();
        assert_eq!(op.value(&frame()), None);
    }

    struct ScalarSource;

    impl NumericProperty for ScalarSource {
        fn read(&self, index: usize) -> Option<f64> {
            (index == 0).then_some(1.0)
        }
    }

    #[test]
    fn test_unknown_keyword() {
        let obj = host();
        let err = Operand::resolve("limits#BOGUS", &obj, &keywords(), "t").unwrap_err();
        assert!(matches!(err, FsmError::UnknownState { ref state, .. } if state == "BOGUS"));
    }

    #[test]
    fn test_unresolvable_names() {
        let obj = host();
        let err = Operand::resolve("missing", &obj, &keywords(), "missing>1").unwrap_err();
        assert_eq!(err.error_code(), "UNBOUND_OPERAND");
        assert!(err.to_string().contains("tank"));
        assert!(err.to_string().contains("missing>1"));

        let err = Operand::resolve("label", &obj, &keywords(), "label>1").unwrap_err();
        assert!(matches!(err, FsmError::UnboundOperand { .. }));

        let err = Operand::resolve("mode", &obj, &keywords(), "mode>1").unwrap_err();
        assert!(matches!(err, FsmError::UnboundOperand { .. }));

        let err = Operand::resolve("$clock", &obj, &keywords(), "$clock>1").unwrap_err();
        assert!(matches!(err, FsmError::UnboundOperand { .. }));
    }
}
