//! Compiled transition rules.
//!
//! The rule graph holds, for every origin state, an ordered list of
//! candidate transitions. Candidates are alternatives (OR, first satisfied
//! in list order wins); the comparisons inside one candidate are a
//! conjunction (AND, evaluated left to right with short-circuit).

use crate::operand::{Frame, Operand};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparator {
    pub fn apply(&self, a: f64, b: f64) -> bool {
        match self {
            Comparator::Lt => a < b,
            Comparator::Le => a <= b,
            Comparator::Gt => a > b,
            Comparator::Ge => a >= b,
            Comparator::Eq => a == b,
            Comparator::Ne => a != b,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

impl FromStr for Comparator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Comparator::Lt),
            "<=" => Ok(Comparator::Le),
            ">" => Ok(Comparator::Gt),
            ">=" => Ok(Comparator::Ge),
            "==" => Ok(Comparator::Eq),
            "!=" => Ok(Comparator::Ne),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Outcome of evaluating one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    True,
    False,
    /// An operand could not be read; names which side.
    Unresolved(Side),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lhs,
    Rhs,
}

/// A single test: `lhs op rhs`.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub lhs: Operand,
    pub op: Comparator,
    pub rhs: Operand,
}

impl Comparison {
    pub fn new(lhs: Operand, op: Comparator, rhs: Operand) -> Self {
        Self { lhs, op, rhs }
    }

    pub fn evaluate(&self, frame: &Frame) -> Outcome {
        let Some(a) = self.lhs.value(frame) else {
            return Outcome::Unresolved(Side::Lhs);
        };
        let Some(b) = self.rhs.value(frame) else {
            return Outcome::Unresolved(Side::Rhs);
        };
        if self.op.apply(a, b) {
            Outcome::True
        } else {
            Outcome::False
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.lhs, self.op, self.rhs)
    }
}

/// An AND-chain of comparisons leading to a target state.
#[derive(Debug, Clone)]
pub struct CandidateTransition {
    pub to: usize,
    pub tests: Vec<Comparison>,
}

impl CandidateTransition {
    pub fn new(to: usize) -> Self {
        Self {
            to,
            tests: Vec::new(),
        }
    }

    /// Appends an AND term.
    pub fn and(&mut self, test: Comparison) {
        self.tests.push(test);
    }

    /// Evaluates the chain left to right, stopping at the first test that is
    /// not true. Returns that test's index and outcome on failure.
    pub fn evaluate(&self, frame: &Frame) -> Result<(), (usize, Outcome)> {
        for (i, test) in self.tests.iter().enumerate() {
            match test.evaluate(frame) {
                Outcome::True => continue,
                outcome => return Err((i, outcome)),
            }
        }
        Ok(())
    }
}

/// Candidate transitions indexed by origin state.
#[derive(Debug, Clone, Default)]
pub struct RuleGraph {
    by_origin: Vec<Vec<CandidateTransition>>,
}

impl RuleGraph {
    pub fn with_states(n_states: usize) -> Self {
        Self {
            by_origin: vec![Vec::new(); n_states],
        }
    }

    pub fn n_states(&self) -> usize {
        self.by_origin.len()
    }

    /// Adds a new OR branch for `from`.
    pub fn push(&mut self, from: usize, candidate: CandidateTransition) {
        if let Some(list) = self.by_origin.get_mut(from) {
            list.push(candidate);
        }
    }

    pub fn candidates(&self, from: usize) -> &[CandidateTransition] {
        self.by_origin.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of candidates across all origin states.
    pub fn len(&self) -> usize {
        self.by_origin.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(elapsed: f64) -> Frame {
        Frame {
            elapsed,
            state: 0.0,
        }
    }

    fn timer_test(op: Comparator, limit: f64) -> Comparison {
        Comparison::new(Operand::DwellTimer, op, Operand::Literal(limit))
    }

    #[test]
    fn test_comparator_parse() {
        for sym in ["<", "<=", ">", ">=", "==", "!="] {
            let op: Comparator = sym.parse().unwrap();
            assert_eq!(op.symbol(), sym);
        }
        assert!("=".parse::<Comparator>().is_err());
        assert!("<>".parse::<Comparator>().is_err());
        assert!("=>".parse::<Comparator>().is_err());
    }

    #[test]
    fn test_chain_stops_at_first_false() {
        let mut candidate = CandidateTransition::new(1);
        candidate.and(timer_test(Comparator::Ge, 1.0));
        candidate.and(timer_test(Comparator::Ge, 10.0));
        candidate.and(timer_test(Comparator::Ge, 2.0));

        assert_eq!(candidate.evaluate(&frame(5.0)), Err((1, Outcome::False)));
        assert_eq!(candidate.evaluate(&frame(20.0)), Ok(()));
    }

    #[test]
    fn test_display() {
        let test = timer_test(Comparator::Ge, 5.0);
        assert_eq!(test.to_string(), "$timer>=5");
    }

    #[test]
    fn test_graph_ignores_out_of_range_origin() {
        let mut graph = RuleGraph::with_states(2);
        graph.push(0, CandidateTransition::new(1));
        graph.push(5, CandidateTransition::new(1));
        assert_eq!(graph.len(), 1);
        assert!(graph.candidates(5).is_empty());
    }

    proptest! {
        #[test]
        fn prop_comparators_agree_with_f64_ordering(a in -1e6f64..1e6, b in -1e6f64..1e6) {
            prop_assert_eq!(Comparator::Lt.apply(a, b), a < b);
            prop_assert_eq!(Comparator::Ge.apply(a, b), !(a < b));
            prop_assert_eq!(Comparator::Gt.apply(a, b), b < a);
            prop_assert_eq!(Comparator::Le.apply(a, b), !(b < a));
            prop_assert_eq!(Comparator::Eq.apply(a, b), !Comparator::Ne.apply(a, b));
        }
    }
}
