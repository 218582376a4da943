//! Rule and hold compilation.
//!
//! Grammar:
//!
//! ```text
//! rule       ::= FROM "->" TO "=" test ("," test)*
//! test       ::= lhs comparator rhs
//! comparator ::= "<" | "<=" | ">" | ">=" | "==" | "!="
//! lhs, rhs   ::= "$timer" | "$state" | NUMBER | NAME ["#" KEYWORD]
//! hold       ::= STATE "=" NUMBER [UNIT]
//! ```
//!
//! Examples:
//! - `OFF->ON=$timer>=5` - leave OFF after five seconds
//! - `ON->OFF=temp>setpoint#ON,$timer>60` - both tests must hold
//! - `ON=10min` - stay in ON for at least ten minutes

use crate::error::FsmError;
use crate::host::{keyword_value, HostContext, Keyword};
use crate::operand::Operand;
use crate::rule::{CandidateTransition, Comparator, Comparison};

/// Compiles rule text against one bound state variable.
pub struct RuleCompiler<'a> {
    context: &'a dyn HostContext,
    keywords: &'a [Keyword],
    n_states: usize,
}

impl<'a> RuleCompiler<'a> {
    pub fn new(context: &'a dyn HostContext, keywords: &'a [Keyword], n_states: usize) -> Self {
        Self {
            context,
            keywords,
            n_states,
        }
    }

    /// Compiles `FROM->TO=TEST(,TEST)*` into a new candidate for `FROM`.
    pub fn compile_transition(
        &self,
        spec: &str,
    ) -> Result<(usize, CandidateTransition), FsmError> {
        let mut scanner = Scanner::new(spec);
        scanner.skip_whitespace();

        let from = scanner.take_while(is_name_char);
        if from.is_empty() {
            return Err(self.grammar(spec, "missing origin state"));
        }
        scanner.skip_whitespace();
        if !scanner.eat("->") {
            return Err(self.grammar(spec, "expected '->'"));
        }
        scanner.skip_whitespace();
        let to = scanner.take_while(is_name_char);
        if to.is_empty() {
            return Err(self.grammar(spec, "missing target state"));
        }
        scanner.skip_whitespace();
        if !scanner.eat("=") {
            return Err(self.grammar(spec, "expected '='"));
        }

        let from = self.state_index(from, spec)?;
        let to = self.state_index(to, spec)?;

        let mut candidate = CandidateTransition::new(to);
        for token in scanner.rest().split(',') {
            let token = token.trim();
            if token.is_empty() {
                tracing::warn!(
                    "empty test in '{}' rule '{}'",
                    self.context.name(),
                    spec
                );
                continue;
            }
            candidate.and(self.compile_test(token)?);
        }

        if candidate.tests.is_empty() {
            return Err(self.grammar(spec, "rule has no tests"));
        }

        Ok((from, candidate))
    }

    /// Compiles `STATE=NUMBER[UNIT]` into a state index and a duration in seconds.
    pub fn compile_hold(&self, spec: &str) -> Result<(usize, f64), FsmError> {
        let mut scanner = Scanner::new(spec);
        scanner.skip_whitespace();

        let state = scanner.take_while(is_name_char);
        if state.is_empty() {
            return Err(self.grammar(spec, "missing state"));
        }
        scanner.skip_whitespace();
        if !scanner.eat("=") {
            return Err(self.grammar(spec, "expected '='"));
        }
        scanner.skip_whitespace();

        let number = scanner
            .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'));
        let duration: f64 = number
            .parse()
            .map_err(|_| self.grammar(spec, &format!("invalid duration '{}'", number)))?;
        if !duration.is_finite() || duration < 0.0 {
            return Err(self.grammar(spec, &format!("invalid duration '{}'", number)));
        }

        let unit = match scanner.rest().trim() {
            "" => "s",
            unit => unit,
        };

        let state = self.state_index(state, spec)?;

        let seconds = self
            .context
            .units()
            .convert(duration, unit, "s")
            .ok_or_else(|| FsmError::UnitConversion {
                object: self.context.name(),
                text: spec.to_string(),
                unit: unit.to_string(),
            })?;

        Ok((state, seconds))
    }

    /// Parses exactly one `lhs op rhs` triple.
    fn compile_test(&self, token: &str) -> Result<Comparison, FsmError> {
        let mut scanner = Scanner::new(token);
        let lhs = scanner.take_while(is_operand_char);
        scanner.skip_whitespace();
        let op = scanner.take_while(is_comparator_char);
        scanner.skip_whitespace();
        let rhs = scanner.take_while(is_operand_char);
        scanner.skip_whitespace();

        if lhs.is_empty() || rhs.is_empty() {
            return Err(self.grammar(token, "expected 'lhs op rhs'"));
        }
        if !scanner.rest().is_empty() {
            return Err(self.grammar(token, &format!("unexpected '{}'", scanner.rest())));
        }
        let op: Comparator = op
            .parse()
            .map_err(|_| self.grammar(token, &format!("unsupported comparator '{}'", op)))?;

        let lhs = Operand::resolve(lhs, self.context, self.keywords, token)?;
        let rhs = Operand::resolve(rhs, self.context, self.keywords, token)?;

        Ok(Comparison::new(lhs, op, rhs))
    }

    fn state_index(&self, name: &str, spec: &str) -> Result<usize, FsmError> {
        keyword_value(self.keywords, name)
            .filter(|v| *v >= 0 && (*v as usize) < self.n_states)
            .map(|v| v as usize)
            .ok_or_else(|| FsmError::UnknownState {
                object: self.context.name(),
                text: spec.to_string(),
                state: name.to_string(),
            })
    }

    fn grammar(&self, text: &str, reason: &str) -> FsmError {
        FsmError::Grammar {
            object: self.context.name(),
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_operand_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '#' | '$' | '+' | '-')
}

fn is_comparator_char(c: char) -> bool {
    matches!(c, '<' | '=' | '>' | '!')
}

/// Cursor over specification text.
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if pred(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }
}
