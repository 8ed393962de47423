//! Comparison operators and their placeholder text.
//!
//! [`write_operator`] is the single decision table mapping an operator and an
//! argument count to SQL. The text pass runs it against a `String`, the
//! argument pass runs the very same function against [`Discard`] to learn how
//! many slots the operator consumes, so both passes can never disagree.

use crate::error::{DmlError, DmlResult};
use std::fmt;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Null,
    NotNull,
    In,
    NotIn,
    Between,
    NotBetween,
    Like,
    NotLike,
    Greatest,
    Least,
    Equal,
    NotEqual,
    Exists,
    NotExists,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Regexp,
    NotRegexp,
    Xor,
    /// Null-safe equal `<=>`.
    SpaceShip,
    Coalesce,
}

impl Op {
    /// SQL keyword or symbol.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Op::Null => "IS NULL",
            Op::NotNull => "IS NOT NULL",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::Between => "BETWEEN",
            Op::NotBetween => "NOT BETWEEN",
            Op::Like => "LIKE",
            Op::NotLike => "NOT LIKE",
            Op::Greatest => "GREATEST",
            Op::Least => "LEAST",
            Op::Equal => "=",
            Op::NotEqual => "!=",
            Op::Exists => "EXISTS",
            Op::NotExists => "NOT EXISTS",
            Op::Less => "<",
            Op::Greater => ">",
            Op::LessOrEqual => "<=",
            Op::GreaterOrEqual => ">=",
            Op::Regexp => "REGEXP",
            Op::NotRegexp => "NOT REGEXP",
            Op::Xor => "XOR",
            Op::SpaceShip => "<=>",
            Op::Coalesce => "COALESCE",
        }
    }

    /// Operators taking one operand, or a sub-select.
    fn is_binary(&self) -> bool {
        matches!(
            self,
            Op::Equal
                | Op::NotEqual
                | Op::Less
                | Op::Greater
                | Op::LessOrEqual
                | Op::GreaterOrEqual
                | Op::Like
                | Op::NotLike
                | Op::Regexp
                | Op::NotRegexp
                | Op::Xor
                | Op::SpaceShip
        )
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Destination of the operator text.
pub(crate) trait SqlSink {
    fn push_str(&mut self, s: &str);
}

impl SqlSink for String {
    fn push_str(&mut self, s: &str) {
        String::push_str(self, s);
    }
}

/// Sink that drops all text; used to count slots.
pub(crate) struct Discard;

impl SqlSink for Discard {
    fn push_str(&mut self, _: &str) {}
}

fn placeholder_list(w: &mut impl SqlSink, n: usize) {
    w.push_str("(");
    for i in 0..n {
        if i > 0 {
            w.push_str(",");
        }
        w.push_str("?");
    }
    w.push_str(")");
}

/// Write the operator with placeholders for an argument of length `n` and
/// return how many argument slots it consumes.
///
/// Without an explicit operator a multi-value argument becomes `IN`, a
/// missing or NULL argument becomes `IS NULL`, anything else `=`.
pub(crate) fn write_operator(w: &mut impl SqlSink, op: Option<Op>, n: usize) -> DmlResult<usize> {
    let op = match op {
        Some(op) => op,
        None if n > 1 => Op::In,
        None if n == 0 => Op::Null,
        None => Op::Equal,
    };
    match op {
        Op::Null | Op::NotNull => {
            w.push_str(" ");
            w.push_str(op.as_sql());
            Ok(0)
        }
        Op::In | Op::NotIn | Op::Greatest | Op::Least => {
            w.push_str(" ");
            w.push_str(op.as_sql());
            w.push_str(" ");
            if n == 0 {
                w.push_str("(NULL)");
            } else {
                placeholder_list(w, n);
            }
            Ok(n)
        }
        Op::Between | Op::NotBetween => {
            if n != 2 {
                return Err(DmlError::mismatch(format!(
                    "{op} requires exactly 2 arguments, got {n}"
                )));
            }
            w.push_str(" ");
            w.push_str(op.as_sql());
            w.push_str(" ? AND ?");
            Ok(2)
        }
        Op::Exists | Op::NotExists => Err(DmlError::not_supported(format!(
            "{op} requires a sub-select"
        ))),
        Op::Coalesce => match n {
            1 => {
                w.push_str(" = COALESCE(?)");
                Ok(1)
            }
            _ => Err(DmlError::mismatch(format!(
                "COALESCE requires exactly 1 argument, got {n}"
            ))),
        },
        Op::Equal if n == 0 => {
            w.push_str(" IS NULL");
            Ok(0)
        }
        Op::NotEqual if n == 0 => {
            w.push_str(" IS NOT NULL");
            Ok(0)
        }
        _ => match n {
            0 => {
                w.push_str(" ");
                w.push_str(op.as_sql());
                w.push_str(" NULL");
                Ok(0)
            }
            1 => {
                w.push_str(" ");
                w.push_str(op.as_sql());
                w.push_str(" ?");
                Ok(1)
            }
            _ => Err(DmlError::mismatch(format!(
                "operator {op} takes one argument, got {n}"
            ))),
        },
    }
}

/// Slots consumed by `op` for an argument of length `n`.
pub(crate) fn count_slots(op: Option<Op>, n: usize) -> DmlResult<usize> {
    write_operator(&mut Discard, op, n)
}

/// Write the operator that precedes `(sub-select)`. `IN` when unset.
pub(crate) fn write_sub_operator(w: &mut String, op: Option<Op>) -> DmlResult<()> {
    let op = op.unwrap_or(Op::In);
    match op {
        Op::In | Op::NotIn => {}
        Op::Exists | Op::NotExists => {}
        op if op.is_binary() => {}
        op => {
            return Err(DmlError::not_supported(format!(
                "operator {op} cannot compare against a sub-select"
            )));
        }
    }
    if !w.is_empty() && !w.ends_with('(') {
        w.push(' ');
    }
    w.push_str(op.as_sql());
    w.push(' ');
    Ok(())
}
