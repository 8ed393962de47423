//! Literal interpolation of arguments into SQL text.
//!
//! [`render`] replaces every `?` placeholder with the escaped literal of its
//! argument, producing SQL that can be sent without a prepare round trip.
//! `?` inside quoted strings and backtick identifiers is left alone.
//!
//! Arguments bind in one of two ways, chosen by count:
//! - one placeholder per scalar slot (lists bind element-wise), which is what
//!   every builder produces;
//! - one placeholder per argument, where a list at a single `?` expands to a
//!   comma separated literal list, parenthesized unless already in parens.
//!
//! ```
//! use mydml::interpolate;
//!
//! let sql = interpolate("SELECT * FROM x WHERE a IN (?) AND d BETWEEN ? AND ?")
//!     .ints([1, 2, 3])
//!     .str("wat")
//!     .str("o'k")
//!     .to_sql()?;
//! assert_eq!(sql, r"SELECT * FROM x WHERE a IN (1,2,3) AND d BETWEEN 'wat' AND 'o\'k'");
//! # Ok::<(), mydml::DmlError>(())
//! ```

use crate::arg::{Argument, Arguments};
use crate::error::{DmlError, DmlResult};
use bytes::Bytes;
use chrono::NaiveDateTime;
use std::fmt::Write as _;

#[cfg(test)]
mod tests;

/// Byte offsets of the `?` placeholders in `sql`.
pub(crate) fn placeholder_positions(sql: &str) -> Vec<usize> {
    let mut out = Vec::new();
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for (i, b) in sql.bytes().enumerate() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if b == b'\\' && q != b'`' {
                    escaped = true;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'?' => out.push(i),
                _ => {}
            },
        }
    }
    out
}

/// Number of `?` placeholders outside literals and quoted identifiers.
pub fn count_placeholders(sql: &str) -> usize {
    placeholder_positions(sql).len()
}

/// Interpolate `args` into `sql`.
pub fn render(sql: &str, args: &Arguments) -> DmlResult<String> {
    let marks = placeholder_positions(sql);
    let slots = args.slot_count();
    let mut out = String::with_capacity(sql.len() + args.len() * 8);
    let mut last = 0;

    if marks.len() == slots {
        let flat = args.flatten()?;
        for (&pos, arg) in marks.iter().zip(&flat) {
            out.push_str(&sql[last..pos]);
            write_literal(&mut out, arg)?;
            last = pos + 1;
        }
    } else if marks.len() == args.len() {
        for (&pos, arg) in marks.iter().zip(args) {
            out.push_str(&sql[last..pos]);
            if arg.is_list() {
                let in_parens = sql[..pos].trim_end().ends_with('(')
                    && sql[pos + 1..].trim_start().starts_with(')');
                write_list(&mut out, &arg.scalars()?, in_parens)?;
            } else {
                write_literal(&mut out, arg)?;
            }
            last = pos + 1;
        }
    } else {
        return Err(DmlError::mismatch(format!(
            "{} placeholders but {} arguments ({} values)",
            marks.len(),
            args.len(),
            slots
        )));
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

fn write_list(out: &mut String, items: &[Argument], in_parens: bool) -> DmlResult<()> {
    match items {
        [] if in_parens => out.push_str("NULL"),
        [] => out.push_str("(NULL)"),
        [single] if !in_parens => write_literal(out, single)?,
        _ => {
            if !in_parens {
                out.push('(');
            }
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_literal(out, item)?;
            }
            if !in_parens {
                out.push(')');
            }
        }
    }
    Ok(())
}

/// Write one scalar argument as a SQL literal.
pub fn write_literal(out: &mut String, arg: &Argument) -> DmlResult<()> {
    match arg {
        Argument::Null => out.push_str("NULL"),
        Argument::Bool(b) => out.push(if *b { '1' } else { '0' }),
        Argument::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Argument::Float(f) => {
            if !f.is_finite() {
                return Err(DmlError::not_supported(format!(
                    "float {f} has no SQL literal"
                )));
            }
            let _ = write!(out, "{f}");
        }
        Argument::String(s) => escape_string(out, s),
        Argument::Bytes(b) => write_bytes(out, b),
        Argument::Time(t) => write_time(out, t),
        Argument::Value(v) => {
            let resolved = v.to_argument()?;
            if resolved.is_list() || matches!(resolved, Argument::Value(_)) {
                return Err(DmlError::not_supported(format!(
                    "driver value {v:?} must resolve to a scalar"
                )));
            }
            write_literal(out, &resolved)?;
        }
        Argument::Pending => {
            return Err(DmlError::mismatch(
                "deferred placeholder has not been assembled from a record",
            ));
        }
        list => {
            return Err(DmlError::mismatch(format!(
                "list argument {list:?} bound to a single placeholder"
            )));
        }
    }
    Ok(())
}

/// Write `s` as a single quoted MySQL string literal.
pub fn escape_string(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

/// Valid UTF-8 goes out as a string literal, anything else as `X'..'`.
fn write_bytes(out: &mut String, b: &Bytes) {
    match std::str::from_utf8(b) {
        Ok(s) => escape_string(out, s),
        Err(_) => {
            out.push_str("X'");
            for byte in b.iter() {
                let _ = write!(out, "{byte:02x}");
            }
            out.push('\'');
        }
    }
}

fn write_time(out: &mut String, t: &NaiveDateTime) {
    let _ = write!(out, "'{}'", t.format("%Y-%m-%d %H:%M:%S"));
}

/// Expand each `?` of `sql` to as many placeholders as its argument has
/// values: a list of three turns `?` into `?,?,?`.
///
/// ```
/// use mydml::{repeat, Arguments};
///
/// let args = Arguments::new().ints([5, 7, 9]).strs(["a", "b", "c", "d", "e"]);
/// let sql = repeat("SELECT * FROM `table` WHERE id IN (?) AND name IN (?)", &args)?;
/// assert_eq!(sql, "SELECT * FROM `table` WHERE id IN (?,?,?) AND name IN (?,?,?,?,?)");
/// # Ok::<(), mydml::DmlError>(())
/// ```
pub fn repeat(sql: &str, args: &Arguments) -> DmlResult<String> {
    let mut out = String::with_capacity(sql.len() + args.slot_count() * 2);
    repeat_into(&mut out, sql, args)?;
    Ok(out)
}

pub(crate) fn repeat_into(out: &mut String, sql: &str, args: &Arguments) -> DmlResult<()> {
    let marks = placeholder_positions(sql);
    if marks.len() != args.len() {
        return Err(DmlError::mismatch(format!(
            "{} placeholders but {} arguments",
            marks.len(),
            args.len()
        )));
    }
    let mut last = 0;
    for (&pos, arg) in marks.iter().zip(args) {
        out.push_str(&sql[last..pos]);
        if arg.is_list() {
            if arg.is_empty() {
                out.push_str("NULL");
            }
            for i in 0..arg.len() {
                if i > 0 {
                    out.push(',');
                }
                out.push('?');
            }
        } else {
            out.push('?');
        }
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    Ok(())
}

/// Write a raw SQL template bound to `args`. The text goes out verbatim when
/// it already has one `?` per scalar slot; with one `?` per argument, lists
/// expand through [`repeat`].
pub(crate) fn write_template(out: &mut String, sql: &str, args: &Arguments) -> DmlResult<()> {
    let marks = count_placeholders(sql);
    if marks == args.slot_count() {
        out.push_str(sql);
        Ok(())
    } else if marks == args.len() {
        repeat_into(out, sql, args)
    } else {
        Err(DmlError::mismatch(format!(
            "{sql:?} has {marks} placeholders but {} arguments",
            args.slot_count()
        )))
    }
}

/// Ad hoc interpolation with fluent arguments, see [`interpolate`].
#[derive(Debug, Clone)]
#[must_use]
pub struct Interpolate {
    sql: String,
    args: Arguments,
}

/// Start interpolating `sql`.
pub fn interpolate(sql: impl Into<String>) -> Interpolate {
    Interpolate {
        sql: sql.into(),
        args: Arguments::new(),
    }
}

impl Interpolate {
    pub fn arg(mut self, arg: impl Into<Argument>) -> Self {
        self.args.push(arg);
        self
    }

    /// Append several arguments.
    pub fn args(mut self, args: Arguments) -> Self {
        self.args.extend(args);
        self
    }

    pub fn null(self) -> Self {
        self.arg(Argument::Null)
    }

    pub fn bool(self, v: bool) -> Self {
        self.arg(v)
    }

    pub fn int(self, v: i64) -> Self {
        self.arg(v)
    }

    pub fn ints(self, v: impl IntoIterator<Item = i64>) -> Self {
        self.arg(Argument::Ints(v.into_iter().collect()))
    }

    pub fn float(self, v: f64) -> Self {
        self.arg(v)
    }

    pub fn floats(self, v: impl IntoIterator<Item = f64>) -> Self {
        self.arg(Argument::Floats(v.into_iter().collect()))
    }

    pub fn str(self, v: impl Into<String>) -> Self {
        self.arg(Argument::String(v.into()))
    }

    pub fn strs<S: Into<String>>(self, v: impl IntoIterator<Item = S>) -> Self {
        self.arg(Argument::Strings(v.into_iter().map(Into::into).collect()))
    }

    pub fn bytes(self, v: impl Into<Bytes>) -> Self {
        self.arg(Argument::Bytes(v.into()))
    }

    pub fn time(self, v: NaiveDateTime) -> Self {
        self.arg(v)
    }

    pub fn times(self, v: impl IntoIterator<Item = NaiveDateTime>) -> Self {
        self.arg(Argument::Times(v.into_iter().collect()))
    }

    /// Render the literal SQL.
    pub fn to_sql(&self) -> DmlResult<String> {
        render(&self.sql, &self.args)
    }
}
