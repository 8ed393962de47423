//! WHERE / HAVING / JOIN conditions and conditional column expressions.
//!
//! Conditions are built fluently and serialized in two passes: text via
//! [`write_conditions`] and arguments via [`append_condition_args`]. Both walk
//! the list in the same order and share the operator decision table.
//!
//! ```
//! use mydml::{column, expr, paren_close, paren_open, select, SqlQb};
//!
//! let (sql, args) = select("t")
//!     .select_cols(&["a"])
//!     .where_(paren_open())
//!     .where_(column("d").int(1))
//!     .where_(column("e").str("wat").or())
//!     .where_(paren_close())
//!     .where_(column("f").in_().ints([1, 2]))
//!     .where_(expr("LENGTH(g) > ?").int(3))
//!     .to_sql()?;
//! assert_eq!(
//!     sql,
//!     "SELECT `a` FROM `t` WHERE ((`d` = ?) OR (`e` = ?)) AND (`f` IN (?,?)) AND (LENGTH(g) > ?)"
//! );
//! assert_eq!(args.slot_count(), 5);
//! # Ok::<(), mydml::DmlError>(())
//! ```

use crate::arg::{Argument, Arguments};
use crate::assemble::ArgPass;
use crate::error::{DmlError, DmlResult};
use crate::interpolate::{count_placeholders, write_template};
use crate::op::{Op, count_slots, write_operator, write_sub_operator};
use crate::qb::{SelectQb, SqlQb};
use crate::quote::{Ident, write_alias, write_name, write_name_list};
use bytes::Bytes;
use chrono::NaiveDateTime;

/// How a condition attaches to the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Logical {
    #[default]
    And,
    Or,
    Xor,
    /// `AND NOT`, or a leading `NOT` on the first condition of a group.
    Not,
}

#[derive(Debug, Clone, PartialEq)]
enum Kind {
    Column,
    Expression,
    ParenOpen,
    ParenClose,
    Using(Vec<String>),
}

/// Where a condition list is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    Where,
    Having,
    Join,
}

/// One WHERE / HAVING / ON fragment.
#[derive(Debug, Clone)]
pub struct Condition {
    left: String,
    kind: Kind,
    op: Option<Op>,
    value: Option<Argument>,
    expr_args: Arguments,
    sub: Option<Box<SelectQb>>,
    logical: Logical,
    placeholder: bool,
    alias: Option<String>,
    invalid: Option<String>,
}

/// Compare a column (`name` or `table.name`).
pub fn column(name: impl Into<String>) -> Condition {
    Condition::new(name.into(), Kind::Column)
}

/// A raw SQL expression written verbatim. `?` in the text bind the
/// expression's own arguments.
pub fn expr(sql: impl Into<String>) -> Condition {
    Condition::new(sql.into(), Kind::Expression)
}

/// Opening parenthesis of a group.
pub fn paren_open() -> Condition {
    Condition::new("(".into(), Kind::ParenOpen)
}

/// Closing parenthesis of a group.
pub fn paren_close() -> Condition {
    Condition::new(")".into(), Kind::ParenClose)
}

/// `JOIN ... USING (cols)`. Ends the join's condition list.
pub fn using<I, S>(columns: I) -> Condition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Condition::new(
        String::new(),
        Kind::Using(columns.into_iter().map(Into::into).collect()),
    )
}

/// A sub-select compared without a column, e.g. `EXISTS (SELECT ...)`.
pub fn sub_select(op: Op, select: SelectQb) -> Condition {
    let mut c = Condition::new(String::new(), Kind::Column);
    c.op = Some(op);
    c.sub = Some(Box::new(select));
    c
}

/// `IF((cond), then, else)`.
pub fn sql_if(cond: &str, then: &str, otherwise: &str) -> Condition {
    expr(format!("IF(({cond}), {then}, {otherwise})"))
}

/// `IFNULL(a,b)` over 1, 2 or 4 parts.
///
/// One part compares against NULL, two parts are two expressions, four parts
/// are two `table`, `column` pairs. Parts that are identifiers get quoted,
/// everything else is written verbatim.
pub fn sql_if_null(parts: &[&str]) -> Condition {
    let (a, b) = match parts {
        [a] => (quote_or_raw(a), "NULL".to_string()),
        [a, b] => (quote_or_raw(a), quote_or_raw(b)),
        [t1, c1, t2, c2] => (
            quote_or_raw(&format!("{t1}.{c1}")),
            quote_or_raw(&format!("{t2}.{c2}")),
        ),
        _ => {
            let mut c = expr("IFNULL()");
            c.invalid = Some(format!(
                "IFNULL takes 1, 2 or 4 parts, got {}",
                parts.len()
            ));
            return c;
        }
    };
    expr(format!("IFNULL({a},{b})"))
}

/// `CASE value WHEN w THEN t ... ELSE otherwise END`. An empty `value` gives
/// the searched form `CASE  WHEN cond THEN ...`.
pub fn sql_case(value: &str, otherwise: &str, when_then: &[(&str, &str)]) -> Condition {
    let mut sql = format!("CASE {value}");
    for (when, then) in when_then {
        sql.push_str(" WHEN ");
        sql.push_str(when);
        sql.push_str(" THEN ");
        sql.push_str(then);
    }
    if !otherwise.is_empty() {
        sql.push_str(" ELSE ");
        sql.push_str(otherwise);
    }
    sql.push_str(" END");
    let mut c = expr(sql);
    if when_then.is_empty() {
        c.invalid = Some("CASE needs at least one WHEN/THEN pair".into());
    }
    c
}

fn quote_or_raw(s: &str) -> String {
    Ident::parse(s).map_or_else(|_| s.to_string(), |id| id.to_sql())
}

macro_rules! op_setters {
    ($($(#[$m:meta])* $name:ident => $op:ident),* $(,)?) => {$(
        $(#[$m])*
        pub fn $name(mut self) -> Self {
            self.op = Some(Op::$op);
            self
        }
    )*};
}

impl Condition {
    fn new(left: String, kind: Kind) -> Self {
        Self {
            left,
            kind,
            op: None,
            value: None,
            expr_args: Arguments::new(),
            sub: None,
            logical: Logical::And,
            placeholder: false,
            alias: None,
            invalid: None,
        }
    }

    op_setters! {
        /// `IS NULL`; ignores any value.
        null => Null,
        /// `IS NOT NULL`; ignores any value.
        not_null => NotNull,
        in_ => In,
        not_in => NotIn,
        between => Between,
        not_between => NotBetween,
        like => Like,
        not_like => NotLike,
        greatest => Greatest,
        least => Least,
        equal => Equal,
        not_equal => NotEqual,
        exists => Exists,
        not_exists => NotExists,
        less => Less,
        greater => Greater,
        less_or_equal => LessOrEqual,
        greater_or_equal => GreaterOrEqual,
        regexp => Regexp,
        not_regexp => NotRegexp,
        xor => Xor,
        /// Null-safe equal `<=>`.
        spaceship => SpaceShip,
        coalesce => Coalesce,
    }

    /// Set the operator.
    pub fn op(mut self, op: Op) -> Self {
        self.op = Some(op);
        self
    }

    /// Bind an argument. On a column this replaces the previous value, on an
    /// expression it appends.
    pub fn arg(mut self, arg: impl Into<Argument>) -> Self {
        let arg = arg.into();
        if self.kind == Kind::Expression {
            self.expr_args.push(arg);
        } else {
            self.value = Some(arg);
        }
        self
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

    pub fn bool(self, v: bool) -> Self {
        self.arg(v)
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

    /// Bind several arguments to an expression at once.
    pub fn args(mut self, args: Arguments) -> Self {
        for a in args {
            self = self.arg(a);
        }
        self
    }

    /// Compare against a sub-select. `IN` unless another operator is set.
    pub fn sub(mut self, select: SelectQb) -> Self {
        self.sub = Some(Box::new(select));
        self
    }

    /// Defer the value: it is supplied per record by an
    /// [`ArgumentAssembler`](crate::ArgumentAssembler).
    pub fn placeholder(mut self) -> Self {
        self.placeholder = true;
        self
    }

    /// Alias, used when the expression is a projected column.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Attach with `OR`.
    pub fn or(mut self) -> Self {
        self.logical = Logical::Or;
        self
    }

    /// Attach with `AND` (default).
    pub fn and(mut self) -> Self {
        self.logical = Logical::And;
        self
    }

    /// Attach with `XOR`.
    pub fn logical_xor(mut self) -> Self {
        self.logical = Logical::Xor;
        self
    }

    /// Negate.
    pub fn not(mut self) -> Self {
        self.logical = Logical::Not;
        self
    }

    /// Split a `column(..).arg(..)` condition into its column and value.
    pub(crate) fn into_pair(self) -> DmlResult<(String, Argument)> {
        match (self.kind, self.value) {
            (Kind::Column, Some(value))
                if self.sub.is_none() && !self.placeholder && self.op.is_none() =>
            {
                Ok((self.left, value))
            }
            _ => Err(DmlError::not_supported(format!(
                "{:?} is not a column/value pair",
                self.left
            ))),
        }
    }

    /// Projected columns are either a bare name or an expression with its
    /// own arguments.
    pub(crate) fn check_projection(&self) -> DmlResult<()> {
        match self.kind {
            Kind::Expression => Ok(()),
            Kind::Column
                if self.value.is_none()
                    && self.sub.is_none()
                    && !self.placeholder
                    && self.op.is_none() =>
            {
                Ok(())
            }
            _ => Err(DmlError::not_supported(format!(
                "{:?} cannot be used as a projected column",
                self.left
            ))),
        }
    }

    fn check_sources(&self) -> DmlResult<()> {
        if let Some(msg) = &self.invalid {
            return Err(DmlError::mismatch(msg.clone()));
        }
        let sources = usize::from(self.value.is_some())
            + usize::from(self.sub.is_some())
            + usize::from(self.placeholder)
            + usize::from(!self.expr_args.is_empty());
        if sources > 1 {
            return Err(DmlError::not_supported(format!(
                "multiple argument sources for condition {:?}",
                self.left
            )));
        }
        if self.kind == Kind::Expression && (self.placeholder || self.sub.is_some()) {
            return Err(DmlError::not_supported(format!(
                "expression {:?} cannot be deferred or compared to a sub-select",
                self.left
            )));
        }
        Ok(())
    }

    /// Text of one condition, without surrounding parentheses.
    pub(crate) fn write_body(&self, w: &mut String) -> DmlResult<()> {
        self.check_sources()?;
        match &self.kind {
            Kind::Expression => self.write_expression(w),
            Kind::Column => {
                if let Some(sub) = &self.sub {
                    if !matches!(self.op, Some(Op::Exists | Op::NotExists)) {
                        self.write_left(w)?;
                    }
                    write_sub_operator(w, self.op)?;
                    w.push('(');
                    sub.write_sql(w)
                        .map_err(|e| e.context("sub-select"))?;
                    w.push(')');
                    return Ok(());
                }
                self.write_left(w)?;
                let n = match (&self.value, self.placeholder) {
                    (_, true) => 1,
                    (Some(v), false) => v.len(),
                    (None, false) => 0,
                };
                write_operator(w, self.op, n)?;
                Ok(())
            }
            Kind::ParenOpen | Kind::ParenClose | Kind::Using(_) => Err(DmlError::not_supported(
                "grouping or USING marker used as a single condition",
            )),
        }
    }

    fn write_left(&self, w: &mut String) -> DmlResult<()> {
        if self.left.is_empty() {
            return Err(DmlError::empty("condition column"));
        }
        write_name(w, &self.left, false)
    }

    fn write_expression(&self, w: &mut String) -> DmlResult<()> {
        let marks = count_placeholders(&self.left);
        if marks == 0 {
            w.push_str(&self.left);
            return match self.expr_args.as_slice() {
                [] => match self.op {
                    Some(_) => write_operator(w, self.op, 0).map(|_| ()),
                    None => Ok(()),
                },
                [arg] => write_operator(w, self.op, arg.len()).map(|_| ()),
                _ => Err(DmlError::mismatch(format!(
                    "expression {:?} has {} arguments but no placeholder",
                    self.left,
                    self.expr_args.len()
                ))),
            };
        }
        write_template(w, &self.left, &self.expr_args)
    }

    /// Text of a projected column: expression or name, then alias.
    pub(crate) fn write_projection(&self, w: &mut String, raw_ok: bool) -> DmlResult<()> {
        match self.kind {
            Kind::Expression => self.write_body(w)?,
            _ => write_name(w, &self.left, raw_ok)?,
        }
        write_alias(w, self.alias.as_deref())
    }

    /// Arguments of one condition, mirroring [`Condition::write_body`].
    pub(crate) fn append_args(&self, pass: &mut ArgPass<'_>) -> DmlResult<()> {
        match &self.kind {
            Kind::Expression => {
                if count_placeholders(&self.left) == 0 {
                    if let [arg] = self.expr_args.as_slice() {
                        if count_slots(self.op, arg.len())? > 0 {
                            pass.push(arg.clone());
                        }
                    }
                } else {
                    for arg in &self.expr_args {
                        pass.push(arg.clone());
                    }
                }
                Ok(())
            }
            Kind::Column => {
                if let Some(sub) = &self.sub {
                    return sub.append_args(pass).map_err(|e| e.context("sub-select"));
                }
                if self.placeholder {
                    if count_slots(self.op, 1)? > 0 {
                        pass.defer(&self.left);
                    }
                } else if let Some(v) = &self.value {
                    if count_slots(self.op, v.len())? > 0 {
                        pass.push(v.clone());
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Serialize a condition list. Each condition is parenthesized and joined by
/// its connector; grouping markers are written verbatim and restart the group.
pub(crate) fn write_conditions(
    w: &mut String,
    conds: &[Condition],
    clause: Clause,
) -> DmlResult<()> {
    if conds.is_empty() {
        return Ok(());
    }
    match clause {
        Clause::Where => w.push_str(" WHERE "),
        Clause::Having => w.push_str(" HAVING "),
        Clause::Join => {}
    }

    let mut i = 0;
    let mut on_written = false;
    // open groups, and whether the innermost one is still empty
    let mut depth = 0usize;
    let mut group_empty = false;
    for c in conds {
        if let Kind::Using(cols) = &c.kind {
            if clause != Clause::Join {
                return Err(DmlError::not_supported("USING outside of a JOIN"));
            }
            if on_written {
                return Err(DmlError::not_supported("USING mixed with ON conditions"));
            }
            w.push_str(" USING (");
            write_name_list(w, cols)?;
            w.push(')');
            return Ok(());
        }
        if clause == Clause::Join && !on_written {
            w.push_str(" ON ");
            on_written = true;
        }

        if c.kind == Kind::ParenClose {
            if depth == 0 {
                return Err(DmlError::mismatch("closing parenthesis without an open group"));
            }
            if group_empty {
                return Err(DmlError::mismatch("empty parenthesized group"));
            }
            depth -= 1;
            w.push(')');
            continue;
        }

        if i > 0 {
            w.push_str(match c.logical {
                Logical::And => " AND ",
                Logical::Or => " OR ",
                Logical::Xor => " XOR ",
                Logical::Not => " AND NOT ",
            });
        } else if c.logical == Logical::Not {
            w.push_str("NOT ");
        }

        if c.kind == Kind::ParenOpen {
            i = 0;
            depth += 1;
            group_empty = true;
            w.push('(');
            continue;
        }

        w.push('(');
        c.write_body(w)?;
        w.push(')');
        i += 1;
        group_empty = false;
    }
    if depth > 0 {
        return Err(DmlError::mismatch(format!("{depth} parenthesized group(s) left open")));
    }
    Ok(())
}

/// Argument pass over a condition list.
pub(crate) fn append_condition_args(
    pass: &mut ArgPass<'_>,
    conds: &[Condition],
    clause: Clause,
) -> DmlResult<()> {
    for c in conds {
        match c.kind {
            Kind::Using(_) if clause == Clause::Join => return Ok(()),
            Kind::ParenOpen | Kind::ParenClose | Kind::Using(_) => {}
            _ => c.append_args(pass)?,
        }
    }
    Ok(())
}
