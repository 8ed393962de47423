//! SELECT statement builder.

use crate::arg::Arguments;
use crate::assemble::{ArgPass, StmtKind};
use crate::condition::{Clause, Condition, append_condition_args, column, write_conditions};
use crate::error::{DmlError, DmlResult};
use crate::interpolate::write_template;
use crate::qb::traits::{BuildCache, SqlQb};
use crate::qb::{Term, write_limit, write_terms};
use crate::quote::{write_alias, write_name};
use std::fmt::Write as _;

/// Name of the synthetic column a UNION adds to keep each member's rows
/// together.
pub(crate) const PRESERVE_RESULT_SET: &str = "_preserve_result_set";

/// JOIN flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    alias: Option<String>,
    on: Vec<Condition>,
}

/// SELECT builder.
#[derive(Debug, Clone)]
pub struct SelectQb {
    /// Table of the FROM clause; empty for a SELECT without FROM
    table: String,
    alias: Option<String>,
    /// Derived table replacing `table`
    derived: Option<Box<SelectQb>>,
    /// Projected columns, `*` when empty
    columns: Vec<Condition>,
    distinct: bool,
    joins: Vec<Join>,
    wheres: Vec<Condition>,
    group_by: Vec<Term>,
    havings: Vec<Condition>,
    order_by: Vec<Term>,
    limit: Option<u64>,
    offset: Option<u64>,
    /// Columns, group and order terms that are not identifiers go out raw
    unsafe_: bool,
    interpolate: bool,
    /// Caller supplied statement replacing everything above
    raw: Option<(String, Arguments)>,
    /// Value of the preserve-result-set column, set by a UNION
    preserve_index: Option<usize>,
    cache: BuildCache,
    build_error: Option<DmlError>,
}

impl SelectQb {
    /// Create a SELECT builder for a table.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            alias: None,
            derived: None,
            columns: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            wheres: Vec::new(),
            group_by: Vec::new(),
            havings: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            unsafe_: false,
            interpolate: false,
            raw: None,
            preserve_index: None,
            cache: BuildCache::default(),
            build_error: None,
        }
    }

    /// SELECT from a derived table: `FROM (SELECT ...) AS alias`.
    pub fn with_derived_table(derived: SelectQb, alias: &str) -> Self {
        let mut s = Self::new("");
        if alias.is_empty() {
            s.build_error = Some(DmlError::empty("derived table alias"));
        }
        s.derived = Some(Box::new(derived));
        s.alias = Some(alias.to_string());
        s
    }

    /// A statement from caller supplied SQL and arguments.
    ///
    /// The text is sent as is. It must have one `?` per scalar slot of
    /// `args`, or one per argument, in which case lists expand.
    pub fn raw(sql: &str, args: Arguments) -> Self {
        let mut s = Self::new("");
        s.raw = Some((sql.to_string(), args));
        s
    }

    fn mutate(mut self, f: impl FnOnce(&mut Self) -> DmlResult<()>) -> Self {
        if self.build_error.is_none() {
            self.cache.invalidate();
            if let Err(e) = f(&mut self) {
                self.build_error = Some(e);
            }
        }
        self
    }

    fn structured(&self, what: &str) -> DmlResult<()> {
        match self.raw {
            Some(_) => Err(DmlError::not_supported(format!(
                "{what} on a raw statement"
            ))),
            None => Ok(()),
        }
    }

    // ==================== Table ====================

    /// Alias of the FROM table.
    pub fn alias(self, alias: &str) -> Self {
        self.mutate(|s| {
            s.alias = Some(alias.to_string());
            Ok(())
        })
    }

    // ==================== Columns ====================

    /// Append columns. With [`SelectQb::unsafe_`] they may be raw expressions.
    pub fn select_cols(self, cols: &[&str]) -> Self {
        self.mutate(|s| {
            s.structured("columns")?;
            s.columns.extend(cols.iter().map(|c| column(*c)));
            Ok(())
        })
    }

    /// Append one column.
    pub fn add_select(self, col: &str) -> Self {
        self.select_cols(&[col])
    }

    /// Select `*`, dropping previously added columns.
    pub fn star(self) -> Self {
        self.mutate(|s| {
            s.structured("columns")?;
            s.columns = vec![column("*")];
            Ok(())
        })
    }

    /// Append `(column, alias)` pairs.
    pub fn add_columns_aliases(self, pairs: &[(&str, &str)]) -> Self {
        self.mutate(|s| {
            s.structured("columns")?;
            s.columns
                .extend(pairs.iter().map(|(c, a)| column(*c).alias(*a)));
            Ok(())
        })
    }

    /// Append computed columns: expressions built with
    /// [`expr`](crate::expr), [`sql_case`](crate::sql_case) and friends, with
    /// an optional [`alias`](Condition::alias). Their arguments bind before
    /// everything else in the statement.
    pub fn add_columns_conditions(self, conds: impl IntoIterator<Item = Condition>) -> Self {
        self.mutate(|s| {
            s.structured("columns")?;
            for c in conds {
                c.check_projection()?;
                s.columns.push(c);
            }
            Ok(())
        })
    }

    /// `SELECT DISTINCT`.
    pub fn distinct(self) -> Self {
        self.mutate(|s| {
            s.distinct = true;
            Ok(())
        })
    }

    /// Write column, group and order references that are not plain
    /// identifiers verbatim instead of rejecting them.
    pub fn unsafe_(self) -> Self {
        self.mutate(|s| {
            s.unsafe_ = true;
            Ok(())
        })
    }

    // ==================== JOIN ====================

    /// Add a join. `on` holds ON conditions or a single [`using`](crate::using).
    pub fn join(
        self,
        kind: JoinKind,
        table: &str,
        alias: Option<&str>,
        on: impl IntoIterator<Item = Condition>,
    ) -> Self {
        self.mutate(|s| {
            s.structured("JOIN")?;
            let on: Vec<Condition> = on.into_iter().collect();
            if kind == JoinKind::Cross && !on.is_empty() {
                return Err(DmlError::not_supported("CROSS JOIN with conditions"));
            }
            if kind != JoinKind::Cross && on.is_empty() {
                return Err(DmlError::empty(format!("conditions of {}", kind.as_sql())));
            }
            s.joins.push(Join {
                kind,
                table: table.to_string(),
                alias: alias.map(str::to_string),
                on,
            });
            Ok(())
        })
    }

    pub fn inner_join(
        self,
        table: &str,
        alias: Option<&str>,
        on: impl IntoIterator<Item = Condition>,
    ) -> Self {
        self.join(JoinKind::Inner, table, alias, on)
    }

    pub fn left_join(
        self,
        table: &str,
        alias: Option<&str>,
        on: impl IntoIterator<Item = Condition>,
    ) -> Self {
        self.join(JoinKind::Left, table, alias, on)
    }

    pub fn right_join(
        self,
        table: &str,
        alias: Option<&str>,
        on: impl IntoIterator<Item = Condition>,
    ) -> Self {
        self.join(JoinKind::Right, table, alias, on)
    }

    pub fn cross_join(self, table: &str, alias: Option<&str>) -> Self {
        self.join(JoinKind::Cross, table, alias, [])
    }

    // ==================== WHERE / HAVING ====================

    /// Add a WHERE condition.
    pub fn where_(self, cond: Condition) -> Self {
        self.where_all([cond])
    }

    /// Add several WHERE conditions.
    pub fn where_all(self, conds: impl IntoIterator<Item = Condition>) -> Self {
        self.mutate(|s| {
            s.structured("WHERE")?;
            s.wheres.extend(conds);
            Ok(())
        })
    }

    /// Add a HAVING condition.
    pub fn having(self, cond: Condition) -> Self {
        self.having_all([cond])
    }

    pub fn having_all(self, conds: impl IntoIterator<Item = Condition>) -> Self {
        self.mutate(|s| {
            s.structured("HAVING")?;
            s.havings.extend(conds);
            Ok(())
        })
    }

    // ==================== GROUP / ORDER ====================

    pub fn group_by(self, col: &str) -> Self {
        self.mutate(|s| {
            s.structured("GROUP BY")?;
            s.group_by.push(Term::asc(col));
            Ok(())
        })
    }

    /// Group by a raw expression, written verbatim.
    pub fn group_by_expr(self, sql: &str) -> Self {
        self.mutate(|s| {
            s.structured("GROUP BY")?;
            s.group_by.push(Term::Raw(sql.to_string()));
            Ok(())
        })
    }

    pub fn order_by(self, col: &str) -> Self {
        self.mutate(|s| {
            s.structured("ORDER BY")?;
            s.order_by.push(Term::asc(col));
            Ok(())
        })
    }

    pub fn order_by_desc(self, col: &str) -> Self {
        self.mutate(|s| {
            s.structured("ORDER BY")?;
            s.order_by.push(Term::desc(col));
            Ok(())
        })
    }

    /// Order by a raw expression, written verbatim.
    pub fn order_by_expr(self, sql: &str) -> Self {
        self.mutate(|s| {
            s.structured("ORDER BY")?;
            s.order_by.push(Term::Raw(sql.to_string()));
            Ok(())
        })
    }

    // ==================== Pagination ====================

    /// Set LIMIT.
    pub fn limit(self, n: u64) -> Self {
        self.mutate(|s| {
            s.structured("LIMIT")?;
            s.limit = Some(n);
            Ok(())
        })
    }

    /// Set OFFSET. Only written together with a limit.
    pub fn offset(self, n: u64) -> Self {
        self.mutate(|s| {
            s.structured("OFFSET")?;
            s.offset = Some(n);
            Ok(())
        })
    }

    /// Pagination helper.
    ///
    /// `page` is 1-based (clamped to >= 1).
    /// `per_page` is clamped to >= 1.
    pub fn paginate(self, page: u64, per_page: u64) -> Self {
        let size = per_page.max(1);
        let offset = (page.max(1) - 1).saturating_mul(size);
        self.limit(size).offset(offset)
    }

    // ==================== Build options ====================

    /// Render arguments into the SQL text.
    pub fn interpolate(self) -> Self {
        self.mutate(|s| {
            s.interpolate = true;
            Ok(())
        })
    }

    /// Keep the last build until the next mutation.
    pub fn use_build_cache(self) -> Self {
        self.mutate(|s| {
            s.cache.enable();
            Ok(())
        })
    }

    pub(crate) fn preserve_index(mut self, index: usize) -> Self {
        self.cache.invalidate();
        self.preserve_index = Some(index);
        self
    }

    fn write_from(&self, w: &mut String) -> DmlResult<()> {
        if let Some(derived) = &self.derived {
            w.push_str(" FROM (");
            derived
                .write_sql(w)
                .map_err(|e| e.context("derived table"))?;
            w.push(')');
            return write_alias(w, self.alias.as_deref());
        }
        if self.table.is_empty() {
            return Ok(());
        }
        w.push_str(" FROM ");
        write_name(w, &self.table, false)?;
        write_alias(w, self.alias.as_deref())
    }
}

impl SqlQb for SelectQb {
    fn write_sql(&self, w: &mut String) -> DmlResult<()> {
        if let Some(e) = &self.build_error {
            return Err(e.clone());
        }
        if let Some((sql, args)) = &self.raw {
            return write_template(w, sql, args);
        }

        w.push_str("SELECT ");
        if self.distinct {
            w.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            w.push('*');
        }
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                w.push_str(", ");
            }
            c.write_projection(w, self.unsafe_)?;
        }
        if let Some(index) = self.preserve_index {
            let _ = write!(w, ", {index} AS `{PRESERVE_RESULT_SET}`");
        }

        self.write_from(w)?;
        for join in &self.joins {
            w.push(' ');
            w.push_str(join.kind.as_sql());
            w.push(' ');
            write_name(w, &join.table, false)?;
            write_alias(w, join.alias.as_deref())?;
            write_conditions(w, &join.on, Clause::Join)?;
        }
        write_conditions(w, &self.wheres, Clause::Where)?;
        write_terms(w, " GROUP BY ", &self.group_by, self.unsafe_)?;
        write_conditions(w, &self.havings, Clause::Having)?;
        write_terms(w, " ORDER BY ", &self.order_by, self.unsafe_)?;
        write_limit(w, self.limit, self.offset);
        Ok(())
    }

    fn append_args(&self, pass: &mut ArgPass<'_>) -> DmlResult<()> {
        if let Some(e) = &self.build_error {
            return Err(e.clone());
        }
        if let Some((_, args)) = &self.raw {
            for arg in args {
                pass.push(arg.clone());
            }
            return Ok(());
        }
        for c in &self.columns {
            c.append_args(pass)?;
        }
        if let Some(derived) = &self.derived {
            derived.append_args(pass)?;
        }
        for join in &self.joins {
            append_condition_args(pass, &join.on, Clause::Join)?;
        }
        append_condition_args(pass, &self.wheres, Clause::Where)?;
        append_condition_args(pass, &self.havings, Clause::Having)
    }

    fn stmt_kind(&self) -> StmtKind {
        StmtKind::Select
    }

    fn build_error(&self) -> Option<&DmlError> {
        self.build_error.as_ref()
    }

    fn is_interpolated(&self) -> bool {
        self.interpolate
    }

    fn build_cache(&self) -> Option<&BuildCache> {
        Some(&self.cache)
    }
}
