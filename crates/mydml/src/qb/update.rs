//! UPDATE statement builder.

use crate::arg::{Argument, Arguments};
use crate::assemble::{ArgPass, PartKind, StmtKind, StmtPart};
use crate::condition::{Clause, Condition, append_condition_args, write_conditions};
use crate::error::{DmlError, DmlResult};
use crate::interpolate::write_template;
use crate::qb::traits::{BuildCache, MutationQb, SqlQb};
use crate::qb::{Term, write_limit, write_terms};
use crate::quote::{write_alias, write_name};

#[derive(Debug, Clone)]
enum SetValue {
    Arg(Argument),
    Expr(Condition),
}

/// UPDATE builder.
///
/// Columns registered with [`UpdateQb::add_columns`] receive their values
/// from a record and come first in the SET list, followed by the explicit
/// assignments in call order.
#[derive(Clone, Debug)]
pub struct UpdateQb {
    table: String,
    alias: Option<String>,
    /// Columns whose values come from a record
    record_columns: Vec<String>,
    sets: Vec<(String, SetValue)>,
    wheres: Vec<Condition>,
    order_by: Vec<Term>,
    limit: Option<u64>,
    raw: Option<(String, Arguments)>,
    interpolate: bool,
    cache: BuildCache,
    build_error: Option<DmlError>,
}

impl UpdateQb {
    /// Create a new UPDATE builder.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            alias: None,
            record_columns: Vec::new(),
            sets: Vec::new(),
            wheres: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            raw: None,
            interpolate: false,
            cache: BuildCache::default(),
            build_error: None,
        }
    }

    /// A statement from caller supplied SQL and arguments, see
    /// [`SelectQb::raw`](crate::SelectQb::raw).
    pub fn raw(sql: &str, args: Arguments) -> Self {
        let mut u = Self::new("");
        u.raw = Some((sql.to_string(), args));
        u
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

    pub fn alias(self, alias: &str) -> Self {
        self.mutate(|s| {
            s.alias = Some(alias.to_string());
            Ok(())
        })
    }

    /// `` `col`=? ``
    pub fn set(self, col: &str, value: impl Into<Argument>) -> Self {
        let value = value.into();
        self.mutate(|s| {
            s.structured("SET")?;
            if value.is_list() {
                return Err(DmlError::not_supported(format!(
                    "list {value} assigned to {col:?}"
                )));
            }
            s.sets.push((col.to_string(), SetValue::Arg(value)));
            Ok(())
        })
    }

    /// `` `col`=<expression> ``, e.g. a [`sql_case`](crate::sql_case).
    pub fn set_expr(self, col: &str, expr: Condition) -> Self {
        self.mutate(|s| {
            s.structured("SET")?;
            expr.check_projection()?;
            s.sets.push((col.to_string(), SetValue::Expr(expr)));
            Ok(())
        })
    }

    /// Register columns whose values each record supplies.
    pub fn add_columns(self, cols: &[&str]) -> Self {
        self.mutate(|s| {
            s.structured("SET")?;
            s.record_columns.extend(cols.iter().map(|c| c.to_string()));
            Ok(())
        })
    }

    pub fn where_(self, cond: Condition) -> Self {
        self.where_all([cond])
    }

    pub fn where_all(self, conds: impl IntoIterator<Item = Condition>) -> Self {
        self.mutate(|s| {
            s.structured("WHERE")?;
            s.wheres.extend(conds);
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

    pub fn limit(self, n: u64) -> Self {
        self.mutate(|s| {
            s.structured("LIMIT")?;
            s.limit = Some(n);
            Ok(())
        })
    }

    pub fn interpolate(self) -> Self {
        self.mutate(|s| {
            s.interpolate = true;
            Ok(())
        })
    }

    pub fn use_build_cache(self) -> Self {
        self.mutate(|s| {
            s.cache.enable();
            Ok(())
        })
    }
}

impl SqlQb for UpdateQb {
    fn write_sql(&self, w: &mut String) -> DmlResult<()> {
        if let Some(e) = &self.build_error {
            return Err(e.clone());
        }
        if let Some((sql, args)) = &self.raw {
            return write_template(w, sql, args);
        }
        if self.table.is_empty() {
            return Err(DmlError::empty("update table"));
        }
        if self.record_columns.is_empty() && self.sets.is_empty() {
            return Err(DmlError::empty("update columns"));
        }

        w.push_str("UPDATE ");
        write_name(w, &self.table, false)?;
        write_alias(w, self.alias.as_deref())?;
        w.push_str(" SET ");
        let mut first = true;
        for col in &self.record_columns {
            if !first {
                w.push_str(", ");
            }
            first = false;
            write_name(w, col, false)?;
            w.push_str("=?");
        }
        for (col, value) in &self.sets {
            if !first {
                w.push_str(", ");
            }
            first = false;
            write_name(w, col, false)?;
            w.push('=');
            match value {
                SetValue::Arg(_) => w.push('?'),
                SetValue::Expr(c) => c.write_body(w)?,
            }
        }
        write_conditions(w, &self.wheres, Clause::Where)?;
        write_terms(w, " ORDER BY ", &self.order_by, false)?;
        write_limit(w, self.limit, None);
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
        pass.assemble_in_place(
            StmtPart::new(StmtKind::Update, PartKind::Set),
            &self.record_columns,
        )?;
        for (_, value) in &self.sets {
            match value {
                SetValue::Arg(v) => pass.push(v.clone()),
                SetValue::Expr(c) => c.append_args(pass)?,
            }
        }
        append_condition_args(pass, &self.wheres, Clause::Where)
    }

    fn stmt_kind(&self) -> StmtKind {
        StmtKind::Update
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

impl MutationQb for UpdateQb {
    fn record_sql(&self) -> DmlResult<String> {
        self.build_sql()
    }

    fn record_columns(&self) -> &[String] {
        &self.record_columns
    }
}
