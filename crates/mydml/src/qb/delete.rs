//! DELETE statement builder.

use crate::assemble::{ArgPass, StmtKind};
use crate::condition::{Clause, Condition, append_condition_args, write_conditions};
use crate::error::{DmlError, DmlResult};
use crate::qb::traits::{BuildCache, SqlQb};
use crate::qb::{Term, write_limit, write_terms};
use crate::quote::{write_alias, write_name};

/// DELETE builder.
#[derive(Clone, Debug)]
pub struct DeleteQb {
    table: String,
    alias: Option<String>,
    wheres: Vec<Condition>,
    order_by: Vec<Term>,
    limit: Option<u64>,
    interpolate: bool,
    cache: BuildCache,
}

impl DeleteQb {
    /// Create a new DELETE builder.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            alias: None,
            wheres: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            interpolate: false,
            cache: BuildCache::default(),
        }
    }

    fn mutate(mut self, f: impl FnOnce(&mut Self)) -> Self {
        self.cache.invalidate();
        f(&mut self);
        self
    }

    pub fn alias(self, alias: &str) -> Self {
        self.mutate(|s| s.alias = Some(alias.to_string()))
    }

    pub fn where_(self, cond: Condition) -> Self {
        self.mutate(|s| s.wheres.push(cond))
    }

    pub fn where_all(self, conds: impl IntoIterator<Item = Condition>) -> Self {
        self.mutate(|s| s.wheres.extend(conds))
    }

    pub fn order_by(self, col: &str) -> Self {
        self.mutate(|s| s.order_by.push(Term::asc(col)))
    }

    pub fn order_by_desc(self, col: &str) -> Self {
        self.mutate(|s| s.order_by.push(Term::desc(col)))
    }

    pub fn limit(self, n: u64) -> Self {
        self.mutate(|s| s.limit = Some(n))
    }

    pub fn interpolate(self) -> Self {
        self.mutate(|s| s.interpolate = true)
    }

    pub fn use_build_cache(self) -> Self {
        self.mutate(|s| s.cache.enable())
    }
}

impl SqlQb for DeleteQb {
    fn write_sql(&self, w: &mut String) -> DmlResult<()> {
        if self.table.is_empty() {
            return Err(DmlError::empty("delete table"));
        }
        w.push_str("DELETE FROM ");
        write_name(w, &self.table, false)?;
        write_alias(w, self.alias.as_deref())?;
        write_conditions(w, &self.wheres, Clause::Where)?;
        write_terms(w, " ORDER BY ", &self.order_by, false)?;
        write_limit(w, self.limit, None);
        Ok(())
    }

    fn append_args(&self, pass: &mut ArgPass<'_>) -> DmlResult<()> {
        append_condition_args(pass, &self.wheres, Clause::Where)
    }

    fn stmt_kind(&self) -> StmtKind {
        StmtKind::Delete
    }

    fn is_interpolated(&self) -> bool {
        self.interpolate
    }

    fn build_cache(&self) -> Option<&BuildCache> {
        Some(&self.cache)
    }
}
