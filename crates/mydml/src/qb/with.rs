//! WITH (common table expression) statement builder.

use crate::assemble::{ArgPass, StmtKind};
use crate::error::{DmlError, DmlResult};
use crate::qb::select::SelectQb;
use crate::qb::traits::{BuildCache, SqlQb};
use crate::qb::union::UnionQb;
use crate::quote::{write_name, write_name_list};

/// Query defining a common table expression, or the final statement.
#[derive(Clone, Debug)]
pub enum CteQuery {
    Select(SelectQb),
    Union(UnionQb),
}

impl CteQuery {
    fn write_sql(&self, w: &mut String) -> DmlResult<()> {
        match self {
            CteQuery::Select(s) => s.write_sql(w),
            CteQuery::Union(u) => u.write_sql(w),
        }
    }

    fn append_args(&self, pass: &mut ArgPass<'_>) -> DmlResult<()> {
        match self {
            CteQuery::Select(s) => s.append_args(pass),
            CteQuery::Union(u) => u.append_args(pass),
        }
    }
}

impl From<SelectQb> for CteQuery {
    fn from(s: SelectQb) -> Self {
        CteQuery::Select(s)
    }
}

impl From<UnionQb> for CteQuery {
    fn from(u: UnionQb) -> Self {
        CteQuery::Union(u)
    }
}

#[derive(Clone, Debug)]
struct Cte {
    name: String,
    columns: Vec<String>,
    query: CteQuery,
}

/// WITH builder: named expressions followed by one final statement.
///
/// ```
/// use mydml::{column, qb, SqlQb};
///
/// let (sql, args) = qb::with()
///     .cte("recent", &["id"], qb::select("orders").select_cols(&["id"]).where_(column("age").less().int(7)))
///     .select(qb::select("recent"))
///     .to_sql()?;
/// assert_eq!(
///     sql,
///     "WITH `recent` (`id`) AS (SELECT `id` FROM `orders` WHERE (`age` < ?))\nSELECT * FROM `recent`"
/// );
/// assert_eq!(args.len(), 1);
/// # Ok::<(), mydml::DmlError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct WithQb {
    ctes: Vec<Cte>,
    recursive: bool,
    query: Option<CteQuery>,
    interpolate: bool,
    cache: BuildCache,
}

impl WithQb {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutate(mut self, f: impl FnOnce(&mut Self)) -> Self {
        self.cache.invalidate();
        f(&mut self);
        self
    }

    /// Add `` `name` (`cols`) AS (query) ``. An empty column list omits the
    /// parenthesized list.
    pub fn cte(self, name: &str, columns: &[&str], query: impl Into<CteQuery>) -> Self {
        let query = query.into();
        self.mutate(|s| {
            s.ctes.push(Cte {
                name: name.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                query,
            })
        })
    }

    /// `WITH RECURSIVE`.
    pub fn recursive(self) -> Self {
        self.mutate(|s| s.recursive = true)
    }

    /// Final SELECT.
    pub fn select(self, select: SelectQb) -> Self {
        self.mutate(|s| s.query = Some(CteQuery::Select(select)))
    }

    /// Final UNION.
    pub fn union(self, union: UnionQb) -> Self {
        self.mutate(|s| s.query = Some(CteQuery::Union(union)))
    }

    pub fn interpolate(self) -> Self {
        self.mutate(|s| s.interpolate = true)
    }

    pub fn use_build_cache(self) -> Self {
        self.mutate(|s| s.cache.enable())
    }

    fn final_query(&self) -> DmlResult<&CteQuery> {
        if self.ctes.is_empty() {
            return Err(DmlError::empty("common table expressions"));
        }
        self.query
            .as_ref()
            .ok_or_else(|| DmlError::empty("final statement of WITH"))
    }
}

impl SqlQb for WithQb {
    fn write_sql(&self, w: &mut String) -> DmlResult<()> {
        let query = self.final_query()?;
        w.push_str(if self.recursive {
            "WITH RECURSIVE "
        } else {
            "WITH "
        });
        for (i, cte) in self.ctes.iter().enumerate() {
            if i > 0 {
                w.push_str(",\n");
            }
            write_name(w, &cte.name, false)?;
            if !cte.columns.is_empty() {
                w.push_str(" (");
                write_name_list(w, &cte.columns)?;
                w.push(')');
            }
            w.push_str(" AS (");
            cte.query
                .write_sql(w)
                .map_err(|e| e.context(&format!("cte {:?}", cte.name)))?;
            w.push(')');
        }
        w.push('\n');
        query.write_sql(w)
    }

    fn append_args(&self, pass: &mut ArgPass<'_>) -> DmlResult<()> {
        let query = self.final_query()?;
        for cte in &self.ctes {
            cte.query
                .append_args(pass)
                .map_err(|e| e.context(&format!("cte {:?}", cte.name)))?;
        }
        query.append_args(pass)
    }

    fn stmt_kind(&self) -> StmtKind {
        StmtKind::Select
    }

    fn is_interpolated(&self) -> bool {
        self.interpolate
    }

    fn build_cache(&self) -> Option<&BuildCache> {
        Some(&self.cache)
    }
}
