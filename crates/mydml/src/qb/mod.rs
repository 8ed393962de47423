//! Statement builders for MySQL DML.
//!
//! Every builder is a consuming fluent value. A failing call records the
//! first error and turns all later mutations into no-ops; the error surfaces
//! when the statement is built or executed.
//!
//! # Features
//!
//! - **Two-pass build**: text with `?` placeholders, then the arguments in
//!   exactly the same order, nested sub-selects included
//! - **Record binding**: deferred values supplied per record by an
//!   [`ArgumentAssembler`](crate::ArgumentAssembler), see [`Multi`](crate::Multi)
//! - **Interpolation**: optional literal rendering for non-prepared execution
//! - **Build cache**: opt-in memo of the last build, cleared on mutation
//!
//! # Usage
//!
//! ```
//! use mydml::{column, qb, SqlQb};
//!
//! let (sql, args) = qb::select("users")
//!     .select_cols(&["id", "name"])
//!     .where_(column("status").str("active"))
//!     .order_by_desc("created_at")
//!     .limit(20)
//!     .to_sql()?;
//! assert_eq!(
//!     sql,
//!     "SELECT `id`, `name` FROM `users` WHERE (`status` = ?) ORDER BY `created_at` DESC LIMIT 20"
//! );
//! assert_eq!(args.len(), 1);
//!
//! let (sql, _) = qb::delete("users").where_(column("id").int(7)).to_sql()?;
//! assert_eq!(sql, "DELETE FROM `users` WHERE (`id` = ?)");
//! # Ok::<(), mydml::DmlError>(())
//! ```

mod delete;
mod insert;
mod select;
mod traits;
mod union;
mod update;
mod with;


pub use delete::DeleteQb;
pub use insert::{InsertQb, OnDuplicate};
pub use select::{JoinKind, SelectQb};
pub use traits::{BuildCache, MutationQb, SqlQb};
pub use union::UnionQb;
pub use update::UpdateQb;
pub use with::{CteQuery, WithQb};

use crate::error::DmlResult;
use crate::quote::write_name;
use std::fmt::Write as _;

/// Create a SELECT builder for the given table.
pub fn select(table: &str) -> SelectQb {
    SelectQb::new(table)
}

/// Create an INSERT builder for the given table.
pub fn insert(table: &str) -> InsertQb {
    InsertQb::new(table)
}

/// Create an UPDATE builder for the given table.
pub fn update(table: &str) -> UpdateQb {
    UpdateQb::new(table)
}

/// Create a DELETE builder for the given table.
pub fn delete(table: &str) -> DeleteQb {
    DeleteQb::new(table)
}

/// Combine SELECT statements with `UNION` (or `UNION ALL`, see
/// [`UnionQb::all`]).
pub fn union(selects: impl IntoIterator<Item = SelectQb>) -> UnionQb {
    UnionQb::new(selects)
}

/// Start a `WITH` statement.
pub fn with() -> WithQb {
    WithQb::new()
}

/// One ORDER BY or GROUP BY entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Term {
    Name { name: String, desc: bool },
    Raw(String),
}

impl Term {
    pub(crate) fn asc(name: &str) -> Self {
        Term::Name {
            name: name.to_string(),
            desc: false,
        }
    }

    pub(crate) fn desc(name: &str) -> Self {
        Term::Name {
            name: name.to_string(),
            desc: true,
        }
    }
}

/// Write `keyword` followed by the comma separated terms. Nothing when empty.
pub(crate) fn write_terms(
    w: &mut String,
    keyword: &str,
    terms: &[Term],
    raw_ok: bool,
) -> DmlResult<()> {
    if terms.is_empty() {
        return Ok(());
    }
    w.push_str(keyword);
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            w.push_str(", ");
        }
        match term {
            Term::Name { name, desc } => {
                write_name(w, name, raw_ok)?;
                if *desc {
                    w.push_str(" DESC");
                }
            }
            Term::Raw(sql) => w.push_str(sql),
        }
    }
    Ok(())
}

/// `LIMIT n`, then `OFFSET m` when a limit is set.
pub(crate) fn write_limit(w: &mut String, limit: Option<u64>, offset: Option<u64>) {
    if let Some(limit) = limit {
        let _ = write!(w, " LIMIT {limit}");
        if let Some(offset) = offset {
            let _ = write!(w, " OFFSET {offset}");
        }
    }
}
