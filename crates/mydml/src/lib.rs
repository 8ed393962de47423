//! # mydml
//!
//! A MySQL statement builder producing placeholder SQL plus its arguments.
//!
//! ## Features
//!
//! - **Placeholder/argument isomorphism**: the Nth `?` always binds the Nth value,
//!   across sub-selects, derived tables, unions and CTEs
//! - **Backtick quoting**: every identifier is quoted unless explicitly raw
//! - **Sticky errors**: builder calls never panic; the first error surfaces at build time
//! - **Interpolation**: escaped literal SQL for non-prepared execution
//! - **Record binding**: values supplied per record by an [`ArgumentAssembler`],
//!   including deferred WHERE values swapped into place after assembly
//! - **Bulk execution**: [`Multi`] runs one statement per record, optionally in a transaction
//! - **Driver agnostic**: execution goes through the [`Executor`] family of traits
//!
//! ## Query Builder (qb)
//!
//! ```
//! use mydml::{column, qb, SqlQb};
//!
//! // SELECT
//! let (sql, args) = qb::select("tableA")
//!     .select_cols(&["a", "b"])
//!     .where_(column("a").like().str("b'%"))
//!     .where_(column("b").in_().ints([3, 4, 5, 6]))
//!     .to_sql()?;
//! assert_eq!(sql, "SELECT `a`, `b` FROM `tableA` WHERE (`a` LIKE ?) AND (`b` IN (?,?,?,?))");
//! assert_eq!(args.to_string(), "[b'% 3 4 5 6]");
//!
//! // DELETE, interpolated
//! let (sql, _) = qb::delete("tableA")
//!     .where_(column("a").like().str("b'%"))
//!     .order_by("id")
//!     .limit(1)
//!     .interpolate()
//!     .to_sql()?;
//! assert_eq!(sql, r"DELETE FROM `tableA` WHERE (`a` LIKE 'b\'%') ORDER BY `id` LIMIT 1");
//! # Ok::<(), mydml::DmlError>(())
//! ```

pub mod arg;
pub mod assemble;
pub mod condition;
pub mod config;
pub mod driver;
pub mod error;
pub mod interpolate;
pub mod log;
pub mod multi;
pub mod op;
pub mod qb;
pub mod quote;

pub use arg::{Argument, Arguments, DriverValue};
pub use assemble::{ArgPass, ArgumentAssembler, PartKind, StmtKind, StmtPart, backfill};
pub use condition::{
    Condition, Logical, column, expr, paren_close, paren_open, sql_case, sql_if, sql_if_null,
    sub_select, using,
};
pub use config::{ExecContext, IsolationLevel, MultiConfig, TxOptions};
pub use driver::{ExecResult, Executor, PreparedStatement, Transaction, TxBeginner};
pub use error::{DmlError, DmlResult};
pub use interpolate::{
    Interpolate, count_placeholders, escape_string, interpolate, render, repeat, write_literal,
};
pub use log::{SQL_TARGET, SqlLogger};
pub use multi::Multi;
pub use op::Op;
pub use quote::{Ident, IdentPart, quote};

// Re-export qb module for easy access
pub use qb::{
    BuildCache, CteQuery, DeleteQb, InsertQb, JoinKind, MutationQb, OnDuplicate, SelectQb, SqlQb,
    UnionQb, UpdateQb, WithQb, delete, insert, select, union, update, with,
};
