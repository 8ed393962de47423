//! Driver collaborator contract.
//!
//! The crate never opens a connection. Whatever talks to the server
//! implements these traits; the builders and the bulk runner only hand it SQL
//! text, scalar arguments and an [`ExecContext`].

use crate::arg::Argument;
use crate::config::{ExecContext, TxOptions};
use crate::error::DmlResult;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Outcome of executing one statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// `LAST_INSERT_ID()` if the statement generated one.
    pub last_insert_id: Option<u64>,
}

/// Something that can execute and prepare statements: a connection, a pool
/// or a transaction.
///
/// `args` are always scalar (lists flattened, one entry per `?`).
pub trait Executor: Send + Sync {
    /// Prepared statement handle returned by [`Executor::prepare`].
    type Prepared: PreparedStatement;

    /// Execute `sql` once with bound arguments.
    fn exec(
        &self,
        ctx: &ExecContext,
        sql: &str,
        args: &[Argument],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send;

    /// Prepare `sql` for repeated execution.
    fn prepare(
        &self,
        ctx: &ExecContext,
        sql: &str,
    ) -> impl Future<Output = DmlResult<Self::Prepared>> + Send;
}

/// A prepared statement.
pub trait PreparedStatement: Send + Sync {
    /// Execute with fresh arguments.
    fn exec(
        &self,
        ctx: &ExecContext,
        args: &[Argument],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send;

    /// Release server-side resources. The default does nothing.
    fn close(&self) -> impl Future<Output = DmlResult<()>> + Send {
        async { Ok(()) }
    }
}

/// Something that can begin a transaction.
pub trait TxBeginner: Send + Sync {
    type Tx: Transaction;

    fn begin(
        &self,
        ctx: &ExecContext,
        opts: &TxOptions,
    ) -> impl Future<Output = DmlResult<Self::Tx>> + Send;
}

/// An open transaction bound to one connection.
pub trait Transaction: Executor + Sized {
    fn commit(self) -> impl Future<Output = DmlResult<()>> + Send;

    fn rollback(self) -> impl Future<Output = DmlResult<()>> + Send;
}
