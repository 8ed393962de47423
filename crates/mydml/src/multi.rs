//! Record-driven bulk execution.
//!
//! [`Multi`] builds an INSERT or UPDATE once and executes it per record, in
//! input order. Without interpolation the statement is prepared once and
//! every record binds fresh arguments; with interpolation each record renders
//! its own literal SQL.
//!
//! Inside a transaction the records run strictly one after another and any
//! failure rolls the whole run back. Outside a transaction up to
//! `concurrency` records are in flight at once. A failure stops scheduling
//! further records, lets the ones in flight finish, and returns every
//! result obtained, keyed by record index, alongside the error.
//!
//! # Example
//! ```ignore
//! use mydml::{column, qb, Multi, TxOptions};
//!
//! let stmt = qb::update("customer_entity")
//!     .add_columns(&["name", "email"])
//!     .where_(column("entity_id").placeholder());
//!
//! let results = Multi::new(stmt)
//!     .transaction(TxOptions::new())
//!     .exec(&pool, &customers)
//!     .await?;
//! ```

use crate::arg::Argument;
use crate::assemble::ArgumentAssembler;
use crate::config::{ExecContext, MultiConfig, TxOptions};
use crate::driver::{ExecResult, Executor, PreparedStatement, Transaction, TxBeginner};
use crate::error::{DmlError, DmlResult};
use crate::interpolate::{count_placeholders, render};
use crate::log::{SQL_TARGET, SqlLogger};
use crate::qb::MutationQb;
use futures_core::Stream;
use futures_util::stream::{self, StreamExt};
use std::future;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;

/// SQL of one record, computed once per run.
struct Plan {
    sql: String,
    placeholders: usize,
    interpolate: bool,
}

/// Executes one statement template per record.
#[derive(Debug, Clone)]
pub struct Multi<S> {
    stmt: S,
    config: MultiConfig,
    aliases: Option<Vec<String>>,
    logger: SqlLogger,
}

impl<S: MutationQb> Multi<S> {
    pub fn new(stmt: S) -> Self {
        Self {
            stmt,
            config: MultiConfig::default(),
            aliases: None,
            logger: SqlLogger::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: MultiConfig) -> Self {
        self.config = config;
        self
    }

    /// Run all records in one transaction.
    pub fn transaction(mut self, opts: TxOptions) -> Self {
        self.config.transaction = Some(opts);
        self
    }

    /// Records in flight at once outside a transaction.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    /// Context forwarded to every driver call.
    pub fn exec_context(mut self, ctx: ExecContext) -> Self {
        self.config.exec = ctx;
        self
    }

    /// Names the assembler sees instead of the statement's record columns,
    /// one per column.
    pub fn alias(mut self, aliases: &[&str]) -> Self {
        self.aliases = Some(aliases.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn logger(mut self, logger: SqlLogger) -> Self {
        self.logger = logger;
        self
    }

    /// The statement template.
    pub fn statement(&self) -> &S {
        &self.stmt
    }

    fn plan(&self) -> DmlResult<Plan> {
        self.stmt.validate()?;
        let columns = self.stmt.record_columns();
        if columns.is_empty() {
            return Err(DmlError::empty("record columns of the bulk statement"));
        }
        if let Some(aliases) = &self.aliases {
            if aliases.len() != columns.len() {
                return Err(DmlError::mismatch(format!(
                    "{} aliases for {} record columns",
                    aliases.len(),
                    columns.len()
                )));
            }
        }
        let sql = self.stmt.record_sql()?;
        Ok(Plan {
            placeholders: count_placeholders(&sql),
            interpolate: self.stmt.is_interpolated(),
            sql,
        })
    }

    /// Execute the statement once per record of a slice.
    pub async fn exec<D, R>(&self, db: &D, records: &[R]) -> DmlResult<Vec<ExecResult>>
    where
        D: Executor + TxBeginner,
        R: ArgumentAssembler,
    {
        if records.is_empty() {
            return Err(DmlError::empty("records"));
        }
        self.exec_stream(db, stream::iter(records)).await
    }

    /// Execute the statement once per record received from `rx`, until the
    /// channel closes.
    pub async fn exec_channel<D, R>(&self, db: &D, rx: mpsc::Receiver<R>) -> DmlResult<Vec<ExecResult>>
    where
        D: Executor + TxBeginner,
        R: ArgumentAssembler,
    {
        let records = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|record| (record, rx))
        });
        self.exec_stream(db, records).await
    }

    /// Execute the statement once per record of a stream. An empty stream
    /// executes nothing and succeeds.
    pub async fn exec_stream<D, St>(&self, db: &D, records: St) -> DmlResult<Vec<ExecResult>>
    where
        D: Executor + TxBeginner,
        St: Stream + Send,
        St::Item: ArgumentAssembler,
    {
        let plan = self.plan()?;
        let ctx = &self.config.exec;
        let started = Instant::now();
        let transactional = self.config.transaction.is_some();

        let outcome = match &self.config.transaction {
            Some(opts) => {
                let tx = db.begin(ctx, opts).await?;
                match self.run(&plan, &tx, records, 1, false).await {
                    Ok(results) => tx.commit().await.map(|()| results),
                    Err(err) => match tx.rollback().await {
                        Ok(()) => Err(err),
                        Err(rollback) => {
                            tracing::warn!(
                                target: SQL_TARGET,
                                tag = ctx.tag_or_dash(),
                                error = %rollback,
                                original = %err,
                                "rollback failed"
                            );
                            Err(DmlError::Rollback {
                                rollback: Box::new(rollback),
                                original: Box::new(err),
                            })
                        }
                    },
                }
            }
            None => {
                let concurrency = self.config.effective_concurrency();
                self.run(&plan, db, records, concurrency, true).await
            }
        };

        tracing::info!(
            target: SQL_TARGET,
            tag = ctx.tag_or_dash(),
            transactional,
            records = outcome.as_ref().map_or(0, Vec::len),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "bulk execution finished"
        );
        outcome
    }

    /// Execute all records against `db`. The first failing record stops
    /// scheduling; records already in flight run to completion and their
    /// results are kept. `keep_partial` decides whether those results travel
    /// with the error.
    async fn run<E, St>(
        &self,
        plan: &Plan,
        db: &E,
        records: St,
        concurrency: usize,
        keep_partial: bool,
    ) -> DmlResult<Vec<ExecResult>>
    where
        E: Executor,
        St: Stream + Send,
        St::Item: ArgumentAssembler,
    {
        let ctx = &self.config.exec;
        let prepared = if plan.interpolate {
            None
        } else {
            Some(db.prepare(ctx, &plan.sql).await?)
        };

        let stopped = AtomicBool::new(false);
        let (done, failure) = {
            let prepared = prepared.as_ref();
            let stopped = &stopped;
            let mut execs = pin!(
                records
                    .enumerate()
                    .take_while(move |_| future::ready(!stopped.load(Ordering::Acquire)))
                    .map(move |(i, record)| async move {
                        // queued behind the failure but not yet started
                        if stopped.load(Ordering::Acquire) {
                            return (i, None);
                        }
                        let result = self.exec_one(plan, db, prepared, &record).await;
                        if result.is_err() {
                            stopped.store(true, Ordering::Release);
                        }
                        (i, Some(result))
                    })
                    .buffered(concurrency.max(1))
            );
            let mut done = Vec::new();
            let mut failure = None;
            while let Some((i, result)) = execs.next().await {
                match result {
                    Some(Ok(r)) => done.push((i, r)),
                    Some(Err(e)) if failure.is_none() => failure = Some((i, e)),
                    Some(Err(e)) => {
                        tracing::debug!(
                            target: SQL_TARGET,
                            record = i,
                            error = %e,
                            "concurrent record failed too"
                        );
                    }
                    None => {}
                }
            }
            (done, failure)
        };

        let closed = match &prepared {
            Some(p) => p.close().await,
            None => Ok(()),
        };
        match failure {
            Some((index, source)) => Err(DmlError::Record {
                index,
                completed: if keep_partial { done } else { Vec::new() },
                source: Box::new(source),
            }),
            None => closed.map(|()| done.into_iter().map(|(_, r)| r).collect()),
        }
    }

    async fn exec_one<E: Executor>(
        &self,
        plan: &Plan,
        db: &E,
        prepared: Option<&E::Prepared>,
        record: &dyn ArgumentAssembler,
    ) -> DmlResult<ExecResult> {
        let ctx = &self.config.exec;
        let args = self.stmt.record_args(record, self.aliases.as_deref())?;
        match prepared {
            Some(p) => {
                let bound: Vec<Argument> = args.flatten()?;
                if bound.len() != plan.placeholders {
                    return Err(DmlError::mismatch(format!(
                        "record bound {} values for {} placeholders",
                        bound.len(),
                        plan.placeholders
                    )));
                }
                self.logger.statement(ctx, &plan.sql, bound.len());
                p.exec(ctx, &bound).await
            }
            None => {
                let sql = render(&plan.sql, &args)?;
                self.logger.statement(ctx, &sql, 0);
                db.exec(ctx, &sql, &[]).await
            }
        }
    }
}
