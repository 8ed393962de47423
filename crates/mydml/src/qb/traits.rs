//! Trait definitions for statement builders.

use crate::arg::Arguments;
use crate::assemble::{ArgPass, ArgumentAssembler, StmtKind};
use crate::config::ExecContext;
use crate::driver::{ExecResult, Executor};
use crate::error::{DmlError, DmlResult};
use crate::interpolate::render;
use crate::log::{SQL_TARGET, SqlLogger};
use std::sync::OnceLock;

/// Last successful build of a statement, if caching is enabled.
///
/// Cleared by every mutating builder call.
#[derive(Debug, Clone, Default)]
pub struct BuildCache {
    enabled: bool,
    cell: OnceLock<(String, Arguments)>,
}

impl BuildCache {
    pub(crate) fn enable(&mut self) {
        self.enabled = true;
    }

    pub(crate) fn invalidate(&mut self) {
        if self.cell.get().is_some() {
            self.cell = OnceLock::new();
        }
    }

    pub(crate) fn get(&self) -> Option<&(String, Arguments)> {
        if self.enabled { self.cell.get() } else { None }
    }

    pub(crate) fn set(&self, built: &(String, Arguments)) {
        if self.enabled {
            let _ = self.cell.set(built.clone());
        }
    }

    /// True when a build is cached.
    pub fn is_filled(&self) -> bool {
        self.get().is_some()
    }
}

/// Base trait for all statement builders.
///
/// A build is two passes over the same data: [`SqlQb::write_sql`] emits the
/// text with `?` placeholders, [`SqlQb::append_args`] collects the values in
/// the same order. The Nth placeholder binds the Nth scalar value.
pub trait SqlQb: Sync {
    /// Text pass.
    fn write_sql(&self, w: &mut String) -> DmlResult<()>;

    /// Argument pass.
    fn append_args(&self, pass: &mut ArgPass<'_>) -> DmlResult<()>;

    /// Kind reported to assemblers for deferred conditions.
    fn stmt_kind(&self) -> StmtKind;

    /// First error recorded while building.
    fn build_error(&self) -> Option<&DmlError> {
        None
    }

    /// Whether [`SqlQb::to_sql`] renders arguments as literals.
    fn is_interpolated(&self) -> bool {
        false
    }

    fn build_cache(&self) -> Option<&BuildCache> {
        None
    }

    /// Validate builder state before building.
    fn validate(&self) -> DmlResult<()> {
        match self.build_error() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// SQL text with placeholders, regardless of interpolation.
    fn build_sql(&self) -> DmlResult<String> {
        self.validate()?;
        let mut w = String::with_capacity(128);
        self.write_sql(&mut w)?;
        Ok(w)
    }

    /// Arguments in placeholder order. Deferred conditions are filled from
    /// `record`; without a record they stay as staging markers which cannot be
    /// flattened or interpolated.
    fn build_args(&self, record: Option<&dyn ArgumentAssembler>) -> DmlResult<Arguments> {
        self.validate()?;
        let mut pass = ArgPass::new(record, None);
        self.append_args(&mut pass)?;
        pass.finish(self.stmt_kind())
    }

    /// Final SQL and its arguments. With interpolation enabled the arguments
    /// are rendered into the text and the returned list is empty.
    ///
    /// Calling this twice without mutating the builder yields identical output.
    fn to_sql(&self) -> DmlResult<(String, Arguments)> {
        if let Some(built) = self.build_cache().and_then(BuildCache::get) {
            return Ok(built.clone());
        }
        let sql = self.build_sql()?;
        let args = self.build_args(None)?;
        let built = if self.is_interpolated() {
            (render(&sql, &args)?, Arguments::new())
        } else {
            (sql, args)
        };
        tracing::trace!(
            target: SQL_TARGET,
            sql = %built.0,
            arg_count = built.1.len(),
            "statement built"
        );
        if let Some(cache) = self.build_cache() {
            cache.set(&built);
        }
        Ok(built)
    }

    /// Build and execute once.
    fn exec<E: Executor>(
        &self,
        db: &E,
        ctx: &ExecContext,
    ) -> impl std::future::Future<Output = DmlResult<ExecResult>> + Send {
        async move {
            let (sql, args) = self.to_sql()?;
            let args = args.flatten()?;
            SqlLogger::default().statement(ctx, &sql, args.len());
            db.exec(ctx, &sql, &args).await
        }
    }

    /// Prepare the placeholder SQL for repeated execution.
    fn prepare<E: Executor>(
        &self,
        db: &E,
        ctx: &ExecContext,
    ) -> impl std::future::Future<Output = DmlResult<E::Prepared>> + Send {
        async move {
            let sql = self.build_sql()?;
            SqlLogger::default().statement(ctx, &sql, 0);
            db.prepare(ctx, &sql).await
        }
    }
}

/// Statements that can be re-bound to many records: INSERT and UPDATE.
pub trait MutationQb: SqlQb {
    /// Placeholder SQL of the statement bound to a single record.
    fn record_sql(&self) -> DmlResult<String>;

    /// Columns a record supplies values for.
    fn record_columns(&self) -> &[String];

    /// Arguments of the statement bound to `record`. `aliases` rename the
    /// record columns as seen by the assembler.
    fn record_args(
        &self,
        record: &dyn ArgumentAssembler,
        aliases: Option<&[String]>,
    ) -> DmlResult<Arguments> {
        self.validate()?;
        let mut pass = ArgPass::for_record(record, aliases);
        self.append_args(&mut pass)?;
        pass.finish(self.stmt_kind())
    }
}
