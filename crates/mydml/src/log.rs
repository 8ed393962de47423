//! `tracing` output for executed statements.

use crate::config::ExecContext;
use std::borrow::Cow;
use tracing::Level;

/// Target of every SQL event emitted by this crate.
pub const SQL_TARGET: &str = "mydml.sql";

/// Emits the SQL that is about to run as a `tracing` event.
///
/// Statement text longer than the byte budget is cut at the last char
/// boundary inside the budget and suffixed with `...`.
#[derive(Debug, Clone)]
pub struct SqlLogger {
    level: Level,
    sql_bytes: Option<usize>,
}

impl Default for SqlLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            sql_bytes: Some(200),
        }
    }
}

impl SqlLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit statement events at `level` instead of DEBUG.
    pub fn at(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Keep at most `bytes` bytes of statement text per event.
    pub fn limit_bytes(mut self, bytes: usize) -> Self {
        self.sql_bytes = Some(bytes);
        self
    }

    /// Log statement text in full.
    pub fn full_sql(mut self) -> Self {
        self.sql_bytes = None;
        self
    }

    fn clip<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        let Some(budget) = self.sql_bytes.filter(|b| sql.len() > *b) else {
            return Cow::Borrowed(sql);
        };
        let end = (0..=budget).rev().find(|i| sql.is_char_boundary(*i)).unwrap_or(0);
        Cow::Owned(format!("{}...", &sql[..end]))
    }

    /// Log one statement execution.
    pub fn statement(&self, ctx: &ExecContext, sql: &str, arg_count: usize) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN => tracing::warn!($($field)*),
                    Level::INFO => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    _ => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.clip(sql);
        emit_at_level!(
            self.level,
            target: SQL_TARGET,
            tag = ctx.tag_or_dash(),
            arg_count,
            sql = %sql,
        );
    }
}
