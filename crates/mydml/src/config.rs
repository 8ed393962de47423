//! Execution, transaction and bulk-run configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Per-call execution context forwarded verbatim to the driver.
///
/// The builders perform no I/O, so the timeout means nothing to them; it is
/// the driver's job to honour it (and to report [`DmlError::Timeout`]).
///
/// [`DmlError::Timeout`]: crate::DmlError::Timeout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecContext {
    /// Timeout for the call. `None` means no timeout (default).
    pub timeout: Option<Duration>,
    /// Observability tag attached to log events.
    pub tag: Option<String>,
}

impl ExecContext {
    /// Create a context without timeout or tag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub(crate) fn tag_or_dash(&self) -> &str {
        self.tag.as_deref().unwrap_or("-")
    }
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    /// The InnoDB default.
    #[default]
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The SQL keywords, as used in `SET TRANSACTION ISOLATION LEVEL ...`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Options for beginning a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = level;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Configuration of a record-driven bulk run.
///
/// ```
/// use mydml::{IsolationLevel, MultiConfig, TxOptions};
///
/// let cfg: MultiConfig = serde_json::from_str(
///     r#"{"transaction":{"isolation":"serializable"},"concurrency":4}"#,
/// ).unwrap();
/// assert_eq!(cfg.transaction.unwrap().isolation, IsolationLevel::Serializable);
/// assert_eq!(cfg.concurrency, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiConfig {
    /// Wrap all records in one transaction. Forces serial execution.
    pub transaction: Option<TxOptions>,
    /// Maximum records in flight outside a transaction. Values below 1 mean 1.
    pub concurrency: usize,
    /// Context used for every statement of the run.
    pub exec: ExecContext,
}

impl Default for MultiConfig {
    fn default() -> Self {
        Self {
            transaction: None,
            concurrency: 1,
            exec: ExecContext::default(),
        }
    }
}

impl MultiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run all records inside one transaction.
    pub fn with_transaction(mut self, opts: TxOptions) -> Self {
        self.transaction = Some(opts);
        self
    }

    /// Allow up to `n` records in flight when not transactional.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_exec(mut self, exec: ExecContext) -> Self {
        self.exec = exec;
        self
    }

    /// Effective concurrency: 1 inside a transaction.
    pub(crate) fn effective_concurrency(&self) -> usize {
        if self.transaction.is_some() {
            1
        } else {
            self.concurrency.max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_forces_serial() {
        let cfg = MultiConfig::new().with_concurrency(8);
        assert_eq!(cfg.effective_concurrency(), 8);
        let cfg = cfg.with_transaction(TxOptions::new());
        assert_eq!(cfg.effective_concurrency(), 1);
        assert_eq!(MultiConfig::new().with_concurrency(0).effective_concurrency(), 1);
    }

    #[test]
    fn test_isolation_sql() {
        assert_eq!(IsolationLevel::default().as_sql(), "REPEATABLE READ");
        assert_eq!(IsolationLevel::ReadCommitted.to_string(), "READ COMMITTED");
    }

    #[test]
    fn test_exec_context_roundtrips_through_json() {
        let ctx = ExecContext::new()
            .with_timeout(Duration::from_secs(3))
            .with_tag("nightly-reindex");
        let json = serde_json::to_string(&ctx).unwrap();
        let back: ExecContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
        let empty: ExecContext = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ExecContext::default());
    }
}
