//! Single and bulk execution against an in-memory driver.

use futures_util::stream;
use mydml::{
    Argument, Arguments, ArgumentAssembler, DmlError, DmlResult, ExecContext, ExecResult,
    Executor, IsolationLevel, Multi, PreparedStatement, SqlQb, StmtPart, Transaction, TxBeginner,
    TxOptions, column, qb,
};
use std::error::Error as _;
use std::future::{Future, ready};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ==================== Mock driver ====================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Begin(TxOptions),
    Prepare(String),
    Exec { sql: String, args: Vec<String> },
    StmtExec(Vec<String>),
    Close,
    Commit,
    Rollback,
}

/// Records every call. Executions fail when an argument (or an interpolated
/// string literal) equals `fail_value`. An execution whose arguments contain a
/// value listed in `delays` sleeps that many milliseconds before it is
/// applied.
#[derive(Clone, Default)]
struct MockDb {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_value: Option<String>,
    fail_rollback: bool,
    delays: Vec<(&'static str, u64)>,
    last_id: Arc<AtomicU64>,
}

impl MockDb {
    fn failing_on(value: &str) -> Self {
        Self {
            fail_value: Some(value.to_string()),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self, args: &[String]) {
        let ms = self
            .delays
            .iter()
            .find(|(value, _)| args.iter().any(|a| a == value))
            .map_or(0, |(_, ms)| *ms);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Argument lists of the executions that reached the database.
    fn applied(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::StmtExec(args) => Some(args),
                _ => None,
            })
            .collect()
    }

    fn run(&self, sql: &str, args: &[String]) -> DmlResult<ExecResult> {
        if let Some(bad) = &self.fail_value {
            if args.contains(bad) || sql.contains(&format!("'{bad}'")) {
                return Err(DmlError::driver(format!("Duplicate entry '{bad}'")));
            }
        }
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: Some(id),
        })
    }
}

fn shown(args: &[Argument]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

impl Executor for MockDb {
    type Prepared = MockStmt;

    fn exec(
        &self,
        _ctx: &ExecContext,
        sql: &str,
        args: &[Argument],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        let args = shown(args);
        let sql = sql.to_string();
        let db = self.clone();
        async move {
            db.pause(&args).await;
            db.log(Call::Exec {
                sql: sql.clone(),
                args: args.clone(),
            });
            db.run(&sql, &args)
        }
    }

    fn prepare(
        &self,
        _ctx: &ExecContext,
        sql: &str,
    ) -> impl Future<Output = DmlResult<MockStmt>> + Send {
        self.log(Call::Prepare(sql.to_string()));
        ready(Ok(MockStmt {
            db: self.clone(),
            sql: sql.to_string(),
        }))
    }
}

impl TxBeginner for MockDb {
    type Tx = MockTx;

    fn begin(
        &self,
        _ctx: &ExecContext,
        opts: &TxOptions,
    ) -> impl Future<Output = DmlResult<MockTx>> + Send {
        self.log(Call::Begin(*opts));
        ready(Ok(MockTx { db: self.clone() }))
    }
}

struct MockStmt {
    db: MockDb,
    sql: String,
}

impl PreparedStatement for MockStmt {
    fn exec(
        &self,
        _ctx: &ExecContext,
        args: &[Argument],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        let args = shown(args);
        let sql = self.sql.clone();
        let db = self.db.clone();
        async move {
            db.pause(&args).await;
            db.log(Call::StmtExec(args.clone()));
            db.run(&sql, &args)
        }
    }

    fn close(&self) -> impl Future<Output = DmlResult<()>> + Send {
        self.db.log(Call::Close);
        ready(Ok(()))
    }
}

struct MockTx {
    db: MockDb,
}

impl Executor for MockTx {
    type Prepared = MockStmt;

    fn exec(
        &self,
        ctx: &ExecContext,
        sql: &str,
        args: &[Argument],
    ) -> impl Future<Output = DmlResult<ExecResult>> + Send {
        self.db.exec(ctx, sql, args)
    }

    fn prepare(
        &self,
        ctx: &ExecContext,
        sql: &str,
    ) -> impl Future<Output = DmlResult<MockStmt>> + Send {
        self.db.prepare(ctx, sql)
    }
}

impl Transaction for MockTx {
    fn commit(self) -> impl Future<Output = DmlResult<()>> + Send {
        self.db.log(Call::Commit);
        ready(Ok(()))
    }

    fn rollback(self) -> impl Future<Output = DmlResult<()>> + Send {
        self.db.log(Call::Rollback);
        ready(if self.db.fail_rollback {
            Err(DmlError::driver("connection lost during rollback"))
        } else {
            Ok(())
        })
    }
}

// ==================== Records ====================

#[derive(Debug, Clone)]
struct Customer {
    id: i64,
    name: &'static str,
    broken: bool,
}

fn customer(id: i64, name: &'static str) -> Customer {
    Customer {
        id,
        name,
        broken: false,
    }
}

impl ArgumentAssembler for Customer {
    fn assemble_arguments(
        &self,
        _part: StmtPart,
        mut args: Arguments,
        columns: &[String],
    ) -> DmlResult<Arguments> {
        if self.broken {
            return Err(DmlError::not_supported(format!(
                "customer {} has no valid name",
                self.id
            )));
        }
        for c in columns {
            match c.as_str() {
                "entity_id" => args.push(self.id),
                "name" | "firstname" => args.push(self.name),
                other => return Err(DmlError::not_supported(format!("unknown column {other}"))),
            }
        }
        Ok(args)
    }
}

fn customers() -> Vec<Customer> {
    vec![customer(1, "Ann"), customer(2, "Bob"), customer(3, "Cid")]
}

fn rename() -> mydml::UpdateQb {
    qb::update("customer_entity")
        .add_columns(&["name"])
        .where_(column("entity_id").placeholder())
}

const RENAME_SQL: &str = "UPDATE `customer_entity` SET `name`=? WHERE (`entity_id` = ?)";

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

// ==================== Single statements ====================

#[tokio::test]
async fn test_exec_flattens_lists() {
    let db = MockDb::default();
    let ctx = ExecContext::new().with_tag("cleanup");
    let res = qb::delete("customer_entity")
        .where_(column("entity_id").in_().ints([4, 5]))
        .exec(&db, &ctx)
        .await
        .unwrap();
    assert_eq!(res.rows_affected, 1);
    assert_eq!(
        db.calls(),
        vec![Call::Exec {
            sql: "DELETE FROM `customer_entity` WHERE (`entity_id` IN (?,?))".into(),
            args: strings(&["4", "5"]),
        }]
    );
}

#[tokio::test]
async fn test_exec_interpolated() {
    let db = MockDb::default();
    qb::update("customer_entity")
        .set("name", "O'Hara")
        .where_(column("entity_id").int(9))
        .interpolate()
        .exec(&db, &ExecContext::new())
        .await
        .unwrap();
    assert_eq!(
        db.calls(),
        vec![Call::Exec {
            sql: "UPDATE `customer_entity` SET `name`='O\\'Hara' WHERE (`entity_id` = 9)".into(),
            args: Vec::new(),
        }]
    );
}

#[tokio::test]
async fn test_exec_rejects_unassembled_placeholder() {
    let db = MockDb::default();
    let err = rename().exec(&db, &ExecContext::new()).await.unwrap_err();
    assert!(err.is_mismatch());
    assert!(db.calls().is_empty());
}

#[tokio::test]
async fn test_prepare_uses_placeholder_sql() {
    let db = MockDb::default();
    let stmt = qb::select("customer_entity")
        .where_(column("email").str("ann@example.com"))
        .interpolate()
        .prepare(&db, &ExecContext::new())
        .await
        .unwrap();
    stmt.exec(&ExecContext::new(), &[Argument::from("bob@example.com")])
        .await
        .unwrap();
    assert_eq!(
        db.calls(),
        vec![
            Call::Prepare("SELECT * FROM `customer_entity` WHERE (`email` = ?)".into()),
            Call::StmtExec(strings(&["bob@example.com"])),
        ]
    );
}

// ==================== Bulk ====================

#[tokio::test]
async fn test_bulk_update_in_transaction() {
    let db = MockDb::default();
    let opts = TxOptions::new().isolation(IsolationLevel::ReadCommitted);
    let results = Multi::new(rename())
        .transaction(opts)
        .exec(&db, &customers())
        .await
        .unwrap();
    let ids: Vec<_> = results.iter().map(|r| r.last_insert_id).collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(
        db.calls(),
        vec![
            Call::Begin(opts),
            Call::Prepare(RENAME_SQL.into()),
            Call::StmtExec(strings(&["Ann", "1"])),
            Call::StmtExec(strings(&["Bob", "2"])),
            Call::StmtExec(strings(&["Cid", "3"])),
            Call::Close,
            Call::Commit,
        ]
    );
}

#[tokio::test]
async fn test_bulk_assembler_error_rolls_back() {
    let db = MockDb::default();
    let mut records = customers();
    records[2].broken = true;
    let err = Multi::new(rename())
        .transaction(TxOptions::new())
        .exec(&db, &records)
        .await
        .unwrap_err();

    assert_eq!(err.record_index(), Some(2));
    assert!(err.to_string().contains("record 2"), "{err}");
    assert!(err.completed().is_empty());
    let calls = db.calls();
    assert!(!calls.contains(&Call::Commit));
    assert_eq!(calls.last(), Some(&Call::Rollback));
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, Call::StmtExec(_)))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_bulk_rollback_failure_wins() {
    let db = MockDb {
        fail_rollback: true,
        ..MockDb::failing_on("Bob")
    };
    let err = Multi::new(rename())
        .transaction(TxOptions::new())
        .exec(&db, &customers())
        .await
        .unwrap_err();

    assert!(matches!(err, DmlError::Rollback { .. }));
    assert!(err.to_string().starts_with("rollback failed"), "{err}");
    assert_eq!(err.record_index(), Some(1));
    let original = err.source().map(ToString::to_string).unwrap_or_default();
    assert!(original.contains("record 1"), "{original}");
    assert!(original.contains("Duplicate entry"), "{original}");
}

#[tokio::test]
async fn test_bulk_without_transaction_keeps_partial_results() {
    let db = MockDb::failing_on("Cid");
    let mut records = customers();
    records.push(customer(4, "Dee"));
    let err = Multi::new(rename())
        .concurrency(4)
        .exec(&db, &records)
        .await
        .unwrap_err();

    assert_eq!(err.record_index(), Some(2));
    let indexes: Vec<usize> = err.completed().iter().map(|(i, _)| *i).collect();
    assert_eq!(&indexes[..2], &[0, 1]);
    // every successful execution is reported, the failing one is not
    assert_eq!(indexes.len(), db.applied().len() - 1);
    let calls = db.calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::Begin(_))));
    assert!(calls.contains(&Call::Close));
}

#[tokio::test]
async fn test_bulk_reports_records_finishing_after_the_failure() {
    let db = MockDb {
        delays: vec![("Ann", 5), ("Bob", 20), ("Cid", 5), ("Dee", 5)],
        ..MockDb::failing_on("Bob")
    };
    let mut records = customers();
    records.push(customer(4, "Dee"));
    let err = Multi::new(rename())
        .concurrency(4)
        .exec(&db, &records)
        .await
        .unwrap_err();

    assert_eq!(err.record_index(), Some(1));
    let indexes: Vec<usize> = err.completed().iter().map(|(i, _)| *i).collect();
    assert_eq!(indexes, vec![0, 2, 3]);
    let mut applied: Vec<String> = db.applied().into_iter().map(|a| a[0].clone()).collect();
    applied.sort();
    assert_eq!(applied, strings(&["Ann", "Bob", "Cid", "Dee"]));
}

#[tokio::test]
async fn test_bulk_failure_stops_scheduling() {
    let db = MockDb {
        delays: vec![("Ann", 10)],
        ..MockDb::failing_on("Bob")
    };
    let mut records = customers();
    records.push(customer(4, "Dee"));
    let err = Multi::new(rename())
        .concurrency(2)
        .exec(&db, &records)
        .await
        .unwrap_err();

    assert_eq!(err.record_index(), Some(1));
    let indexes: Vec<usize> = err.completed().iter().map(|(i, _)| *i).collect();
    assert_eq!(indexes, vec![0]);
    let applied: Vec<String> = db.applied().into_iter().map(|a| a[0].clone()).collect();
    assert_eq!(applied, strings(&["Bob", "Ann"]));
    assert_eq!(db.calls().last(), Some(&Call::Close));
}

#[tokio::test]
async fn test_bulk_from_channel() {
    let db = MockDb::default();
    let (tx, rx) = mpsc::channel(2);
    let producer = tokio::spawn(async move {
        for c in customers() {
            if tx.send(c).await.is_err() {
                break;
            }
        }
    });
    let results = Multi::new(rename())
        .transaction(TxOptions::new())
        .exec_channel(&db, rx)
        .await
        .unwrap();
    producer.await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(db.calls().contains(&Call::Commit));
}

#[tokio::test]
async fn test_bulk_interpolated_renders_per_record() {
    let db = MockDb::default();
    Multi::new(rename().interpolate())
        .exec(&db, &customers()[..2])
        .await
        .unwrap();
    assert_eq!(
        db.calls(),
        vec![
            Call::Exec {
                sql: "UPDATE `customer_entity` SET `name`='Ann' WHERE (`entity_id` = 1)".into(),
                args: Vec::new(),
            },
            Call::Exec {
                sql: "UPDATE `customer_entity` SET `name`='Bob' WHERE (`entity_id` = 2)".into(),
                args: Vec::new(),
            },
        ]
    );
}

#[tokio::test]
async fn test_bulk_insert() {
    let db = MockDb::default();
    let ins = qb::insert("customer_entity").columns(&["entity_id", "name"]);
    Multi::new(ins).exec(&db, &customers()).await.unwrap();
    let calls = db.calls();
    assert_eq!(
        calls[0],
        Call::Prepare("INSERT INTO `customer_entity` (`entity_id`,`name`) VALUES (?,?)".into())
    );
    assert_eq!(calls[3], Call::StmtExec(strings(&["3", "Cid"])));
}

#[tokio::test]
async fn test_bulk_alias() {
    let db = MockDb::default();
    Multi::new(rename())
        .alias(&["firstname"])
        .exec(&db, &customers()[..1])
        .await
        .unwrap();
    assert!(db.calls().contains(&Call::StmtExec(strings(&["Ann", "1"]))));

    let err = Multi::new(rename())
        .alias(&["firstname", "lastname"])
        .exec(&db, &customers())
        .await
        .unwrap_err();
    assert!(err.is_mismatch());
}

#[tokio::test]
async fn test_bulk_empty_input() {
    let db = MockDb::default();
    let none: Vec<Customer> = Vec::new();
    let err = Multi::new(rename()).exec(&db, &none).await.unwrap_err();
    assert!(err.is_empty_input());
    assert!(db.calls().is_empty());

    let results = Multi::new(rename())
        .exec_stream(&db, stream::iter(none))
        .await
        .unwrap();
    assert!(results.is_empty());

    let err = Multi::new(qb::update("t").set("a", 1))
        .exec(&db, &customers())
        .await
        .unwrap_err();
    assert!(err.is_empty_input());
}
