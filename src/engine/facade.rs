//! The query facade: compiles descriptors, runs them through the pool,
//! and shapes the results.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value as Json;
use sqlx::any::{Any, AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Column as _, Row as _};
use tokio::sync::Mutex;
use tracing::debug;

use crate::ast::columns::Projection;
use crate::ast::conditions::Criteria;
use crate::ast::joins::JoinSpec;
use crate::ast::raw::RawFragment;
use crate::ast::values::{Record, Value};
use crate::error::{QuarryError, Result};
use crate::shaper::{self, Row};
use crate::transpiler::dml::{
    build_aggregate, build_delete, build_exists, build_insert, build_replace, build_select,
    build_update, Replacement,
};
use crate::transpiler::{interpolate, positional, Compiler, Dialect};

use super::pool::{Pool, PoolConfig, PooledConnection};
use super::transaction::Transaction;

/// Retained statement-log depth while logging is enabled.
const LOG_CAPACITY: usize = 32;

/// Driver error captured from a failed prepare/execute, inspectable
/// after the call returned its empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Five-character SQLSTATE, when the driver reports one.
    pub sql_state: Option<String>,
    pub driver_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
struct LogEntry {
    sql: String,
    params: Vec<(String, Value)>,
}

/// Per-facade mutable state: the held transaction connection, the
/// statement log, and the introspection toggles.
struct Session {
    tx: Option<PooledConnection>,
    logs: VecDeque<LogEntry>,
    logging: bool,
    debug_once: bool,
    error: Option<ErrorInfo>,
}

struct DbInner {
    pool: Pool,
    dialect: Dialect,
    prefix: String,
    session: Mutex<Session>,
}

/// How a statement's result is consumed.
enum Fetch {
    Rows,
    Affected,
}

/// What a statement produced.
enum Outcome {
    /// Debug mode swallowed the statement; nothing ran.
    Skipped,
    Rows(Vec<Row>),
    Affected { rows: u64, last_insert_id: Option<i64> },
}

/// Handle to one database. Cheap to clone; clones share the pool,
/// the statement log, and any active transaction.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

impl Db {
    /// Open a facade over a fresh pool. No connection is dialed yet.
    pub fn open(config: PoolConfig) -> Result<Self> {
        let dialect = config.dialect;
        Ok(Self::from_pool(Pool::new(config)?, dialect, ""))
    }

    pub fn open_prefixed(config: PoolConfig, prefix: impl Into<String>) -> Result<Self> {
        let dialect = config.dialect;
        Ok(Self::from_pool(Pool::new(config)?, dialect, prefix))
    }

    /// Build a facade over an already-registered pool.
    pub fn from_pool(pool: Pool, dialect: Dialect, prefix: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(DbInner {
                pool,
                dialect,
                prefix: prefix.into(),
                session: Mutex::new(Session {
                    tx: None,
                    logs: VecDeque::new(),
                    logging: false,
                    debug_once: false,
                    error: None,
                }),
            }),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    pub fn pool(&self) -> &Pool {
        &self.inner.pool
    }

    fn compiler(&self) -> Compiler {
        Compiler::new(self.inner.dialect, self.inner.prefix.clone())
    }

    /// Fetch rows shaped by the projection. A `Grouped` projection
    /// returns an object keyed by the root column, otherwise an array.
    pub async fn select(
        &self,
        table: &str,
        joins: Option<&JoinSpec>,
        columns: &Projection,
        criteria: Option<&Criteria>,
    ) -> Result<Json> {
        let mut c = self.compiler();
        let sql = build_select(&mut c, table, joins, columns, criteria)?;
        let rows = self.fetch_rows(sql, c.params.into_vec()).await?;
        shaper::shape_rows(columns, rows)
    }

    /// Fetch a single shaped row (forces LIMIT 1). A single plain column
    /// projection collapses to the bare value.
    pub async fn get(
        &self,
        table: &str,
        joins: Option<&JoinSpec>,
        columns: &Projection,
        criteria: Option<&Criteria>,
    ) -> Result<Option<Json>> {
        let mut limited = criteria.cloned().unwrap_or_default();
        limited.limit = Some(crate::ast::conditions::Limit {
            count: 1,
            offset: limited.limit.and_then(|l| l.offset),
        });
        let mut c = self.compiler();
        let sql = build_select(&mut c, table, joins, columns, Some(&limited))?;
        let rows = self.fetch_rows(sql, c.params.into_vec()).await?;
        match rows.first() {
            Some(row) => Ok(Some(shaper::shape_row(columns, row)?)),
            None => Ok(None),
        }
    }

    /// Insert one or more rows; returns the backend-reported last insert
    /// id when there is one.
    pub async fn insert(&self, table: &str, rows: &[Record]) -> Result<Option<i64>> {
        let mut c = self.compiler();
        let sql = build_insert(&mut c, table, rows)?;
        let (_, last_insert_id) = self.run_affected(sql, c.params.into_vec()).await?;
        Ok(last_insert_id)
    }

    /// Update matching rows; returns the affected-row count.
    pub async fn update(
        &self,
        table: &str,
        data: &Record,
        criteria: Option<&Criteria>,
    ) -> Result<u64> {
        let mut c = self.compiler();
        let sql = build_update(&mut c, table, data, criteria)?;
        Ok(self.run_affected(sql, c.params.into_vec()).await?.0)
    }

    /// Delete matching rows. The criteria is required; pass an explicitly
    /// empty one to clear the whole table.
    pub async fn delete(&self, table: &str, criteria: &Criteria) -> Result<u64> {
        let mut c = self.compiler();
        let sql = build_delete(&mut c, table, criteria)?;
        Ok(self.run_affected(sql, c.params.into_vec()).await?.0)
    }

    /// Rewrite substrings in place via SQL `REPLACE()`.
    pub async fn replace(
        &self,
        table: &str,
        replacement: &Replacement,
        criteria: Option<&Criteria>,
    ) -> Result<u64> {
        let mut c = self.compiler();
        let sql = build_replace(&mut c, table, replacement, criteria)?;
        Ok(self.run_affected(sql, c.params.into_vec()).await?.0)
    }

    pub async fn count(
        &self,
        table: &str,
        joins: Option<&JoinSpec>,
        columns: Option<&Projection>,
        criteria: Option<&Criteria>,
    ) -> Result<i64> {
        let value = self
            .aggregate("COUNT", table, joins, columns, criteria)
            .await?;
        Ok(value.map(|n| n as i64).unwrap_or(0))
    }

    pub async fn sum(
        &self,
        table: &str,
        joins: Option<&JoinSpec>,
        columns: &Projection,
        criteria: Option<&Criteria>,
    ) -> Result<Option<f64>> {
        self.aggregate("SUM", table, joins, Some(columns), criteria).await
    }

    pub async fn avg(
        &self,
        table: &str,
        joins: Option<&JoinSpec>,
        columns: &Projection,
        criteria: Option<&Criteria>,
    ) -> Result<Option<f64>> {
        self.aggregate("AVG", table, joins, Some(columns), criteria).await
    }

    pub async fn min(
        &self,
        table: &str,
        joins: Option<&JoinSpec>,
        columns: &Projection,
        criteria: Option<&Criteria>,
    ) -> Result<Option<f64>> {
        self.aggregate("MIN", table, joins, Some(columns), criteria).await
    }

    pub async fn max(
        &self,
        table: &str,
        joins: Option<&JoinSpec>,
        columns: &Projection,
        criteria: Option<&Criteria>,
    ) -> Result<Option<f64>> {
        self.aggregate("MAX", table, joins, Some(columns), criteria).await
    }

    async fn aggregate(
        &self,
        func: &str,
        table: &str,
        joins: Option<&JoinSpec>,
        columns: Option<&Projection>,
        criteria: Option<&Criteria>,
    ) -> Result<Option<f64>> {
        let mut c = self.compiler();
        let sql = build_aggregate(&mut c, func, table, joins, columns, criteria)?;
        let rows = self.fetch_rows(sql, c.params.into_vec()).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        Ok(row.values().next().and_then(scalar_number))
    }

    /// Existence probe.
    pub async fn has(
        &self,
        table: &str,
        joins: Option<&JoinSpec>,
        criteria: Option<&Criteria>,
    ) -> Result<bool> {
        let mut c = self.compiler();
        let sql = build_exists(&mut c, table, joins, criteria)?;
        let rows = self.fetch_rows(sql, c.params.into_vec()).await?;
        let Some(row) = rows.first() else {
            return Ok(false);
        };
        Ok(row
            .values()
            .next()
            .and_then(scalar_number)
            .map(|n| n != 0.0)
            .unwrap_or(false))
    }

    /// `select` with a dialect-random ordering appended.
    pub async fn rand(
        &self,
        table: &str,
        joins: Option<&JoinSpec>,
        columns: &Projection,
        criteria: Option<&Criteria>,
    ) -> Result<Json> {
        let ordered = criteria
            .cloned()
            .unwrap_or_default()
            .order_raw(RawFragment::new(self.inner.dialect.random_function()));
        self.select(table, joins, columns, Some(&ordered)).await
    }

    /// Execute a caller-supplied raw fragment and fetch its rows.
    /// Identifier tokens resolve and parameters merge as everywhere else.
    pub async fn query(&self, fragment: &RawFragment) -> Result<Vec<Row>> {
        let mut c = self.compiler();
        let sql = c.build_raw(fragment)?;
        self.fetch_rows(sql, c.params.into_vec()).await
    }

    /// Arm one-shot debug mode: the next statement is printed with its
    /// parameters interpolated instead of being executed.
    pub async fn debug(&self) -> &Self {
        self.inner.session.lock().await.debug_once = true;
        self
    }

    /// Toggle the rolling statement log. Disabled, only the most recent
    /// statement is retained.
    pub async fn logging(&self, enabled: bool) {
        self.inner.session.lock().await.logging = enabled;
    }

    /// The most recent statement, parameters interpolated.
    pub async fn last(&self) -> Option<String> {
        let session = self.inner.session.lock().await;
        session
            .logs
            .back()
            .map(|e| interpolate(&e.sql, &e.params, self.inner.dialect))
    }

    /// Every retained statement, parameters interpolated.
    pub async fn log(&self) -> Vec<String> {
        let session = self.inner.session.lock().await;
        session
            .logs
            .iter()
            .map(|e| interpolate(&e.sql, &e.params, self.inner.dialect))
            .collect()
    }

    /// The driver error captured from the most recent statement, if it
    /// failed at prepare or execute.
    pub async fn error(&self) -> Option<ErrorInfo> {
        self.inner.session.lock().await.error.clone()
    }

    /// Begin a transaction. Statements issued through this facade (and
    /// its clones) reuse the held connection until the guard resolves.
    pub async fn begin(&self) -> Result<Transaction> {
        let mut session = self.inner.session.lock().await;
        if session.tx.is_some() {
            return Err(QuarryError::TransactionActive);
        }
        let mut conn = self.inner.pool.acquire().await?;
        sqlx::query("BEGIN")
            .execute(conn.get_mut())
            .await
            .map_err(|e| QuarryError::Execute(e.to_string()))?;
        session.tx = Some(conn);
        Ok(Transaction::new(self.clone()))
    }

    /// Unit-of-work helper: begin, run the closure, commit on `Ok`,
    /// roll back on `Err`.
    pub async fn action<F, Fut, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce(Db) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let tx = self.begin().await?;
        match work(self.clone()).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Resolve the held transaction connection with COMMIT or ROLLBACK
    /// and release it back to the pool. A connection whose resolution
    /// failed is in an unknown transaction state and must not be leased
    /// out again, so it is closed instead.
    pub(crate) async fn finish(&self, verb: &str) -> Result<()> {
        let mut session = self.inner.session.lock().await;
        let Some(mut conn) = session.tx.take() else {
            return Ok(());
        };
        match sqlx::query(verb).execute(conn.get_mut()).await {
            Ok(_) => Ok(()),
            Err(e) => {
                conn.discard();
                Err(QuarryError::Execute(e.to_string()))
            }
        }
    }

    async fn fetch_rows(&self, sql: String, params: Vec<(String, Value)>) -> Result<Vec<Row>> {
        match self.exec(sql, params, Fetch::Rows).await? {
            Outcome::Rows(rows) => Ok(rows),
            _ => Ok(Vec::new()),
        }
    }

    async fn run_affected(
        &self,
        sql: String,
        params: Vec<(String, Value)>,
    ) -> Result<(u64, Option<i64>)> {
        match self.exec(sql, params, Fetch::Affected).await? {
            Outcome::Affected { rows, last_insert_id } => Ok((rows, last_insert_id)),
            _ => Ok((0, None)),
        }
    }

    async fn exec(
        &self,
        sql: String,
        params: Vec<(String, Value)>,
        fetch: Fetch,
    ) -> Result<Outcome> {
        let mut session = self.inner.session.lock().await;

        if session.logging {
            if session.logs.len() == LOG_CAPACITY {
                session.logs.pop_front();
            }
        } else {
            session.logs.clear();
        }
        session.logs.push_back(LogEntry {
            sql: sql.clone(),
            params: params.clone(),
        });

        if session.debug_once {
            session.debug_once = false;
            println!("{}", interpolate(&sql, &params, self.inner.dialect));
            return Ok(Outcome::Skipped);
        }

        let (positional_sql, values) = positional(&sql, &params, self.inner.dialect);
        debug!(sql = %positional_sql, "executing statement");

        // Transactional statements share the held connection and run
        // under the session lock; everything else releases it before
        // touching the pool, so introspection and other clones are not
        // blocked behind a slow statement.
        if let Some(conn) = session.tx.as_mut() {
            let result = run_statement(conn.get_mut(), &positional_sql, &values, &fetch).await;
            return settle(&mut session, result, fetch);
        }
        drop(session);

        let result = {
            let mut conn = self.inner.pool.acquire().await?;
            run_statement(conn.get_mut(), &positional_sql, &values, &fetch).await
        };

        let mut session = self.inner.session.lock().await;
        settle(&mut session, result, fetch)
    }
}

/// Record the statement's fate on the session: a backend-level failure
/// is captured as inspectable error info plus an empty result, anything
/// else raises.
fn settle(session: &mut Session, result: sqlx::Result<Outcome>, fetch: Fetch) -> Result<Outcome> {
    match result {
        Ok(outcome) => {
            session.error = None;
            Ok(outcome)
        }
        Err(sqlx::Error::Database(db_err)) => {
            session.error = Some(ErrorInfo {
                sql_state: db_err.code().map(|c| c.to_string()),
                driver_code: None,
                message: db_err.message().to_string(),
            });
            Ok(match fetch {
                Fetch::Rows => Outcome::Rows(Vec::new()),
                Fetch::Affected => Outcome::Affected {
                    rows: 0,
                    last_insert_id: None,
                },
            })
        }
        Err(e) => Err(QuarryError::Execute(e.to_string())),
    }
}

async fn run_statement(
    conn: &mut sqlx::AnyConnection,
    sql: &str,
    values: &[Value],
    fetch: &Fetch,
) -> sqlx::Result<Outcome> {
    let mut query = sqlx::query(sql);
    for value in values {
        query = bind_value(query, value);
    }
    match fetch {
        Fetch::Rows => {
            let rows = query.fetch_all(conn).await?;
            Ok(Outcome::Rows(rows.iter().map(row_to_map).collect()))
        }
        Fetch::Affected => {
            let done = query.execute(conn).await?;
            Ok(Outcome::Affected {
                rows: done.rows_affected(),
                last_insert_id: done.last_insert_id(),
            })
        }
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(n) => query.bind(*n),
        Value::Float(n) => query.bind(*n),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        // Compound and raw values are serialized by the compiler; a stray
        // one binds as its text form.
        other => query.bind(other.to_text()),
    }
}

/// Decode one fetched row into a column-keyed JSON map, probing the
/// driver value through the scalar types the backends report.
fn row_to_map(row: &AnyRow) -> Row {
    let mut map = Row::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map(Json::from).unwrap_or(Json::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.and_then(|f| serde_json::Number::from_f64(f).map(Json::Number))
                .unwrap_or(Json::Null)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
            v.map(Json::Bool).unwrap_or(Json::Null)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map(Json::String).unwrap_or(Json::Null)
        } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
            v.map(|b| Json::String(String::from_utf8_lossy(&b).into_owned()))
                .unwrap_or(Json::Null)
        } else {
            Json::Null
        };
        map.insert(column.name().to_string(), value);
    }
    map
}

fn scalar_number(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse().ok(),
        Json::Bool(b) => Some(*b as i64 as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::raw::raw;
    use serde_json::json;

    fn memory_db() -> Db {
        Db::open(PoolConfig::sqlite(":memory:")).unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let db = memory_db();
        // A transaction pins one connection, so every statement sees the
        // same in-memory database.
        let tx = db.begin().await.unwrap();
        db.query(&raw(
            "CREATE TABLE players (id INTEGER PRIMARY KEY, name TEXT, score INTEGER)",
        ))
        .await
        .unwrap();

        let id = db
            .insert(
                "players",
                &[
                    Record::new().set("name", "kim").set("score", 7),
                    Record::new().set("name", "sam"),
                ],
            )
            .await
            .unwrap();
        // The any driver does not surface sqlite rowids; ask the backend.
        assert_eq!(id, None);
        let rows = db
            .query(&raw("SELECT last_insert_rowid() AS id"))
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], json!(2));

        let rows = db
            .select(
                "players",
                None,
                &Projection::cols(["name", "score[Int]"]),
                Some(&Criteria::new().filter("name", "kim")),
            )
            .await
            .unwrap();
        assert_eq!(rows, json!([{"name": "kim", "score": 7}]));

        let affected = db
            .update(
                "players",
                &Record::new().set("score[+]", 3),
                Some(&Criteria::new().filter("name", "kim")),
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let total = db.sum("players", None, &Projection::col("score"), None).await;
        assert_eq!(total.unwrap(), Some(10.0));

        assert!(db
            .has("players", None, Some(&Criteria::new().filter("name", "sam")))
            .await
            .unwrap());
        assert_eq!(db.count("players", None, None, None).await.unwrap(), 2);

        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_debug_skips_execution() {
        let db = memory_db();
        db.logging(true).await;
        db.debug().await;
        let rows = db
            .select(
                "missing",
                None,
                &Projection::all(),
                Some(&Criteria::new().filter("id", 1)),
            )
            .await
            .unwrap();
        assert_eq!(rows, json!([]));
        assert_eq!(
            db.last().await.unwrap(),
            "SELECT * FROM \"missing\" WHERE \"id\" = 1"
        );
    }

    #[tokio::test]
    async fn test_backend_error_captured_not_raised() {
        let db = memory_db();
        let rows = db.select("missing", None, &Projection::all(), None).await.unwrap();
        assert_eq!(rows, json!([]));
        let error = db.error().await.unwrap();
        assert!(error.message.contains("missing"));
    }

    #[tokio::test]
    async fn test_begin_twice_rejected() {
        let db = memory_db();
        let _tx = db.begin().await.unwrap();
        assert!(matches!(
            db.begin().await,
            Err(QuarryError::TransactionActive)
        ));
    }

    #[tokio::test]
    async fn test_failed_resolution_discards_connection() {
        let db = memory_db();
        let tx = db.begin().await.unwrap();
        // Resolve the transaction behind the guard's back; the guard's
        // own COMMIT then fails, and the connection must not go back to
        // the idle pool with unknown session state.
        db.query(&raw("COMMIT")).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert_eq!(db.pool().idle_count().await, 0);

        // The facade still works: the next statement dials fresh.
        let rows = db.query(&raw("SELECT 1 AS one")).await.unwrap();
        assert_eq!(rows[0]["one"], json!(1));
    }

    #[tokio::test]
    async fn test_session_free_while_waiting_for_pool() {
        use std::time::Duration;

        let db = Db::open(PoolConfig::sqlite(":memory:").max_connections(1)).unwrap();
        let held = db.pool().acquire().await.unwrap();

        let pending = {
            let db = db.clone();
            tokio::spawn(async move { db.select("t", None, &Projection::all(), None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The statement is parked waiting for a connection slot;
        // introspection must not queue up behind it.
        let last = tokio::time::timeout(Duration::from_millis(200), db.last()).await;
        assert!(last.is_ok());

        drop(held);
        let _ = pending.await.unwrap();
    }

    #[tokio::test]
    async fn test_log_retention_toggle() {
        let db = memory_db();
        // Logging off: only the most recent statement is retained.
        db.debug().await;
        let _ = db.select("a", None, &Projection::all(), None).await;
        db.debug().await;
        let _ = db.select("b", None, &Projection::all(), None).await;
        assert_eq!(db.log().await, vec!["SELECT * FROM \"b\"".to_string()]);

        db.logging(true).await;
        db.debug().await;
        let _ = db.select("c", None, &Projection::all(), None).await;
        db.debug().await;
        let _ = db.select("d", None, &Projection::all(), None).await;
        assert_eq!(db.log().await.len(), 3);
    }
}
