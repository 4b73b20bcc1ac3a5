//! Observed database connection wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    ExecResult, IsolationLevel, QueryResult, Statement, StreamTrait, TransactionError,
    TransactionTrait,
};
use serde_json::Value as JsonValue;

use crate::config::QueryLogConfig;
use crate::params::value_to_json;
use crate::recorder::{default_recorder, QueryRecorder};
use crate::statement::ObservedStatement;
use crate::transaction::ObservedTransaction;

/// An observed wrapper around SeaORM's `DatabaseConnection`.
///
/// The wrapper implements `ConnectionTrait`, `StreamTrait`, and
/// `TransactionTrait`, making it a drop-in replacement for
/// `DatabaseConnection`. Every operation executed through it is timed by the
/// shared [`QueryRecorder`] and logged according to how slow it was; the
/// operation's own result passes through untouched.
///
/// Statements run inside [`begin_observed`](Self::begin_observed)
/// transactions are not logged one by one. They are accumulated and
/// attributed to the transaction's single aggregate event on
/// commit/rollback.
///
/// # Example
///
/// ```rust,ignore
/// use sea_orm::Database;
/// use sea_orm_querylog::ObservedConnection;
///
/// let db = Database::connect("postgres://localhost/mydb").await?;
/// let db = ObservedConnection::from(db);
///
/// // All queries are now timed
/// let users = Users::find().all(&db).await?;
/// ```
#[derive(Debug)]
pub struct ObservedConnection {
    inner: DatabaseConnection,
    recorder: Arc<QueryRecorder>,
}

impl ObservedConnection {
    /// Wrap a connection with its own recorder built from the given
    /// configuration.
    pub fn new(connection: DatabaseConnection, config: QueryLogConfig) -> Self {
        Self {
            inner: connection,
            recorder: Arc::new(QueryRecorder::new(config)),
        }
    }

    /// Wrap a connection with an existing (usually shared) recorder.
    pub fn with_recorder(connection: DatabaseConnection, recorder: Arc<QueryRecorder>) -> Self {
        Self {
            inner: connection,
            recorder,
        }
    }

    /// Wrap a connection with the process-wide default recorder, so sequence
    /// ids stay coherent across every connection wrapped this way.
    pub fn wrap(connection: DatabaseConnection) -> Self {
        Self::with_recorder(connection, default_recorder())
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    /// Consume the wrapper and return the inner `DatabaseConnection`.
    pub fn into_inner(self) -> DatabaseConnection {
        self.inner
    }

    pub fn recorder(&self) -> &Arc<QueryRecorder> {
        &self.recorder
    }

    pub fn config(&self) -> &QueryLogConfig {
        self.recorder.config()
    }

    /// Prepare a statement whose bound parameters will be captured and
    /// logged alongside its timed execution.
    pub fn prepare(&self, sql: impl Into<String>) -> ObservedStatement<'_, DatabaseConnection> {
        ObservedStatement::new(&self.inner, Arc::clone(&self.recorder), sql)
    }

    /// Begin a transaction whose statements are accumulated and reported as
    /// one aggregate event on commit or rollback.
    ///
    /// The transaction timer starts before the underlying `begin` so the
    /// aggregate duration covers the whole window; if `begin` itself fails
    /// the timer is discarded and the error propagates.
    pub async fn begin_observed(&self) -> Result<ObservedTransaction, DbErr> {
        ObservedTransaction::begin(&self.inner, Arc::clone(&self.recorder)).await
    }

    fn operation_name(&self, sql: &str) -> String {
        format!("{}. {}", self.recorder.next_id(), sql)
    }
}

impl From<DatabaseConnection> for ObservedConnection {
    fn from(connection: DatabaseConnection) -> Self {
        Self::wrap(connection)
    }
}

impl AsRef<DatabaseConnection> for ObservedConnection {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.inner
    }
}

/// Positional statement values converted for logging. Sanitization of the
/// copy happens in the recorder; the statement keeps its original values.
pub(crate) fn statement_params(stmt: &Statement) -> Option<JsonValue> {
    stmt.values
        .as_ref()
        .map(|values| JsonValue::Array(values.0.iter().map(value_to_json).collect()))
}

#[async_trait]
impl ConnectionTrait for ObservedConnection {
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let name = self.operation_name(&stmt.sql);
        let sql = stmt.sql.clone();
        let params = statement_params(&stmt);

        self.recorder
            .watch(&name, &sql, params, self.inner.execute(stmt))
            .await
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        let name = self.operation_name(sql);

        self.recorder
            .watch(&name, sql, None, self.inner.execute_unprepared(sql))
            .await
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let name = self.operation_name(&stmt.sql);
        let sql = stmt.sql.clone();
        let params = statement_params(&stmt);

        self.recorder
            .watch(&name, &sql, params, self.inner.query_one(stmt))
            .await
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let name = self.operation_name(&stmt.sql);
        let sql = stmt.sql.clone();
        let params = statement_params(&stmt);

        self.recorder
            .watch(&name, &sql, params, self.inner.query_all(stmt))
            .await
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

#[async_trait]
impl StreamTrait for ObservedConnection {
    type Stream<'a> = <DatabaseConnection as StreamTrait>::Stream<'a>;

    fn stream<'a>(
        &'a self,
        stmt: Statement,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream<'a>, DbErr>> + 'a + Send>> {
        let name = self.operation_name(&stmt.sql);
        let sql = stmt.sql.clone();
        let params = statement_params(&stmt);

        Box::pin(async move {
            self.recorder
                .watch(&name, &sql, params, self.inner.stream(stmt))
                .await
        })
    }
}

#[async_trait]
impl TransactionTrait for ObservedConnection {
    /// Transparent delegation: the returned `DatabaseTransaction` is not
    /// observed. Use [`begin_observed`](ObservedConnection::begin_observed)
    /// for aggregate transaction timing.
    async fn begin(&self) -> Result<DatabaseTransaction, DbErr> {
        self.inner.begin().await
    }

    async fn begin_with_config(
        &self,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<DatabaseTransaction, DbErr> {
        self.inner
            .begin_with_config(isolation_level, access_mode)
            .await
    }

    /// The closure-style transaction is timed as one unit of work.
    async fn transaction<F, T, E>(&self, callback: F) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        let name = self.operation_name("TRANSACTION");

        self.recorder
            .watch(&name, "TRANSACTION", None, self.inner.transaction(callback))
            .await
    }

    async fn transaction_with_config<F, T, E>(
        &self,
        callback: F,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        let name = self.operation_name("TRANSACTION");

        self.recorder
            .watch(
                &name,
                "TRANSACTION",
                None,
                self.inner
                    .transaction_with_config(callback, isolation_level, access_mode),
            )
            .await
    }
}

/// Extension trait for easy wrapping of database connections.
pub trait ObserveExt {
    /// Wrap this connection with query-timing observation and the
    /// process-wide default recorder.
    fn with_query_log(self) -> ObservedConnection;

    /// Wrap this connection with a custom configuration.
    fn with_query_log_config(self, config: QueryLogConfig) -> ObservedConnection;
}

impl ObserveExt for DatabaseConnection {
    fn with_query_log(self) -> ObservedConnection {
        ObservedConnection::wrap(self)
    }

    fn with_query_log_config(self, config: QueryLogConfig) -> ObservedConnection {
        ObservedConnection::new(self, config)
    }
}
