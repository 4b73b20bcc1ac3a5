//! Transaction-scoped accumulation of statement timings.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, DbBackend, DbErr, ExecResult, QueryResult, Statement,
    StreamTrait, TransactionTrait,
};
use serde_json::Value as JsonValue;

use crate::connection::statement_params;
use crate::recorder::{now_ms, LogSubject, OperationRecord, QueryRecorder};
use crate::statement::ObservedStatement;

/// An open transaction whose statements are recorded but not logged.
///
/// While the transaction is open, every operation executed through it only
/// measures its own start/end locally and appends an [`OperationRecord`];
/// nothing is emitted. On [`commit`](Self::commit) the whole transaction
/// becomes one timed event carrying the accumulated records as context, so
/// a slow transaction surfaces every statement that ran inside its window
/// without per-statement noise during bulk workloads.
///
/// Timing each inner statement individually would double-count against the
/// transaction's own duration; the aggregate event avoids that.
///
/// A transaction handle is owned by one logical caller; the most recently
/// begun (nested) transaction is the mutation target, and commit/rollback
/// consume exactly one handle.
pub struct ObservedTransaction {
    inner: DatabaseTransaction,
    recorder: Arc<QueryRecorder>,
    id: String,
    operations: Mutex<Vec<OperationRecord>>,
}

impl fmt::Debug for ObservedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedTransaction")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ObservedTransaction {
    pub(crate) async fn begin<C: TransactionTrait>(
        connection: &C,
        recorder: Arc<QueryRecorder>,
    ) -> Result<Self, DbErr> {
        let id = format!("transaction-{}", uuid::Uuid::new_v4().simple());
        recorder.stopwatch().start(&id);

        match connection.begin().await {
            Ok(inner) => Ok(Self {
                inner,
                recorder,
                id,
                operations: Mutex::new(Vec::new()),
            }),
            Err(err) => {
                recorder.stopwatch().stop(&id);
                Err(err)
            }
        }
    }

    /// Opaque token identifying this transaction in the aggregate log event.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn inner(&self) -> &DatabaseTransaction {
        &self.inner
    }

    /// Number of statements accumulated so far.
    pub fn pending_operations(&self) -> usize {
        self.operations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Begin a nested transaction (savepoint) with its own id and
    /// accumulator.
    pub async fn begin_nested(&self) -> Result<ObservedTransaction, DbErr> {
        Self::begin(&self.inner, Arc::clone(&self.recorder)).await
    }

    /// Prepare a statement against this transaction.
    ///
    /// Statement construction is local, so nothing is accumulated for the
    /// prepare itself; the statement's `execute` is timed and logged
    /// individually by the recorder.
    pub fn prepare(&self, sql: impl Into<String>) -> ObservedStatement<'_, DatabaseTransaction> {
        ObservedStatement::new(&self.inner, Arc::clone(&self.recorder), sql)
    }

    /// Commit, then report the whole transaction as one timed event with
    /// the accumulated statements attached.
    ///
    /// The timer is stopped and the event classified even when the commit
    /// itself fails; the commit error propagates unchanged.
    pub async fn commit(self) -> Result<(), DbErr> {
        let Self {
            inner,
            recorder,
            id,
            operations,
        } = self;

        let result = inner.commit().await;

        let event = recorder.stopwatch().stop(&id);
        let operations = operations.into_inner().unwrap_or_else(|e| e.into_inner());
        recorder.check_event(&event, LogSubject::Transaction { id: &id }, &operations);

        result
    }

    /// Roll back, then report the transaction as one timed event.
    ///
    /// The per-statement breakdown is not attached: the statements' effects
    /// were discarded with the rollback. The accumulator is gone with the
    /// handle either way, so a subsequent transaction starts empty.
    pub async fn rollback(self) -> Result<(), DbErr> {
        let Self {
            inner,
            recorder,
            id,
            operations,
        } = self;

        let result = inner.rollback().await;

        let event = recorder.stopwatch().stop(&id);
        drop(operations);
        recorder.check_event(&event, LogSubject::Transaction { id: &id }, &[]);

        result
    }

    /// Measure one operation locally and append its record. No log line is
    /// emitted here; the record surfaces with the aggregate event.
    async fn record<T, F>(&self, sql: &str, params: Option<JsonValue>, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        let started_at = now_ms();
        let clock = Instant::now();
        let output = operation.await;
        let duration_ms = clock.elapsed().as_secs_f64() * 1000.0;

        self.operations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(OperationRecord {
                sql: sql.to_owned(),
                params: params.unwrap_or_else(|| JsonValue::Object(Default::default())),
                started_at,
                ended_at: started_at + duration_ms,
                duration_ms,
            });

        output
    }
}

#[async_trait]
impl ConnectionTrait for ObservedTransaction {
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let sql = stmt.sql.clone();
        let params = statement_params(&stmt);

        self.record(&sql, params, self.inner.execute(stmt)).await
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        self.record(sql, None, self.inner.execute_unprepared(sql))
            .await
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let sql = stmt.sql.clone();
        let params = statement_params(&stmt);

        self.record(&sql, params, self.inner.query_one(stmt)).await
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let sql = stmt.sql.clone();
        let params = statement_params(&stmt);

        self.record(&sql, params, self.inner.query_all(stmt)).await
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

#[async_trait]
impl StreamTrait for ObservedTransaction {
    type Stream<'a> = <DatabaseTransaction as StreamTrait>::Stream<'a>;

    fn stream<'a>(
        &'a self,
        stmt: Statement,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream<'a>, DbErr>> + 'a + Send>> {
        let sql = stmt.sql.clone();
        let params = statement_params(&stmt);

        Box::pin(async move { self.record(&sql, params, self.inner.stream(stmt)).await })
    }
}
