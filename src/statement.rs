//! Prepared-statement wrapper that captures bound parameters.

use std::collections::BTreeMap;
use std::sync::Arc;

use sea_orm::{ConnectionTrait, DbBackend, DbErr, ExecResult, QueryResult, Statement, Value};
use serde_json::Value as JsonValue;

use crate::params::value_to_json;
use crate::recorder::QueryRecorder;

/// A prepared statement that remembers what was bound to it.
///
/// Binding records the value in an internal map (last write per index wins,
/// as usual for rebinding a position) and the exact bound values are what is
/// sent to the database; logging only ever sees a sanitized copy. Execution
/// is timed and classified by the shared [`QueryRecorder`].
///
/// Created by [`ObservedConnection::prepare`](crate::ObservedConnection::prepare)
/// or [`ObservedTransaction::prepare`](crate::ObservedTransaction::prepare).
#[derive(Debug)]
pub struct ObservedStatement<'c, C: ConnectionTrait> {
    executor: &'c C,
    recorder: Arc<QueryRecorder>,
    backend: DbBackend,
    sql: String,
    params: BTreeMap<u32, Value>,
}

impl<'c, C: ConnectionTrait> ObservedStatement<'c, C> {
    pub(crate) fn new(executor: &'c C, recorder: Arc<QueryRecorder>, sql: impl Into<String>) -> Self {
        Self {
            backend: executor.get_database_backend(),
            executor,
            recorder,
            sql: sql.into(),
            params: BTreeMap::new(),
        }
    }

    /// Bind a value to the 1-based parameter index. Rebinding an index
    /// replaces the previous value.
    pub fn bind_value(&mut self, index: u32, value: impl Into<Value>) -> &mut Self {
        self.params.insert(index, value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Execute the statement with the bound values, timed and logged under a
    /// fresh `"<id>. <sql>"` label. The driver result passes through
    /// unchanged.
    pub async fn execute(&self) -> Result<ExecResult, DbErr> {
        let name = self.operation_name();
        self.recorder
            .watch(
                &name,
                &self.sql,
                Some(self.logged_params()),
                self.executor.execute(self.statement()),
            )
            .await
    }

    /// Run the statement as a query returning all rows, timed the same way
    /// as [`execute`](Self::execute).
    pub async fn query_all(&self) -> Result<Vec<QueryResult>, DbErr> {
        let name = self.operation_name();
        self.recorder
            .watch(
                &name,
                &self.sql,
                Some(self.logged_params()),
                self.executor.query_all(self.statement()),
            )
            .await
    }

    /// Run the statement as a query returning at most one row.
    pub async fn query_one(&self) -> Result<Option<QueryResult>, DbErr> {
        let name = self.operation_name();
        self.recorder
            .watch(
                &name,
                &self.sql,
                Some(self.logged_params()),
                self.executor.query_one(self.statement()),
            )
            .await
    }

    fn operation_name(&self) -> String {
        format!("{}. {}", self.recorder.next_id(), self.sql)
    }

    fn statement(&self) -> Statement {
        Statement::from_sql_and_values(
            self.backend,
            self.sql.as_str(),
            self.params.values().cloned(),
        )
    }

    fn logged_params(&self) -> JsonValue {
        let map: serde_json::Map<String, JsonValue> = self
            .params
            .iter()
            .map(|(index, value)| (index.to_string(), value_to_json(value)))
            .collect();
        JsonValue::Object(map)
    }
}
