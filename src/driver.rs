//! Connection factory sharing one recorder across connections.

use std::sync::Arc;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use crate::config::QueryLogConfig;
use crate::connection::ObservedConnection;
use crate::recorder::{default_recorder, QueryRecorder};

/// Factory that connects and wraps in one step.
///
/// Every connection it produces shares the same [`QueryRecorder`], so the
/// sequence counter and named timers are coherent process-wide even when an
/// application opens several connections.
#[derive(Debug, Clone)]
pub struct ObservedDatabase {
    recorder: Arc<QueryRecorder>,
}

impl ObservedDatabase {
    /// Factory with its own recorder built from the given configuration.
    pub fn new(config: QueryLogConfig) -> Self {
        Self {
            recorder: Arc::new(QueryRecorder::new(config)),
        }
    }

    /// Factory reusing an existing recorder.
    pub fn with_recorder(recorder: Arc<QueryRecorder>) -> Self {
        Self { recorder }
    }

    pub fn recorder(&self) -> &Arc<QueryRecorder> {
        &self.recorder
    }

    /// Connect through SeaORM and wrap the resulting connection.
    pub async fn connect<C>(&self, options: C) -> Result<ObservedConnection, DbErr>
    where
        C: Into<ConnectOptions> + Send,
    {
        let connection = Database::connect(options).await?;
        Ok(self.wrap(connection))
    }

    /// Decorate an already-open connection with this factory's recorder.
    pub fn wrap(&self, connection: DatabaseConnection) -> ObservedConnection {
        ObservedConnection::with_recorder(connection, Arc::clone(&self.recorder))
    }
}

impl Default for ObservedDatabase {
    /// Factory on the process-wide default recorder.
    fn default() -> Self {
        Self::with_recorder(default_recorder())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, MockDatabase};

    #[test]
    fn wrapped_connections_share_the_factory_recorder() {
        let factory = ObservedDatabase::new(QueryLogConfig::default());
        let a = factory.wrap(MockDatabase::new(DbBackend::Postgres).into_connection());
        let b = factory.wrap(MockDatabase::new(DbBackend::Postgres).into_connection());

        assert!(Arc::ptr_eq(a.recorder(), b.recorder()));
        assert!(Arc::ptr_eq(a.recorder(), factory.recorder()));
    }
}
