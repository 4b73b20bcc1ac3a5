//! # sea-orm-querylog
//!
//! Slow-query detection and transaction-aware execution-time logging for
//! SeaORM database operations.
//!
//! This crate wraps a SeaORM connection so that every statement execution
//! and every transaction is timed. Slow operations are logged with full
//! context (SQL text, sanitized parameters, call stack); fast operations are
//! logged tersely or not at all. It answers "is my database fast enough,
//! and what exactly did it run" without touching what is actually sent to
//! the database.
//!
//! ## Features
//!
//! - **Transparent decoration**: `ObservedConnection` is a drop-in
//!   `ConnectionTrait`/`StreamTrait`/`TransactionTrait` implementation
//! - **Slow-query escalation**: operations at or over a configurable
//!   threshold are logged at error level with a backtrace
//! - **Transaction aggregation**: statements inside an observed transaction
//!   are accumulated and attributed to a single commit/rollback event
//!   instead of flooding the log one line at a time
//! - **Bounded log volume**: SQL is middle-truncated, long parameters are
//!   shortened, binary parameters are redacted
//! - **Correlatable labels**: every operation is named `"<n>. <sql>"` with a
//!   process-wide sequence id
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sea_orm::Database;
//! use sea_orm_querylog::ObservedConnection;
//!
//! // Wrap your existing connection
//! let db = Database::connect("postgres://localhost/mydb").await?;
//! let db = ObservedConnection::from(db);
//!
//! // Use it exactly like a normal DatabaseConnection
//! let users = Users::find().all(&db).await?;
//!
//! // Aggregate-timed transaction
//! let txn = db.begin_observed().await?;
//! txn.execute_unprepared("UPDATE accounts SET balance = balance - 10").await?;
//! txn.execute_unprepared("UPDATE accounts SET balance = balance + 10").await?;
//! txn.commit().await?; // one timed event, sub-statements attached if slow
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use sea_orm_querylog::{ObservedConnection, QueryLogConfig};
//! use std::time::Duration;
//!
//! let config = QueryLogConfig::default()
//!     .with_slow_query_threshold(Duration::from_millis(250))
//!     .with_environment("prod")
//!     .with_canary_statements(["SELECT 1"]);
//!
//! let db = ObservedConnection::new(db, config);
//! ```
//!
//! ## Log context
//!
//! The following keys appear in the structured context of emitted lines:
//!
//! | Key | Description |
//! |-----|-------------|
//! | `executionTime` | Wall-clock duration in milliseconds |
//! | `sql` | Statement text, middle-truncated to the configured length |
//! | `params` | Sanitized bound parameters |
//! | `transactionId` | Opaque token of an aggregated transaction |
//! | `backtrace` | Rendered call stack (slow path by default) |
//! | `startTime` / `endTime` / `duration` | Per-statement timing inside a slow transaction |

mod backtrace;
mod config;
mod connection;
mod driver;
mod params;
mod recorder;
mod sequence;
mod sink;
mod statement;
mod stopwatch;
mod transaction;

pub use backtrace::{BacktraceRenderer, StdBacktraceRenderer};
pub use config::QueryLogConfig;
pub use connection::{ObserveExt, ObservedConnection};
pub use driver::ObservedDatabase;
pub use params::{normalize, truncate_middle, value_to_json, BINARY_DATA_VALUE, MAX_STRING_LENGTH};
pub use recorder::{default_recorder, LogSubject, OperationRecord, QueryRecorder};
pub use sequence::SequenceAllocator;
pub use sink::{LogContext, LogLevel, LogRecord, LogSink, MemorySink, TracingSink};
pub use statement::ObservedStatement;
pub use stopwatch::{Stopwatch, StopwatchEvent};
pub use transaction::ObservedTransaction;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{ObserveExt, ObservedConnection, ObservedDatabase, QueryLogConfig};
}
