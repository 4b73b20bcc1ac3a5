//! Execution-time measurement and slow/normal classification.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;

use crate::backtrace::{BacktraceRenderer, StdBacktraceRenderer};
use crate::config::QueryLogConfig;
use crate::params::{normalize, truncate_middle};
use crate::sequence::SequenceAllocator;
use crate::sink::{LogContext, LogLevel, LogSink, TracingSink};
use crate::stopwatch::{Stopwatch, StopwatchEvent};

/// What a timed event was about.
#[derive(Debug, Clone)]
pub enum LogSubject<'a> {
    /// A single statement with its (already JSON-converted) parameters.
    Statement {
        sql: &'a str,
        params: Option<JsonValue>,
    },
    /// A whole transaction, identified by its opaque token.
    Transaction { id: &'a str },
}

/// One statement captured while a transaction was open.
///
/// Immutable once the duration is computed; discarded after being logged.
/// All times are in milliseconds (timestamps since the Unix epoch).
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub sql: String,
    pub params: JsonValue,
    pub started_at: f64,
    pub ended_at: f64,
    pub duration_ms: f64,
}

impl OperationRecord {
    fn to_context(&self, max_sql_length: usize) -> LogContext {
        let mut context = LogContext::new();
        context.insert(
            "sql".to_owned(),
            truncate_middle(&self.sql, max_sql_length).into(),
        );
        context.insert("params".to_owned(), normalize(&self.params));
        context.insert("startTime".to_owned(), self.started_at.into());
        context.insert("endTime".to_owned(), self.ended_at.into());
        context.insert("duration".to_owned(), self.duration_ms.into());
        context
    }
}

/// Milliseconds since the Unix epoch, for operation-record timestamps.
pub(crate) fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
        * 1000.0
}

/// Times units of work and logs them according to how slow they were.
///
/// One recorder is meant to be shared (via `Arc`) by every connection a
/// process opens, so sequence ids and named timers stay coherent
/// process-wide.
pub struct QueryRecorder {
    config: QueryLogConfig,
    stopwatch: Stopwatch,
    sequence: SequenceAllocator,
    sink: Arc<dyn LogSink>,
    backtrace: Arc<dyn BacktraceRenderer>,
}

impl fmt::Debug for QueryRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryRecorder")
            .field("config", &self.config)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

impl Default for QueryRecorder {
    fn default() -> Self {
        Self::new(QueryLogConfig::default())
    }
}

impl QueryRecorder {
    /// Recorder emitting through [`TracingSink`] with standard backtraces.
    pub fn new(config: QueryLogConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(TracingSink),
            Arc::new(StdBacktraceRenderer),
        )
    }

    /// Recorder with explicit sink and backtrace renderer.
    pub fn with_collaborators(
        config: QueryLogConfig,
        sink: Arc<dyn LogSink>,
        backtrace: Arc<dyn BacktraceRenderer>,
    ) -> Self {
        Self {
            config,
            stopwatch: Stopwatch::new(),
            sequence: SequenceAllocator::new(),
            sink,
            backtrace,
        }
    }

    pub fn config(&self) -> &QueryLogConfig {
        &self.config
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn sequence(&self) -> &SequenceAllocator {
        &self.sequence
    }

    /// Next human-correlatable operation id.
    pub fn next_id(&self) -> String {
        self.sequence.next_id()
    }

    /// Time a unit of work and classify the result.
    ///
    /// The timer is stopped and the event evaluated whatever the outcome;
    /// an `Err` output is classified like any other and returned unchanged.
    /// The recorder never swallows or rewrites what the operation produced.
    pub async fn watch<T, F>(
        &self,
        name: &str,
        sql: &str,
        params: Option<JsonValue>,
        operation: F,
    ) -> T
    where
        F: Future<Output = T>,
    {
        self.stopwatch.start(name);
        let output = operation.await;
        let event = self.stopwatch.stop(name);
        self.check_event(&event, LogSubject::Statement { sql, params }, &[]);
        output
    }

    /// Classify a stopped event and emit the matching log lines.
    ///
    /// Callable directly so transaction aggregation can reuse it with the
    /// accumulated sub-operations. A duration strictly under the threshold
    /// is normal; anything else (equality included) is slow.
    pub fn check_event(
        &self,
        event: &StopwatchEvent,
        subject: LogSubject<'_>,
        sub_operations: &[OperationRecord],
    ) {
        let mut context = LogContext::new();
        context.insert("executionTime".to_owned(), event.duration_ms().into());

        match &subject {
            LogSubject::Statement { sql, params } => {
                context.insert(
                    "sql".to_owned(),
                    truncate_middle(sql, self.config.max_sql_length).into(),
                );
                context.insert(
                    "params".to_owned(),
                    params
                        .as_ref()
                        .map(normalize)
                        .unwrap_or_else(|| JsonValue::Object(Default::default())),
                );
            }
            LogSubject::Transaction { id } => {
                context.insert("transactionId".to_owned(), (*id).into());
            }
        }

        if event.duration() < self.config.slow_query_threshold {
            self.log_normal(context, &subject);
            return;
        }

        self.log_slow(context, sub_operations);
    }

    fn log_normal(&self, mut context: LogContext, subject: &LogSubject<'_>) {
        if !self.config.is_verbose_environment() {
            return;
        }
        // liveness probes would flood the log
        if let LogSubject::Statement { sql, .. } = subject {
            if self.config.is_canary(sql) {
                return;
            }
        }

        if self.config.backtrace_on_fast {
            context.insert("backtrace".to_owned(), self.backtrace.render().into());
        }
        self.sink
            .log(LogLevel::Info, "executed SQL statement", &context);
    }

    fn log_slow(&self, mut context: LogContext, sub_operations: &[OperationRecord]) {
        // rendered once; the same stack applies to every line of this event
        let backtrace = self
            .config
            .backtrace_on_slow
            .then(|| self.backtrace.render());

        if let Some(trace) = &backtrace {
            context.insert("backtrace".to_owned(), trace.as_str().into());
        }
        self.sink.log(
            LogLevel::Error,
            "detected potentially slow SQL execution",
            &context,
        );

        for operation in sub_operations {
            let mut context = operation.to_context(self.config.max_sql_length);
            if let Some(trace) = &backtrace {
                context.insert("backtrace".to_owned(), trace.as_str().into());
            }
            self.sink.log(
                LogLevel::Warning,
                "statement executed inside the slow transaction",
                &context,
            );
        }
    }

    /// Discard every open timer. Sequence ids keep counting.
    pub fn reset(&self) {
        self.stopwatch.reset();
    }
}

static DEFAULT_RECORDER: Lazy<Arc<QueryRecorder>> =
    Lazy::new(|| Arc::new(QueryRecorder::new(QueryLogConfig::from_env())));

/// Process-wide recorder used by the convenience wrappers, configured from
/// the environment on first use. Sharing it keeps sequence ids coherent
/// across connections wrapped with defaults.
pub fn default_recorder() -> Arc<QueryRecorder> {
    Arc::clone(&DEFAULT_RECORDER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde_json::json;
    use std::time::Duration;

    struct StubTrace;

    impl BacktraceRenderer for StubTrace {
        fn render(&self) -> String {
            "stub trace".to_owned()
        }
    }

    fn recorder(config: QueryLogConfig) -> (QueryRecorder, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let recorder = QueryRecorder::with_collaborators(
            config,
            Arc::clone(&sink) as Arc<dyn LogSink>,
            Arc::new(StubTrace),
        );
        (recorder, sink)
    }

    fn event_of(ms: u64) -> StopwatchEvent {
        StopwatchEvent::new(Duration::from_millis(ms))
    }

    fn statement(sql: &str) -> LogSubject<'_> {
        LogSubject::Statement { sql, params: None }
    }

    #[test]
    fn fast_event_is_suppressed_outside_verbose_environments() {
        let (recorder, sink) = recorder(QueryLogConfig::default());
        recorder.check_event(&event_of(500), statement("SELECT * FROM users"), &[]);

        assert!(sink.records().is_empty());
    }

    #[test]
    fn fast_event_logs_once_at_info_in_production() {
        let (recorder, sink) = recorder(QueryLogConfig::production());
        recorder.check_event(&event_of(500), statement("SELECT * FROM users"), &[]);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[0].context["executionTime"], json!(500.0));
        assert_eq!(records[0].context["sql"], json!("SELECT * FROM users"));
        assert!(!records[0].context.contains_key("backtrace"));
    }

    #[test]
    fn fast_event_backtrace_is_opt_in() {
        let (recorder, sink) =
            recorder(QueryLogConfig::production().with_backtrace_on_fast(true));
        recorder.check_event(&event_of(500), statement("SELECT * FROM users"), &[]);

        assert_eq!(sink.records()[0].context["backtrace"], json!("stub trace"));
    }

    #[test]
    fn canary_probe_is_suppressed_even_in_production() {
        let (recorder, sink) = recorder(QueryLogConfig::production());
        recorder.check_event(&event_of(500), statement("SELECT 1"), &[]);

        assert!(sink.records().is_empty());
    }

    #[test]
    fn slow_event_logs_error_with_backtrace() {
        let (recorder, sink) = recorder(QueryLogConfig::default());
        recorder.check_event(&event_of(1500), statement("SELECT * FROM users"), &[]);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Error);
        assert_eq!(records[0].context["backtrace"], json!("stub trace"));
    }

    #[test]
    fn duration_equal_to_threshold_counts_as_slow() {
        let (recorder, sink) = recorder(QueryLogConfig::default());
        recorder.check_event(&event_of(1000), statement("SELECT * FROM users"), &[]);

        assert_eq!(sink.records()[0].level, LogLevel::Error);
    }

    #[test]
    fn slow_transaction_reports_each_sub_operation() {
        let (recorder, sink) = recorder(QueryLogConfig::default());
        let sub_operations = vec![
            OperationRecord {
                sql: "INSERT INTO a VALUES (1)".to_owned(),
                params: json!({}),
                started_at: 1.0,
                ended_at: 2.0,
                duration_ms: 1.0,
            },
            OperationRecord {
                sql: "INSERT INTO b VALUES (2)".to_owned(),
                params: json!({"1": 2}),
                started_at: 2.0,
                ended_at: 3.0,
                duration_ms: 1.0,
            },
        ];

        recorder.check_event(
            &event_of(2000),
            LogSubject::Transaction { id: "transaction-x" },
            &sub_operations,
        );

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].level, LogLevel::Error);
        assert_eq!(records[0].context["transactionId"], json!("transaction-x"));
        assert_eq!(records[1].level, LogLevel::Warning);
        assert_eq!(records[1].context["sql"], json!("INSERT INTO a VALUES (1)"));
        assert_eq!(records[1].context["backtrace"], json!("stub trace"));
        assert_eq!(records[2].context["params"], json!({"1": 2}));
        assert_eq!(records[2].context["duration"], json!(1.0));
    }

    #[test]
    fn slow_sql_is_middle_truncated_in_context() {
        let (recorder, sink) = recorder(QueryLogConfig::default().with_max_sql_length(20));
        let sql = format!("SELECT {} FROM t", "col,".repeat(100));
        recorder.check_event(&event_of(1500), statement(&sql), &[]);

        let logged = sink.records()[0].context["sql"].as_str().unwrap().to_owned();
        assert_eq!(logged.chars().count(), 20);
        assert!(logged.contains("..."));
    }

    #[tokio::test]
    async fn watch_returns_the_operation_output() {
        let (recorder, sink) = recorder(QueryLogConfig::production());
        let result = recorder
            .watch("1. SELECT 2", "SELECT 2", None, async { 40 + 2 })
            .await;

        assert_eq!(result, 42);
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn watch_propagates_errors_but_still_classifies() {
        let (recorder, sink) = recorder(QueryLogConfig::production());
        let result: Result<(), &str> = recorder
            .watch("2. SELECT boom", "SELECT boom", None, async {
                Err("query failed")
            })
            .await;

        assert_eq!(result, Err("query failed"));
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn watch_normalizes_parameters_into_context() {
        let (recorder, sink) = recorder(QueryLogConfig::production());
        let params = json!({"1": "v".repeat(50), "2": 7});
        recorder
            .watch("3. INSERT", "INSERT INTO t VALUES (?, ?)", Some(params), async {})
            .await;

        let logged = &sink.records()[0].context["params"];
        assert_eq!(logged["1"], json!(format!("{} [...]", "v".repeat(26))));
        assert_eq!(logged["2"], json!(7));
    }

    #[test]
    fn sequence_ids_increase_across_calls() {
        let (recorder, _) = recorder(QueryLogConfig::default());
        let a: u64 = recorder.next_id().parse().unwrap();
        let b: u64 = recorder.next_id().parse().unwrap();
        assert!(a < b);
    }
}
