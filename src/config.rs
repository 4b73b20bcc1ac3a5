//! Configuration for query-timing behavior.

use std::time::Duration;

/// Configuration options for query-timing logs.
///
/// # Example
///
/// ```rust
/// use sea_orm_querylog::QueryLogConfig;
/// use std::time::Duration;
///
/// let config = QueryLogConfig::default()
///     .with_slow_query_threshold(Duration::from_millis(100))
///     .with_environment("prod");
/// ```
#[derive(Debug, Clone)]
pub struct QueryLogConfig {
    /// Duration at or above which an operation is escalated to a detailed,
    /// always-traced error-level log.
    /// Default: 1000ms
    pub slow_query_threshold: Duration,

    /// Maximum number of characters of SQL kept in a log line; longer text
    /// is middle-truncated.
    /// Default: 1000
    pub max_sql_length: usize,

    /// Name of the current deployment environment.
    /// Default: `"dev"`
    pub environment: String,

    /// Environments in which fast (under-threshold) operations are still
    /// logged at info level. Everywhere else they are suppressed entirely.
    /// Default: `["prod"]`
    pub verbose_environments: Vec<String>,

    /// Liveness-probe statements excluded from normal-path logging, compared
    /// by exact text. Slow-path logging ignores this list.
    /// Default: `["SELECT 1"]`
    pub canary_statements: Vec<String>,

    /// Whether to attach a rendered backtrace to fast-operation log lines.
    /// Default: `false` (capture is expensive)
    pub backtrace_on_fast: bool,

    /// Whether to attach a rendered backtrace to slow-operation log lines.
    /// Default: `true`
    pub backtrace_on_slow: bool,
}

impl Default for QueryLogConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold: Duration::from_millis(1000),
            max_sql_length: 1000,
            environment: "dev".to_owned(),
            verbose_environments: vec!["prod".to_owned()],
            canary_statements: vec!["SELECT 1".to_owned()],
            backtrace_on_fast: false,
            backtrace_on_slow: true,
        }
    }
}

impl QueryLogConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from process environment variables, falling
    /// back to defaults for anything unset or unparsable:
    ///
    /// - `APP_ENV` — deployment environment name
    /// - `SLOW_QUERY_THRESHOLD_MS` — slow threshold in milliseconds
    /// - `SQL_LOG_LENGTH` — SQL truncation length
    /// - `LOG_DB_QUERY_BACKTRACE` — enable backtraces on fast operations
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(environment) = std::env::var("APP_ENV") {
            config.environment = environment;
        }
        if let Some(threshold) = env_parse::<u64>("SLOW_QUERY_THRESHOLD_MS") {
            config.slow_query_threshold = Duration::from_millis(threshold);
        }
        if let Some(length) = env_parse::<usize>("SQL_LOG_LENGTH") {
            config.max_sql_length = length;
        }
        if let Ok(toggle) = std::env::var("LOG_DB_QUERY_BACKTRACE") {
            config.backtrace_on_fast = toggle != "0" && !toggle.is_empty();
        }

        config
    }

    /// Set the threshold at which operations count as slow.
    ///
    /// An operation taking exactly the threshold is already slow; only
    /// strictly shorter durations are normal.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Set the SQL truncation length for log context.
    pub fn with_max_sql_length(mut self, length: usize) -> Self {
        self.max_sql_length = length;
        self
    }

    /// Set the current deployment environment name.
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Replace the list of environments in which fast operations are logged.
    pub fn with_verbose_environments(
        mut self,
        environments: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.verbose_environments = environments.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the list of canary statements suppressed on the normal path.
    pub fn with_canary_statements(
        mut self,
        statements: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.canary_statements = statements.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable backtrace capture for fast operations.
    pub fn with_backtrace_on_fast(mut self, enabled: bool) -> Self {
        self.backtrace_on_fast = enabled;
        self
    }

    /// Enable or disable backtrace capture for slow operations.
    pub fn with_backtrace_on_slow(mut self, enabled: bool) -> Self {
        self.backtrace_on_slow = enabled;
        self
    }

    /// Create a development-friendly configuration: everything is logged,
    /// slow queries trip early, backtraces everywhere.
    pub fn development() -> Self {
        Self {
            slow_query_threshold: Duration::from_millis(100),
            environment: "dev".to_owned(),
            verbose_environments: vec!["dev".to_owned(), "prod".to_owned()],
            backtrace_on_fast: true,
            ..Self::default()
        }
    }

    /// Create a production configuration: fast operations are logged (minus
    /// canaries), slow operations carry a backtrace.
    pub fn production() -> Self {
        Self {
            environment: "prod".to_owned(),
            ..Self::default()
        }
    }

    /// Whether fast operations should be logged in the current environment.
    pub fn is_verbose_environment(&self) -> bool {
        self.verbose_environments
            .iter()
            .any(|env| env == &self.environment)
    }

    /// Whether the given SQL text is a configured liveness probe.
    pub fn is_canary(&self, sql: &str) -> bool {
        self.canary_statements.iter().any(|canary| canary == sql)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}
