//! Tracing configuration for dispatcher operations.
//!
//! [`TracingConfig`] controls the level of the spans dispatcher operations emit
//! and whether per-operation elapsed-time events are recorded.

use tracing::Level;

/// Controls tracing span levels and per-operation timing for the dispatcher.
///
/// By default `close` emits its span at `INFO` level, while the high-frequency
/// `execute` and `start` operations use `DEBUG`. Timing is disabled for all
/// operations.
///
/// When no `tracing` subscriber is installed, span creation is a no-op.
///
/// # Examples
///
/// ```
/// use muxpool::TracingConfig;
/// use tracing::Level;
///
/// let config = TracingConfig::default()
///     .with_execute_level(Level::INFO)
///     .with_execute_timing(true);
/// let _ = config;
/// ```
#[derive(Clone, Debug)]
pub struct TracingConfig {
    pub(crate) execute_level: Level,
    pub(crate) start_level: Level,
    pub(crate) close_level: Level,
    pub(crate) execute_timing: bool,
    pub(crate) start_timing: bool,
    pub(crate) close_timing: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            execute_level: Level::DEBUG,
            start_level: Level::DEBUG,
            close_level: Level::INFO,
            execute_timing: false,
            start_timing: false,
            close_timing: false,
        }
    }
}

impl TracingConfig {
    /// Set the tracing level for the `execute` operation.
    #[must_use]
    pub fn with_execute_level(mut self, level: Level) -> Self {
        self.execute_level = level;
        self
    }

    /// Enable or disable timing for the `execute` operation.
    ///
    /// When enabled, an event recording `elapsed_us` is emitted at `DEBUG`
    /// level when the request completes.
    #[must_use]
    pub fn with_execute_timing(mut self, enabled: bool) -> Self {
        self.execute_timing = enabled;
        self
    }

    /// Set the tracing level for the `start` operation.
    #[must_use]
    pub fn with_start_level(mut self, level: Level) -> Self {
        self.start_level = level;
        self
    }

    /// Enable or disable timing for the `start` operation.
    #[must_use]
    pub fn with_start_timing(mut self, enabled: bool) -> Self {
        self.start_timing = enabled;
        self
    }

    /// Set the tracing level for the `close` operation.
    #[must_use]
    pub fn with_close_level(mut self, level: Level) -> Self {
        self.close_level = level;
        self
    }

    /// Enable or disable timing for the `close` operation.
    #[must_use]
    pub fn with_close_timing(mut self, enabled: bool) -> Self {
        self.close_timing = enabled;
        self
    }

    /// Set every operation to `level`.
    #[must_use]
    pub fn with_all_levels(mut self, level: Level) -> Self {
        self.execute_level = level;
        self.start_level = level;
        self.close_level = level;
        self
    }

    /// Enable or disable timing for every operation.
    #[must_use]
    pub fn with_all_timing(mut self, enabled: bool) -> Self {
        self.execute_timing = enabled;
        self.start_timing = enabled;
        self.close_timing = enabled;
        self
    }
}
