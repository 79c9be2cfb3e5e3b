//! Instrumentation configuration
//!
//! Controls the optional extras recorded on spans. None of these settings
//! change the structure of the execution graph or how success is decided.
//! The two result extras only apply to operations that record their result
//! (`RepoOperation::recording_result`, `SpanExecutor::execute_recorded_with_spans`).

/// Instrumentation configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentationConfig {
    /// Attach the serialized operation payload as an artifact on the agent span
    pub attach_result_artifacts: bool,

    /// Attach a SHA-256 `hash` evidence entry over the serialized payload
    pub hash_result_evidence: bool,

    /// Write `duration_ms` into span metadata on terminal transitions
    pub record_durations: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            attach_result_artifacts: false,
            hash_result_evidence: false,
            record_durations: true,
        }
    }
}

impl InstrumentationConfig {
    /// Create a new config builder
    pub fn builder() -> InstrumentationConfigBuilder {
        InstrumentationConfigBuilder::new()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v.trim().parse().unwrap_or(default))
                .unwrap_or(default)
        };

        Self {
            attach_result_artifacts: flag(
                "AGENTICS_ATTACH_RESULT_ARTIFACTS",
                defaults.attach_result_artifacts,
            ),
            hash_result_evidence: flag(
                "AGENTICS_HASH_RESULT_EVIDENCE",
                defaults.hash_result_evidence,
            ),
            record_durations: flag("AGENTICS_RECORD_DURATIONS", defaults.record_durations),
        }
    }
}

/// Builder for InstrumentationConfig
#[derive(Debug, Default)]
pub struct InstrumentationConfigBuilder {
    config: InstrumentationConfig,
}

impl InstrumentationConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: InstrumentationConfig::default(),
        }
    }

    pub fn attach_result_artifacts(mut self, enabled: bool) -> Self {
        self.config.attach_result_artifacts = enabled;
        self
    }

    pub fn hash_result_evidence(mut self, enabled: bool) -> Self {
        self.config.hash_result_evidence = enabled;
        self
    }

    pub fn record_durations(mut self, enabled: bool) -> Self {
        self.config.record_durations = enabled;
        self
    }

    pub fn build(self) -> InstrumentationConfig {
        self.config
    }
}
