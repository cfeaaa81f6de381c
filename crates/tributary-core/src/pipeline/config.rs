//! Pipeline configuration.

/// Default maximum number of downstream stages per stage.
pub const DEFAULT_MAX_FAN_OUT: usize = 64;

/// Upper bound for [`PipelineConfig::max_fan_out`].
pub const MAX_FAN_OUT_LIMIT: usize = 4096;

/// Default pipeline name.
pub const DEFAULT_PIPELINE_NAME: &str = "pipeline";

/// Configuration for a [`Pipeline`](super::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Name used in diagnostics and log events.
    pub name: String,

    /// Maximum downstream stages per stage, checked at compile time.
    pub max_fan_out: usize,

    /// Whether compile rejects non-sink stages that are never drained.
    pub require_drained: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PIPELINE_NAME.to_string(),
            max_fan_out: DEFAULT_MAX_FAN_OUT,
            require_drained: false,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with the given name and default limits.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Returns the fan-out limit actually enforced.
    #[must_use]
    pub fn effective_max_fan_out(&self) -> usize {
        self.max_fan_out.clamp(1, MAX_FAN_OUT_LIMIT)
    }
}

/// Builder for `PipelineConfig`.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    name: Option<String>,
    max_fan_out: Option<usize>,
    require_drained: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Sets the pipeline name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the fan-out limit.
    #[must_use]
    pub fn max_fan_out(mut self, max: usize) -> Self {
        self.max_fan_out = Some(max);
        self
    }

    /// Makes undrained stages a compile error.
    #[must_use]
    pub fn require_drained(mut self, enabled: bool) -> Self {
        self.require_drained = Some(enabled);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> PipelineConfig {
        PipelineConfig {
            name: self
                .name
                .unwrap_or_else(|| DEFAULT_PIPELINE_NAME.to_string()),
            max_fan_out: self
                .max_fan_out
                .unwrap_or(DEFAULT_MAX_FAN_OUT)
                .clamp(1, MAX_FAN_OUT_LIMIT),
            require_drained: self.require_drained.unwrap_or(false),
        }
    }
}
