use thiserror::Error;

use crate::resource_state::TransitionMode;

/// Suffix most shader authors use to pair `g_Tex` with `g_Tex_sampler`.
pub const DEFAULT_COMBINED_SAMPLER_SUFFIX: &str = "_sampler";

pub const ENV_COMBINED_SAMPLER_SUFFIX: &str = "STRATA_COMBINED_SAMPLER_SUFFIX";
pub const ENV_TRANSITION_MODE: &str = "STRATA_TRANSITION_MODE";
pub const ENV_VERIFY_COMMITTED: &str = "STRATA_VERIFY_COMMITTED";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Engine-wide settings owned by the render device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Suffix used when a shader does not specify its own combined-sampler suffix.
    /// `None` disables combined texture samplers.
    pub combined_sampler_suffix: Option<String>,
    /// Mode used by callers that do not pick a transition mode explicitly.
    pub transition_mode: TransitionMode,
    /// Re-read the native context after every commit and compare it with the tracked state.
    /// Only honored with the `development` feature.
    pub verify_committed: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            combined_sampler_suffix: None,
            transition_mode: TransitionMode::Transition,
            verify_committed: false,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable lookup; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(suffix) = lookup(ENV_COMBINED_SAMPLER_SUFFIX) {
            let suffix = suffix.trim();
            config.combined_sampler_suffix = (!suffix.is_empty()).then(|| suffix.to_owned());
        }

        if let Some(mode) = lookup(ENV_TRANSITION_MODE) {
            config.transition_mode = mode.parse().map_err(|reason| ConfigError::InvalidEnv {
                var: ENV_TRANSITION_MODE,
                value: mode.clone(),
                reason,
            })?;
        }

        if let Some(flag) = lookup(ENV_VERIFY_COMMITTED) {
            config.verify_committed = parse_bool(&flag).ok_or_else(|| ConfigError::InvalidEnv {
                var: ENV_VERIFY_COMMITTED,
                value: flag.clone(),
                reason: "expected one of 0, 1, true, false".to_owned(),
            })?;
        }

        Ok(config)
    }

    pub fn with_combined_sampler_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.combined_sampler_suffix = Some(suffix.into());
        self
    }

    pub fn with_verify_committed(mut self, verify: bool) -> Self {
        self.verify_committed = verify;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}
