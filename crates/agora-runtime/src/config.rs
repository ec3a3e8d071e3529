//! Runtime configuration

use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use agora_llm::ConfigError;

/// Knobs for the orchestrator's background work
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Shortest pause before an agent speaks (env: AGORA_AGENT_DELAY_MIN_MS)
    pub agent_delay_min: Duration,
    /// Longest pause before an agent speaks (env: AGORA_AGENT_DELAY_MAX_MS)
    pub agent_delay_max: Duration,
    /// Generator attempts before falling back to a template (env: AGORA_AGENT_ATTEMPTS)
    pub agent_attempts: u32,
    /// Speeches shown to the generator (env: AGORA_HISTORY_WINDOW)
    pub history_window: usize,
    /// How long finalization waits for outstanding feedback (env: AGORA_FEEDBACK_GRACE_MS)
    pub feedback_grace: Duration,
    /// Buffered events per session channel (env: AGORA_EVENT_CAPACITY)
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            agent_delay_min: Duration::from_millis(2_000),
            agent_delay_max: Duration::from_millis(5_000),
            agent_attempts: 3,
            history_window: 6,
            feedback_grace: Duration::from_millis(3_000),
            event_capacity: 256,
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{} = '{}' is not valid", name, raw))),
        Err(_) => Ok(None),
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ms = |name: &str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(parse_env::<u64>(name)?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };

        let config = Self {
            agent_delay_min: ms("AGORA_AGENT_DELAY_MIN_MS", defaults.agent_delay_min)?,
            agent_delay_max: ms("AGORA_AGENT_DELAY_MAX_MS", defaults.agent_delay_max)?,
            agent_attempts: parse_env("AGORA_AGENT_ATTEMPTS")?.unwrap_or(defaults.agent_attempts),
            history_window: parse_env("AGORA_HISTORY_WINDOW")?.unwrap_or(defaults.history_window),
            feedback_grace: ms("AGORA_FEEDBACK_GRACE_MS", defaults.feedback_grace)?,
            event_capacity: parse_env("AGORA_EVENT_CAPACITY")?.unwrap_or(defaults.event_capacity),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_delay_min > self.agent_delay_max {
            return Err(ConfigError::Invalid(format!(
                "agent delay min {:?} exceeds max {:?}",
                self.agent_delay_min, self.agent_delay_max
            )));
        }
        if self.agent_attempts == 0 {
            return Err(ConfigError::Invalid(
                "agent attempts must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Agent delay bounds in milliseconds
    pub fn agent_delay_ms(&self) -> RangeInclusive<u64> {
        self.agent_delay_min.as_millis() as u64..=self.agent_delay_max.as_millis() as u64
    }

    /// Zero delays and a short grace period, for tests and simulations
    pub fn instant() -> Self {
        Self {
            agent_delay_min: Duration::ZERO,
            agent_delay_max: Duration::ZERO,
            feedback_grace: Duration::from_millis(500),
            ..Self::default()
        }
    }
}
