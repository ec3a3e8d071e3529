//! Per-session clock settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DebateError;

/// Inclusive millisecond range a setting must fall in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: u64,
    pub max: u64,
}

impl Bounds {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Clock settings for one session. Out-of-range values are rejected, never clamped.
///
/// Missing fields take their defaults; camelCase keys are accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    #[serde(alias = "prepDurationMs")]
    pub prep_duration_ms: u64,
    #[serde(alias = "perSpeechDurationMs")]
    pub per_speech_duration_ms: u64,
    #[serde(alias = "breakBetweenSpeakersMs")]
    pub break_between_speakers_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            prep_duration_ms: 60_000,
            per_speech_duration_ms: 180_000,
            break_between_speakers_ms: 5_000,
        }
    }
}

impl TimingConfig {
    pub const PREP_BOUNDS: Bounds = Bounds::new(5_000, 1_800_000);
    pub const SPEECH_BOUNDS: Bounds = Bounds::new(10_000, 900_000);
    pub const BREAK_BOUNDS: Bounds = Bounds::new(0, 120_000);

    /// Check every setting against its bounds
    pub fn validate(&self) -> Result<(), DebateError> {
        let checks = [
            ("prep_duration_ms", self.prep_duration_ms, Self::PREP_BOUNDS),
            (
                "per_speech_duration_ms",
                self.per_speech_duration_ms,
                Self::SPEECH_BOUNDS,
            ),
            (
                "break_between_speakers_ms",
                self.break_between_speakers_ms,
                Self::BREAK_BOUNDS,
            ),
        ];
        for (name, value, bounds) in checks {
            if !bounds.contains(value) {
                return Err(DebateError::InvalidTiming(format!(
                    "{} = {} is outside {}..={}",
                    name, value, bounds.min, bounds.max
                )));
            }
        }
        Ok(())
    }

    pub fn prep_duration(&self) -> Duration {
        Duration::from_millis(self.prep_duration_ms)
    }

    /// Length of a speaker's window; the break is folded in when the turn advanced
    pub fn speech_window(&self, after_break: bool) -> Duration {
        let mut ms = self.per_speech_duration_ms;
        if after_break {
            ms += self.break_between_speakers_ms;
        }
        Duration::from_millis(ms)
    }
}
