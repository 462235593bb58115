use serde::Serialize;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("answer time limit must be between 5 and 600 seconds, got {0}")]
    InvalidTimeLimit(u32),

    #[error("weeks per topic must be finite and > 0, got {0}")]
    InvalidWeeksPerTopic(f64),

    #[error("minimum weeks must be finite and > 0, got {0}")]
    InvalidMinimumWeeks(f64),

    #[error("quick pace threshold ({quick}s) must be below slow pace threshold ({slow}s)")]
    InvalidPaceThresholds { quick: u32, slow: u32 },
}

//
// ─── PHASE ESTIMATE ────────────────────────────────────────────────────────────
//

/// Effort model for one roadmap phase: `max(minimum_weeks, topics * weeks_per_topic)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseEstimate {
    weeks_per_topic: f64,
    minimum_weeks: f64,
}

impl PhaseEstimate {
    /// # Errors
    ///
    /// Returns `SettingsError` if either value is non-finite or not positive.
    pub fn new(weeks_per_topic: f64, minimum_weeks: f64) -> Result<Self, SettingsError> {
        if !weeks_per_topic.is_finite() || weeks_per_topic <= 0.0 {
            return Err(SettingsError::InvalidWeeksPerTopic(weeks_per_topic));
        }
        if !minimum_weeks.is_finite() || minimum_weeks <= 0.0 {
            return Err(SettingsError::InvalidMinimumWeeks(minimum_weeks));
        }
        Ok(Self {
            weeks_per_topic,
            minimum_weeks,
        })
    }

    #[must_use]
    pub fn weeks_per_topic(&self) -> f64 {
        self.weeks_per_topic
    }

    #[must_use]
    pub fn minimum_weeks(&self) -> f64 {
        self.minimum_weeks
    }

    /// Estimated weeks for a phase holding `topics` topics.
    #[must_use]
    pub fn weeks_for(&self, topics: usize) -> f64 {
        let topics = u32::try_from(topics).unwrap_or(u32::MAX);
        (f64::from(topics) * self.weeks_per_topic).max(self.minimum_weeks)
    }
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Tunable constants of the assessment workflow and roadmap estimates.
///
/// The defaults are product choices:
/// - 45 seconds to answer each question
/// - 1 / 0.5 / 0.25 weeks per topic for the three roadmap phases
/// - minimum phase lengths of 1 / 1 / 0.5 weeks
/// - quick pace at or below 20 seconds, slow pace above 45 seconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentSettings {
    answer_time_limit_secs: u32,
    foundation: PhaseEstimate,
    enhancement: PhaseEstimate,
    advanced: PhaseEstimate,
    quick_pace_max_secs: u32,
    slow_pace_min_secs: u32,
}

impl Default for AssessmentSettings {
    fn default() -> Self {
        Self {
            answer_time_limit_secs: 45,
            foundation: PhaseEstimate {
                weeks_per_topic: 1.0,
                minimum_weeks: 1.0,
            },
            enhancement: PhaseEstimate {
                weeks_per_topic: 0.5,
                minimum_weeks: 1.0,
            },
            advanced: PhaseEstimate {
                weeks_per_topic: 0.25,
                minimum_weeks: 0.5,
            },
            quick_pace_max_secs: 20,
            slow_pace_min_secs: 45,
        }
    }
}

impl AssessmentSettings {
    /// Creates custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the time limit is outside 5..=600 seconds or the
    /// pace thresholds are inverted.
    pub fn new(
        answer_time_limit_secs: u32,
        foundation: PhaseEstimate,
        enhancement: PhaseEstimate,
        advanced: PhaseEstimate,
        quick_pace_max_secs: u32,
        slow_pace_min_secs: u32,
    ) -> Result<Self, SettingsError> {
        validate_time_limit(answer_time_limit_secs)?;
        if quick_pace_max_secs >= slow_pace_min_secs {
            return Err(SettingsError::InvalidPaceThresholds {
                quick: quick_pace_max_secs,
                slow: slow_pace_min_secs,
            });
        }
        Ok(Self {
            answer_time_limit_secs,
            foundation,
            enhancement,
            advanced,
            quick_pace_max_secs,
            slow_pace_min_secs,
        })
    }

    /// Returns a copy with a different answer time limit.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidTimeLimit` if outside 5..=600 seconds.
    pub fn with_time_limit(mut self, secs: u32) -> Result<Self, SettingsError> {
        validate_time_limit(secs)?;
        self.answer_time_limit_secs = secs;
        Ok(self)
    }

    #[must_use]
    pub fn answer_time_limit_secs(&self) -> u32 {
        self.answer_time_limit_secs
    }

    #[must_use]
    pub fn foundation(&self) -> PhaseEstimate {
        self.foundation
    }

    #[must_use]
    pub fn enhancement(&self) -> PhaseEstimate {
        self.enhancement
    }

    #[must_use]
    pub fn advanced(&self) -> PhaseEstimate {
        self.advanced
    }

    #[must_use]
    pub fn quick_pace_max_secs(&self) -> u32 {
        self.quick_pace_max_secs
    }

    #[must_use]
    pub fn slow_pace_min_secs(&self) -> u32 {
        self.slow_pace_min_secs
    }
}

fn validate_time_limit(secs: u32) -> Result<(), SettingsError> {
    if (5..=600).contains(&secs) {
        Ok(())
    } else {
        Err(SettingsError::InvalidTimeLimit(secs))
    }
}
