use thiserror::Error;

use crate::model::Difficulty;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("question counts must be > 0")]
    InvalidQuestionCount,

    #[error("max question count ({max}) is below a default count ({default})")]
    MaxBelowDefault { max: u32, default: u32 },

    #[error("persist attempts must be > 0")]
    InvalidPersistAttempts,

    #[error("tick interval must be > 0")]
    InvalidTickInterval,
}

/// Tunables for starting and running quiz sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettings {
    easy_count: u32,
    medium_count: u32,
    hard_count: u32,
    fallback_count: u32,
    max_question_count: u32,
    persist_attempts: u32,
    persist_backoff_ms: u64,
    tick_millis: u64,
}

impl QuizSettings {
    /// Build custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any count, the attempt budget or the tick is
    /// zero, or if the cap is below one of the per-difficulty defaults.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        easy_count: u32,
        medium_count: u32,
        hard_count: u32,
        fallback_count: u32,
        max_question_count: u32,
        persist_attempts: u32,
        persist_backoff_ms: u64,
        tick_millis: u64,
    ) -> Result<Self, SettingsError> {
        let defaults = [easy_count, medium_count, hard_count, fallback_count];
        if defaults.contains(&0) || max_question_count == 0 {
            return Err(SettingsError::InvalidQuestionCount);
        }
        if let Some(default) = defaults.into_iter().find(|c| *c > max_question_count) {
            return Err(SettingsError::MaxBelowDefault {
                max: max_question_count,
                default,
            });
        }
        if persist_attempts == 0 {
            return Err(SettingsError::InvalidPersistAttempts);
        }
        if tick_millis == 0 {
            return Err(SettingsError::InvalidTickInterval);
        }

        Ok(Self {
            easy_count,
            medium_count,
            hard_count,
            fallback_count,
            max_question_count,
            persist_attempts,
            persist_backoff_ms,
            tick_millis,
        })
    }

    /// Recommended session length for a difficulty filter.
    #[must_use]
    pub fn default_count(&self, difficulty: Option<Difficulty>) -> u32 {
        match difficulty {
            Some(Difficulty::Easy) => self.easy_count,
            Some(Difficulty::Medium) => self.medium_count,
            Some(Difficulty::Hard) => self.hard_count,
            Some(Difficulty::Expert) | None => self.fallback_count,
        }
    }

    /// Resolve the number of questions to request, capped at the maximum.
    #[must_use]
    pub fn resolve_count(&self, requested: Option<u32>, difficulty: Option<Difficulty>) -> u32 {
        requested
            .unwrap_or_else(|| self.default_count(difficulty))
            .min(self.max_question_count)
    }

    #[must_use]
    pub fn max_question_count(&self) -> u32 {
        self.max_question_count
    }

    #[must_use]
    pub fn persist_attempts(&self) -> u32 {
        self.persist_attempts
    }

    #[must_use]
    pub fn persist_backoff_ms(&self) -> u64 {
        self.persist_backoff_ms
    }

    #[must_use]
    pub fn tick_millis(&self) -> u64 {
        self.tick_millis
    }
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            easy_count: 10,
            medium_count: 15,
            hard_count: 20,
            fallback_count: 10,
            max_question_count: 50,
            persist_attempts: 3,
            persist_backoff_ms: 200,
            tick_millis: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_difficulty() {
        let settings = QuizSettings::default();
        assert_eq!(settings.default_count(Some(Difficulty::Easy)), 10);
        assert_eq!(settings.default_count(Some(Difficulty::Medium)), 15);
        assert_eq!(settings.default_count(Some(Difficulty::Hard)), 20);
        assert_eq!(settings.default_count(Some(Difficulty::Expert)), 10);
        assert_eq!(settings.default_count(None), 10);
    }

    #[test]
    fn requested_count_is_capped() {
        let settings = QuizSettings::default();
        assert_eq!(settings.resolve_count(Some(80), None), 50);
        assert_eq!(settings.resolve_count(Some(8), Some(Difficulty::Hard)), 8);
        assert_eq!(settings.resolve_count(None, Some(Difficulty::Medium)), 15);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert_eq!(
            QuizSettings::new(0, 15, 20, 10, 50, 3, 200, 1_000).unwrap_err(),
            SettingsError::InvalidQuestionCount
        );
        assert_eq!(
            QuizSettings::new(10, 15, 20, 10, 12, 3, 200, 1_000).unwrap_err(),
            SettingsError::MaxBelowDefault {
                max: 12,
                default: 15
            }
        );
        assert_eq!(
            QuizSettings::new(10, 15, 20, 10, 50, 0, 200, 1_000).unwrap_err(),
            SettingsError::InvalidPersistAttempts
        );
        assert_eq!(
            QuizSettings::new(10, 15, 20, 10, 50, 3, 200, 0).unwrap_err(),
            SettingsError::InvalidTickInterval
        );
    }
}
