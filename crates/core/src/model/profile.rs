use thiserror::Error;

use crate::model::UserId;

/// Points needed per level.
pub const POINTS_PER_LEVEL: u64 = 1_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("username cannot be empty")]
    EmptyUsername,
}

/// Running totals added to a profile after a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileDelta {
    pub points: u64,
    pub games_played: u32,
}

/// Player totals as kept by the profile store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    user_id: UserId,
    username: String,
    total_points: u64,
    games_played: u32,
    current_level: u32,
}

impl Profile {
    /// Fresh profile with zero totals.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::EmptyUsername` if the username is blank.
    pub fn new(user_id: UserId, username: impl Into<String>) -> Result<Self, ProfileError> {
        Self::from_persisted(user_id, username, 0, 0)
    }

    /// Rehydrate a profile; the level is always derived from the points.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::EmptyUsername` if the username is blank.
    pub fn from_persisted(
        user_id: UserId,
        username: impl Into<String>,
        total_points: u64,
        games_played: u32,
    ) -> Result<Self, ProfileError> {
        let username = username.into().trim().to_owned();
        if username.is_empty() {
            return Err(ProfileError::EmptyUsername);
        }
        Ok(Self {
            user_id,
            username,
            total_points,
            games_played,
            current_level: level_for_points(total_points),
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    #[must_use]
    pub fn games_played(&self) -> u32 {
        self.games_played
    }

    #[must_use]
    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    /// Add a finished session's delta and recompute the level.
    #[must_use]
    pub fn apply(&self, delta: ProfileDelta) -> Self {
        let total_points = self.total_points.saturating_add(delta.points);
        Self {
            user_id: self.user_id,
            username: self.username.clone(),
            total_points,
            games_played: self.games_played.saturating_add(delta.games_played),
            current_level: level_for_points(total_points),
        }
    }
}

#[must_use]
pub fn level_for_points(total_points: u64) -> u32 {
    u32::try_from(total_points / POINTS_PER_LEVEL)
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn applying_delta_updates_level() {
        let profile = Profile::from_persisted(UserId::new(Uuid::nil()), "ana", 950, 4).unwrap();
        assert_eq!(profile.current_level(), 1);

        let next = profile.apply(ProfileDelta {
            points: 60,
            games_played: 1,
        });
        assert_eq!(next.total_points(), 1_010);
        assert_eq!(next.games_played(), 5);
        assert_eq!(next.current_level(), 2);
    }

    #[test]
    fn blank_username_is_rejected() {
        let err = Profile::new(UserId::new(Uuid::nil()), "  ").unwrap_err();
        assert_eq!(err, ProfileError::EmptyUsername);
    }
}
