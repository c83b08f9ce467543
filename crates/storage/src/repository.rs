use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    AnswerRecord, CategoryId, Difficulty, Profile, ProfileDelta, Question, QuestionId, QuizResult,
    SessionId, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Filter handed to the question supplier when a session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    pub category: Option<CategoryId>,
    pub difficulty: Option<Difficulty>,
    pub exclude_ids: Vec<QuestionId>,
}

impl CandidateFilter {
    #[must_use]
    pub fn matches(&self, question: &Question) -> bool {
        self.category.is_none_or(|c| c == question.category_id())
            && self.difficulty.is_none_or(|d| d == question.difficulty())
            && !self.exclude_ids.contains(&question.id())
    }
}

/// Persisted shape of a finished session's header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSessionRecord {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub category_id: CategoryId,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub total_time_secs: u32,
    pub score: u8,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl GameSessionRecord {
    #[must_use]
    pub fn from_result(user_id: UserId, result: &QuizResult) -> Self {
        Self {
            session_id: result.session_id(),
            user_id,
            category_id: result.category_id(),
            total_questions: result.total_questions(),
            correct_answers: result.correct_answers(),
            total_time_secs: result.total_time_secs(),
            score: result.score(),
            started_at: result.started_at(),
            completed_at: result.completed_at(),
        }
    }
}

/// A session as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub id: i64,
    pub session: GameSessionRecord,
    pub answers: Vec<AnswerRecord>,
}

/// Question supplier: the read side of the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert or replace a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError>;

    /// Fetch every question matching the filter. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails or a stored row is invalid.
    async fn fetch_candidates(&self, filter: &CandidateFilter)
    -> Result<Vec<Question>, StorageError>;
}

/// Result persister: writes a finished session, its answers, and the
/// profile delta as one unit.
#[async_trait]
pub trait ResultPersister: Send + Sync {
    /// Persist a finished session. Re-persisting the same `session_id` returns
    /// the existing row id without applying the delta twice.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the player has no profile, or other
    /// storage errors. Nothing is written on error.
    async fn persist(
        &self,
        session: &GameSessionRecord,
        answers: &[AnswerRecord],
        delta: ProfileDelta,
    ) -> Result<i64, StorageError>;

    /// Fetch a persisted session by row ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: i64) -> Result<PersistedSession, StorageError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert or replace a profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the profile cannot be stored.
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError>;

    /// Fetch a profile by user ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_profile(&self, user_id: UserId) -> Result<Profile, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<BTreeMap<QuestionId, Question>>>,
    profiles: Arc<Mutex<HashMap<UserId, Profile>>>,
    sessions: Arc<Mutex<Vec<PersistedSession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn fetch_candidates(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard
            .values()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResultPersister for InMemoryRepository {
    async fn persist(
        &self,
        session: &GameSessionRecord,
        answers: &[AnswerRecord],
        delta: ProfileDelta,
    ) -> Result<i64, StorageError> {
        // Lock order: sessions, then profiles.
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        if let Some(existing) = sessions
            .iter()
            .find(|s| s.session.session_id == session.session_id)
        {
            return Ok(existing.id);
        }

        let mut profiles = self.profiles.lock().map_err(poisoned)?;
        let profile = profiles
            .get(&session.user_id)
            .ok_or(StorageError::NotFound)?
            .apply(delta);
        profiles.insert(session.user_id, profile);

        let id = i64::try_from(sessions.len()).map_err(poisoned)? + 1;
        sessions.push(PersistedSession {
            id,
            session: session.clone(),
            answers: answers.to_vec(),
        });
        Ok(id)
    }

    async fn get_session(&self, id: i64) -> Result<PersistedSession, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        guard.insert(profile.user_id(), profile.clone());
        Ok(())
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Profile, StorageError> {
        let guard = self.profiles.lock().map_err(poisoned)?;
        guard.get(&user_id).cloned().ok_or(StorageError::NotFound)
    }
}

/// Aggregates the collaborator repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub results: Arc<dyn ResultPersister>,
    pub profiles: Arc<dyn ProfileRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let results: Arc<dyn ResultPersister> = Arc::new(repo.clone());
        let profiles: Arc<dyn ProfileRepository> = Arc::new(repo);
        Self {
            questions,
            results,
            profiles,
        }
    }
}
