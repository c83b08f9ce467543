use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use quiz_core::Clock;
use quiz_core::model::{
    CategoryId, Difficulty, Profile, QuestionId, QuizResult, QuizSettings, Submission, UserId,
};
use storage::repository::{
    CandidateFilter, GameSessionRecord, ProfileRepository, QuestionRepository, ResultPersister,
    StorageError,
};

use super::builder::SessionBuilder;
use super::runner::{SessionEvent, SessionHandle, spawn_session};
use super::session::{QuizSession, RecordedAnswer};
use crate::error::SessionError;
use crate::profile_cache::ProfileCache;

/// Parameters for starting a session. `None` means "any" for the filters and
/// "difficulty default" for the count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizRequest {
    pub category: Option<CategoryId>,
    pub difficulty: Option<Difficulty>,
    pub exclude_ids: Vec<QuestionId>,
    pub count: Option<u32>,
}

/// Result of answering a single question in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAnswerResult {
    pub recorded: RecordedAnswer,
    pub is_complete: bool,
    pub result_id: Option<i64>,
}

/// Orchestrates session start and persisted answering.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    settings: QuizSettings,
    questions: Arc<dyn QuestionRepository>,
    results: Arc<dyn ResultPersister>,
    profiles: Arc<ProfileCache>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: QuizSettings,
        questions: Arc<dyn QuestionRepository>,
        results: Arc<dyn ResultPersister>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            clock,
            settings,
            questions,
            results,
            profiles: Arc::new(ProfileCache::new(profiles)),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    #[must_use]
    pub fn profile_cache(&self) -> &ProfileCache {
        &self.profiles
    }

    /// Current profile for a player, served from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the profile is missing or unreadable.
    pub async fn profile(&self, user_id: UserId) -> Result<Profile, SessionError> {
        Ok(self.profiles.get(user_id).await?)
    }

    /// Start a new session for a player.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidQuestionCount` for an explicit count of
    /// zero, `NoQuestionsAvailable` if nothing matches the filter, or storage
    /// errors from the question supplier.
    pub async fn start_session(
        &self,
        user_id: UserId,
        request: &QuizRequest,
    ) -> Result<QuizSession, SessionError> {
        if request.count == Some(0) {
            return Err(SessionError::InvalidQuestionCount);
        }
        let count = self
            .settings
            .resolve_count(request.count, request.difficulty);

        let filter = CandidateFilter {
            category: request.category,
            difficulty: request.difficulty,
            exclude_ids: request.exclude_ids.clone(),
        };
        let candidates = self.questions.fetch_candidates(&filter).await?;
        let pool = candidates.len();
        let questions = SessionBuilder::new(count).build(candidates)?;
        let session = QuizSession::new(user_id, questions, self.clock)?;

        info!(
            session_id = %session.id(),
            %user_id,
            requested = count,
            pool,
            selected = session.total_questions(),
            "session started"
        );
        Ok(session)
    }

    /// Answer the active question and persist the result when it was the last.
    ///
    /// # Errors
    ///
    /// Returns the session's rejection for stale or finished slots, or
    /// `SessionError::Persist` if saving the result failed. On a persist
    /// failure the session keeps its result; call
    /// [`QuizLoopService::finalize_result`] to retry.
    pub async fn answer_current(
        &self,
        session: &mut QuizSession,
        submission: Submission,
    ) -> Result<SessionAnswerResult, SessionError> {
        let recorded = session.submit_current(submission)?;
        self.after_record(session, recorded).await
    }

    /// Time out the active question and persist the result when it was the last.
    ///
    /// # Errors
    ///
    /// Same as [`QuizLoopService::answer_current`].
    pub async fn timeout_current(
        &self,
        session: &mut QuizSession,
    ) -> Result<SessionAnswerResult, SessionError> {
        let recorded = session.on_timeout(session.current_index())?;
        self.after_record(session, recorded).await
    }

    /// Persist a completed session's result, retrying transient failures.
    ///
    /// Idempotent: a session that was already saved returns its row id
    /// without touching storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotCompleted` for a session still in progress or
    /// abandoned, and `SessionError::Persist` once retries are exhausted.
    pub async fn finalize_result(&self, session: &mut QuizSession) -> Result<i64, SessionError> {
        if let Some(id) = session.persisted_id() {
            return Ok(id);
        }
        let Some(result) = session.result() else {
            return Err(SessionError::NotCompleted);
        };

        let id = self.persist_with_retry(session.user_id(), result).await?;
        let (score, points) = (result.score(), result.total_points());
        session.set_persisted_id(id);
        self.profiles.invalidate(session.user_id());
        info!(
            session_id = %session.id(),
            row_id = id,
            score,
            points,
            "session result saved"
        );
        Ok(id)
    }

    /// Hand the session to a background runner that drives its countdown.
    ///
    /// Persist the returned session with [`QuizLoopService::finalize_result`]
    /// once the join handle resolves.
    #[must_use]
    pub fn spawn_runner(
        &self,
        session: QuizSession,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> (SessionHandle, JoinHandle<QuizSession>) {
        let tick = Duration::from_millis(self.settings.tick_millis());
        spawn_session(session, tick, events)
    }

    async fn after_record(
        &self,
        session: &mut QuizSession,
        recorded: RecordedAnswer,
    ) -> Result<SessionAnswerResult, SessionError> {
        if session.is_complete() && session.persisted_id().is_none() {
            self.finalize_result(session).await?;
        }

        Ok(SessionAnswerResult {
            recorded,
            is_complete: session.is_complete(),
            result_id: session.persisted_id(),
        })
    }

    async fn persist_with_retry(
        &self,
        user_id: UserId,
        result: &QuizResult,
    ) -> Result<i64, SessionError> {
        let record = GameSessionRecord::from_result(user_id, result);
        let answers = result.answer_records();
        let delta = result.profile_delta();
        let attempts = self.settings.persist_attempts();

        let mut attempt = 1;
        loop {
            match self.results.persist(&record, &answers, delta).await {
                Ok(id) => return Ok(id),
                // A missing profile will not appear by retrying.
                Err(source @ StorageError::NotFound) => {
                    return Err(SessionError::Persist {
                        attempts: attempt,
                        source,
                    });
                }
                Err(source) if attempt >= attempts => {
                    warn!(
                        session_id = %record.session_id,
                        attempts = attempt,
                        error = %source,
                        "giving up on saving session result"
                    );
                    return Err(SessionError::Persist {
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(
                        session_id = %record.session_id,
                        attempt,
                        error = %err,
                        "saving session result failed, retrying"
                    );
                    let backoff = self
                        .settings
                        .persist_backoff_ms()
                        .saturating_mul(u64::from(attempt));
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }
}
