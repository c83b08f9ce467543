use rand::Rng;
use rand::rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

use quiz_core::model::Question;

use crate::error::SessionError;

/// Picks the questions for a new session out of a candidate pool.
///
/// Candidates are shuffled uniformly, then the first `min(requested, pool)`
/// are kept. Duplicate ids in the pool are collapsed before shuffling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionBuilder {
    requested: u32,
}

impl SessionBuilder {
    #[must_use]
    pub fn new(requested_count: u32) -> Self {
        Self {
            requested: requested_count,
        }
    }

    #[must_use]
    pub fn requested(&self) -> u32 {
        self.requested
    }

    /// Build the ordered question list using the thread-local RNG.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidQuestionCount` for a zero count and
    /// `SessionError::NoQuestionsAvailable` for an empty pool.
    pub fn build(self, candidates: Vec<Question>) -> Result<Vec<Question>, SessionError> {
        let mut rng = rng();
        self.build_with_rng(candidates, &mut rng)
    }

    /// Same as [`SessionBuilder::build`] with a caller-supplied RNG.
    ///
    /// # Errors
    ///
    /// See [`SessionBuilder::build`].
    pub fn build_with_rng<R: Rng + ?Sized>(
        self,
        candidates: Vec<Question>,
        rng: &mut R,
    ) -> Result<Vec<Question>, SessionError> {
        if self.requested == 0 {
            return Err(SessionError::InvalidQuestionCount);
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        let mut pool: Vec<Question> = candidates
            .into_iter()
            .filter(|q| seen.insert(q.id()))
            .collect();
        if pool.is_empty() {
            return Err(SessionError::NoQuestionsAvailable);
        }

        pool.as_mut_slice().shuffle(rng);
        let take = usize::try_from(self.requested).unwrap_or(usize::MAX);
        pool.truncate(take);
        pool.shrink_to_fit();
        Ok(pool)
    }
}
