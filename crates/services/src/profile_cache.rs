use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use quiz_core::model::{Profile, UserId};
use storage::repository::{ProfileRepository, StorageError};
use tracing::debug;

/// Read-through cache over the profile repository.
///
/// Entries are dropped explicitly with [`ProfileCache::invalidate`] after a
/// write, never by age. A read that was in flight across an invalidation
/// returns its value but does not fill the cache.
pub struct ProfileCache {
    repo: Arc<dyn ProfileRepository>,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<UserId, Profile>,
    // Bumped per user by `invalidate`, globally by `clear`.
    generations: HashMap<UserId, u64>,
    epoch: u64,
}

impl CacheState {
    fn stamp(&self, user_id: UserId) -> (u64, u64) {
        let generation = self.generations.get(&user_id).copied().unwrap_or(0);
        (self.epoch, generation)
    }
}

impl ProfileCache {
    #[must_use]
    pub fn new(repo: Arc<dyn ProfileRepository>) -> Self {
        Self {
            repo,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Fetch a profile, hitting the repository only on a miss.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown players, or other storage
    /// errors. Failures are not cached.
    pub async fn get(&self, user_id: UserId) -> Result<Profile, StorageError> {
        let stamp = {
            let state = self.lock()?;
            if let Some(profile) = state.entries.get(&user_id) {
                debug!(%user_id, "profile cache hit");
                return Ok(profile.clone());
            }
            state.stamp(user_id)
        };

        let profile = self.repo.get_profile(user_id).await?;

        let mut state = self.lock()?;
        if state.stamp(user_id) == stamp {
            state.entries.insert(user_id, profile.clone());
        } else {
            debug!(%user_id, "profile invalidated during read, not caching");
        }
        Ok(profile)
    }

    /// Returns true when an entry was removed.
    pub fn invalidate(&self, user_id: UserId) -> bool {
        let mut state = self.lock_recovering();
        *state.generations.entry(user_id).or_insert(0) += 1;
        state.entries.remove(&user_id).is_some()
    }

    pub fn clear(&self) {
        let mut state = self.lock_recovering();
        state.epoch += 1;
        state.entries.clear();
        state.generations.clear();
    }

    #[must_use]
    pub fn contains(&self, user_id: UserId) -> bool {
        self.state
            .lock()
            .is_ok_and(|state| state.entries.contains_key(&user_id))
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn lock_recovering(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::ProfileDelta;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use storage::repository::InMemoryRepository;
    use tokio::sync::Notify;
    use uuid::Uuid;

    struct CountingProfiles {
        inner: InMemoryRepository,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl ProfileRepository for CountingProfiles {
        async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
            self.inner.upsert_profile(profile).await
        }

        async fn get_profile(&self, user_id: UserId) -> Result<Profile, StorageError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_profile(user_id).await
        }
    }

    /// Holds the first read after it has fetched, until released.
    struct GatedProfiles {
        inner: InMemoryRepository,
        gate: AtomicBool,
        fetched: Notify,
        release: Notify,
    }

    impl GatedProfiles {
        fn new(inner: InMemoryRepository) -> Self {
            Self {
                inner,
                gate: AtomicBool::new(true),
                fetched: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl ProfileRepository for GatedProfiles {
        async fn upsert_profile(&self, profile: &Profile) -> Result<(), StorageError> {
            self.inner.upsert_profile(profile).await
        }

        async fn get_profile(&self, user_id: UserId) -> Result<Profile, StorageError> {
            let profile = self.inner.get_profile(user_id).await;
            if self.gate.swap(false, Ordering::SeqCst) {
                self.fetched.notify_one();
                self.release.notified().await;
            }
            profile
        }
    }

    async fn stale_read_setup() -> (Arc<GatedProfiles>, Arc<ProfileCache>, UserId, Profile) {
        let repo = Arc::new(GatedProfiles::new(InMemoryRepository::new()));
        let user = UserId::new(Uuid::new_v4());
        let fresh = Profile::new(user, "sari").unwrap();
        repo.upsert_profile(&fresh).await.unwrap();
        let cache = Arc::new(ProfileCache::new(repo.clone()));
        let updated = fresh.apply(ProfileDelta {
            points: 50,
            games_played: 1,
        });
        (repo, cache, user, updated)
    }

    #[tokio::test]
    async fn read_racing_invalidate_does_not_refill_cache() {
        let (repo, cache, user, updated) = stale_read_setup().await;

        let reader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get(user).await }
        });
        repo.fetched.notified().await;

        repo.upsert_profile(&updated).await.unwrap();
        assert!(!cache.invalidate(user));
        repo.release.notify_one();

        let stale = reader.await.unwrap().unwrap();
        assert_eq!(stale.total_points(), 0);
        assert!(!cache.contains(user));

        let current = cache.get(user).await.unwrap();
        assert_eq!(current.total_points(), 50);
        assert!(cache.contains(user));
    }

    #[tokio::test]
    async fn read_racing_clear_does_not_refill_cache() {
        let (repo, cache, user, updated) = stale_read_setup().await;

        let reader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get(user).await }
        });
        repo.fetched.notified().await;

        repo.upsert_profile(&updated).await.unwrap();
        cache.clear();
        repo.release.notify_one();

        reader.await.unwrap().unwrap();
        assert!(!cache.contains(user));
        assert_eq!(cache.get(user).await.unwrap().total_points(), 50);
    }

    #[tokio::test]
    async fn clear_drops_every_entry() {
        let repo = InMemoryRepository::new();
        let first = UserId::new(Uuid::new_v4());
        let second = UserId::new(Uuid::new_v4());
        for (user, name) in [(first, "ayu"), (second, "bayu")] {
            repo.upsert_profile(&Profile::new(user, name).unwrap())
                .await
                .unwrap();
        }

        let cache = ProfileCache::new(Arc::new(repo));
        cache.get(first).await.unwrap();
        cache.get(second).await.unwrap();
        assert!(cache.contains(first) && cache.contains(second));

        cache.clear();
        assert!(!cache.contains(first));
        assert!(!cache.contains(second));
        cache.get(first).await.unwrap();
        assert!(cache.contains(first));
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let repo = Arc::new(CountingProfiles {
            inner: InMemoryRepository::new(),
            reads: AtomicUsize::new(0),
        });
        let user = UserId::new(Uuid::new_v4());
        repo.upsert_profile(&Profile::new(user, "dewi").unwrap())
            .await
            .unwrap();

        let cache = ProfileCache::new(repo.clone());
        cache.get(user).await.unwrap();
        cache.get(user).await.unwrap();
        assert_eq!(repo.reads.load(Ordering::SeqCst), 1);
        assert!(cache.contains(user));

        assert!(cache.invalidate(user));
        assert!(!cache.invalidate(user));
        cache.get(user).await.unwrap();
        assert_eq!(repo.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn misses_are_not_cached() {
        let cache = ProfileCache::new(Arc::new(InMemoryRepository::new()));
        let user = UserId::new(Uuid::new_v4());
        assert!(matches!(cache.get(user).await, Err(StorageError::NotFound)));
        assert!(!cache.contains(user));
    }
}
