#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CandidateFilter, GameSessionRecord, InMemoryRepository, PersistedSession, ProfileRepository,
    QuestionRepository, ResultPersister, Storage, StorageError,
};
