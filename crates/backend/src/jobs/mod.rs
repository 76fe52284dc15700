pub mod lock;
pub mod notify;
pub mod queue;
pub mod result_store;
pub mod runner;

use thiserror::Error;

/// Ошибки инфраструктуры задач (Redis, сериализация payload).
#[derive(Debug, Error)]
pub enum JobsError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
