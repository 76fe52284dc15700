use redis::AsyncCommands;
use serde::Serialize;
use uuid::Uuid;

use contracts::job::JobResult;

use super::JobsError;

/// Хранилище терминальных результатов задач.
///
/// Ключ - идентификатор задачи, значение - сериализованный JobResult.
/// Запись через SET NX: результат пишется один раз, повторная доставка
/// той же задачи не перезаписывает первый исход. Записи истекают по
/// TTL, чтение несуществующего или истекшего ключа дает None.
pub struct ResultStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl ResultStore {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    /// Записывает результат, если его еще нет. Возвращает true, если
    /// запись произошла.
    pub async fn set_nx<T: Serialize>(
        &self,
        job_id: Uuid,
        result: &JobResult<T>,
    ) -> Result<bool, JobsError> {
        let payload = serde_json::to_string(result)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(job_id.to_string())
            .arg(payload)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<JobResult>, JobsError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(job_id.to_string()).await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(JobsError::from)
    }
}
