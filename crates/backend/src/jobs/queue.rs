use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;

use contracts::job::CampaignJob;

use super::JobsError;
use crate::shared::config::JobsConfig;

/// Задача, прочитанная из потока: запись нужно подтвердить после
/// доставки результата.
pub struct QueuedJob {
    pub entry_id: String,
    pub job: CampaignJob,
}

/// Долговечная очередь задач на Redis Stream.
///
/// XADD при постановке, XREADGROUP с consumer group при разборе,
/// XACK после доставки результата. Доставка at-least-once: запись,
/// не подтвержденная до рестарта, будет прочитана заново из pending.
pub struct JobQueue {
    client: redis::Client,
    stream: String,
    group: String,
    block_ms: u64,
}

impl JobQueue {
    pub fn new(client: redis::Client, cfg: &JobsConfig) -> Self {
        Self {
            client,
            stream: cfg.stream.clone(),
            group: cfg.group.clone(),
            block_ms: cfg.block_ms,
        }
    }

    /// Создает consumer group (идемпотентно, BUSYGROUP игнорируется).
    pub async fn ensure_group(&self) -> Result<(), JobsError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let created: Result<String, redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        match created {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn enqueue(&self, job: &CampaignJob) -> Result<(), JobsError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("XADD")
            .arg(&self.stream)
            .arg("*")
            .arg("payload")
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        tracing::info!(
            "Задача поставлена в очередь. job_id={}, stream={}",
            job.job_id,
            self.stream
        );
        Ok(())
    }

    /// Именованный потребитель со своим соединением: блокирующее чтение
    /// не должно делить соединение с остальными операциями.
    pub async fn consumer(&self, name: &str) -> Result<JobConsumer, JobsError> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(JobConsumer {
            conn,
            stream: self.stream.clone(),
            group: self.group.clone(),
            consumer: name.to_string(),
            block_ms: self.block_ms,
            backlog_done: false,
        })
    }
}

pub struct JobConsumer {
    conn: MultiplexedConnection,
    stream: String,
    group: String,
    consumer: String,
    block_ms: u64,
    backlog_done: bool,
}

impl JobConsumer {
    /// Следующая задача. После рестарта сначала дочитываются записи,
    /// оставшиеся за этим потребителем без подтверждения, затем поток
    /// читается блокирующе.
    pub async fn next(&mut self) -> Result<Option<QueuedJob>, JobsError> {
        let (id, options) = if self.backlog_done {
            (
                ">",
                StreamReadOptions::default()
                    .group(&self.group, &self.consumer)
                    .count(1)
                    .block(self.block_ms as usize),
            )
        } else {
            (
                "0",
                StreamReadOptions::default()
                    .group(&self.group, &self.consumer)
                    .count(1),
            )
        };

        // nil при истечении BLOCK разбирается как None
        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.stream], &[id], &options)
            .await?;

        let entry = reply
            .into_iter()
            .flat_map(|r| r.keys.into_iter())
            .flat_map(|key| key.ids.into_iter())
            .next();
        let Some(entry) = entry else {
            // pending исчерпан, переключаемся на новые записи
            self.backlog_done = true;
            return Ok(None);
        };

        let payload: Option<String> = entry.get("payload");
        let Some(payload) = payload else {
            tracing::error!("Запись без payload, подтверждаем и пропускаем. id={}", entry.id);
            self.ack(&entry.id).await?;
            return Ok(None);
        };
        match serde_json::from_str::<CampaignJob>(&payload) {
            Ok(job) => Ok(Some(QueuedJob {
                entry_id: entry.id,
                job,
            })),
            Err(e) => {
                tracing::error!(
                    "Нечитаемый payload задачи, подтверждаем и пропускаем. id={}, error={e}",
                    entry.id
                );
                self.ack(&entry.id).await?;
                Ok(None)
            }
        }
    }

    pub async fn ack(&mut self, entry_id: &str) -> Result<(), JobsError> {
        let _: i64 = self
            .conn
            .xack(&self.stream, &self.group, &[entry_id])
            .await?;
        Ok(())
    }
}
