use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

use super::JobsError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Рекомендательная блокировка на пользователя.
///
/// Одновременные саги одного пользователя сериализуются через
/// SET NX PX с ограниченным ожиданием. Блокировка живет не дольше TTL,
/// даже если воркер упал, не вернув ее.
pub struct UserLock {
    client: redis::Client,
    ttl: Duration,
    wait: Duration,
}

/// Захваченная блокировка; токен нужен, чтобы не снять чужую.
pub struct LockGuard {
    key: String,
    token: String,
}

impl UserLock {
    pub fn new(client: redis::Client, ttl: Duration, wait: Duration) -> Self {
        Self { client, ttl, wait }
    }

    /// Пытается захватить блокировку, опрашивая до истечения ожидания.
    /// None означает, что блокировку держит другая задача.
    pub async fn acquire(&self, user_id: Uuid) -> Result<Option<LockGuard>, JobsError> {
        let key = format!("wba:lock:{user_id}");
        let token = Uuid::new_v4().to_string();
        let deadline = tokio::time::Instant::now() + self.wait;

        loop {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(self.ttl.as_millis() as u64)
                .query_async(&mut conn)
                .await?;
            if acquired.is_some() {
                return Ok(Some(LockGuard { key, token }));
            }
            if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Снимает блокировку, если она все еще наша.
    pub async fn release(&self, guard: LockGuard) -> Result<(), JobsError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let current: Option<String> = conn.get(&guard.key).await?;
        if current.as_deref() == Some(guard.token.as_str()) {
            let _: i64 = conn.del(&guard.key).await?;
        }
        Ok(())
    }
}
