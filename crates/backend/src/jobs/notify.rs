use contracts::job::JobNotification;

use super::JobsError;

/// Публикация уведомлений о завершении задач.
///
/// Уведомление уходит в поток, имя которого выводится из ключа
/// маршрутизации вызывающей системы: внешний потребитель подписывается
/// на свой поток и получает только свои события. Доставка
/// at-least-once: запись остается в потоке до обработки потребителем.
pub struct NotificationPublisher {
    client: redis::Client,
    sender: String,
}

impl NotificationPublisher {
    pub fn new(client: redis::Client, sender: String) -> Self {
        Self { client, sender }
    }

    /// Полный ключ маршрутизации уведомления.
    pub fn routing_key(&self, caller_routing_key: &str) -> String {
        format!("{}.task_complete.{}", self.sender, caller_routing_key)
    }

    pub async fn publish(
        &self,
        caller_routing_key: &str,
        notification: &JobNotification,
        priority: u8,
    ) -> Result<(), JobsError> {
        let payload = serde_json::to_string(notification)?;
        let stream = self.routing_key(caller_routing_key);
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("XADD")
            .arg(&stream)
            .arg("*")
            .arg("payload")
            .arg(payload)
            .arg("priority")
            .arg(priority)
            .query_async(&mut conn)
            .await?;
        tracing::info!(
            "Уведомление о завершении отправлено. job_id={}, stream={stream}",
            notification.job_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_scopes_to_caller() {
        let publisher = NotificationPublisher::new(
            redis::Client::open("redis://127.0.0.1:6379").unwrap(),
            "wba".to_string(),
        );
        assert_eq!(
            publisher.routing_key("campaign-manager"),
            "wba.task_complete.campaign-manager"
        );
    }
}
