use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::queue::JobQueue;
use crate::usecases::create_full_campaign::CreateFullCampaignExecutor;

/// Пул воркеров, разбирающих очередь задач.
///
/// Каждый воркер читает по одной задаче, доводит сагу до терминального
/// результата и только после этого подтверждает запись. Ошибки чтения
/// очереди приводят к переподключению, а не к падению воркера.
pub fn spawn_workers(
    queue: Arc<JobQueue>,
    executor: Arc<CreateFullCampaignExecutor>,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    (0..workers)
        .map(|index| {
            let queue = Arc::clone(&queue);
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                let consumer_name = format!("worker-{index}");
                loop {
                    let mut consumer = match queue.consumer(&consumer_name).await {
                        Ok(consumer) => consumer,
                        Err(e) => {
                            tracing::error!(
                                "Воркер {consumer_name} не смог подключиться к очереди: {e}"
                            );
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            continue;
                        }
                    };
                    tracing::info!("Воркер {consumer_name} запущен");
                    loop {
                        match consumer.next().await {
                            Ok(Some(queued)) => {
                                executor.run(&queued.job).await;
                                if let Err(e) = consumer.ack(&queued.entry_id).await {
                                    tracing::error!(
                                        "Не удалось подтвердить запись {}: {e}",
                                        queued.entry_id
                                    );
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::error!("Ошибка чтения очереди: {e}");
                                tokio::time::sleep(Duration::from_secs(1)).await;
                                break;
                            }
                        }
                    }
                }
            })
        })
        .collect()
}
