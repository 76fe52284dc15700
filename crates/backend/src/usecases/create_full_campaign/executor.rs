use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use contracts::campaign::{CreateCampaignResponse, DepositSource};
use contracts::job::{CampaignJob, JobNotification, JobResult, CAMPAIGN_START_SUCCESS};

use crate::jobs::lock::UserLock;
use crate::jobs::notify::NotificationPublisher;
use crate::jobs::result_store::ResultStore;
use crate::shared::config::SagaConfig;
use crate::token::{with_auth, TokenService};
use crate::wb::campaign::CampaignAdapter;
use crate::wb::error::WbaError;

/// Сага создания и запуска рекламной кампании.
///
/// Шаги выполняются строго последовательно:
/// создание -> пополнение бюджета -> ключевые фразы -> фиксированный
/// список -> запуск. Каждый шаг идет со свежими авторизационными
/// данными: сага длится десятки секунд и токен может истечь между
/// шагами. Любой исход, включая срыв крайнего срока, завершается
/// ровно одной записью результата и одним уведомлением.
pub struct CreateFullCampaignExecutor {
    token: Arc<TokenService>,
    campaigns: Arc<CampaignAdapter>,
    results: Arc<ResultStore>,
    notifier: Arc<NotificationPublisher>,
    locks: Arc<UserLock>,
    pre_create_delay: Duration,
    step_delay: Duration,
    pre_start_delay: Duration,
    deadline: Duration,
}

impl CreateFullCampaignExecutor {
    pub fn new(
        token: Arc<TokenService>,
        campaigns: Arc<CampaignAdapter>,
        results: Arc<ResultStore>,
        notifier: Arc<NotificationPublisher>,
        locks: Arc<UserLock>,
        cfg: &SagaConfig,
    ) -> Self {
        Self {
            token,
            campaigns,
            results,
            notifier,
            locks,
            pre_create_delay: Duration::from_millis(cfg.pre_create_delay_ms),
            step_delay: Duration::from_millis(cfg.step_delay_ms),
            pre_start_delay: Duration::from_millis(cfg.pre_start_delay_ms),
            deadline: Duration::from_secs(cfg.deadline_secs),
        }
    }

    /// Выполняет задачу до терминального результата. Никогда не
    /// возвращает ошибку: граница задачи конвертирует любой сбой в
    /// JobResult.
    pub async fn run(&self, job: &CampaignJob) {
        tracing::info!(
            "Задача создания кампании принята. job_id={}, user_id={}, source_id={}",
            job.job_id,
            job.user_id,
            job.request.source_id
        );

        let lock = match self.locks.acquire(job.user_id).await {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                let err = WbaError::domain(format!(
                    "Другая задача пользователя еще выполняется. user_id={}",
                    job.user_id
                ));
                self.deliver(job, failure_result(&err, None, job.request.source_id))
                    .await;
                return;
            }
            Err(e) => {
                let err = WbaError::domain(format!("Не удалось получить блокировку: {e}"));
                self.deliver(job, failure_result(&err, None, job.request.source_id))
                    .await;
                return;
            }
        };

        let created: Mutex<Option<i64>> = Mutex::new(job.wb_campaign_id);
        let outcome = match tokio::time::timeout(self.deadline, self.execute(job, &created)).await {
            Ok(Ok(wb_campaign_id)) => success_result(wb_campaign_id, job.request.source_id),
            Ok(Err(err)) => {
                let partial = *created.lock().unwrap();
                tracing::error!(
                    "Сага завершилась ошибкой. job_id={}, step_error={err}, wb_campaign_id={partial:?}",
                    job.job_id
                );
                failure_result(&err, partial, job.request.source_id)
            }
            Err(_) => {
                let partial = *created.lock().unwrap();
                let err = WbaError::domain(format!(
                    "Превышен крайний срок создания кампании ({} s)",
                    self.deadline.as_secs()
                ));
                tracing::error!(
                    "Сага прервана по крайнему сроку. job_id={}, wb_campaign_id={partial:?}",
                    job.job_id
                );
                failure_result(&err, partial, job.request.source_id)
            }
        };

        self.deliver(job, outcome).await;

        if let Err(e) = self.locks.release(lock).await {
            tracing::warn!("Не удалось снять блокировку пользователя {}: {e}", job.user_id);
        }
    }

    async fn execute(
        &self,
        job: &CampaignJob,
        created: &Mutex<Option<i64>>,
    ) -> Result<i64, WbaError> {
        let user_id = job.user_id;

        // Пауза перед первым обращением к маркетплейсу; авторизационные
        // данные после нее читаются заново внутри каждого шага.
        tokio::time::sleep(self.pre_create_delay).await;

        let wb_campaign_id = match job.wb_campaign_id {
            // Продолжение ранее начатого создания: CREATE пропускается.
            Some(id) => id,
            None => {
                let campaigns = Arc::clone(&self.campaigns);
                let name = job.request.name.clone();
                let nms = job.request.nms.clone();
                let id = with_auth(self.token.as_ref(), user_id, move |auth| {
                    let campaigns = Arc::clone(&campaigns);
                    let name = name.clone();
                    let nms = nms.clone();
                    async move { campaigns.create_campaign(&auth, &name, &nms).await }
                })
                .await?;
                *created.lock().unwrap() = Some(id);
                tracing::info!(
                    "Кампания создана. job_id={}, wb_campaign_id={id}",
                    job.job_id
                );
                id
            }
        };

        tokio::time::sleep(self.step_delay).await;
        {
            let campaigns = Arc::clone(&self.campaigns);
            let budget = job.request.budget;
            with_auth(self.token.as_ref(), user_id, move |auth| {
                let campaigns = Arc::clone(&campaigns);
                async move {
                    campaigns
                        .replenish_budget(&auth, wb_campaign_id, budget, DepositSource::Account)
                        .await
                }
            })
            .await?;
        }

        tokio::time::sleep(self.step_delay).await;
        {
            let campaigns = Arc::clone(&self.campaigns);
            let keywords = job.request.keywords.clone();
            with_auth(self.token.as_ref(), user_id, move |auth| {
                let campaigns = Arc::clone(&campaigns);
                let keywords = keywords.clone();
                async move {
                    campaigns
                        .add_keywords(&auth, wb_campaign_id, &keywords)
                        .await
                }
            })
            .await?;
        }

        tokio::time::sleep(self.step_delay).await;
        {
            let campaigns = Arc::clone(&self.campaigns);
            with_auth(self.token.as_ref(), user_id, move |auth| {
                let campaigns = Arc::clone(&campaigns);
                async move { campaigns.enable_fixed_list(&auth, wb_campaign_id).await }
            })
            .await?;
        }

        tokio::time::sleep(self.pre_start_delay).await;
        {
            let campaigns = Arc::clone(&self.campaigns);
            with_auth(self.token.as_ref(), user_id, move |auth| {
                let campaigns = Arc::clone(&campaigns);
                async move { campaigns.start_campaign(&auth, wb_campaign_id).await }
            })
            .await?;
        }

        Ok(wb_campaign_id)
    }

    /// Доставка терминального результата: запись в хранилище и
    /// уведомление, на любом исходе саги.
    async fn deliver(&self, job: &CampaignJob, result: JobResult<CreateCampaignResponse>) {
        match self.results.set_nx(job.job_id, &result).await {
            Ok(true) => {
                tracing::info!(
                    "Результат записан. job_id={}, code={}",
                    job.job_id,
                    result.code
                );
            }
            Ok(false) => {
                tracing::warn!(
                    "Результат уже был записан, повторная доставка. job_id={}",
                    job.job_id
                );
            }
            Err(e) => {
                tracing::error!("Не удалось записать результат. job_id={}, error={e}", job.job_id);
            }
        }

        let notification = JobNotification { job_id: job.job_id };
        if let Err(e) = self
            .notifier
            .publish(&job.routing_key, &notification, 1)
            .await
        {
            tracing::error!(
                "Не удалось отправить уведомление. job_id={}, error={e}",
                job.job_id
            );
        }
    }
}

fn success_result(wb_campaign_id: i64, source_id: Uuid) -> JobResult<CreateCampaignResponse> {
    JobResult {
        code: CAMPAIGN_START_SUCCESS.to_string(),
        status_code: 201,
        text: None,
        response: CreateCampaignResponse {
            wb_campaign_id: Some(wb_campaign_id.to_string()),
            source_id,
        },
    }
}

fn failure_result(
    err: &WbaError,
    wb_campaign_id: Option<i64>,
    source_id: Uuid,
) -> JobResult<CreateCampaignResponse> {
    JobResult {
        code: err.code().to_string(),
        status_code: err.status_code(),
        text: Some(err.to_string()),
        response: CreateCampaignResponse {
            wb_campaign_id: wb_campaign_id.map(|id| id.to_string()),
            source_id,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_result_carries_campaign_and_source() {
        let source_id = Uuid::new_v4();
        let result = success_result(987, source_id);
        assert_eq!(result.code, CAMPAIGN_START_SUCCESS);
        assert_eq!(result.status_code, 201);
        assert_eq!(result.text, None);
        assert_eq!(result.response.wb_campaign_id.as_deref(), Some("987"));
        assert_eq!(result.response.source_id, source_id);
    }

    #[test]
    fn failure_result_keeps_partially_created_campaign_id() {
        let source_id = Uuid::new_v4();
        let err = WbaError::CampaignInit {
            status_code: 400,
            description: "Ошибка при пополнении бюджета кампании".to_string(),
        };
        let result = failure_result(&err, Some(42), source_id);
        assert_eq!(result.code, "CampaignInitError");
        assert_eq!(result.status_code, 400);
        assert!(result.text.as_deref().unwrap().contains("бюджета"));
        assert_eq!(result.response.wb_campaign_id.as_deref(), Some("42"));
        assert_eq!(result.response.source_id, source_id);
    }

    #[test]
    fn failure_before_create_has_no_campaign_id() {
        let err = WbaError::NotAuthenticated {
            status_code: 401,
            description: "истек токен".to_string(),
        };
        let result = failure_result(&err, None, Uuid::nil());
        assert_eq!(result.code, "NotAuthenticated");
        assert_eq!(result.status_code, 401);
        assert_eq!(result.response.wb_campaign_id, None);
    }
}
