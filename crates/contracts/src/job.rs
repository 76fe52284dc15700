use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::campaign::CampaignCreateRequest;

/// Код успешного завершения задачи создания кампании.
pub const CAMPAIGN_START_SUCCESS: &str = "CampaignStartSuccess";

/// Ответ API при постановке задачи в очередь (HTTP 202).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedResponse {
    pub job_id: Uuid,
}

/// Терминальный результат фоновой задачи.
///
/// Пишется в хранилище результатов ровно один раз. `code` содержит
/// либо `CAMPAIGN_START_SUCCESS`, либо имя вида ошибки.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult<T = Value> {
    pub code: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub response: T,
}

/// Сообщение о завершении задачи, публикуемое в поток уведомлений.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobNotification {
    pub job_id: Uuid,
}

/// Задача создания кампании в очереди.
///
/// `wb_campaign_id` задан только при продолжении ранее начатого
/// создания: сага тогда пропускает шаг CREATE и стартует с пополнения
/// бюджета.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignJob {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub routing_key: String,
    pub request: CampaignCreateRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wb_campaign_id: Option<i64>,
    pub enqueued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CreateCampaignResponse;

    #[test]
    fn job_result_omits_empty_text() {
        let result = JobResult {
            code: CAMPAIGN_START_SUCCESS.to_string(),
            status_code: 201,
            text: None,
            response: CreateCampaignResponse {
                wb_campaign_id: Some("123".to_string()),
                source_id: Uuid::nil(),
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("text").is_none());
        assert_eq!(json["status_code"], 201);
        assert_eq!(json["response"]["wb_campaign_id"], "123");
    }

    #[test]
    fn job_result_parses_untyped_payload() {
        let raw = r#"{"code":"CampaignCreateError","status_code":429,"text":"too many requests","response":{"source_id":"00000000-0000-0000-0000-000000000000"}}"#;
        let result: JobResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.code, "CampaignCreateError");
        assert_eq!(result.status_code, 429);
        assert_eq!(result.text.as_deref(), Some("too many requests"));
    }
}
