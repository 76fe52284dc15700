use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use contracts::campaign::{CampaignCreateRequest, DepositResponse, DepositSource};
use contracts::job::{CampaignJob, QueuedResponse};

use super::{ADVERTS, CAMPAIGNS, JOB_QUEUE, TOKEN_SERVICE};
use crate::token::with_auth;
use crate::wb::error::WbaError;

fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, StatusCode> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or(StatusCode::BAD_REQUEST)
}

fn header_string(headers: &HeaderMap, name: &str) -> Result<String, StatusCode> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .ok_or(StatusCode::BAD_REQUEST)
}

fn error_status(err: WbaError) -> StatusCode {
    tracing::error!("{err}");
    if err.is_not_authenticated() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn enqueue_job(
    user_id: Uuid,
    routing_key: String,
    request: CampaignCreateRequest,
    wb_campaign_id: Option<i64>,
) -> Result<(StatusCode, Json<QueuedResponse>), StatusCode> {
    let job_id = Uuid::new_v4();
    let job = CampaignJob {
        job_id,
        user_id,
        routing_key,
        request,
        wb_campaign_id,
        enqueued_at: Utc::now(),
    };
    JOB_QUEUE.enqueue(&job).await.map_err(|e| {
        tracing::error!("Не удалось поставить задачу в очередь: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { job_id })))
}

/// Принимает запрос на создание и запуск кампании, ставит задачу в
/// очередь и сразу отвечает 202. Результат забирается по /jobs/{id}.
pub async fn create_full(
    headers: HeaderMap,
    Json(request): Json<CampaignCreateRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), StatusCode> {
    let user_id = header_uuid(&headers, "x-user-id")?;
    let routing_key = header_string(&headers, "routing-key")?;
    enqueue_job(user_id, routing_key, request, None).await
}

#[derive(Debug, Deserialize)]
pub struct ContinueQuery {
    pub wb_campaign_id: i64,
}

/// Продолжает создание ранее созданной кампании с шага пополнения
/// бюджета.
pub async fn continue_create(
    Query(query): Query<ContinueQuery>,
    headers: HeaderMap,
    Json(request): Json<CampaignCreateRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), StatusCode> {
    let user_id = header_uuid(&headers, "x-user-id")?;
    let routing_key = header_string(&headers, "routing-key")?;
    enqueue_job(user_id, routing_key, request, Some(query.wb_campaign_id)).await
}

#[derive(Debug, Deserialize)]
pub struct DepositQuery {
    pub amount: i64,
    #[serde(rename = "type")]
    pub source: DepositSource,
}

/// Пополняет бюджет кампании и возвращает его новое значение.
pub async fn deposit(
    Path(wb_campaign_id): Path<i64>,
    Query(query): Query<DepositQuery>,
    headers: HeaderMap,
) -> Result<Json<DepositResponse>, StatusCode> {
    let user_id = header_uuid(&headers, "x-user-id")?;
    let budget = with_auth(TOKEN_SERVICE.as_ref(), user_id, move |auth| {
        let campaigns = Arc::clone(&CAMPAIGNS);
        async move {
            campaigns
                .deposit_budget(&auth, wb_campaign_id, query.amount, query.source)
                .await?;
            campaigns.campaign_budget(&auth, wb_campaign_id).await
        }
    })
    .await
    .map_err(error_status)?;
    Ok(Json(DepositResponse { budget }))
}

pub async fn pause(
    Path(wb_campaign_id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    let user_id = header_uuid(&headers, "x-user-id")?;
    with_auth(TOKEN_SERVICE.as_ref(), user_id, move |auth| {
        let adverts = Arc::clone(&ADVERTS);
        async move { adverts.pause(&auth, wb_campaign_id).await }
    })
    .await
    .map_err(error_status)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume(
    Path(wb_campaign_id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    let user_id = header_uuid(&headers, "x-user-id")?;
    with_auth(TOKEN_SERVICE.as_ref(), user_id, move |auth| {
        let adverts = Arc::clone(&ADVERTS);
        async move { adverts.resume(&auth, wb_campaign_id).await }
    })
    .await
    .map_err(error_status)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub rate: i64,
    pub ad_type: u8,
    /// Для поисковых кампаний - subject id предмета.
    pub param: i64,
}

/// Устанавливает новое значение ставки на торгах.
pub async fn change_rate(
    Path(wb_campaign_id): Path<i64>,
    Query(query): Query<RateQuery>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    let user_id = header_uuid(&headers, "x-user-id")?;
    with_auth(TOKEN_SERVICE.as_ref(), user_id, move |auth| {
        let adverts = Arc::clone(&ADVERTS);
        async move {
            adverts
                .change_rate(&auth, wb_campaign_id, query.ad_type, query.rate, query.param)
                .await
        }
    })
    .await
    .map_err(error_status)?;
    Ok(StatusCode::NO_CONTENT)
}
