use axum::extract::Path;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use contracts::job::JobResult;

use super::RESULTS;

/// Результат задачи по идентификатору.
///
/// 404 возвращается и для незавершенной задачи, и для неизвестного или
/// истекшего идентификатора: хранилище их не различает, вызывающая
/// система опрашивает до появления результата.
pub async fn get_by_id(Path(job_id): Path<Uuid>) -> Result<Json<JobResult>, StatusCode> {
    match RESULTS.get(job_id).await {
        Ok(Some(result)) => Ok(Json(result)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Не удалось прочитать результат задачи {job_id}: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
