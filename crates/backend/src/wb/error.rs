use thiserror::Error;

use super::client::CallError;

/// Статус-код для ошибок, у которых нет ответа маркетплейса.
pub const DEFAULT_ERROR_STATUS: u16 = 999;

/// Ошибки доменного уровня. Каждый вариант несет статус-код исходного
/// ответа маркетплейса и человекочитаемое описание; имя варианта
/// попадает в `JobResult.code`.
#[derive(Debug, Error)]
pub enum WbaError {
    #[error("{description}")]
    NotAuthenticated { status_code: u16, description: String },
    #[error("{description}")]
    CampaignCreate { status_code: u16, description: String },
    #[error("{description}")]
    CampaignInit { status_code: u16, description: String },
    #[error("{description}")]
    CampaignStart { status_code: u16, description: String },
    #[error("{description}")]
    Domain { status_code: u16, description: String },
}

/// Вид доменной ошибки, в которую заворачивается неудачный вызов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Create,
    Init,
    Start,
    Domain,
}

impl WbaError {
    pub fn domain(description: impl Into<String>) -> Self {
        Self::Domain {
            status_code: DEFAULT_ERROR_STATUS,
            description: description.into(),
        }
    }

    /// Имя вида ошибки, используется как код результата задачи.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAuthenticated { .. } => "NotAuthenticated",
            Self::CampaignCreate { .. } => "CampaignCreateError",
            Self::CampaignInit { .. } => "CampaignInitError",
            Self::CampaignStart { .. } => "CampaignStartError",
            Self::Domain { .. } => "DomainError",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotAuthenticated { status_code, .. }
            | Self::CampaignCreate { status_code, .. }
            | Self::CampaignInit { status_code, .. }
            | Self::CampaignStart { status_code, .. }
            | Self::Domain { status_code, .. } => *status_code,
        }
    }

    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, Self::NotAuthenticated { .. })
    }
}

/// Переводит транспортную ошибку в доменную заданного вида.
///
/// 401 и 403 всегда классифицируются как `NotAuthenticated`, независимо
/// от вида: это сигнал к обновлению токена, а не доменная ошибка шага.
pub fn classify(kind: ErrorKind, err: CallError, description: impl Into<String>) -> WbaError {
    let description: String = description.into();
    let description = format!("{description}. {err}");
    let status_code = err.status().unwrap_or(DEFAULT_ERROR_STATUS);
    if matches!(err, CallError::NotAuthenticated { .. }) {
        return WbaError::NotAuthenticated {
            status_code,
            description,
        };
    }
    match kind {
        ErrorKind::Create => WbaError::CampaignCreate {
            status_code,
            description,
        },
        ErrorKind::Init => WbaError::CampaignInit {
            status_code,
            description,
        },
        ErrorKind::Start => WbaError::CampaignStart {
            status_code,
            description,
        },
        ErrorKind::Domain => WbaError::Domain {
            status_code,
            description,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_statuses_become_not_authenticated() {
        for status in [401u16, 403] {
            let err = classify(
                ErrorKind::Create,
                CallError::NotAuthenticated {
                    status,
                    body: String::new(),
                },
                "Ошибка при создании кампании",
            );
            assert!(err.is_not_authenticated());
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn kinds_map_to_result_codes() {
        let err = classify(
            ErrorKind::Init,
            CallError::Status {
                status: 400,
                body: "bad".to_string(),
            },
            "Ошибка при пополнении бюджета",
        );
        assert_eq!(err.code(), "CampaignInitError");
        assert_eq!(err.status_code(), 400);
        assert_eq!(WbaError::domain("x").status_code(), DEFAULT_ERROR_STATUS);
        assert_eq!(WbaError::domain("x").code(), "DomainError");
    }
}
