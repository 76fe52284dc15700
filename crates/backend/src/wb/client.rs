use rand::seq::SliceRandom;
use reqwest::header;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use contracts::auth::UserAuthData;

use crate::shared::retry::RetryPolicy;

/// Транспортные ошибки вызова маркетплейса.
///
/// 401/403 выделены в отдельный вариант: это сигнал протоколу
/// обновления токена, а не обычная ошибка статуса.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("not authenticated, status {status}")]
    NotAuthenticated { status: u16, body: String },
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl CallError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotAuthenticated { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }

    /// Временные сбои, которые имеет смысл повторять: 429, 5xx и
    /// сетевые таймауты/отказы соединения.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::NotAuthenticated { .. } => false,
        }
    }
}

/// Способ авторизации запроса к Wildberries.
#[derive(Debug, Clone, Copy)]
pub enum WbIdentity<'a> {
    /// Cookie-авторизация кабинета продавца (cmp.wildberries.ru):
    /// заголовок X-User-Id плюс cookies WBToken и x-supplier-id-external.
    SellerWeb(&'a UserAuthData),
    /// Официальный advert API: токен в заголовке Authorization.
    AdvertApi(&'a str),
}

pub struct WbResponse {
    pub status: u16,
    pub body: String,
}

impl WbResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.2151.97",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 OPR/106.0.0.0",
];

/// HTTP-клиент для запросов к Wildberries от имени пользователя.
///
/// Подставляет авторизационные заголовки и cookies, повторяет временные
/// сбои по политике и журналирует запрос/ответ с усечением тела.
pub struct WbClient {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl WbClient {
    pub fn new(request_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("Failed to create HTTP client"),
            retry,
        }
    }

    fn user_agent() -> &'static str {
        USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0])
    }

    pub async fn call(
        &self,
        method: Method,
        url: &str,
        identity: WbIdentity<'_>,
        referer: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<WbResponse, CallError> {
        self.retry
            .run(CallError::is_transient, || {
                self.attempt(method.clone(), url, identity, referer, query, body)
            })
            .await
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        identity: WbIdentity<'_>,
        referer: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<WbResponse, CallError> {
        let shown_url = urlencoding::decode(url)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| url.to_string());
        let shown_body = body.map(|b| b.to_string()).unwrap_or_default();
        tracing::debug!(
            "{}: {}, data: {}",
            method,
            shown_url,
            cut_string(&shown_body, 75)
        );

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(header::USER_AGENT, Self::user_agent());
        if !referer.is_empty() {
            request = request.header(header::REFERER, referer);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        match identity {
            WbIdentity::SellerWeb(auth) => {
                request = request
                    .header("X-User-Id", auth.wb_user_id.to_string())
                    .header(
                        header::COOKIE,
                        format!(
                            "WBToken={}; x-supplier-id-external={}",
                            auth.wb_token_access, auth.wb_supplier_id
                        ),
                    );
            }
            WbIdentity::AdvertApi(token) => {
                request = request.header(header::AUTHORIZATION, token.to_string());
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(
            "{}: {}, status: {}, data: {}",
            method,
            shown_url,
            status.as_u16(),
            cut_string(&text, 75)
        );

        if status.is_success() {
            Ok(WbResponse {
                status: status.as_u16(),
                body: text,
            })
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Err(CallError::NotAuthenticated {
                status: status.as_u16(),
                body: text,
            })
        } else {
            Err(CallError::Status {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

/// Усекает строку для журнала, убирая переводы строк.
pub fn cut_string(s: &str, length: usize) -> String {
    let flat = s.replace('\n', "");
    if flat.chars().count() > length {
        let head: String = flat.chars().take(length).collect();
        format!("{head} ...")
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_string_truncates_and_flattens() {
        assert_eq!(cut_string("short", 75), "short");
        assert_eq!(cut_string("a\nb", 75), "ab");
        let long = "x".repeat(80);
        let cut = cut_string(&long, 75);
        assert!(cut.ends_with(" ..."));
        assert_eq!(cut.chars().count(), 79);
    }

    #[test]
    fn transient_statuses_are_retryable() {
        let too_many = CallError::Status {
            status: 429,
            body: String::new(),
        };
        let server = CallError::Status {
            status: 503,
            body: String::new(),
        };
        let not_found = CallError::Status {
            status: 404,
            body: String::new(),
        };
        let unauthorized = CallError::NotAuthenticated {
            status: 401,
            body: String::new(),
        };
        assert!(too_many.is_transient());
        assert!(server.is_transient());
        assert!(!not_found.is_transient());
        assert!(!unauthorized.is_transient());
    }
}
