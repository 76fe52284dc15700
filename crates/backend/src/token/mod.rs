use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use contracts::auth::UserAuthData;

use crate::shared::config::TokenServiceConfig;
use crate::wb::error::WbaError;

/// Источник авторизационных данных пользователя.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn auth_data(&self, user_id: Uuid) -> Result<UserAuthData, WbaError>;

    /// Fire-and-forget запрос на обновление истекшего wb_token_access.
    /// Новый токен не возвращается, его нужно перечитать после паузы.
    async fn request_token_refresh(
        &self,
        user_id: Uuid,
        wb_token_access: &str,
    ) -> Result<(), WbaError>;

    fn refresh_delay(&self) -> Duration;
}

/// Выполняет операцию со свежими авторизационными данными.
///
/// Протокол обновления: получили `NotAuthenticated` - запросили
/// обновление токена, подождали, перечитали данные и повторили ровно
/// один раз. Повторный `NotAuthenticated` терминален для операции,
/// бесконечного цикла обновлений нет.
pub async fn with_auth<P, T, F, Fut>(provider: &P, user_id: Uuid, op: F) -> Result<T, WbaError>
where
    P: AuthProvider + ?Sized,
    F: Fn(UserAuthData) -> Fut,
    Fut: Future<Output = Result<T, WbaError>>,
{
    let auth = provider.auth_data(user_id).await?;
    let token = auth.wb_token_access.clone();
    match op(auth).await {
        Err(err) if err.is_not_authenticated() => {
            tracing::info!("wb_token_access истек, запрашиваем обновление. user_id={user_id}");
            provider.request_token_refresh(user_id, &token).await?;
            tokio::time::sleep(provider.refresh_delay()).await;
            let auth = provider.auth_data(user_id).await?;
            op(auth).await
        }
        other => other,
    }
}

#[derive(Debug, Deserialize)]
struct AuthDataResponse {
    wb_user_id: Option<i64>,
    wb_supplier_id: Option<String>,
    wb_token_access: Option<String>,
    #[serde(default)]
    wb_token_ad: Option<String>,
}

/// Клиент внешнего токен-сервиса.
pub struct TokenService {
    http: reqwest::Client,
    base_url: String,
    refresh_delay: Duration,
}

impl TokenService {
    pub fn new(cfg: &TokenServiceConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            refresh_delay: Duration::from_millis(cfg.refresh_delay_ms),
        }
    }
}

#[async_trait]
impl AuthProvider for TokenService {
    async fn auth_data(&self, user_id: Uuid) -> Result<UserAuthData, WbaError> {
        let url = format!("{}/v1/auth_data", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("user_id", user_id.to_string())])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Токен-сервис недоступен ({}): {e}", self.base_url);
                WbaError::domain(format!("Не удалось подключиться к токен-сервису: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(WbaError::domain(format!(
                "Ошибка при получении авторизационных данных. user_id={user_id}, status={}",
                response.status().as_u16()
            )));
        }

        let data: AuthDataResponse = response.json().await.map_err(|e| {
            WbaError::domain(format!(
                "Не удалось обработать ответ токен-сервиса. user_id={user_id}, error={e}"
            ))
        })?;

        match (data.wb_user_id, data.wb_supplier_id, data.wb_token_access) {
            (Some(wb_user_id), Some(wb_supplier_id), Some(wb_token_access)) => {
                tracing::debug!(
                    "Получены авторизационные данные. user_id={user_id}, wb_user_id={wb_user_id}"
                );
                Ok(UserAuthData {
                    wb_user_id,
                    wb_supplier_id,
                    wb_token_access,
                    wb_token_ad: data.wb_token_ad,
                })
            }
            _ => Err(WbaError::domain(format!(
                "Авторизационные данные пользователя не найдены. user_id={user_id}"
            ))),
        }
    }

    async fn request_token_refresh(
        &self,
        user_id: Uuid,
        wb_token_access: &str,
    ) -> Result<(), WbaError> {
        let url = format!("{}/v1/auth_data/update", self.base_url);
        self.http
            .get(&url)
            .query(&[
                ("user_id", user_id.to_string()),
                ("wb_token_access", wb_token_access.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                WbaError::domain(format!(
                    "Не удалось запросить обновление токена. user_id={user_id}, error={e}"
                ))
            })?;
        tracing::debug!("Отправлен запрос на обновление wb_token_access. user_id={user_id}");
        Ok(())
    }

    fn refresh_delay(&self) -> Duration {
        self.refresh_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubProvider {
        resolves: AtomicU32,
        refreshes: AtomicU32,
        fail_resolve: bool,
    }

    impl StubProvider {
        fn new() -> Self {
            Self {
                resolves: AtomicU32::new(0),
                refreshes: AtomicU32::new(0),
                fail_resolve: false,
            }
        }

        fn auth(generation: u32) -> UserAuthData {
            UserAuthData {
                wb_user_id: 1,
                wb_supplier_id: "supplier".to_string(),
                wb_token_access: format!("token-{generation}"),
                wb_token_ad: None,
            }
        }
    }

    #[async_trait]
    impl AuthProvider for StubProvider {
        async fn auth_data(&self, _user_id: Uuid) -> Result<UserAuthData, WbaError> {
            if self.fail_resolve {
                return Err(WbaError::domain("token service unreachable"));
            }
            let n = self.resolves.fetch_add(1, Ordering::SeqCst);
            Ok(Self::auth(n))
        }

        async fn request_token_refresh(
            &self,
            _user_id: Uuid,
            _wb_token_access: &str,
        ) -> Result<(), WbaError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn refresh_delay(&self) -> Duration {
            Duration::from_millis(0)
        }
    }

    fn not_authenticated() -> WbaError {
        WbaError::NotAuthenticated {
            status_code: 401,
            description: "expired".to_string(),
        }
    }

    #[tokio::test]
    async fn does_not_refresh_when_first_call_succeeds() {
        let provider = StubProvider::new();
        let result = with_auth(&provider, Uuid::nil(), |auth| async move {
            Ok::<_, WbaError>(auth.wb_token_access)
        })
        .await
        .unwrap();
        assert_eq!(result, "token-0");
        assert_eq!(provider.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(provider.resolves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refreshes_once_and_retries_with_new_token() {
        let provider = StubProvider::new();
        let result = with_auth(&provider, Uuid::nil(), |auth| async move {
            if auth.wb_token_access == "token-0" {
                Err(not_authenticated())
            } else {
                Ok(auth.wb_token_access)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, "token-1");
        assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(provider.resolves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_not_authenticated_is_terminal() {
        let provider = StubProvider::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), WbaError> = with_auth(&provider, Uuid::nil(), |_auth| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(not_authenticated()) }
        })
        .await;
        assert!(result.unwrap_err().is_not_authenticated());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_provider_is_fatal_before_the_operation() {
        let provider = StubProvider {
            fail_resolve: true,
            ..StubProvider::new()
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), WbaError> = with_auth(&provider, Uuid::nil(), |_auth| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert_eq!(result.unwrap_err().code(), "DomainError");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
