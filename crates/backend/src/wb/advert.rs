use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

use contracts::auth::UserAuthData;

use super::client::{WbClient, WbIdentity};
use super::error::{classify, ErrorKind, WbaError};

/// Управление кампанией через официальный advert API
/// (advert-api.wb.ru, авторизация заголовком из wb_token_ad).
pub struct AdvertAdapter {
    client: Arc<WbClient>,
    adv_url: String,
}

impl AdvertAdapter {
    pub fn new(client: Arc<WbClient>, adv_url: String) -> Self {
        Self { client, adv_url }
    }

    fn ad_token<'a>(auth: &'a UserAuthData) -> Result<&'a str, WbaError> {
        auth.wb_token_ad.as_deref().ok_or_else(|| {
            WbaError::domain(format!(
                "Не найден wb_token_ad для пользователя wb_user_id={}",
                auth.wb_user_id
            ))
        })
    }

    /// Ставит кампанию на паузу.
    pub async fn pause(&self, auth: &UserAuthData, id: i64) -> Result<(), WbaError> {
        let token = Self::ad_token(auth)?;
        let url = format!("{}/v0/pause", self.adv_url);
        self.client
            .call(
                Method::GET,
                &url,
                WbIdentity::AdvertApi(token),
                "",
                &[("id", id.to_string())],
                None,
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Domain,
                    e,
                    format!("Ошибка при постановке кампании на паузу. wb_campaign_id={id}"),
                )
            })?;
        Ok(())
    }

    /// Возобновляет показы кампании.
    pub async fn resume(&self, auth: &UserAuthData, id: i64) -> Result<(), WbaError> {
        let token = Self::ad_token(auth)?;
        let url = format!("{}/v0/start", self.adv_url);
        self.client
            .call(
                Method::GET,
                &url,
                WbIdentity::AdvertApi(token),
                "",
                &[("id", id.to_string())],
                None,
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Domain,
                    e,
                    format!("Ошибка при возобновлении кампании. wb_campaign_id={id}"),
                )
            })?;
        Ok(())
    }

    /// Устанавливает новое значение ставки на торгах.
    ///
    /// `param` для поисковых кампаний равен subject id предмета.
    pub async fn change_rate(
        &self,
        auth: &UserAuthData,
        advert_id: i64,
        ad_type: u8,
        cpm: i64,
        param: i64,
    ) -> Result<(), WbaError> {
        let token = Self::ad_token(auth)?;
        let url = format!("{}/v0/cpm", self.adv_url);
        let body = json!({
            "advertId": advert_id,
            "type": ad_type,
            "cpm": cpm,
            "param": param,
        });
        self.client
            .call(
                Method::POST,
                &url,
                WbIdentity::AdvertApi(token),
                "",
                &[],
                Some(&body),
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Domain,
                    e,
                    format!("Ошибка при обновлении ставки. wb_campaign_id={advert_id}"),
                )
            })?;
        Ok(())
    }
}
