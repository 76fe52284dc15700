use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;

use contracts::auth::UserAuthData;

use super::client::{WbClient, WbIdentity};
use super::error::{classify, ErrorKind, WbaError, DEFAULT_ERROR_STATUS};

const CREATE_SEARCH_REFERER: &str = "https://cmp.wildberries.ru/campaigns/create/search";

#[derive(Debug, Deserialize)]
struct CardDetail {
    data: CardDetailData,
}

#[derive(Debug, Deserialize)]
struct CardDetailData {
    products: Vec<CardProduct>,
}

#[derive(Debug, Deserialize)]
struct CardProduct {
    #[serde(rename = "subjectId")]
    subject_id: i64,
}

/// Категория продавца из списка supplier-subjects.
#[derive(Debug, Clone, Deserialize)]
pub struct SupplierSubject {
    pub id: i64,
    pub name: String,
}

/// Запросы к карточкам товаров и категориям продавца.
pub struct ProductAdapter {
    client: Arc<WbClient>,
    cmp_url: String,
    card_url: String,
}

impl ProductAdapter {
    pub fn new(client: Arc<WbClient>, cmp_url: String, card_url: String) -> Self {
        Self {
            client,
            cmp_url,
            card_url,
        }
    }

    /// subject id товара из публичной карточки.
    pub async fn subject_id(&self, auth: &UserAuthData, nm: i64) -> Result<i64, WbaError> {
        let url = format!("{}/cards/detail", self.card_url);
        let response = self
            .client
            .call(
                Method::GET,
                &url,
                WbIdentity::SellerWeb(auth),
                CREATE_SEARCH_REFERER,
                &[("nm", nm.to_string())],
                None,
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Create,
                    e,
                    format!("Ошибка при получении subject id. nm={nm}"),
                )
            })?;

        let detail: CardDetail = response.json().map_err(|e| {
            WbaError::domain(format!(
                "Не удалось обработать карточку товара. nm={nm}, error={e}"
            ))
        })?;
        detail
            .data
            .products
            .first()
            .map(|p| p.subject_id)
            .ok_or_else(|| WbaError::domain(format!("Пустой список товаров в карточке. nm={nm}")))
    }

    /// Список категорий (subjects) продавца.
    pub async fn supplier_subjects(
        &self,
        auth: &UserAuthData,
    ) -> Result<Vec<SupplierSubject>, WbaError> {
        let url = format!("{}/backend/api/v2/search/supplier-subjects", self.cmp_url);
        let response = self
            .client
            .call(
                Method::GET,
                &url,
                WbIdentity::SellerWeb(auth),
                CREATE_SEARCH_REFERER,
                &[],
                None,
            )
            .await
            .map_err(|e| classify(ErrorKind::Create, e, "Ошибка при получении списка категорий"))?;

        response.json().map_err(|e| {
            WbaError::domain(format!("Не удалось обработать список категорий. error={e}"))
        })
    }

    /// Название категории товара: subject id карточки ищется в списке
    /// категорий продавца.
    pub async fn category(&self, auth: &UserAuthData, nm: i64) -> Result<String, WbaError> {
        let subject_id = self.subject_id(auth, nm).await?;
        let subjects = self.supplier_subjects(auth).await?;
        subjects
            .into_iter()
            .find(|s| s.id == subject_id)
            .map(|s| s.name)
            .ok_or_else(|| WbaError::CampaignCreate {
                status_code: DEFAULT_ERROR_STATUS,
                description: format!(
                    "Не удалось получить название категории для subject_id={subject_id}"
                ),
            })
    }
}
