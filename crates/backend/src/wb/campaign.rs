use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use contracts::auth::UserAuthData;
use contracts::campaign::DepositSource;

use super::client::{WbClient, WbIdentity};
use super::error::{classify, ErrorKind, WbaError};
use super::product::ProductAdapter;

const CREATE_SEARCH_REFERER: &str = "https://cmp.wildberries.ru/campaigns/create/search";

/// Конфигурация кампании, как ее отдает cmp.wildberries.ru.
///
/// Документ принадлежит маркетплейсу: перед запуском мы меняем только
/// `budget.total` и публикуем его обратно, незнакомые поля должны
/// пережить круговой проход без потерь.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub budget: CampaignBudget,
    #[serde(rename = "minCPM")]
    pub min_cpm: i64,
    #[serde(rename = "stepCPM")]
    pub step_cpm: i64,
    pub locale: Vec<i64>,
    pub place: Vec<Value>,
    pub limited: bool,
    #[serde(rename = "nmsCount")]
    pub nms_count: i64,
    pub name: String,
    pub status: i32,
    pub fixed: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignBudget {
    pub total: i64,
    #[serde(rename = "dailyMax")]
    pub daily_max: i64,
}

#[derive(Debug, Deserialize)]
struct BudgetResponse {
    total: i64,
}

#[derive(Debug, Deserialize)]
struct SaveAdResponse {
    id: Value,
}

/// Группа товаров одной категории в payload создания кампании.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordGroup {
    pub nms: Vec<i64>,
    pub key_word: String,
}

/// Группирует товары по названию категории. Порядок групп следует
/// первому вхождению категории, порядок nm внутри группы повторяет
/// входной.
pub fn group_by_category<I>(pairs: I) -> Vec<KeywordGroup>
where
    I: IntoIterator<Item = (String, i64)>,
{
    let mut groups: Vec<KeywordGroup> = Vec::new();
    for (category, nm) in pairs {
        match groups.iter_mut().find(|g| g.key_word == category) {
            Some(group) => group.nms.push(nm),
            None => groups.push(KeywordGroup {
                nms: vec![nm],
                key_word: category,
            }),
        }
    }
    groups
}

/// Сумма пополнения бюджета до `target` с учетом гранулярности
/// пополнений маркетплейса.
///
/// Wildberries валидирует кратность суммы, поэтому при ненулевом
/// текущем бюджете запрашивается max(100, ceil(current / 50) * 50),
/// а не разница до целевого значения. None означает, что бюджет уже
/// достаточен и вызов пополнения не нужен.
pub fn rounded_top_up(current: i64, target: i64) -> Option<i64> {
    if current >= target {
        return None;
    }
    if current == 0 {
        return Some(target);
    }
    Some((((current + 49) / 50) * 50).max(100))
}

fn parse_campaign_id(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Операции над рекламной кампанией в кабинете продавца.
pub struct CampaignAdapter {
    client: Arc<WbClient>,
    products: ProductAdapter,
    cmp_url: String,
    /// Пауза между последовательными вызовами внутри запуска кампании,
    /// иначе cmp отвечает 429.
    start_call_delay: Duration,
}

impl CampaignAdapter {
    pub fn new(
        client: Arc<WbClient>,
        products: ProductAdapter,
        cmp_url: String,
        start_call_delay: Duration,
    ) -> Self {
        Self {
            client,
            products,
            cmp_url,
            start_call_delay,
        }
    }

    fn edit_referer(&self, id: i64) -> String {
        format!(
            "https://cmp.wildberries.ru/campaigns/list/active/edit/search/{id}"
        )
    }

    /// Создает рекламную кампанию и возвращает ее идентификатор.
    pub async fn create_campaign(
        &self,
        auth: &UserAuthData,
        name: &str,
        nms: &[i64],
    ) -> Result<i64, WbaError> {
        let mut pairs = Vec::with_capacity(nms.len());
        for &nm in nms {
            pairs.push((self.products.category(auth, nm).await?, nm));
        }
        let groups = group_by_category(pairs);

        let url = format!("{}/backend/api/v2/search/save-ad", self.cmp_url);
        let body = json!({
            "campaignName": name,
            "groups": groups,
        });
        let response = self
            .client
            .call(
                Method::POST,
                &url,
                WbIdentity::SellerWeb(auth),
                CREATE_SEARCH_REFERER,
                &[],
                Some(&body),
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Create,
                    e,
                    format!("Ошибка при создании кампании. name={name}"),
                )
            })?;

        let saved: SaveAdResponse = response.json().map_err(|e| {
            WbaError::domain(format!(
                "Не удалось обработать ответ создания кампании. error={e}"
            ))
        })?;
        parse_campaign_id(&saved.id).ok_or_else(|| {
            WbaError::domain(format!(
                "Неожиданный идентификатор кампании в ответе: {}",
                saved.id
            ))
        })
    }

    /// Текущий размер бюджета кампании.
    pub async fn campaign_budget(&self, auth: &UserAuthData, id: i64) -> Result<i64, WbaError> {
        let url = format!("{}/backend/api/v2/search/{id}/budget", self.cmp_url);
        let response = self
            .client
            .call(
                Method::GET,
                &url,
                WbIdentity::SellerWeb(auth),
                &self.edit_referer(id),
                &[],
                None,
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Init,
                    e,
                    format!("Ошибка при получении бюджета кампании. wb_campaign_id={id}"),
                )
            })?;

        let budget: BudgetResponse = response.json().map_err(|e| {
            WbaError::domain(format!(
                "Не удалось обработать бюджет кампании. wb_campaign_id={id}, error={e}"
            ))
        })?;
        Ok(budget.total)
    }

    /// Доводит бюджет кампании минимум до `target` с округлением суммы
    /// пополнения вверх. Если бюджет уже достаточен, ничего не делает,
    /// поэтому повторная доставка задачи вырождается в no-op.
    pub async fn replenish_budget(
        &self,
        auth: &UserAuthData,
        id: i64,
        target: i64,
        source: DepositSource,
    ) -> Result<(), WbaError> {
        let current = self.campaign_budget(auth, id).await?;
        let Some(amount) = rounded_top_up(current, target) else {
            return Ok(());
        };
        self.deposit_budget(auth, id, amount, source).await
    }

    /// Пополняет бюджет кампании ровно на `amount`.
    pub async fn deposit_budget(
        &self,
        auth: &UserAuthData,
        id: i64,
        amount: i64,
        source: DepositSource,
    ) -> Result<(), WbaError> {
        let url = format!("{}/backend/api/v2/search/{id}/budget/deposit", self.cmp_url);
        let body = json!({
            "sum": amount,
            "type": source,
        });
        self.client
            .call(
                Method::POST,
                &url,
                WbIdentity::SellerWeb(auth),
                &self.edit_referer(id),
                &[],
                Some(&body),
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Init,
                    e,
                    format!("Ошибка при пополнении бюджета кампании. sum={amount}"),
                )
            })?;
        Ok(())
    }

    /// Добавляет ключевые фразы в кампанию.
    pub async fn add_keywords(
        &self,
        auth: &UserAuthData,
        id: i64,
        keywords: &[String],
    ) -> Result<(), WbaError> {
        let url = format!("{}/backend/api/v2/search/{id}/set-plus", self.cmp_url);
        let body = json!({ "pluse": keywords });
        self.client
            .call(
                Method::POST,
                &url,
                WbIdentity::SellerWeb(auth),
                &self.edit_referer(id),
                &[],
                Some(&body),
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Init,
                    e,
                    format!("Ошибка при добавлении ключевых фраз. keywords={keywords:?}"),
                )
            })?;
        Ok(())
    }

    /// Включает показ только по фиксированному списку фраз.
    pub async fn enable_fixed_list(&self, auth: &UserAuthData, id: i64) -> Result<(), WbaError> {
        let url = format!("{}/backend/api/v2/search/{id}/set-plus", self.cmp_url);
        self.client
            .call(
                Method::GET,
                &url,
                WbIdentity::SellerWeb(auth),
                &self.edit_referer(id),
                &[("fixed", "true".to_string())],
                None,
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Init,
                    e,
                    "Ошибка при включении опции фиксированных фраз",
                )
            })?;
        Ok(())
    }

    /// Текущая конфигурация кампании.
    pub async fn campaign_config(
        &self,
        auth: &UserAuthData,
        id: i64,
    ) -> Result<CampaignConfig, WbaError> {
        let url = format!("{}/backend/api/v2/search/{id}/placement", self.cmp_url);
        let response = self
            .client
            .call(
                Method::GET,
                &url,
                WbIdentity::SellerWeb(auth),
                &self.edit_referer(id),
                &[],
                None,
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Domain,
                    e,
                    format!("Ошибка при получении конфигурации кампании. wb_campaign_id={id}"),
                )
            })?;

        response.json().map_err(|e| {
            WbaError::domain(format!(
                "Не удалось обработать конфигурацию кампании. wb_campaign_id={id}, error={e}"
            ))
        })
    }

    /// Запускает кампанию: в конфигурацию проставляется актуальный
    /// бюджет и документ публикуется обратно.
    pub async fn start_campaign(&self, auth: &UserAuthData, id: i64) -> Result<(), WbaError> {
        let budget = self.campaign_budget(auth, id).await?;
        tokio::time::sleep(self.start_call_delay).await;
        let mut config = self.campaign_config(auth, id).await?;
        config.budget.total = budget;
        tokio::time::sleep(self.start_call_delay).await;

        let url = format!("{}/backend/api/v2/search/{id}/placement", self.cmp_url);
        let body = serde_json::to_value(&config)
            .map_err(|e| WbaError::domain(format!("Не удалось сериализовать конфигурацию: {e}")))?;
        self.client
            .call(
                Method::PUT,
                &url,
                WbIdentity::SellerWeb(auth),
                &self.edit_referer(id),
                &[],
                Some(&body),
            )
            .await
            .map_err(|e| {
                classify(
                    ErrorKind::Start,
                    e,
                    format!("Ошибка при запуске кампании. wb_campaign_id={id}"),
                )
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_up_funds_target_when_budget_is_empty() {
        assert_eq!(rounded_top_up(0, 500), Some(500));
    }

    #[test]
    fn top_up_rounds_by_current_budget_not_target() {
        assert_eq!(rounded_top_up(120, 500), Some(150));
        assert_eq!(rounded_top_up(30, 500), Some(100));
        assert_eq!(rounded_top_up(150, 500), Some(150));
    }

    #[test]
    fn top_up_skips_when_budget_is_sufficient() {
        assert_eq!(rounded_top_up(600, 500), None);
        assert_eq!(rounded_top_up(500, 500), None);
    }

    #[test]
    fn grouping_collects_nms_by_category() {
        let groups = group_by_category([
            ("Shoes".to_string(), 1),
            ("Shoes".to_string(), 2),
            ("Bags".to_string(), 3),
        ]);
        assert_eq!(
            groups,
            vec![
                KeywordGroup {
                    nms: vec![1, 2],
                    key_word: "Shoes".to_string()
                },
                KeywordGroup {
                    nms: vec![3],
                    key_word: "Bags".to_string()
                },
            ]
        );
    }

    #[test]
    fn grouping_does_not_depend_on_category_order() {
        let shuffled = group_by_category([
            ("Bags".to_string(), 3),
            ("Shoes".to_string(), 1),
            ("Shoes".to_string(), 2),
        ]);
        assert_eq!(shuffled.len(), 2);
        let shoes = shuffled.iter().find(|g| g.key_word == "Shoes").unwrap();
        let bags = shuffled.iter().find(|g| g.key_word == "Bags").unwrap();
        assert_eq!(shoes.nms, vec![1, 2]);
        assert_eq!(bags.nms, vec![3]);
    }

    #[test]
    fn create_payload_matches_wire_shape() {
        let groups = group_by_category([("Сумки".to_string(), 7)]);
        let body = json!({ "campaignName": "test", "groups": groups });
        assert_eq!(
            body,
            json!({
                "campaignName": "test",
                "groups": [{ "nms": [7], "key_word": "Сумки" }],
            })
        );
    }

    #[test]
    fn campaign_id_accepts_number_and_string() {
        assert_eq!(parse_campaign_id(&json!(123)), Some(123));
        assert_eq!(parse_campaign_id(&json!("456")), Some(456));
        assert_eq!(parse_campaign_id(&json!({"id": 1})), None);
    }

    #[test]
    fn config_roundtrips_unknown_fields() {
        let raw = json!({
            "budget": { "total": 100, "dailyMax": 0 },
            "minCPM": 125,
            "stepCPM": 5,
            "locale": [1],
            "place": [{ "keyWord": "Сумки", "price": 125 }],
            "limited": false,
            "nmsCount": 2,
            "name": "test",
            "status": 4,
            "fixed": true,
            "futureField": { "nested": true },
        });
        let config: CampaignConfig = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(config.budget.total, 100);
        assert_eq!(config.extra["futureField"], json!({ "nested": true }));
        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back, raw);
    }
}
