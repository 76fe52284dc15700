use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Тип рекламной кампании Wildberries.
///
/// Values:
///     4 - реклама в каталоге,
///     5 - реклама в карточке товара,
///     6 - реклама в поиске,
///     7 - реклама в рекомендациях,
///     8 - автоматическая кампания,
///     9 - поиск + каталог.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CampaignType {
    Catalog = 4,
    Card = 5,
    Search = 6,
    Recommend = 7,
    Auto = 8,
    SearchCatalog = 9,
}

impl TryFrom<u8> for CampaignType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Self::Catalog),
            5 => Ok(Self::Card),
            6 => Ok(Self::Search),
            7 => Ok(Self::Recommend),
            8 => Ok(Self::Auto),
            9 => Ok(Self::SearchCatalog),
            other => Err(format!("unknown campaign type: {other}")),
        }
    }
}

impl From<CampaignType> for u8 {
    fn from(value: CampaignType) -> Self {
        value as u8
    }
}

/// Источник пополнения бюджета: 0 - счет, 1 - баланс.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DepositSource {
    Account = 0,
    Balance = 1,
}

impl TryFrom<u8> for DepositSource {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Account),
            1 => Ok(Self::Balance),
            other => Err(format!("unknown deposit source: {other}")),
        }
    }
}

impl From<DepositSource> for u8 {
    fn from(value: DepositSource) -> Self {
        value as u8
    }
}

/// Запрос на создание и запуск рекламной кампании.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignCreateRequest {
    pub name: String,
    /// Корреляционный идентификатор, назначенный вызывающей системой.
    pub source_id: Uuid,
    pub nms: Vec<i64>,
    pub keywords: Vec<String>,
    pub budget: i64,
    #[serde(rename = "type")]
    pub campaign_type: CampaignType,
}

/// Payload результата задачи создания кампании.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCampaignResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wb_campaign_id: Option<String>,
    pub source_id: Uuid,
}

/// Ответ на синхронное пополнение бюджета: новое значение бюджета кампании.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositResponse {
    pub budget: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_type_roundtrips_through_numbers() {
        let json = serde_json::to_string(&CampaignType::Search).unwrap();
        assert_eq!(json, "6");
        let back: CampaignType = serde_json::from_str("9").unwrap();
        assert_eq!(back, CampaignType::SearchCatalog);
        assert!(serde_json::from_str::<CampaignType>("3").is_err());
    }

    #[test]
    fn create_request_accepts_wire_shape() {
        let raw = r#"{
            "name": "test",
            "source_id": "7e2b9f4e-9f2a-4c5e-8c9a-0a1b2c3d4e5f",
            "nms": [101, 102],
            "keywords": ["обувь"],
            "budget": 500,
            "type": 6
        }"#;
        let req: CampaignCreateRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.campaign_type, CampaignType::Search);
        assert_eq!(req.nms, vec![101, 102]);
    }
}
