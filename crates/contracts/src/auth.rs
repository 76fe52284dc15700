use serde::{Deserialize, Serialize};

/// Авторизационные данные пользователя, выданные токен-сервисом.
///
/// `wb_token_access` и `wb_supplier_id` используются для вызовов
/// cmp.wildberries.ru (cookie-авторизация), `wb_token_ad` для вызовов
/// официального advert API (заголовок Authorization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAuthData {
    pub wb_user_id: i64,
    pub wb_supplier_id: String,
    pub wb_token_access: String,
    #[serde(default)]
    pub wb_token_ad: Option<String>,
}
