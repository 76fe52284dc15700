use once_cell::sync::Lazy;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub token_service: TokenServiceConfig,
    pub wildberries: WildberriesConfig,
    pub retry: RetryConfig,
    pub saga: SagaConfig,
    pub jobs: JobsConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Пауза между запросом обновления токена и повторным чтением
    /// авторизационных данных.
    pub refresh_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WildberriesConfig {
    pub cmp_url: String,
    pub card_url: String,
    pub adv_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Максимальное суммарное время повторов одного вызова.
    pub max_elapsed_secs: u64,
    /// Базовый шаг фибоначчиевой паузы между повторами.
    pub base_delay_ms: u64,
    /// Потолок одиночной паузы.
    pub max_delay_secs: u64,
}

/// Паузы между вызовами маркетплейса внутри саги. Значения подобраны
/// опытным путем против HTTP 429 и намеренно вынесены в конфигурацию.
#[derive(Debug, Deserialize, Clone)]
pub struct SagaConfig {
    pub pre_create_delay_ms: u64,
    pub step_delay_ms: u64,
    pub pre_start_delay_ms: u64,
    /// Пауза между чтением бюджета, чтением конфигурации и записью
    /// placement на шаге запуска.
    pub start_call_delay_ms: u64,
    pub deadline_secs: u64,
    pub lock_ttl_secs: u64,
    pub lock_wait_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobsConfig {
    pub stream: String,
    pub group: String,
    pub workers: usize,
    pub result_ttl_secs: u64,
    pub block_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationsConfig {
    /// Префикс отправителя в ключе маршрутизации уведомлений.
    pub sender: String,
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 8000

[redis]
url = "redis://127.0.0.1:6379"

[token_service]
base_url = "http://token-manager:8000"
timeout_secs = 5
refresh_delay_ms = 2000

[wildberries]
cmp_url = "https://cmp.wildberries.ru"
card_url = "https://card.wb.ru"
adv_url = "https://advert-api.wb.ru/adv"
request_timeout_secs = 30

[retry]
max_elapsed_secs = 60
base_delay_ms = 1000
max_delay_secs = 8

[saga]
pre_create_delay_ms = 1000
step_delay_ms = 500
pre_start_delay_ms = 3000
start_call_delay_ms = 500
deadline_secs = 300
lock_ttl_secs = 330
lock_wait_ms = 15000

[jobs]
stream = "wba:jobs"
group = "wba-workers"
workers = 4
result_ttl_secs = 1800
block_ms = 5000

[notifications]
sender = "wba"
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

/// Конфигурация процесса, загружается один раз при старте.
pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    load_config().expect("Failed to load configuration")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let config: Result<Config, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.jobs.result_ttl_secs, 1800);
        assert_eq!(config.jobs.workers, 4);
        assert_eq!(config.notifications.sender, "wba");
        assert_eq!(config.wildberries.cmp_url, "https://cmp.wildberries.ru");
    }
}
