pub mod campaigns;
pub mod jobs;

use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

use crate::jobs::lock::UserLock;
use crate::jobs::notify::NotificationPublisher;
use crate::jobs::queue::JobQueue;
use crate::jobs::result_store::ResultStore;
use crate::shared::config::CONFIG;
use crate::shared::retry::RetryPolicy;
use crate::token::TokenService;
use crate::usecases::create_full_campaign::CreateFullCampaignExecutor;
use crate::wb::advert::AdvertAdapter;
use crate::wb::campaign::CampaignAdapter;
use crate::wb::client::WbClient;
use crate::wb::product::ProductAdapter;

static REDIS: Lazy<redis::Client> = Lazy::new(|| {
    redis::Client::open(CONFIG.redis.url.as_str()).expect("Failed to create Redis client")
});

static WB_CLIENT: Lazy<Arc<WbClient>> = Lazy::new(|| {
    Arc::new(WbClient::new(
        Duration::from_secs(CONFIG.wildberries.request_timeout_secs),
        RetryPolicy::from_config(&CONFIG.retry),
    ))
});

pub static TOKEN_SERVICE: Lazy<Arc<TokenService>> =
    Lazy::new(|| Arc::new(TokenService::new(&CONFIG.token_service)));

pub static CAMPAIGNS: Lazy<Arc<CampaignAdapter>> = Lazy::new(|| {
    Arc::new(CampaignAdapter::new(
        Arc::clone(&WB_CLIENT),
        ProductAdapter::new(
            Arc::clone(&WB_CLIENT),
            CONFIG.wildberries.cmp_url.clone(),
            CONFIG.wildberries.card_url.clone(),
        ),
        CONFIG.wildberries.cmp_url.clone(),
        Duration::from_millis(CONFIG.saga.start_call_delay_ms),
    ))
});

pub static ADVERTS: Lazy<Arc<AdvertAdapter>> = Lazy::new(|| {
    Arc::new(AdvertAdapter::new(
        Arc::clone(&WB_CLIENT),
        CONFIG.wildberries.adv_url.clone(),
    ))
});

pub static JOB_QUEUE: Lazy<Arc<JobQueue>> =
    Lazy::new(|| Arc::new(JobQueue::new(REDIS.clone(), &CONFIG.jobs)));

pub static RESULTS: Lazy<Arc<ResultStore>> =
    Lazy::new(|| Arc::new(ResultStore::new(REDIS.clone(), CONFIG.jobs.result_ttl_secs)));

static NOTIFIER: Lazy<Arc<NotificationPublisher>> = Lazy::new(|| {
    Arc::new(NotificationPublisher::new(
        REDIS.clone(),
        CONFIG.notifications.sender.clone(),
    ))
});

static LOCKS: Lazy<Arc<UserLock>> = Lazy::new(|| {
    Arc::new(UserLock::new(
        REDIS.clone(),
        Duration::from_secs(CONFIG.saga.lock_ttl_secs),
        Duration::from_millis(CONFIG.saga.lock_wait_ms),
    ))
});

pub static EXECUTOR: Lazy<Arc<CreateFullCampaignExecutor>> = Lazy::new(|| {
    Arc::new(CreateFullCampaignExecutor::new(
        Arc::clone(&TOKEN_SERVICE),
        Arc::clone(&CAMPAIGNS),
        Arc::clone(&RESULTS),
        Arc::clone(&NOTIFIER),
        Arc::clone(&LOCKS),
        &CONFIG.saga,
    ))
});
