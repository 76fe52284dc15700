use std::future::Future;
use std::time::Duration;

use crate::shared::config::RetryConfig;

/// Политика повторов для вызовов внешних сервисов.
///
/// Паузы растут по Фибоначчи (1, 1, 2, 3, 5, ... базовых шагов) с
/// потолком `max_delay`; повторы прекращаются, когда следующая пауза
/// вывела бы суммарное время за `max_elapsed`. Повторяется только то,
/// что `is_retryable` признал временным, остальные ошибки возвращаются
/// сразу.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
            max_elapsed: Duration::from_secs(cfg.max_elapsed_secs),
        }
    }

    /// Пауза перед повтором номер `attempt` (нумерация с нуля).
    fn delay(&self, attempt: u32) -> Duration {
        let mut prev: u64 = 1;
        let mut cur: u64 = 1;
        for _ in 0..attempt {
            let next = prev.saturating_add(cur);
            prev = cur;
            cur = next;
        }
        self.base_delay.saturating_mul(prev as u32).min(self.max_delay)
    }

    pub async fn run<T, E, F, Fut, R>(&self, is_retryable: R, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
    {
        let started = tokio::time::Instant::now();
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_retryable(&err) => {
                    let delay = self.delay(attempt);
                    if started.elapsed() + delay > self.max_elapsed {
                        return Err(err);
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            max_elapsed: Duration::from_millis(200),
        }
    }

    #[test]
    fn fibonacci_delays_are_capped() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            max_elapsed: Duration::from_secs(60),
        };
        let delays: Vec<u64> = (0..7).map(|n| policy.delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 1, 2, 3, 5, 8, 8]);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = quick_policy()
            .run(
                |_e| true,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err("transient")
                        } else {
                            Ok(n)
                        }
                    }
                },
            )
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = quick_policy()
            .run(
                |e: &&str| *e == "transient",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("permanent") }
                },
            )
            .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_when_elapsed_budget_is_spent() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(5),
            max_elapsed: Duration::from_millis(12),
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(
                |_e| true,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("transient") }
                },
            )
            .await;
        assert_eq!(result, Err("transient"));
        // две паузы по 5ms укладываются в бюджет 12ms, третья уже нет
        assert!(calls.load(Ordering::SeqCst) <= 4);
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
