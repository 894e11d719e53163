//! 重试工具
//!
//! - [`retry_with_backoff`]：无条件重试，每次失败后指数退避等待
//! - [`retry_on_condition`]：仅在谓词判定可重试时立即重试，不等待。
//!   模型调用路径使用它，外层由熔断器包裹
//!
//! `max_retries` 是总尝试次数的上限（至少尝试一次），耗尽后原样返回最后一次错误。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// 第 `attempt` 次（从 0 开始）失败后的等待时间：`base * 2^attempt`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// 带指数退避的重试，使用 tokio 的真实等待
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_with_backoff_using(operation, max_retries, base_delay, tokio::time::sleep).await
}

/// 带指数退避的重试，等待函数由调用方注入
pub async fn retry_with_backoff_using<T, E, F, Fut, S, SFut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
    mut sleep: S,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: FnMut(Duration) -> SFut,
    SFut: Future<Output = ()>,
    E: Display,
{
    let max_attempts = max_retries.max(1);
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    warn!("重试 {} 次后仍然失败: {}", attempt, e);
                    return Err(e);
                }
                let delay = backoff_delay(base_delay, attempt - 1);
                debug!(
                    "第 {}/{} 次尝试失败: {}，{:?} 后重试",
                    attempt, max_attempts, e, delay
                );
                sleep(delay).await;
            }
        }
    }
}

/// 条件重试：只有 `should_retry` 返回 true 且未达上限时才立即重试
pub async fn retry_on_condition<T, E, F, Fut, P>(
    mut operation: F,
    mut should_retry: P,
    max_retries: u32,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E) -> bool,
    E: Display,
{
    let max_attempts = max_retries.max(1);
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts || !should_retry(&e) {
                    debug!("第 {} 次尝试失败，不再重试: {}", attempt, e);
                    return Err(e);
                }
                debug!("第 {}/{} 次尝试失败，可重试: {}", attempt, max_attempts, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_backoff_delay_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_backoff_waits_between_attempts_and_returns_last_error() {
        let calls = AtomicUsize::new(0);
        let delays = Mutex::new(Vec::new());

        let result: Result<(), String> = retry_with_backoff_using(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(format!("failure {}", n)) }
            },
            3,
            Duration::from_millis(10),
            |d| {
                delays.lock().unwrap().push(d);
                std::future::ready(())
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *delays.lock().unwrap(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[tokio::test]
    async fn test_backoff_stops_on_success() {
        let calls = AtomicUsize::new(0);
        let result: Result<usize, String> = retry_with_backoff_using(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 2 {
                        Err("not yet".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
            5,
            Duration::from_millis(1),
            |_| std::future::ready(()),
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_backoff_with_real_sleep() {
        let result: Result<(), &str> =
            retry_with_backoff(|| async { Err("down") }, 2, Duration::from_millis(1)).await;
        assert_eq!(result.unwrap_err(), "down");
    }

    #[tokio::test]
    async fn test_condition_true_once_gives_two_invocations() {
        let calls = AtomicUsize::new(0);
        let mut allowed = 1;

        let result: Result<(), &str> = retry_on_condition(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            },
            |_| {
                if allowed > 0 {
                    allowed -= 1;
                    true
                } else {
                    false
                }
            },
            3,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_condition_respects_bound() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), &str> = retry_on_condition(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            },
            |_| true,
            3,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_condition_false_propagates_immediately() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), &str> = retry_on_condition(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
            |_| false,
            5,
        )
        .await;

        assert_eq!(result.unwrap_err(), "fatal");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_condition_recovers_after_transient_failure() {
        let calls = AtomicUsize::new(0);
        let result: Result<&str, &str> = retry_on_condition(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err("loading")
                    } else {
                        Ok("done")
                    }
                }
            },
            |e| *e == "loading",
            3,
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
