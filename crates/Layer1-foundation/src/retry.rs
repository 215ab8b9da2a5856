//! Retry logic for the worker's own fallible calls

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry 설정
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수
    pub max_retries: u32,

    /// 초기 대기 시간 (밀리초)
    pub initial_delay_ms: u64,

    /// 최대 대기 시간 (밀리초)
    pub max_delay_ms: u64,

    /// 백오프 배수
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// 재시도 없음
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// 지정 횟수 재시도
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// n번째 재시도의 대기 시간 계산
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32))
            as u64;
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// 재시도 로직으로 함수 실행
///
/// Only errors for which [`Error::is_retryable`] holds are retried.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation_name: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_retryable() || attempt >= config.max_retries {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after error"
                );

                last_error = Some(e);
                sleep(delay).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Internal("No attempts made".to_string())))
}
