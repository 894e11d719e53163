//! 熔断器 - 基础设施层
//!
//! 每个外部依赖一个实例，由所有并发请求共享（不是每个请求一个）。
//!
//! # 状态
//!
//! - **Closed**：正常放行，失败计数累加，达到阈值后转为 Open
//! - **Open**：`until` 之前的调用直接拒绝，不触达被包裹的操作；
//!   到期后的第一个调用转为 HalfOpen 并放行
//! - **HalfOpen**：只放行一个探测调用，其结果决定下一个状态
//!
//! 状态转换是 `(当前状态, 现在, 结果)` 的纯函数（见 [`BreakerSnapshot`]），
//! 外层只用一把互斥锁保证原子更新，锁不会跨 `.await` 持有。

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::infrastructure::clock::{Clock, SystemClock};

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { until: Instant },
    HalfOpen,
}

/// 熔断器配置
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// 连续失败多少次后打开
    pub failure_threshold: u32,
    /// 打开后多久允许探测
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// 熔断器错误
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// 熔断器打开，请求未触达上游
    #[error("熔断器 {name} 已打开，拒绝请求")]
    Open { name: String },
    /// 被包裹操作本身的错误
    #[error("{0}")]
    Inner(E),
}

/// 一次调用被放行的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed 状态下的普通调用
    Allowed,
    /// HalfOpen 状态下唯一的探测调用
    Probe,
    /// 被拒绝
    Rejected,
}

/// 被包裹操作的结果（对熔断器而言）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// 熔断器的完整状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
}

impl BreakerSnapshot {
    pub fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
        }
    }

    /// 判断调用能否放行
    pub fn admit(self, now: Instant) -> (Admission, Self) {
        match self.state {
            CircuitState::Closed => (Admission::Allowed, self),
            CircuitState::Open { until } if now >= until => (
                Admission::Probe,
                Self {
                    state: CircuitState::HalfOpen,
                    ..self
                },
            ),
            // 探测进行中，其余调用一律拒绝
            CircuitState::Open { .. } | CircuitState::HalfOpen => (Admission::Rejected, self),
        }
    }

    /// 记录被放行调用的结果
    pub fn record(
        self,
        admission: Admission,
        outcome: Outcome,
        now: Instant,
        config: &CircuitBreakerConfig,
    ) -> Self {
        let reopen = |failure_count| Self {
            state: CircuitState::Open {
                until: now + config.reset_timeout,
            },
            failure_count,
        };

        match (admission, self.state, outcome) {
            (Admission::Rejected, _, _) => self,
            (Admission::Probe, _, Outcome::Success) => Self::closed(),
            (Admission::Probe, _, Outcome::Failure) => reopen(self.failure_count.saturating_add(1)),
            (Admission::Allowed, CircuitState::Closed, Outcome::Success) => Self::closed(),
            (Admission::Allowed, CircuitState::Closed, Outcome::Failure) => {
                let failure_count = self.failure_count.saturating_add(1);
                if failure_count >= config.failure_threshold {
                    reopen(failure_count)
                } else {
                    Self {
                        failure_count,
                        ..self
                    }
                }
            }
            // 在 Closed 时放行、返回时状态已变化的调用：只计数，不改变状态
            (Admission::Allowed, _, Outcome::Success) => self,
            (Admission::Allowed, _, Outcome::Failure) => Self {
                failure_count: self.failure_count.saturating_add(1),
                ..self
            },
        }
    }
}

/// 熔断器
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerSnapshot>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// 创建使用系统时钟的熔断器
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// 创建使用指定时钟的熔断器
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = name.into();
        debug!("创建熔断器: {} ({:?})", name, config);
        Self {
            name,
            config,
            state: Mutex::new(BreakerSnapshot::closed()),
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        *self.lock()
    }

    pub fn state(&self) -> CircuitState {
        self.snapshot().state
    }

    /// 执行操作，所有错误都计为失败
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with(operation, |_| true).await
    }

    /// 执行操作，由 `counts_as_failure` 决定哪些错误计入熔断
    ///
    /// 不计入的错误视为上游已正常响应
    pub async fn execute_with<T, E, F, Fut, C>(
        &self,
        operation: F,
        counts_as_failure: C,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&E) -> bool,
    {
        let admission = self.admit();
        if admission == Admission::Rejected {
            debug!("熔断器 {} 拒绝请求", self.name);
            return Err(BreakerError::Open {
                name: self.name.clone(),
            });
        }

        let mut pending = PendingCall {
            breaker: self,
            admission,
            finished: false,
        };
        let result = operation().await;
        let outcome = match &result {
            Err(e) if counts_as_failure(e) => Outcome::Failure,
            _ => Outcome::Success,
        };
        pending.finish(outcome);

        result.map_err(BreakerError::Inner)
    }

    fn admit(&self) -> Admission {
        let mut state = self.lock();
        let (admission, next) = state.admit(self.clock.now());
        if admission == Admission::Probe {
            info!("熔断器 {} 进入 HalfOpen，放行探测请求", self.name);
        }
        *state = next;
        admission
    }

    fn record(&self, admission: Admission, outcome: Outcome) {
        let mut state = self.lock();
        let before = *state;
        let after = before.record(admission, outcome, self.clock.now(), &self.config);
        *state = after;
        drop(state);

        match (before.state, after.state) {
            (CircuitState::Closed, CircuitState::Open { .. }) => warn!(
                "熔断器 {} 打开: 连续失败 {} 次，{:?} 内拒绝请求",
                self.name, after.failure_count, self.config.reset_timeout
            ),
            (CircuitState::HalfOpen, CircuitState::Open { .. }) => {
                warn!("熔断器 {} 探测失败，重新打开", self.name)
            }
            (CircuitState::HalfOpen, CircuitState::Closed) => {
                info!("熔断器 {} 探测成功，恢复 Closed", self.name)
            }
            _ => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 已放行但尚未记录结果的调用
///
/// 若 future 在完成前被丢弃，按失败记录，避免熔断器停留在 HalfOpen
struct PendingCall<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    finished: bool,
}

impl PendingCall<'_> {
    fn finish(&mut self, outcome: Outcome) {
        self.finished = true;
        self.breaker.record(self.admission, outcome);
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.finished && self.admission == Admission::Probe {
            self.breaker.record(self.admission, Outcome::Failure);
        }
    }
}
