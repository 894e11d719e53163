//! 基础设施层
//!
//! 持有跨请求共享的资源（熔断器）和通用控制流（重试、时钟），
//! 不认识文档、摘要或选择题

pub mod circuit_breaker;
pub mod clock;
pub mod retry;

pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use retry::{retry_on_condition, retry_with_backoff, retry_with_backoff_using};
