//! 编排层（Orchestration Layer）
//!
//! 负责批量加载、并发调度和统计，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<LoadedText>)
//!     ↓
//! workflow::DocumentProcessor (处理单个文档)
//!     ↓
//! services (能力层：cascade / composer / fallback / writer)
//!     ↓
//! clients + infrastructure (推理 API、熔断器、重试)
//! ```
//!
//! 只有编排层持有推理客户端和熔断器的创建权；下层只接收共享句柄。

pub mod batch_processor;

pub use batch_processor::{App, CliArgs, RunStats};
