//! # Document Quiz
//!
//! 对任意长度的文档生成摘要和 5 道选择题。
//! 主路径调用不稳定的外部推理服务，服务不可用、过慢、过载或输出不可用时
//! 退回确定性的本地算法，保证每个非空文档都能得到完整结果。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 熔断器、重试、时钟；不认识任何业务概念
//! - `CircuitBreaker` - 每个外部依赖一个实例，被所有并发请求共享
//!
//! ### ② 客户端（Clients）
//! - `clients/` - `ModelInvoker` trait 与托管推理 API 的实现，负责错误分类
//!
//! ### ③ 业务能力层（Services）
//! - `ModelCascade` - 按顺序尝试候选模型（熔断器 → 条件重试 → 调用）
//! - `TextAnalyzer` / `SummaryComposer` - 基于词频的本地摘要
//! - `McqFallbackGenerator` - 本地兜底出题
//! - `ResultWriter` - 结果写入
//!
//! ### ④ 流程层（Workflow）
//! - `DocumentProcessor` - 单个文档的状态机（短文本/分块 → 摘要 → 出题）
//! - `chunker` - 长文档分块与优先块选择
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator::App` - 加载文档、控制并发、统计
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{HfInferenceClient, ModelInvoker};
pub use config::Config;
pub use error::{AppError, AppResult, CandidateFailure, ConfigError, InputError, UpstreamError};
pub use infrastructure::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use models::{Mcq, ModelCandidate, ProcessingResult, Task};
pub use orchestrator::App;
pub use services::{CascadeOutcome, CascadeSettings, ModelCascade};
pub use workflow::{DocumentProcessor, ProcessingStage, ProcessorSettings};
