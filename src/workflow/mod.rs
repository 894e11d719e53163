//! 流程层
//!
//! 定义"一个文档"的完整处理流程：分块策略 → 摘要 → 出题

pub mod chunker;
pub mod document_flow;

pub use chunker::{chunk, priority_chunks, Chunk};
pub use document_flow::{DocumentProcessor, ProcessingStage, ProcessorSettings};
