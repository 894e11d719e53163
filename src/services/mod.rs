//! 业务能力层
//!
//! 每个服务只描述"我能做什么"，只处理单个文档或单次调用，不关心流程顺序

pub mod mcq_fallback;
pub mod mcq_parser;
pub mod model_cascade;
pub mod result_writer;
pub mod summary_composer;
pub mod text_analyzer;

pub use mcq_fallback::McqFallbackGenerator;
pub use mcq_parser::{build_mcq_prompt, parse_mcqs, McqParseError};
pub use model_cascade::{CascadeOutcome, CascadeSettings, ModelCascade};
pub use result_writer::ResultWriter;
pub use summary_composer::SummaryComposer;
pub use text_analyzer::{AnalyzerOptions, TextAnalysis, TextAnalyzer};
