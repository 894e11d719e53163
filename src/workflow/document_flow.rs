//! 单个文档的处理流程 - 流程层
//!
//! 流程（状态机）：
//!
//! ```text
//! Received → ShortPath | ChunkedPath → SummaryReady → McqReady → Done
//! ```
//!
//! - 词数不超过阈值走短文本路径，直接对全文做摘要级联
//! - 否则分块，只摘要优先块（首、中、尾），拼接后过长再摘要一次
//! - 摘要短于下限时，用本地拼装的摘要替换（前提是后者更长）
//! - 出题总是针对全文，与摘要路径无关
//!
//! 除了 [`InputError`]，所有上游错误都在级联内部被吸收，
//! 级联耗尽时由确定性兜底接手，因此对非空输入总能得到完整结果。

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::clients::ModelInvoker;
use crate::config::Config;
use crate::error::{ConfigError, InputError};
use crate::infrastructure::CircuitBreaker;
use crate::models::{Document, Mcq, ProcessingResult, MCQ_COUNT};
use crate::services::{McqFallbackGenerator, ModelCascade, SummaryComposer};
use crate::utils::logging::truncate_text;
use crate::workflow::chunker::{chunk, priority_chunks};

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Received,
    ShortPath,
    ChunkedPath,
    SummaryReady,
    McqReady,
    Done,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStage::Received => "received",
            ProcessingStage::ShortPath => "short-path",
            ProcessingStage::ChunkedPath => "chunked-path",
            ProcessingStage::SummaryReady => "summary-ready",
            ProcessingStage::McqReady => "mcq-ready",
            ProcessingStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// 流程阈值
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// 超过该词数走分块路径
    pub long_document_words: usize,
    pub words_per_chunk: usize,
    /// 最终摘要的最小长度（字符）
    pub summary_min_chars: usize,
    /// 分块摘要拼接后超过该长度则再摘要一次
    pub resummarize_threshold_chars: usize,
    /// 所有分块摘要都失败时，取原文前 N 个字符摘要
    pub raw_fallback_chars: usize,
    pub min_input_chars: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            long_document_words: 3000,
            words_per_chunk: 1000,
            summary_min_chars: 100,
            resummarize_threshold_chars: 500,
            raw_fallback_chars: 3000,
            min_input_chars: 1,
        }
    }
}

impl From<&Config> for ProcessorSettings {
    fn from(config: &Config) -> Self {
        Self {
            long_document_words: config.long_document_words,
            words_per_chunk: config.words_per_chunk,
            summary_min_chars: config.summary_min_chars,
            resummarize_threshold_chars: config.resummarize_threshold_chars,
            raw_fallback_chars: config.raw_fallback_chars,
            min_input_chars: config.min_input_chars,
        }
    }
}

/// 文档处理器
///
/// 无每文档状态，可以被多个并发任务共享
pub struct DocumentProcessor {
    cascade: ModelCascade,
    composer: SummaryComposer,
    fallback: McqFallbackGenerator,
    settings: ProcessorSettings,
}

impl DocumentProcessor {
    pub fn new(cascade: ModelCascade, settings: ProcessorSettings) -> Self {
        Self {
            cascade,
            composer: SummaryComposer::new(),
            fallback: McqFallbackGenerator::new(),
            settings,
        }
    }

    /// 根据配置创建，熔断器由调用方持有并共享
    pub fn from_config(
        config: &Config,
        invoker: Arc<dyn ModelInvoker>,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, ConfigError> {
        let cascade = ModelCascade::from_config(config, invoker, breaker)?;
        Ok(Self::new(cascade, ProcessorSettings::from(config)))
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    pub fn cascade(&self) -> &ModelCascade {
        &self.cascade
    }

    /// 处理一个文档
    ///
    /// 只有输入不合法时返回错误
    pub async fn process_document(&self, text: &str) -> Result<ProcessingResult, InputError> {
        let document = Document::new(text, self.settings.min_input_chars)?;
        enter(ProcessingStage::Received, &document);

        let path = self.select_path(&document);
        enter(path, &document);
        let summary = match path {
            ProcessingStage::ChunkedPath => self.summarize_chunked(document.text()).await,
            _ => self.summarize_short(document.text()).await,
        };
        let summary = self.apply_summary_floor(summary, document.text());
        enter(ProcessingStage::SummaryReady, &document);

        let mcqs = self.generate_mcqs(document.text()).await;
        enter(ProcessingStage::McqReady, &document);

        enter(ProcessingStage::Done, &document);
        Ok(ProcessingResult { summary, mcqs })
    }

    /// 按词数选择摘要路径
    pub fn select_path(&self, document: &Document) -> ProcessingStage {
        if document.word_count() <= self.settings.long_document_words {
            ProcessingStage::ShortPath
        } else {
            ProcessingStage::ChunkedPath
        }
    }

    /// 短文本路径：级联，耗尽则本地拼装
    async fn summarize_short(&self, text: &str) -> String {
        match self.cascade.summarize(text).await.into_value() {
            Some(summary) => summary,
            None => {
                info!("🔁 摘要级联耗尽，使用本地摘要");
                self.composer.compose(text)
            }
        }
    }

    /// 分块路径：逐个摘要优先块（顺序执行）
    async fn summarize_chunked(&self, text: &str) -> String {
        let chunks = chunk(text, self.settings.words_per_chunk);
        let picks = priority_chunks(&chunks);
        info!(
            "📚 长文档分为 {} 块，摘要其中 {} 块",
            chunks.len(),
            picks.len()
        );

        let mut parts = Vec::with_capacity(picks.len());
        for piece in picks {
            match self.cascade.summarize(piece.text).await.into_value() {
                Some(summary) => {
                    debug!(
                        "块 {} 摘要完成: {}",
                        piece.index,
                        truncate_text(&summary, 60)
                    );
                    parts.push(summary);
                }
                None => debug!("块 {} 摘要失败，跳过", piece.index),
            }
        }

        if parts.is_empty() {
            info!(
                "🔁 所有分块摘要失败，改为摘要原文前 {} 个字符",
                self.settings.raw_fallback_chars
            );
            let head: String = text.chars().take(self.settings.raw_fallback_chars).collect();
            return self.summarize_short(&head).await;
        }

        let combined = parts.join(" ");
        if combined.chars().count() > self.settings.resummarize_threshold_chars {
            debug!("分块摘要共 {} 字符，再摘要一次", combined.chars().count());
            self.summarize_short(&combined).await
        } else {
            combined
        }
    }

    /// 摘要短于下限时，换成更长的本地摘要
    fn apply_summary_floor(&self, summary: String, text: &str) -> String {
        let len = summary.chars().count();
        if len >= self.settings.summary_min_chars {
            return summary;
        }
        let composed = self.composer.compose(text);
        if composed.chars().count() > len {
            info!(
                "摘要只有 {} 字符，低于下限 {}，替换为本地摘要",
                len, self.settings.summary_min_chars
            );
            composed
        } else {
            summary
        }
    }

    /// 出题：级联结果不足 5 道时用兜底题补齐
    async fn generate_mcqs(&self, text: &str) -> [Mcq; MCQ_COUNT] {
        let generated = self
            .cascade
            .generate_mcqs(text)
            .await
            .into_value()
            .unwrap_or_default();

        match <[Mcq; MCQ_COUNT]>::try_from(generated) {
            Ok(mcqs) => mcqs,
            Err(partial) => {
                info!(
                    "🔁 模型出题 {} 道，其余 {} 道使用兜底题",
                    partial.len(),
                    MCQ_COUNT.saturating_sub(partial.len())
                );
                let fallback = self.fallback.generate_intelligent_mcqs(text);
                let mut partial = partial.into_iter();
                fallback.map(|backup| partial.next().unwrap_or(backup))
            }
        }
    }
}

fn enter(stage: ProcessingStage, document: &Document) {
    debug!("[{} 词] 进入阶段: {}", document.word_count(), stage);
}
