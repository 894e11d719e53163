//! 批量文档处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：创建推理客户端、唯一的熔断器和文档处理器
//! 2. **加载**：单个 `.txt` 文件，或文件夹中的所有 `.txt` 文件
//! 3. **并发控制**：使用 Semaphore 限制同时处理的文档数
//! 4. **结果交付**：每个文档一行 JSON，追加写入输出文件
//! 5. **全局统计**：汇总所有文档的处理结果
//!
//! 所有任务共享同一个 [`DocumentProcessor`]，因此也共享同一个熔断器。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::clients::HfInferenceClient;
use crate::config::Config;
use crate::infrastructure::{CircuitBreaker, CircuitBreakerConfig};
use crate::models::{load_text_document, load_text_documents, LoadedText};
use crate::services::ResultWriter;
use crate::utils::logging::{log_documents_loaded, log_startup, print_final_stats, truncate_text};
use crate::workflow::DocumentProcessor;

/// 命令行参数
#[derive(Debug, Default, PartialEq, Eq, Parser)]
#[command(name = "document_quiz")]
#[command(version, about = "Summarize text documents and generate multiple choice questions")]
pub struct CliArgs {
    /// TOML config file (overrides CONFIG_FILE)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// A .txt file or a folder of .txt files (overrides INPUT_PATH)
    #[arg(value_name = "INPUT")]
    pub input: Option<String>,
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

/// 应用主结构
pub struct App {
    config: Config,
    processor: Arc<DocumentProcessor>,
    writer: Arc<ResultWriter>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        log_startup(
            config.max_concurrent_documents,
            &config.summary_models,
            &config.mcq_models,
        );

        let client = HfInferenceClient::new(&config).context("创建推理客户端失败")?;
        let breaker = Arc::new(CircuitBreaker::new(
            "inference-api",
            CircuitBreakerConfig {
                failure_threshold: config.breaker_failure_threshold,
                reset_timeout: Duration::from_secs(config.breaker_reset_timeout_secs),
            },
        ));
        let processor = DocumentProcessor::from_config(&config, Arc::new(client), breaker)?;

        Ok(Self::with_processor(config, processor))
    }

    /// 使用现成的处理器创建（测试中注入假的推理实现）
    pub fn with_processor(config: Config, processor: DocumentProcessor) -> Self {
        let writer = ResultWriter::new(config.output_file.clone());
        Self {
            config,
            processor: Arc::new(processor),
            writer: Arc::new(writer),
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunStats> {
        let documents = self.load_documents().await?;

        if documents.is_empty() {
            warn!("⚠️ 没有找到待处理的文档，程序结束");
            return Ok(RunStats::default());
        }

        let max_concurrent = self.config.max_concurrent_documents.max(1);
        log_documents_loaded(documents.len(), max_concurrent);

        let stats = self.process_all(documents, max_concurrent).await?;
        print_final_stats(stats.success, stats.failed, stats.total, self.writer.path());

        Ok(stats)
    }

    /// 加载文档：输入路径可以是单个文件或文件夹
    async fn load_documents(&self) -> Result<Vec<LoadedText>> {
        let input = Path::new(&self.config.input_path);
        info!("\n📁 正在读取: {}", input.display());

        if input.is_file() {
            let document = load_text_document(input)
                .await
                .with_context(|| format!("无法加载文档: {}", input.display()))?;
            return Ok(vec![document]);
        }
        load_text_documents(&self.config.input_path).await
    }

    /// 并发处理所有文档
    async fn process_all(&self, documents: Vec<LoadedText>, max_concurrent: usize) -> Result<RunStats> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let total = documents.len();
        let mut handles = Vec::with_capacity(total);

        for (idx, document) in documents.into_iter().enumerate() {
            let doc_index = idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;
            let processor = Arc::clone(&self.processor);
            let writer = Arc::clone(&self.writer);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                info!("[文档 {}/{}] 开始处理: {}", doc_index, total, document.source);

                let result = processor
                    .process_document(&document.text)
                    .await
                    .with_context(|| format!("文档不可用: {}", document.source))?;
                info!(
                    "[文档 {}/{}] ✅ 摘要: {}",
                    doc_index,
                    total,
                    truncate_text(&result.summary, 80)
                );

                writer.write(&document.source, &result).await?;
                Ok::<_, anyhow::Error>(())
            }));
        }

        let mut stats = RunStats {
            total,
            ..Default::default()
        };
        for (idx, outcome) in join_all(handles).await.into_iter().enumerate() {
            match outcome {
                Ok(Ok(())) => stats.success += 1,
                Ok(Err(e)) => {
                    error!("[文档 {}] ❌ 处理失败: {:#}", idx + 1, e);
                    stats.failed += 1;
                }
                Err(e) => {
                    error!("[文档 {}] 任务执行失败: {}", idx + 1, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}
