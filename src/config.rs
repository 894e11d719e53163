use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::{ModelCandidate, Task};

/// 程序配置
///
/// 加载顺序：默认值 < TOML 文件（`CONFIG_FILE`）< 环境变量。
/// 进程启动时加载一次，处理过程中不会重新读取。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 推理服务 ---
    pub inference_api_base_url: String,
    pub inference_api_token: String,
    /// 单次请求的硬超时（秒）
    pub request_timeout_secs: u64,
    /// 每个候选模型的最大尝试次数
    pub max_retries: u32,
    // --- 熔断器 ---
    pub breaker_failure_threshold: u32,
    pub breaker_reset_timeout_secs: u64,
    // --- 候选模型（有序） ---
    pub summary_models: Vec<String>,
    pub mcq_models: Vec<String>,
    // --- 文档处理阈值 ---
    /// 超过该词数走分块路径
    pub long_document_words: usize,
    pub words_per_chunk: usize,
    /// 最终摘要的最小长度（字符）
    pub summary_min_chars: usize,
    /// 分块摘要拼接后超过该长度则再摘要一次
    pub resummarize_threshold_chars: usize,
    /// 所有分块摘要都失败时，直接摘要原文的前 N 个字符
    pub raw_fallback_chars: usize,
    /// 级联中模型摘要被接受的最小长度
    pub cascade_summary_min_chars: usize,
    /// 出题提示词中原文的最大长度
    pub mcq_prompt_max_chars: usize,
    /// 输入文本的最小长度
    pub min_input_chars: usize,
    // --- 批处理 ---
    pub input_path: String,
    pub output_file: String,
    pub max_concurrent_documents: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inference_api_base_url: "https://api-inference.huggingface.co".to_string(),
            inference_api_token: String::new(),
            request_timeout_secs: 60,
            max_retries: 3,
            breaker_failure_threshold: 5,
            breaker_reset_timeout_secs: 60,
            summary_models: ModelCandidate::default_names(Task::Summarize),
            mcq_models: ModelCandidate::default_names(Task::GenerateMcqs),
            long_document_words: 3000,
            words_per_chunk: 1000,
            summary_min_chars: 100,
            resummarize_threshold_chars: 500,
            raw_fallback_chars: 3000,
            cascade_summary_min_chars: 20,
            mcq_prompt_max_chars: 3000,
            min_input_chars: 1,
            input_path: "documents".to_string(),
            output_file: "results.jsonl".to_string(),
            max_concurrent_documents: 4,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载完整配置：默认值 → `CONFIG_FILE` 指定的 TOML → 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_file(None)
    }

    /// 同 [`Config::load`]，但命令行指定的配置文件优先于 `CONFIG_FILE`
    pub fn load_with_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = env_string("CONFIG_FILE");
        let file = path.or_else(|| from_env.as_deref().map(|p| Path::new(p.trim())));
        let base = match file {
            Some(file) => Self::from_toml_file(file)?,
            None => Self::default(),
        };
        base.with_env_overrides()
    }

    /// 只使用默认值和环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺失的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let c = self;
        Ok(Self {
            inference_api_base_url: env_string("INFERENCE_API_BASE_URL")
                .unwrap_or(c.inference_api_base_url),
            inference_api_token: env_string("INFERENCE_API_TOKEN")
                .or_else(|| env_string("HF_API_TOKEN"))
                .unwrap_or(c.inference_api_token),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS")?
                .unwrap_or(c.request_timeout_secs),
            max_retries: env_parse("MAX_RETRIES")?.unwrap_or(c.max_retries),
            breaker_failure_threshold: env_parse("BREAKER_FAILURE_THRESHOLD")?
                .unwrap_or(c.breaker_failure_threshold),
            breaker_reset_timeout_secs: env_parse("BREAKER_RESET_TIMEOUT_SECS")?
                .unwrap_or(c.breaker_reset_timeout_secs),
            summary_models: env_string("SUMMARY_MODELS")
                .map(|v| parse_model_list(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or(c.summary_models),
            mcq_models: env_string("MCQ_MODELS")
                .map(|v| parse_model_list(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or(c.mcq_models),
            long_document_words: env_parse("LONG_DOCUMENT_WORDS")?
                .unwrap_or(c.long_document_words),
            words_per_chunk: env_parse("WORDS_PER_CHUNK")?.unwrap_or(c.words_per_chunk),
            summary_min_chars: env_parse("SUMMARY_MIN_CHARS")?.unwrap_or(c.summary_min_chars),
            resummarize_threshold_chars: env_parse("RESUMMARIZE_THRESHOLD_CHARS")?
                .unwrap_or(c.resummarize_threshold_chars),
            raw_fallback_chars: env_parse("RAW_FALLBACK_CHARS")?.unwrap_or(c.raw_fallback_chars),
            cascade_summary_min_chars: env_parse("CASCADE_SUMMARY_MIN_CHARS")?
                .unwrap_or(c.cascade_summary_min_chars),
            mcq_prompt_max_chars: env_parse("MCQ_PROMPT_MAX_CHARS")?
                .unwrap_or(c.mcq_prompt_max_chars),
            min_input_chars: env_parse("MIN_INPUT_CHARS")?.unwrap_or(c.min_input_chars),
            input_path: env_string("INPUT_PATH").unwrap_or(c.input_path),
            output_file: env_string("OUTPUT_FILE").unwrap_or(c.output_file),
            max_concurrent_documents: env_parse("MAX_CONCURRENT_DOCUMENTS")?
                .unwrap_or(c.max_concurrent_documents),
            verbose_logging: env_parse("VERBOSE_LOGGING")?.unwrap_or(c.verbose_logging),
        })
    }

    /// 构建某个任务的有序候选列表
    pub fn candidates(&self, task: Task) -> Result<Vec<ModelCandidate>, ConfigError> {
        let names = match task {
            Task::Summarize => &self.summary_models,
            Task::GenerateMcqs => &self.mcq_models,
        };
        if names.is_empty() {
            return Err(ConfigError::NoCandidates {
                task: task.to_string(),
            });
        }
        Ok(names
            .iter()
            .map(|name| ModelCandidate::for_task(name, task))
            .collect())
    }
}

/// 解析逗号分隔的模型列表
pub fn parse_model_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(var_name: &str) -> Result<Option<T>, ConfigError> {
    match env_string(var_name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }),
    }
}
