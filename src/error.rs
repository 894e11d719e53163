use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 输入文本错误
    #[error("输入错误: {0}")]
    Input(#[from] InputError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 结果写入错误
    #[error("写入结果失败 ({path}): {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 输入文本错误
///
/// 这是流水线唯一会向调用方暴露的错误
#[derive(Debug, Error)]
pub enum InputError {
    /// 文本为空（或只有空白）
    #[error("文本为空")]
    EmptyText,
    /// 文本过短
    #[error("文本长度 {length} 低于最小要求 {min}")]
    TooShort { length: usize, min: usize },
    /// 无法读取文档
    #[error("无法读取文档 ({path}): {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 推理服务错误
///
/// 由 `ModelInvoker` 对单次调用的响应进行分类
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// 模型正在加载
    #[error("模型 {model} 正在加载 (预计 {estimated_time:?} 秒)")]
    ModelLoading {
        model: String,
        estimated_time: Option<f64>,
    },
    /// 请求频率限制
    #[error("模型 {model} 请求频率限制, 建议等待: {retry_after:?} 秒")]
    RateLimited {
        model: String,
        retry_after: Option<u64>,
    },
    /// 端点已下线
    #[error("模型 {model} 端点已下线")]
    EndpointGone { model: String },
    /// 其他 4xx
    #[error("模型 {model} 请求被拒绝: status={status}, message={message}")]
    ClientError {
        model: String,
        status: u16,
        message: String,
    },
    /// 5xx（非加载中）
    #[error("模型 {model} 服务端错误: status={status}, message={message}")]
    ServerError {
        model: String,
        status: u16,
        message: String,
    },
    /// 请求超时
    #[error("模型 {model} 请求超时")]
    Timeout { model: String },
    /// 网络连接失败
    #[error("模型 {model} 网络请求失败: {message}")]
    Network { model: String, message: String },
    /// 响应成功但无法解析
    #[error("模型 {model} 返回无法解析的响应: {message}")]
    MalformedResponse { model: String, message: String },
}

impl UpstreamError {
    /// 是否为瞬时错误（值得在同一个模型上重试）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::ModelLoading { .. }
                | UpstreamError::RateLimited { .. }
                | UpstreamError::Timeout { .. }
                | UpstreamError::Network { .. }
        )
    }

    /// 是否计入熔断器：上游本身出了问题
    ///
    /// 下线的端点、请求被拒和输出无法解析只说明这个模型不可用，
    /// 上游仍在正常响应，不计入
    pub fn counts_against_breaker(&self) -> bool {
        !matches!(
            self,
            UpstreamError::EndpointGone { .. }
                | UpstreamError::ClientError { .. }
                | UpstreamError::MalformedResponse { .. }
        )
    }
}

/// 级联中某个候选模型被放弃的原因
#[derive(Debug, Clone, Error)]
pub enum CandidateFailure {
    /// 熔断器打开，未触达上游
    #[error("熔断器已打开 ({breaker})")]
    CircuitOpen { breaker: String },
    /// 上游调用失败（已耗尽重试或不可重试）
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    /// 响应未通过结构校验
    #[error("输出校验失败: {0}")]
    InvalidOutput(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 某任务的候选模型列表为空
    #[error("任务 {task} 没有配置任何候选模型")]
    NoCandidates { task: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建结果写入错误
    pub fn output_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Output {
            path: path.into(),
            source,
        }
    }
}

impl InputError {
    /// 创建文档读取错误
    pub fn unreadable(path: impl Into<String>, source: std::io::Error) -> Self {
        InputError::Unreadable {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
