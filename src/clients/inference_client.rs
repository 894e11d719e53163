/// 推理服务客户端
///
/// 对一个候选模型发起一次请求，并把响应/错误归一化为
/// 文本或 [`UpstreamError`]
use crate::config::Config;
use crate::error::UpstreamError;
use crate::models::ModelCandidate;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// 单次模型调用能力
///
/// 流水线只依赖这个 trait，测试中可替换为脚本化的实现
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, candidate: &ModelCandidate, input: &str) -> Result<String, UpstreamError>;
}

/// 托管推理 API 客户端（`POST {base}/models/{model}`）
pub struct HfInferenceClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HfInferenceClient {
    /// 根据配置创建客户端
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Self::with_base_url(
            &config.inference_api_base_url,
            &config.inference_api_token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// 使用指定地址和超时创建客户端
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}", self.base_url, model)
    }
}

#[async_trait]
impl ModelInvoker for HfInferenceClient {
    async fn invoke(&self, candidate: &ModelCandidate, input: &str) -> Result<String, UpstreamError> {
        let model = candidate.name.as_str();
        debug!("调用推理 API，模型: {}，输入长度: {} 字符", model, input.len());

        let body = json!({
            "inputs": candidate.render_input(input),
            "parameters": candidate.params,
            "options": { "wait_for_model": false, "use_cache": false },
        });

        let mut request = self.http.post(self.endpoint(model)).json(&body);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(model, &e))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport_error(model, &e))?;

        if (200..300).contains(&status) {
            let content = extract_generated_text(model, &text)?;
            debug!("模型 {} 调用成功，输出 {} 字符", model, content.len());
            return Ok(content);
        }

        let err = classify_status(model, status, &text, retry_after);
        warn!("模型 {} 调用失败: {}", model, err);
        Err(err)
    }
}

/// 按 HTTP 状态码和响应体对错误分类
pub fn classify_status(
    model: &str,
    status: u16,
    body: &str,
    retry_after: Option<u64>,
) -> UpstreamError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| body.chars().take(200).collect());
    let model = model.to_string();

    match status {
        503 => UpstreamError::ModelLoading {
            model,
            estimated_time: parsed
                .as_ref()
                .and_then(|v| v.get("estimated_time"))
                .and_then(Value::as_f64),
        },
        429 => UpstreamError::RateLimited { model, retry_after },
        410 => UpstreamError::EndpointGone { model },
        400..=499 => UpstreamError::ClientError {
            model,
            status,
            message,
        },
        _ if message.to_lowercase().contains("loading") => UpstreamError::ModelLoading {
            model,
            estimated_time: None,
        },
        _ => UpstreamError::ServerError {
            model,
            status,
            message,
        },
    }
}

fn classify_transport_error(model: &str, err: &reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout {
            model: model.to_string(),
        }
    } else {
        UpstreamError::Network {
            model: model.to_string(),
            message: err.to_string(),
        }
    }
}

/// 从成功响应中取出生成的文本
///
/// 支持 `[{"summary_text": ..}]`、`[{"generated_text": ..}]`、对象形式和纯字符串
pub fn extract_generated_text(model: &str, body: &str) -> Result<String, UpstreamError> {
    let malformed = |message: &str| UpstreamError::MalformedResponse {
        model: model.to_string(),
        message: message.to_string(),
    };

    let value: Value = serde_json::from_str(body).map_err(|e| malformed(&e.to_string()))?;
    let item = match &value {
        Value::Array(items) => items.first().ok_or_else(|| malformed("空数组"))?,
        other => other,
    };

    if let Some(message) = item.get("error").and_then(|_| error_message(item)) {
        if message.to_lowercase().contains("loading") {
            return Err(UpstreamError::ModelLoading {
                model: model.to_string(),
                estimated_time: item.get("estimated_time").and_then(Value::as_f64),
            });
        }
        return Err(malformed(&message));
    }

    let text = match item {
        Value::String(s) => Some(s.as_str()),
        Value::Object(_) => ["summary_text", "generated_text", "translation_text"]
            .iter()
            .find_map(|key| item.get(*key).and_then(Value::as_str)),
        _ => None,
    }
    .map(str::trim)
    .unwrap_or_default();

    if text.is_empty() {
        return Err(malformed("响应中没有生成文本"));
    }
    Ok(text.to_string())
}

fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        other => Some(other.to_string()),
    }
}
