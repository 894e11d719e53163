//! 模型级联 - 业务能力层
//!
//! 按顺序尝试候选模型，第一个通过校验的结果胜出。
//! 每个候选的调用链：熔断器 → 条件重试 → [`ModelInvoker`]。
//! 熔断器只有一个实例，由所有候选和所有并发文档共享。
//! 只有瞬时错误会重试；5xx 不重试，但和瞬时错误一样计入熔断器。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clients::ModelInvoker;
use crate::config::Config;
use crate::error::{CandidateFailure, ConfigError, UpstreamError};
use crate::infrastructure::{retry_on_condition, BreakerError, CircuitBreaker};
use crate::models::{Mcq, ModelCandidate, Task, MCQ_COUNT};
use crate::services::mcq_parser::{build_mcq_prompt, parse_mcqs};

/// 级联结果
#[derive(Debug)]
pub enum CascadeOutcome<T> {
    /// 某个候选的输出通过了校验
    Accepted { model: String, value: T },
    /// 所有候选都失败，按尝试顺序记录原因
    Exhausted {
        failures: Vec<(String, CandidateFailure)>,
    },
}

impl<T> CascadeOutcome<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            CascadeOutcome::Accepted { value, .. } => Some(value),
            CascadeOutcome::Exhausted { .. } => None,
        }
    }
}

/// 级联参数
#[derive(Debug, Clone)]
pub struct CascadeSettings {
    /// 每个候选的总尝试次数上限
    pub max_retries: u32,
    /// 摘要输出的最短长度（字符）
    pub summary_min_chars: usize,
    /// 出题提示词中原文的最大长度（字符）
    pub mcq_prompt_max_chars: usize,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            summary_min_chars: 20,
            mcq_prompt_max_chars: 3000,
        }
    }
}

/// 模型级联
pub struct ModelCascade {
    invoker: Arc<dyn ModelInvoker>,
    breaker: Arc<CircuitBreaker>,
    summary_candidates: Vec<ModelCandidate>,
    mcq_candidates: Vec<ModelCandidate>,
    settings: CascadeSettings,
}

impl ModelCascade {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        breaker: Arc<CircuitBreaker>,
        summary_candidates: Vec<ModelCandidate>,
        mcq_candidates: Vec<ModelCandidate>,
        settings: CascadeSettings,
    ) -> Self {
        Self {
            invoker,
            breaker,
            summary_candidates,
            mcq_candidates,
            settings,
        }
    }

    /// 根据配置中的模型列表创建级联
    pub fn from_config(
        config: &Config,
        invoker: Arc<dyn ModelInvoker>,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, ConfigError> {
        let settings = CascadeSettings {
            max_retries: config.max_retries,
            summary_min_chars: config.cascade_summary_min_chars,
            mcq_prompt_max_chars: config.mcq_prompt_max_chars,
        };
        Ok(Self::new(
            invoker,
            breaker,
            config.candidates(Task::Summarize)?,
            config.candidates(Task::GenerateMcqs)?,
            settings,
        ))
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// 摘要级联：去掉首尾空白后足够长的输出即被接受
    pub async fn summarize(&self, text: &str) -> CascadeOutcome<String> {
        let min_chars = self.settings.summary_min_chars;
        self.run(Task::Summarize, &self.summary_candidates, text, |raw| {
            let summary = raw.trim();
            let len = summary.chars().count();
            if len < min_chars {
                return Err(format!("摘要过短: {} 字符，要求至少 {}", len, min_chars));
            }
            Ok(summary.to_string())
        })
        .await
    }

    /// 出题级联：输出中至少解析出一道合法题目即被接受，最多保留 5 道
    pub async fn generate_mcqs(&self, text: &str) -> CascadeOutcome<Vec<Mcq>> {
        let prompt = build_mcq_prompt(text, self.settings.mcq_prompt_max_chars);
        self.run(Task::GenerateMcqs, &self.mcq_candidates, &prompt, |raw| {
            let mut mcqs = parse_mcqs(raw).map_err(|e| e.to_string())?;
            mcqs.truncate(MCQ_COUNT);
            Ok(mcqs)
        })
        .await
    }

    async fn run<T, V>(
        &self,
        task: Task,
        candidates: &[ModelCandidate],
        input: &str,
        validate: V,
    ) -> CascadeOutcome<T>
    where
        V: Fn(&str) -> Result<T, String>,
    {
        let mut failures = Vec::with_capacity(candidates.len());

        for (i, candidate) in candidates.iter().enumerate() {
            debug!(
                "[{}] 尝试候选 {}/{}: {}",
                task,
                i + 1,
                candidates.len(),
                candidate.name
            );

            let failure = match self.attempt(candidate, input).await {
                Ok(raw) => match validate(&raw) {
                    Ok(value) => {
                        info!("✅ [{}] 模型 {} 输出被接受", task, candidate.name);
                        return CascadeOutcome::Accepted {
                            model: candidate.name.clone(),
                            value,
                        };
                    }
                    Err(reason) => CandidateFailure::InvalidOutput(reason),
                },
                Err(failure) => failure,
            };

            warn!("[{}] 放弃模型 {}: {}", task, candidate.name, failure);
            failures.push((candidate.name.clone(), failure));
        }

        warn!("⚠️ [{}] 全部 {} 个候选模型失败", task, candidates.len());
        CascadeOutcome::Exhausted { failures }
    }

    async fn attempt(&self, candidate: &ModelCandidate, input: &str) -> Result<String, CandidateFailure> {
        let invoker: &dyn ModelInvoker = self.invoker.as_ref();
        let max_retries = self.settings.max_retries;
        self.breaker
            .execute_with(
                move || {
                    retry_on_condition(
                        move || invoker.invoke(candidate, input),
                        UpstreamError::is_transient,
                        max_retries,
                    )
                },
                UpstreamError::counts_against_breaker,
            )
            .await
            .map_err(|e| match e {
                BreakerError::Open { name } => CandidateFailure::CircuitOpen { breaker: name },
                BreakerError::Inner(e) => CandidateFailure::Upstream(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{CircuitBreakerConfig, CircuitState};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    /// 按模型名预设响应序列；序列耗尽后返回 410
    #[derive(Default)]
    struct ScriptedInvoker {
        script: Mutex<HashMap<String, VecDeque<Result<String, UpstreamError>>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedInvoker {
        fn on(self, model: &str, responses: Vec<Result<String, UpstreamError>>) -> Self {
            self.script
                .lock()
                .unwrap()
                .insert(model.to_string(), responses.into());
            self
        }

        fn calls_to(&self, model: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|(m, _)| m == model).count()
        }

        fn inputs(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(_, i)| i.clone()).collect()
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedInvoker {
        async fn invoke(&self, candidate: &ModelCandidate, input: &str) -> Result<String, UpstreamError> {
            self.calls
                .lock()
                .unwrap()
                .push((candidate.name.clone(), input.to_string()));
            let next = self
                .script
                .lock()
                .unwrap()
                .get_mut(&candidate.name)
                .and_then(VecDeque::pop_front);
            next.unwrap_or_else(|| {
                Err(UpstreamError::EndpointGone {
                    model: candidate.name.clone(),
                })
            })
        }
    }

    fn loading(model: &str) -> Result<String, UpstreamError> {
        Err(UpstreamError::ModelLoading {
            model: model.to_string(),
            estimated_time: None,
        })
    }

    fn breaker(threshold: u32) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "inference-api",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout: Duration::from_secs(600),
            },
        ))
    }

    fn cascade(invoker: Arc<ScriptedInvoker>, breaker: Arc<CircuitBreaker>) -> ModelCascade {
        let summary = ["sum-a", "sum-b", "sum-c"]
            .iter()
            .map(|n| ModelCandidate::for_task(n, Task::Summarize))
            .collect();
        let mcq = ["mcq-a", "mcq-b"]
            .iter()
            .map(|n| ModelCandidate::for_task(n, Task::GenerateMcqs))
            .collect();
        ModelCascade::new(invoker, breaker, summary, mcq, CascadeSettings::default())
    }

    const GOOD_SUMMARY: &str = "A perfectly adequate summary of the text.";

    #[tokio::test]
    async fn test_transient_errors_are_retried_on_same_candidate() {
        let invoker = Arc::new(ScriptedInvoker::default().on(
            "sum-a",
            vec![loading("sum-a"), loading("sum-a"), Ok(GOOD_SUMMARY.into())],
        ));
        let cascade = cascade(invoker.clone(), breaker(5));

        match cascade.summarize("text").await {
            CascadeOutcome::Accepted { model, value } => {
                assert_eq!(model, "sum-a");
                assert_eq!(value, GOOD_SUMMARY);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(invoker.calls_to("sum-a"), 3);
        assert_eq!(invoker.calls_to("sum-b"), 0);
    }

    #[tokio::test]
    async fn test_terminal_error_and_short_output_move_to_next_candidate() {
        let invoker = Arc::new(
            ScriptedInvoker::default()
                .on("sum-b", vec![Ok("  too short  ".into())])
                .on("sum-c", vec![Ok(format!("  {}  ", GOOD_SUMMARY))]),
        );
        let cascade = cascade(invoker.clone(), breaker(5));

        let outcome = cascade.summarize("text").await;
        assert!(matches!(
            &outcome,
            CascadeOutcome::Accepted { model, .. } if model == "sum-c"
        ));
        assert_eq!(outcome.into_value().as_deref(), Some(GOOD_SUMMARY));
        // 410 不可重试，只调用一次
        assert_eq!(invoker.calls_to("sum-a"), 1);
        assert_eq!(invoker.calls_to("sum-b"), 1);
    }

    #[tokio::test]
    async fn test_all_candidates_fail() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let cascade = cascade(invoker, breaker(5));

        match cascade.summarize("text").await {
            CascadeOutcome::Exhausted { failures } => {
                let names: Vec<&str> = failures.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["sum-a", "sum-b", "sum-c"]);
                assert!(failures
                    .iter()
                    .all(|(_, f)| matches!(f, CandidateFailure::Upstream(UpstreamError::EndpointGone { .. }))));
            }
            other => panic!("unexpected: {:?}", other),
        }
        // 不可重试的错误不计入熔断
        assert_eq!(cascade.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_persistent_server_errors_open_breaker() {
        let server_error = |model: &str| -> Vec<Result<String, UpstreamError>> {
            (0..10)
                .map(|_| {
                    Err(UpstreamError::ServerError {
                        model: model.to_string(),
                        status: 500,
                        message: "internal error".into(),
                    })
                })
                .collect()
        };
        let invoker = Arc::new(
            ScriptedInvoker::default()
                .on("sum-a", server_error("sum-a"))
                .on("sum-b", server_error("sum-b"))
                .on("sum-c", server_error("sum-c")),
        );
        let cascade = cascade(invoker.clone(), breaker(2));

        for _ in 0..10 {
            assert!(cascade.summarize("text").await.into_value().is_none());
        }

        assert!(matches!(cascade.breaker().state(), CircuitState::Open { .. }));
        // 500 不重试：sum-a、sum-b 各一次后熔断，之后不再触达上游
        assert_eq!(invoker.calls_to("sum-a"), 1);
        assert_eq!(invoker.calls_to("sum-b"), 1);
        assert_eq!(invoker.calls_to("sum-c"), 0);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_remaining_candidates() {
        let invoker = Arc::new(ScriptedInvoker::default().on(
            "sum-a",
            vec![loading("sum-a"), loading("sum-a"), loading("sum-a")],
        ));
        let cascade = cascade(invoker.clone(), breaker(1));

        let outcome = cascade.summarize("text").await;
        let CascadeOutcome::Exhausted { failures } = outcome else {
            panic!("expected exhaustion");
        };
        assert!(matches!(failures[0].1, CandidateFailure::Upstream(_)));
        assert!(matches!(failures[1].1, CandidateFailure::CircuitOpen { .. }));
        assert!(matches!(failures[2].1, CandidateFailure::CircuitOpen { .. }));
        assert_eq!(invoker.calls_to("sum-a"), 3);
        assert_eq!(invoker.calls_to("sum-b"), 0);
        assert_eq!(invoker.calls_to("sum-c"), 0);
    }

    #[tokio::test]
    async fn test_generate_mcqs_parses_and_caps_output() {
        let item = |i: usize| {
            format!(
                r#"{{"question":"Q{i}?","options":["a{i}","b{i}","c{i}","d{i}"],"answer":"b{i}"}}"#
            )
        };
        let body = format!("[{}]", (0..7).map(item).collect::<Vec<_>>().join(","));
        let invoker = Arc::new(
            ScriptedInvoker::default()
                .on("mcq-a", vec![Ok("I cannot help with that.".into())])
                .on("mcq-b", vec![Ok(body)]),
        );
        let cascade = cascade(invoker.clone(), breaker(5));

        let text = "y".repeat(4000);
        let mcqs = cascade.generate_mcqs(&text).await.into_value().unwrap();
        assert_eq!(mcqs.len(), MCQ_COUNT);
        assert_eq!(mcqs[0].answer(), "b0");

        let inputs = invoker.inputs();
        assert!(inputs.iter().all(|i| i.contains(&"y".repeat(3000))));
        assert!(inputs.iter().all(|i| !i.contains(&"y".repeat(3001))));
    }
}
