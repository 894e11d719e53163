use std::fmt;

use serde::Serialize;

/// 级联任务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Summarize,
    GenerateMcqs,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Summarize => write!(f, "summarize"),
            Task::GenerateMcqs => write!(f, "generate-mcqs"),
        }
    }
}

/// 输入如何包装成请求的 `inputs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// 原文直接发送（摘要专用模型）
    Raw,
    /// 在原文前加摘要指令（通用生成模型）
    SummarizeInstruction,
    /// 指令式模型的 `[INST]` 包装
    InstructTags,
}

impl PromptTemplate {
    pub fn render(self, input: &str) -> String {
        match self {
            PromptTemplate::Raw => input.to_string(),
            PromptTemplate::SummarizeInstruction => format!("summarize: {}", input),
            PromptTemplate::InstructTags => format!("<s>[INST] {} [/INST]", input),
        }
    }
}

/// 随请求发送的生成参数
///
/// 为 `None` 的字段不会被序列化
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    pub do_sample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_full_text: Option<bool>,
}

impl InvocationParams {
    fn summary(max_length: u32, min_length: u32) -> Self {
        Self {
            max_length: Some(max_length),
            min_length: Some(min_length),
            max_new_tokens: None,
            temperature: None,
            top_p: None,
            do_sample: false,
            return_full_text: None,
        }
    }

    fn generation(max_new_tokens: u32, temperature: f32, top_p: f32) -> Self {
        Self {
            max_length: None,
            min_length: None,
            max_new_tokens: Some(max_new_tokens),
            temperature: Some(temperature),
            top_p: Some(top_p),
            do_sample: true,
            return_full_text: Some(false),
        }
    }
}

/// 候选模型：名称 + 该任务下的调用参数
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCandidate {
    pub name: String,
    pub task: Task,
    pub params: InvocationParams,
    pub prompt: PromptTemplate,
}

impl ModelCandidate {
    /// 按名称构建候选
    ///
    /// 内置列表中已知的模型沿用其参数，未知模型使用任务默认参数
    pub fn for_task(name: &str, task: Task) -> Self {
        builtin(task)
            .into_iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| Self {
                name: name.to_string(),
                task,
                params: match task {
                    Task::Summarize => InvocationParams::summary(250, 80),
                    Task::GenerateMcqs => InvocationParams::generation(1500, 0.7, 0.9),
                },
                prompt: match task {
                    Task::Summarize => PromptTemplate::Raw,
                    Task::GenerateMcqs => PromptTemplate::InstructTags,
                },
            })
    }

    /// 内置的默认模型名称（有序）
    pub fn default_names(task: Task) -> Vec<String> {
        builtin(task).into_iter().map(|c| c.name).collect()
    }

    pub fn render_input(&self, input: &str) -> String {
        self.prompt.render(input)
    }
}

fn candidate(name: &str, task: Task, params: InvocationParams, prompt: PromptTemplate) -> ModelCandidate {
    ModelCandidate {
        name: name.to_string(),
        task,
        params,
        prompt,
    }
}

fn builtin(task: Task) -> Vec<ModelCandidate> {
    match task {
        Task::Summarize => vec![
            candidate(
                "facebook/bart-large-cnn",
                task,
                InvocationParams::summary(300, 100),
                PromptTemplate::Raw,
            ),
            candidate(
                "sshleifer/distilbart-cnn-12-6",
                task,
                InvocationParams::summary(250, 80),
                PromptTemplate::Raw,
            ),
            candidate(
                "google/pegasus-xsum",
                task,
                InvocationParams::summary(200, 60),
                PromptTemplate::Raw,
            ),
            candidate(
                "google/flan-t5-large",
                task,
                InvocationParams::summary(250, 60),
                PromptTemplate::SummarizeInstruction,
            ),
        ],
        Task::GenerateMcqs => vec![
            candidate(
                "mistralai/Mistral-7B-Instruct-v0.2",
                task,
                InvocationParams::generation(1500, 0.7, 0.9),
                PromptTemplate::InstructTags,
            ),
            candidate(
                "HuggingFaceH4/zephyr-7b-beta",
                task,
                InvocationParams::generation(1500, 0.7, 0.95),
                PromptTemplate::Raw,
            ),
            candidate(
                "google/flan-t5-large",
                task,
                InvocationParams::generation(1024, 0.5, 0.9),
                PromptTemplate::Raw,
            ),
        ],
    }
}
