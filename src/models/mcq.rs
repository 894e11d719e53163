use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 每道题的选项数量
pub const OPTION_COUNT: usize = 4;

/// 选择题
///
/// 不变式：题干非空；恰好 4 个非空且互不重复的选项；答案必须是其中之一。
/// 只能通过 [`Mcq::new`] 构建，反序列化也会经过同样的校验。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMcq")]
pub struct Mcq {
    question: String,
    options: [String; OPTION_COUNT],
    answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum McqError {
    #[error("题干为空")]
    EmptyQuestion,
    #[error("第 {0} 个选项为空")]
    EmptyOption(usize),
    #[error("选项重复: {0}")]
    DuplicateOption(String),
    #[error("答案不在选项中: {0}")]
    AnswerNotInOptions(String),
}

impl Mcq {
    pub fn new(
        question: impl Into<String>,
        options: [String; OPTION_COUNT],
        answer: impl Into<String>,
    ) -> Result<Self, McqError> {
        let question = question.into().trim().to_string();
        if question.is_empty() {
            return Err(McqError::EmptyQuestion);
        }

        let options = options.map(|o| o.trim().to_string());
        for (i, option) in options.iter().enumerate() {
            if option.is_empty() {
                return Err(McqError::EmptyOption(i + 1));
            }
            if options[..i]
                .iter()
                .any(|prev| prev.eq_ignore_ascii_case(option))
            {
                return Err(McqError::DuplicateOption(option.clone()));
            }
        }

        let answer = answer.into().trim().to_string();
        if !options.contains(&answer) {
            return Err(McqError::AnswerNotInOptions(answer));
        }

        Ok(Self {
            question,
            options,
            answer,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }
}

#[derive(Deserialize)]
struct RawMcq {
    question: String,
    options: [String; OPTION_COUNT],
    answer: String,
}

impl TryFrom<RawMcq> for Mcq {
    type Error = McqError;

    fn try_from(raw: RawMcq) -> Result<Self, Self::Error> {
        Mcq::new(raw.question, raw.options, raw.answer)
    }
}
