use crate::error::InputError;

/// 待处理文档
///
/// 在流水线入口创建，之后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    word_count: usize,
}

impl Document {
    /// 创建文档，拒绝空文本和低于 `min_chars` 的文本
    pub fn new(text: impl Into<String>, min_chars: usize) -> Result<Self, InputError> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(InputError::EmptyText);
        }
        let length = trimmed.chars().count();
        if length < min_chars {
            return Err(InputError::TooShort {
                length,
                min: min_chars,
            });
        }
        let text = trimmed.to_string();
        let word_count = text.split_whitespace().count();
        Ok(Self { text, word_count })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }
}
