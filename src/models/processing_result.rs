use serde::Serialize;

use crate::models::mcq::Mcq;

/// 每个文档产出的选择题数量
pub const MCQ_COUNT: usize = 5;

/// 单个文档的最终产物
///
/// 每次上传只创建一次，之后不再修改；交给下游存储方
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    pub summary: String,
    pub mcqs: [Mcq; MCQ_COUNT],
}
