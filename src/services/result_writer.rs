//! 结果写入服务 - 业务能力层
//!
//! 只负责把单个文档的结果追加写入输出文件（JSON Lines），不关心流程

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::ProcessingResult;

/// 输出文件中的一行
#[derive(Debug, Serialize)]
struct ResultLine<'a> {
    source: &'a str,
    processed_at: String,
    #[serde(flatten)]
    result: &'a ProcessingResult,
}

/// 结果写入服务
///
/// 多个并发任务共享一个实例，写入按行串行化
pub struct ResultWriter {
    output_path: String,
    lock: Mutex<()>,
}

impl ResultWriter {
    pub fn new(output_path: impl Into<String>) -> Self {
        Self {
            output_path: output_path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &str {
        &self.output_path
    }

    /// 追加一条结果
    pub async fn write(&self, source: &str, result: &ProcessingResult) -> AppResult<()> {
        let line = ResultLine {
            source,
            processed_at: chrono::Local::now().to_rfc3339(),
            result,
        };
        let mut json = serde_json::to_string(&line)
            .map_err(|e| AppError::output_failed(&self.output_path, std::io::Error::other(e)))?;
        json.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .await
            .map_err(|e| AppError::output_failed(&self.output_path, e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| AppError::output_failed(&self.output_path, e))?;

        debug!("写入结果: {} -> {}", source, self.output_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Mcq;
    use serde_json::Value;

    fn result(summary: &str) -> ProcessingResult {
        let mcq = Mcq::new(
            "Q?",
            ["a".to_string(), "b".into(), "c".into(), "d".into()],
            "a",
        )
        .unwrap();
        ProcessingResult {
            summary: summary.to_string(),
            mcqs: std::array::from_fn(|_| mcq.clone()),
        }
    }

    #[tokio::test]
    async fn test_appends_one_json_line_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let writer = ResultWriter::new(path.to_string_lossy());

        writer.write("a.txt", &result("first")).await.unwrap();
        writer.write("b.txt", &result("second")).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["source"], "a.txt");
        assert_eq!(lines[1]["summary"], "second");
        assert_eq!(lines[0]["mcqs"].as_array().unwrap().len(), 5);
        assert_eq!(lines[0]["mcqs"][0]["answer"], "a");
    }

    #[tokio::test]
    async fn test_unwritable_path_is_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.jsonl");
        let writer = ResultWriter::new(path.to_string_lossy());

        let err = writer.write("a.txt", &result("x")).await.unwrap_err();
        assert!(matches!(err, AppError::Output { .. }));
    }
}
