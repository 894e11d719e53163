use crate::error::InputError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 已读取的纯文本文档
#[derive(Debug, Clone)]
pub struct LoadedText {
    /// 来源文件路径（用于日志和结果标识）
    pub source: String,
    /// 清洗后的文本
    pub text: String,
}

/// 读取单个文本文件并清洗空白
pub async fn load_text_document(path: &Path) -> Result<LoadedText, InputError> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|e| InputError::unreadable(path.display().to_string(), e))?;

    let text = normalize_whitespace(&raw);
    if text.is_empty() {
        return Err(InputError::EmptyText);
    }

    Ok(LoadedText {
        source: path.to_string_lossy().to_string(),
        text,
    })
}

/// 从文件夹中加载所有 `.txt` 文件（按文件名排序）
///
/// 无法读取或为空的文件会被跳过并记录警告
pub async fn load_text_documents(folder_path: &str) -> Result<Vec<LoadedText>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("txt") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_text_document(&path).await {
            Ok(doc) => {
                tracing::info!("成功加载 {} 个词", doc.text.split_whitespace().count());
                documents.push(doc);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(documents)
}

/// 清洗空白：统一换行、合并行内空白、最多保留一个空行
pub fn normalize_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;

    for line in raw.replace("\r\n", "\n").replace('\r', "\n").lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&collapsed);
        blank_run = 0;
    }

    out
}
