//! 长文档分块
//!
//! 按空白切词，每 `words_per_chunk` 个词一块。块是原文的切片，
//! 保留块内原有的空白和换行；块之间的空白不属于任何块。
//! 整篇不超过一块时，唯一的块就是原文本身（包括首尾空白）。

/// 原文中的一段连续词
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: usize,
    pub text: &'a str,
    pub word_count: usize,
}

/// 把文本切成若干块，只有最后一块可能不足 `words_per_chunk` 个词
pub fn chunk(text: &str, words_per_chunk: usize) -> Vec<Chunk<'_>> {
    let words_per_chunk = words_per_chunk.max(1);
    let spans = word_spans(text);
    if spans.is_empty() {
        return Vec::new();
    }
    if spans.len() <= words_per_chunk {
        return vec![Chunk {
            index: 0,
            text,
            word_count: spans.len(),
        }];
    }

    spans
        .chunks(words_per_chunk)
        .enumerate()
        .filter_map(|(index, group)| {
            let (start, _) = *group.first()?;
            let (_, end) = *group.last()?;
            Some(Chunk {
                index,
                text: &text[start..end],
                word_count: group.len(),
            })
        })
        .collect()
}

/// 长文档只摘要有代表性的块：第一块、中间块、最后一块（去重）
pub fn priority_chunks<'c, 'a>(chunks: &'c [Chunk<'a>]) -> Vec<&'c Chunk<'a>> {
    if chunks.is_empty() {
        return Vec::new();
    }
    let mut picks = vec![0, chunks.len() / 2, chunks.len() - 1];
    picks.dedup();
    picks.into_iter().map(|i| &chunks[i]).collect()
}

/// 每个词的字节区间 `[start, end)`
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }

    spans
}
