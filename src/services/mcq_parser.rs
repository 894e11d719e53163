//! 从模型的自由文本输出中解析选择题
//!
//! 上游没有强制的响应格式，这一步本身就是尽力而为：
//! 取第一个 `[` 到最后一个 `]` 之间的子串按 JSON 数组解析，
//! 失败时再按括号配对截取第一个完整数组。
//! 解析失败是常态，调用方要准备好切换候选模型或走兜底。

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::{Mcq, MCQ_COUNT, OPTION_COUNT};

/// 第一个 `[` 到最后一个 `]`
static JSON_ARRAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("固定的正则表达式"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum McqParseError {
    #[error("输出中没有 JSON 数组")]
    NoJsonArray,
    #[error("JSON 数组解析失败: {0}")]
    InvalidJson(String),
    #[error("没有结构完整的题目")]
    NoValidQuestions,
}

/// 出题提示词，原文按字符截断到 `max_chars`
pub fn build_mcq_prompt(text: &str, max_chars: usize) -> String {
    let excerpt: String = text.chars().take(max_chars).collect();
    format!(
        "Generate exactly {count} multiple choice questions based on the text below. \
         Return ONLY a JSON array. Each element must have the fields \"question\", \
         \"options\" (an array of exactly {options} distinct strings) and \"answer\" \
         (the exact text of the correct option).\n\nText:\n{excerpt}\n\nJSON:",
        count = MCQ_COUNT,
        options = OPTION_COUNT,
        excerpt = excerpt.trim(),
    )
}

/// 解析模型输出，至少得到一道结构完整的题目才算成功
pub fn parse_mcqs(raw: &str) -> Result<Vec<Mcq>, McqParseError> {
    let items = extract_json_array(raw)?;

    let mcqs: Vec<Mcq> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let parsed = parse_item(item);
            if parsed.is_none() {
                debug!("丢弃第 {} 个结构不完整的题目", i + 1);
            }
            parsed
        })
        .collect();

    if mcqs.is_empty() {
        return Err(McqParseError::NoValidQuestions);
    }
    Ok(mcqs)
}

/// 找到输出中的第一个 JSON 数组
pub fn extract_json_array(raw: &str) -> Result<Vec<Value>, McqParseError> {
    let greedy = JSON_ARRAY_RE.find(raw).ok_or(McqParseError::NoJsonArray)?;

    match serde_json::from_str::<Vec<Value>>(greedy.as_str()) {
        Ok(items) => Ok(items),
        Err(greedy_err) => balanced_array(greedy.as_str())
            .and_then(|candidate| serde_json::from_str::<Vec<Value>>(candidate).ok())
            .ok_or_else(|| McqParseError::InvalidJson(greedy_err.to_string())),
    }
}

/// 从开头的 `[` 开始按括号配对截取（忽略字符串内的括号）
fn balanced_array(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_item(item: &Value) -> Option<Mcq> {
    let question = item.get("question").and_then(Value::as_str)?.trim();
    if question.is_empty() {
        return None;
    }

    let options = collect_options(item.get("options")?)?;
    let answer = item
        .get("answer")
        .or_else(|| item.get("correct_answer"))
        .and_then(|a| resolve_answer(a, &options))
        .unwrap_or_else(|| options[0].clone());

    Mcq::new(question, options, answer).ok()
}

/// 取前 4 个非空且互不重复的选项
fn collect_options(value: &Value) -> Option<[String; OPTION_COUNT]> {
    let raw: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        // {"A": "...", "B": "..."} 形式，按键排序
        Value::Object(map) => map.values().collect(),
        _ => return None,
    };

    let mut options: Vec<String> = Vec::with_capacity(OPTION_COUNT);
    for v in raw {
        let text = match v {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        if text.is_empty() || options.iter().any(|o| o.eq_ignore_ascii_case(&text)) {
            continue;
        }
        options.push(text);
        if options.len() == OPTION_COUNT {
            break;
        }
    }

    options.try_into().ok()
}

/// 答案可能是选项原文、字母（A-D）或下标（0-3）
fn resolve_answer(answer: &Value, options: &[String; OPTION_COUNT]) -> Option<String> {
    match answer {
        Value::Number(n) => {
            let idx = usize::try_from(n.as_u64()?).ok()?;
            options.get(idx).cloned()
        }
        Value::String(s) => {
            let s = s.trim();
            if let Some(option) = options.iter().find(|o| o.eq_ignore_ascii_case(s)) {
                return Some(option.clone());
            }
            letter_index(s).and_then(|idx| options.get(idx).cloned())
        }
        _ => None,
    }
}

/// "B"、"b)"、"(C)"、"D." 之类的字母答案
fn letter_index(s: &str) -> Option<usize> {
    let s = s.trim_start_matches('(');
    let mut chars = s.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let rest = chars.as_str();
    if !rest.is_empty() && !rest.starts_with([')', '.', ':', ' ']) {
        return None;
    }
    match letter {
        'A'..='D' => Some(letter as usize - 'A' as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_truncates_input() {
        let text = "x".repeat(5000);
        let prompt = build_mcq_prompt(&text, 3000);
        assert!(prompt.contains(&"x".repeat(3000)));
        assert!(!prompt.contains(&"x".repeat(3001)));
        assert!(prompt.contains("exactly 5 multiple choice questions"));
    }

    #[test]
    fn test_parses_array_embedded_in_prose() {
        let raw = r#"Sure! Here are your questions:
[
  {"question": "What is Rust?", "options": ["A language", "A metal oxide", "A game", "A city"], "answer": "A language"},
  {"question": "Who maintains it?", "options": ["Project teams", "Nobody", "One person", "A bank"], "answer": "B"}
]
Hope this helps."#;
        let mcqs = parse_mcqs(raw).unwrap();
        assert_eq!(mcqs.len(), 2);
        assert_eq!(mcqs[0].answer(), "A language");
        assert_eq!(mcqs[1].answer(), "Nobody");
    }

    #[test]
    fn test_extracts_array_repeatedly_across_lines() {
        for _ in 0..3 {
            let items = extract_json_array("Output:\n[\n  1,\n  2\n]\n").unwrap();
            assert_eq!(items, vec![Value::from(1), Value::from(2)]);
        }
        assert_eq!(extract_json_array("no array here"), Err(McqParseError::NoJsonArray));
    }

    #[test]
    fn test_falls_back_to_balanced_array() {
        let raw = r#"[{"question":"Q1?","options":["a","b","c","d"],"answer":"c"}] and also [see note]"#;
        let mcqs = parse_mcqs(raw).unwrap();
        assert_eq!(mcqs.len(), 1);
        assert_eq!(mcqs[0].answer(), "c");
    }

    #[test]
    fn test_answer_defaults_to_first_option() {
        let raw = r#"[{"question":"Q?","options":["w","x","y","z"],"answer":"not an option at all"},
                      {"question":"R?","options":["w","x","y","z"]}]"#;
        let mcqs = parse_mcqs(raw).unwrap();
        assert_eq!(mcqs[0].answer(), "w");
        assert_eq!(mcqs[1].answer(), "w");
    }

    #[test]
    fn test_answer_forms() {
        let opts = ["w".to_string(), "x".into(), "y".into(), "z".into()];
        assert_eq!(resolve_answer(&Value::from(2), &opts), Some("y".into()));
        assert_eq!(resolve_answer(&Value::from("(d)"), &opts), Some("z".into()));
        assert_eq!(resolve_answer(&Value::from("B."), &opts), Some("x".into()));
        assert_eq!(resolve_answer(&Value::from("X"), &opts), Some("x".into()));
        assert_eq!(resolve_answer(&Value::from("Because"), &opts), None);
        assert_eq!(resolve_answer(&Value::from(9), &opts), None);
    }

    #[test]
    fn test_options_object_and_extra_options() {
        let raw = r#"[{"question":"Q?","options":{"A":"one","B":"two","C":"three","D":"four"},"answer":"C"},
                      {"question":"R?","options":["1","2","2","3","4","5"],"answer":"4"}]"#;
        let mcqs = parse_mcqs(raw).unwrap();
        assert_eq!(mcqs[0].options()[2], "three");
        assert_eq!(mcqs[0].answer(), "three");
        assert_eq!(mcqs[1].options(), &["1", "2", "3", "4"].map(String::from));
        assert_eq!(mcqs[1].answer(), "4");
    }

    #[test]
    fn test_rejects_malformed_output() {
        assert_eq!(parse_mcqs("no json here"), Err(McqParseError::NoJsonArray));
        assert!(matches!(
            parse_mcqs("[{broken"),
            Err(McqParseError::NoJsonArray)
        ));
        assert_eq!(
            parse_mcqs("[1, 2, 3] oops ]"),
            Err(McqParseError::NoValidQuestions)
        );
        assert_eq!(
            parse_mcqs(r#"[{"question":"Q?","options":["a","b","a","c"]}]"#),
            Err(McqParseError::NoValidQuestions)
        );
        assert_eq!(
            parse_mcqs(r#"[{"question":"  ","options":["a","b","c","d"]}]"#),
            Err(McqParseError::NoValidQuestions)
        );
    }
}
