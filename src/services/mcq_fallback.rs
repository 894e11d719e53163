//! 兜底出题 - 业务能力层
//!
//! 所有模型都失败时，根据原文的句子和关键词生成 5 道结构合法的选择题。
//! 确定性：相同输入总是得到相同的题目和选项顺序。

use tracing::debug;

use crate::models::{Mcq, MCQ_COUNT, OPTION_COUNT};
use crate::services::summary_composer::truncate_chars;
use crate::services::text_analyzer::{tokenize, AnalyzerOptions, TextAnalysis, TextAnalyzer};

/// 用作正确选项的句子最短长度
const MIN_SOURCE_SENTENCE_CHARS: usize = 30;
const MAX_OPTION_CHARS: usize = 200;
const FALLBACK_TERM: &str = "the main concept";
const FALLBACK_TOPIC: &str = "the main topic";

const DISTRACTORS: [&str; OPTION_COUNT - 1] = [
    "This topic is not discussed in the document.",
    "The document presents conflicting information on this point.",
    "Further research is needed before any conclusion can be drawn.",
];

const QUESTION_TEMPLATES: [&str; MCQ_COUNT] = [
    "What does the document state about {}?",
    "According to the document, which statement about {} is accurate?",
    "How does the document describe {}?",
    "Why is {} significant according to the document?",
    "Which of the following correctly identifies a point made about {}?",
];

/// 兜底出题器
#[derive(Debug, Clone)]
pub struct McqFallbackGenerator {
    analyzer: TextAnalyzer,
}

impl Default for McqFallbackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl McqFallbackGenerator {
    pub fn new() -> Self {
        Self {
            analyzer: TextAnalyzer::new(AnalyzerOptions::mcq()),
        }
    }

    /// 生成恰好 5 道题
    ///
    /// 前几道取自原文中足够长的句子，句子不够时用围绕高频词的通用题补齐
    pub fn generate_intelligent_mcqs(&self, text: &str) -> [Mcq; MCQ_COUNT] {
        let analysis = self.analyzer.analyze(text);
        let sources: Vec<&String> = analysis
            .sentences
            .iter()
            .filter(|s| s.chars().count() >= MIN_SOURCE_SENTENCE_CHARS)
            .take(MCQ_COUNT)
            .collect();
        debug!(
            "兜底出题: {} 个可用句子，{} 个关键词",
            sources.len(),
            analysis.key_terms.len()
        );

        std::array::from_fn(|i| {
            sources
                .get(i)
                .and_then(|sentence| sentence_question(i, sentence, &analysis))
                .unwrap_or_else(|| topic_question(&analysis))
        })
    }
}

fn sentence_question(index: usize, sentence: &str, analysis: &TextAnalysis) -> Option<Mcq> {
    let term = key_term_in(sentence, analysis).unwrap_or(FALLBACK_TERM);
    let question = QUESTION_TEMPLATES[index % MCQ_COUNT].replace("{}", term);
    let correct = truncate_chars(sentence, MAX_OPTION_CHARS);
    let options = place_correct(&correct, index % OPTION_COUNT);

    Mcq::new(question, options, correct).ok()
}

/// 句子中出现的第一个关键词（按词频顺序）
fn key_term_in<'a>(sentence: &str, analysis: &'a TextAnalysis) -> Option<&'a str> {
    let words: Vec<String> = tokenize(sentence).collect();
    analysis
        .key_terms
        .iter()
        .map(|(term, _)| term.as_str())
        .find(|term| words.iter().any(|w| w == term))
}

/// 正确选项放在 `slot`，其余位置依次填入干扰项
fn place_correct(correct: &str, slot: usize) -> [String; OPTION_COUNT] {
    let mut distractors = DISTRACTORS.iter();
    std::array::from_fn(|i| {
        if i == slot {
            correct.to_string()
        } else {
            distractors.next().map(|d| d.to_string()).unwrap_or_default()
        }
    })
}

const TOPIC_QUESTION: &str = "Which of the following is a key concept discussed in the document?";

/// 通用补齐题：正确答案是文中的最高频词
fn topic_question(analysis: &TextAnalysis) -> Mcq {
    let topic = analysis.top_term().unwrap_or(FALLBACK_TOPIC);
    Mcq::new(TOPIC_QUESTION, topic_options(topic), topic)
        .or_else(|_| Mcq::new(TOPIC_QUESTION, topic_options(FALLBACK_TOPIC), FALLBACK_TOPIC))
        .unwrap_or_else(|e| unreachable!("固定兜底题不合法: {}", e))
}

fn topic_options(topic: &str) -> [String; OPTION_COUNT] {
    [
        topic.to_string(),
        "A subject the document never mentions".to_string(),
        "An unrelated historical event".to_string(),
        "A purely fictional concept".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Photosynthesis converts light energy into chemical energy inside plant cells. \
        Chlorophyll absorbs mostly blue and red light while reflecting green light. \
        The light reactions take place in the thylakoid membranes of the chloroplast. \
        The Calvin cycle fixes carbon dioxide into sugars using energy from the light reactions. \
        Environmental factors such as temperature and water availability limit photosynthesis. \
        Some plants use alternative pathways to reduce water loss in hot climates.";

    #[test]
    fn test_generates_five_valid_questions_from_sentences() {
        let mcqs = McqFallbackGenerator::new().generate_intelligent_mcqs(TEXT);
        assert_eq!(mcqs.len(), MCQ_COUNT);
        for (i, mcq) in mcqs.iter().enumerate() {
            assert!(mcq.options().contains(&mcq.answer().to_string()));
            // 正确选项轮换位置
            assert_eq!(mcq.options()[i % OPTION_COUNT], mcq.answer());
        }
        assert_eq!(
            mcqs[0].answer(),
            "Photosynthesis converts light energy into chemical energy inside plant cells."
        );
        assert!(mcqs[0].question().starts_with("What does the document state about"));
    }

    #[test]
    fn test_question_mentions_key_term() {
        let mcqs = McqFallbackGenerator::new().generate_intelligent_mcqs(TEXT);
        // "light" 是最高频词，且出现在第一句中
        assert_eq!(
            mcqs[0].question(),
            "What does the document state about light?"
        );
    }

    #[test]
    fn test_pads_with_topic_questions() {
        let text = "Rust ownership rules prevent data races at compile time. Short one.";
        let mcqs = McqFallbackGenerator::new().generate_intelligent_mcqs(text);
        assert_eq!(mcqs[0].answer(), "Rust ownership rules prevent data races at compile time.");
        for mcq in &mcqs[1..] {
            assert_eq!(mcq.question(), TOPIC_QUESTION);
            assert_eq!(mcq.answer(), "rust");
        }
    }

    #[test]
    fn test_text_without_sentences_still_yields_questions() {
        let mcqs = McqFallbackGenerator::new().generate_intelligent_mcqs("ok");
        assert!(mcqs.iter().all(|m| m.answer() == FALLBACK_TOPIC));
    }

    #[test]
    fn test_is_deterministic() {
        let generator = McqFallbackGenerator::new();
        assert_eq!(
            generator.generate_intelligent_mcqs(TEXT),
            generator.generate_intelligent_mcqs(TEXT)
        );
    }
}
