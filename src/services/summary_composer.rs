//! 摘要拼装 - 业务能力层
//!
//! 不调用任何模型，只根据 [`TextAnalyzer`] 的结果按固定顺序拼出结构化摘要：
//! 引言 → Main Points → Approach → Key Findings → Conclusion

use phf::phf_set;
use std::collections::HashSet;

use crate::services::text_analyzer::{tokenize, AnalyzerOptions, TextAnalysis, TextAnalyzer};

/// 问题/目标类指示词
static PROBLEM_WORDS: phf::Set<&'static str> = phf_set! {
    "problem", "problems", "challenge", "challenges", "issue", "issues", "goal", "goals",
    "aim", "aims", "objective", "objectives", "purpose", "address", "addresses",
    "propose", "proposes", "present", "presents", "introduce", "introduces", "focus",
    "focuses", "investigate", "investigates", "explore", "explores",
};

/// 方法类指示词
static METHOD_WORDS: phf::Set<&'static str> = phf_set! {
    "method", "methods", "methodology", "approach", "approaches", "technique",
    "techniques", "algorithm", "algorithms", "framework", "model", "models", "implement",
    "implemented", "design", "designed", "develop", "developed", "procedure", "analysis",
};

/// 结果类指示词
static RESULT_WORDS: phf::Set<&'static str> = phf_set! {
    "result", "results", "finding", "findings", "show", "shows", "showed", "demonstrate",
    "demonstrates", "demonstrated", "achieve", "achieves", "achieved", "improve",
    "improves", "improved", "outperform", "outperforms", "reveal", "reveals", "indicate",
    "indicates", "found", "evidence", "increase", "reduce", "reduced",
};

const INTRO_MAX_CHARS: usize = 250;
const MAIN_POINT_MIN_CHARS: usize = 40;
const MAIN_POINT_MAX_CHARS: usize = 250;
const MAX_MAIN_POINTS: usize = 6;
const CONCLUSION_MAX_CHARS: usize = 200;

/// 摘要拼装器
#[derive(Debug, Clone)]
pub struct SummaryComposer {
    analyzer: TextAnalyzer,
}

impl Default for SummaryComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryComposer {
    pub fn new() -> Self {
        Self {
            analyzer: TextAnalyzer::new(AnalyzerOptions::summary()),
        }
    }

    /// 对非空文本生成摘要，结果至少包含引言部分
    pub fn compose(&self, text: &str) -> String {
        let analysis = self.analyzer.analyze(text);
        let mut sections = Vec::new();

        let intro = introduction(&analysis, text);
        sections.push(intro.clone());

        let points = main_points(&analysis, &intro);
        if !points.is_empty() {
            let bullets: Vec<String> = points.iter().map(|p| format!("• {}", p)).collect();
            sections.push(format!("Main Points:\n{}", bullets.join("\n")));
        }

        if let Some(approach) = first_matching(&analysis.important_sentences, &METHOD_WORDS) {
            sections.push(format!("Approach: {}", approach));
        }

        if let Some(findings) = first_matching(&analysis.important_sentences, &RESULT_WORDS) {
            sections.push(format!("Key Findings: {}", findings));
        }

        if let Some(conclusion) = conclusion(&analysis, &intro) {
            sections.push(format!("Conclusion: {}", conclusion));
        }

        clean_up(&sections.join("\n\n"))
    }
}

fn introduction(analysis: &TextAnalysis, text: &str) -> String {
    if let Some(sentence) = first_matching(&analysis.introduction, &PROBLEM_WORDS) {
        return truncate_chars(sentence, INTRO_MAX_CHARS);
    }
    if !analysis.introduction.is_empty() {
        let lead = analysis
            .introduction
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        return truncate_chars(&lead, INTRO_MAX_CHARS);
    }
    // 没有合格句子时直接取原文开头
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&flat, INTRO_MAX_CHARS)
}

fn main_points(analysis: &TextAnalysis, intro: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(dedup_key(intro));

    analysis
        .important_sentences
        .iter()
        .filter(|s| {
            let len = s.chars().count();
            (MAIN_POINT_MIN_CHARS..=MAIN_POINT_MAX_CHARS).contains(&len)
        })
        .filter(|s| seen.insert(dedup_key(s)))
        .take(MAX_MAIN_POINTS)
        .cloned()
        .collect()
}

fn conclusion(analysis: &TextAnalysis, intro: &str) -> Option<String> {
    let source = if analysis.paragraphs.len() > 1 {
        analysis.paragraphs.last()?
    } else {
        analysis.sentences.last()?
    };
    let conclusion = truncate_chars(source, CONCLUSION_MAX_CHARS);
    (dedup_key(&conclusion) != dedup_key(intro)).then_some(conclusion)
}

fn first_matching<'a>(sentences: &'a [String], words: &phf::Set<&'static str>) -> Option<&'a String> {
    sentences
        .iter()
        .find(|s| tokenize(s).any(|w| words.contains(w.as_str())))
}

fn dedup_key(sentence: &str) -> String {
    tokenize(sentence).collect::<Vec<_>>().join(" ")
}

/// 按字符截断，超出时去掉尾部标点并补 `...`
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    let cut = cut.trim_end_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation());
    format!("{}...", cut)
}

/// 清理空白和重复标点
///
/// 行内空白合并为一个空格，最多保留一个空行；`..` 合并为 `.`，`...` 保留；
/// 连续的 `!`、`?`、`,`、`;` 合并为一个
pub fn clean_up(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = false;
    for line in text.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !previous_blank && !lines.is_empty() {
                lines.push(String::new());
            }
            previous_blank = true;
        } else {
            lines.push(collapse_punctuation(&collapsed));
            previous_blank = false;
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn collapse_punctuation(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if matches!(c, '.' | '!' | '?' | ',' | ';') {
            let mut j = i;
            while j < chars.len() && chars[j] == c {
                j += 1;
            }
            let run = j - i;
            if c == '.' && run >= 3 {
                out.push_str("...");
            } else {
                out.push(c);
            }
            i = j;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER: &str = "This paper addresses the problem of slow convergence in deep neural network training. \
        Deep networks often require weeks of computation on expensive hardware.\n\n\
        We propose an adaptive learning rate method that scales updates per layer. \
        The method uses gradient statistics gathered during the warmup phase of training. \
        Experiments were run on three public image classification datasets.\n\n\
        Results show the adaptive method improves convergence speed by forty percent. \
        Accuracy on held out data also improved slightly for every network we tested.\n\n\
        Overall, adaptive per-layer learning rates make deep network training cheaper.";

    #[test]
    fn test_compose_has_all_sections_in_order() {
        let summary = SummaryComposer::new().compose(PAPER);

        assert!(summary.starts_with("This paper addresses the problem"));
        let main = summary.find("Main Points:").unwrap();
        let approach = summary.find("Approach:").unwrap();
        let findings = summary.find("Key Findings:").unwrap();
        let conclusion = summary.find("Conclusion: Overall").unwrap();
        assert!(main < approach && approach < findings && findings < conclusion);
        assert!(summary.contains("• "));
    }

    #[test]
    fn test_compose_short_text_still_has_intro() {
        let summary = SummaryComposer::new().compose("tiny note");
        assert_eq!(summary, "tiny note");
    }

    #[test]
    fn test_compose_is_deterministic() {
        let composer = SummaryComposer::new();
        assert_eq!(composer.compose(PAPER), composer.compose(PAPER));
    }

    #[test]
    fn test_main_points_are_bounded_and_unique() {
        let sentence = "Distributed storage engines replicate every write across several nodes.";
        let text = std::iter::repeat(sentence)
            .take(8)
            .collect::<Vec<_>>()
            .join(" ");
        let summary = SummaryComposer::new().compose(&text);
        // 重复句子只出现在引言中，不进入要点
        assert!(!summary.contains("Main Points:"));
        assert!(summary.starts_with(sentence));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        let long = "word ".repeat(100);
        let cut = truncate_chars(&long, 50);
        assert!(cut.chars().count() <= 50);
        assert!(cut.ends_with("..."));
        assert!(!cut.ends_with(" ..."));
    }

    #[test]
    fn test_clean_up() {
        assert_eq!(
            clean_up("A  sentence..  Wow!!  Really??\n\n\n\nNext,,  line...  "),
            "A sentence. Wow! Really?\n\nNext, line..."
        );
    }
}
