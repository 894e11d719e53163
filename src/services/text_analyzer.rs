//! 文本分析 - 业务能力层
//!
//! 基于词频的关键词提取和句子筛选，是所有确定性兜底算法的基础。
//! 纯函数，无副作用：相同输入总是得到相同输出。

use phf::phf_set;
use std::collections::{HashMap, HashSet};

/// 统计词频时忽略的常见虚词
static STOP_WORDS: phf::Set<&'static str> = phf_set! {
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her",
    "his", "was", "one", "our", "out", "has", "have", "this", "that", "with", "from",
    "they", "will", "would", "there", "their", "what", "about", "which", "when", "were",
    "been", "into", "than", "then", "them", "these", "those", "also", "such", "some",
    "more", "most", "other", "only", "over", "very", "just", "each", "many", "much",
    "should", "could", "while", "where", "after", "before", "because", "between",
    "through", "during", "being", "does", "its", "may", "might", "must", "shall",
    "upon", "your", "who", "whom", "how", "why", "both", "same", "here", "within",
    "without", "however", "therefore", "thus", "using", "used", "based", "well",
};

/// 分析参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerOptions {
    /// 短于该长度（字符）的句子被丢弃
    pub min_sentence_chars: usize,
    /// 短于该长度的词不计入词频
    pub min_word_len: usize,
    /// 保留的关键词数量
    pub key_term_count: usize,
    /// 重要句子的上限
    pub important_sentence_cap: usize,
    /// 引言部分占全部句子的百分比
    pub intro_percent: usize,
}

impl AnalyzerOptions {
    /// 摘要使用的参数
    pub fn summary() -> Self {
        Self {
            min_sentence_chars: 20,
            min_word_len: 5,
            key_term_count: 15,
            important_sentence_cap: 10,
            intro_percent: 20,
        }
    }

    /// 兜底出题使用的参数（词长下限更低）
    pub fn mcq() -> Self {
        Self {
            min_word_len: 4,
            key_term_count: 10,
            ..Self::summary()
        }
    }
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self::summary()
    }
}

/// 分析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextAnalysis {
    pub sentences: Vec<String>,
    pub paragraphs: Vec<String>,
    /// 按词频降序（同频按首次出现顺序）
    pub key_terms: Vec<(String, usize)>,
    pub important_sentences: Vec<String>,
    pub introduction: Vec<String>,
}

impl TextAnalysis {
    pub fn top_term(&self) -> Option<&str> {
        self.key_terms.first().map(|(w, _)| w.as_str())
    }
}

/// 文本分析器
#[derive(Debug, Clone, Default)]
pub struct TextAnalyzer {
    options: AnalyzerOptions,
}

impl TextAnalyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn analyze(&self, text: &str) -> TextAnalysis {
        let opts = &self.options;
        let sentences = split_sentences(text, opts.min_sentence_chars);
        let paragraphs = split_paragraphs(text);
        let key_terms: Vec<(String, usize)> = word_frequencies(text, opts.min_word_len)
            .into_iter()
            .take(opts.key_term_count)
            .collect();

        let term_set: HashSet<&str> = key_terms.iter().map(|(w, _)| w.as_str()).collect();
        let important_sentences = sentences
            .iter()
            .filter(|s| tokenize(s).any(|w| term_set.contains(w.as_str())))
            .take(opts.important_sentence_cap)
            .cloned()
            .collect();

        let intro_len = if sentences.is_empty() {
            0
        } else {
            (sentences.len() * opts.intro_percent / 100).max(1)
        };
        let introduction = sentences[..intro_len].to_vec();

        TextAnalysis {
            sentences,
            paragraphs,
            key_terms,
            important_sentences,
            introduction,
        }
    }
}

/// 按句末标点（. ! ?）切分句子
///
/// 标点后必须跟空白或文本结尾，因此 `3.14`、`e.g.x` 不会被切开。
/// 末尾没有标点的残句也会保留。
pub fn split_sentences(text: &str, min_chars: usize) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if !is_terminal(chars[i].1) {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < chars.len() && (is_terminal(chars[j].1) || is_closing(chars[j].1)) {
            j += 1;
        }
        if j == chars.len() || chars[j].1.is_whitespace() {
            let end = chars.get(j).map(|(idx, _)| *idx).unwrap_or(text.len());
            push_sentence(&mut sentences, &text[start..end], min_chars);
            start = end;
        }
        i = j;
    }
    push_sentence(&mut sentences, &text[start..], min_chars);

    sentences
}

fn push_sentence(out: &mut Vec<String>, raw: &str, min_chars: usize) {
    let sentence = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !sentence.is_empty() && sentence.chars().count() >= min_chars {
        out.push(sentence);
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '”' | '’')
}

/// 按空行切分段落
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

/// 小写的词序列（按非字母数字字符切分）
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// 词频表：忽略停用词、纯数字和过短的词，按频率降序
pub fn word_frequencies(text: &str, min_word_len: usize) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for word in tokenize(text) {
        if word.chars().count() < min_word_len
            || is_stop_word(&word)
            || word.chars().all(|c| c.is_numeric())
        {
            continue;
        }
        match index.get(&word) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(word.clone(), order.len());
                order.push((word, 1));
            }
        }
    }

    // 稳定排序：同频保持首次出现顺序
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}
