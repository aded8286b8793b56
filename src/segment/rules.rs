//! Marker rules for the segmentation scan.
//!
//! A paragraph is first cut at sub-numbering boundaries, then every segment is classified:
//! an optional heading (`<n>.` or `(<n>)`) plus an optional answer-section entry found by
//! walking [`ANSWER_RULES`] in priority order.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::textutil::parse_number;

const DIGITS: &str = "[0-9０-９]+";
const CN_NUMERALS: &str = "[一二三四五六七八九十]+";

static QUESTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\s*({DIGITS})\s*[.．]")).expect("question regex")
});
static SUB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\s*[（(]\s*({DIGITS}|{CN_NUMERALS})\s*[）)]")).expect("sub regex")
});
static SUB_ANYWHERE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"[（(]\s*(?:{DIGITS}|{CN_NUMERALS})\s*[）)]")).expect("sub anywhere regex")
});
static OPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[A-DＡ-Ｄ]\s*[.．]").expect("option regex"));
static NEXT_OPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([B-DＢ-Ｄ]\s*[.．])").expect("next option regex"));

static SUB_TAGGED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*[（(]\s*({DIGITS})\s*[）)].*?【(?:答案|解析|解答)】"
    ))
    .expect("sub tagged regex")
});
static SUB_LABELED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*[（(]\s*({DIGITS})\s*[）)].*?(?:答案|解析)(?:[^式]|$)"
    ))
    .expect("sub labeled regex")
});
static QUESTION_TAGGED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^\s*{DIGITS}\s*[.．].*?【(?:答案|解析|解答)】"))
        .expect("question tagged regex")
});
static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*(?:【(?:答案|解析|解答|分析|详解|点睛)】|【小问\s*{DIGITS}\s*详解】|(?:答案|解析|解答)\s*[:：])"
    ))
    .expect("label regex")
});
static BARE_ANSWER_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:答案|解析)(?:[^式]|$)").expect("bare answer word regex"));
static LEAF_ANSWER_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:【答案】|答案\s*[:：])\s*").expect("leaf answer label regex"));

const SPLIT_PUNCT: &[char] = &[
    '。', '．', '.', '；', ';', '：', ':', '，', ',', '！', '!', '？', '?', '、',
];

/// Sub-number from ASCII/full-width digits or a Chinese numeral up to 十九.
pub fn parse_sub_number(s: &str) -> Option<u32> {
    parse_number(s).or_else(|| parse_cn_numeral(s.trim()))
}

fn cn_digit(c: char) -> Option<u32> {
    "一二三四五六七八九"
        .chars()
        .position(|d| d == c)
        .map(|i| i as u32 + 1)
}

fn parse_cn_numeral(s: &str) -> Option<u32> {
    let chars: Vec<char> = s.chars().collect();
    match chars.as_slice() {
        [c] if *c == '十' => Some(10),
        [c] => cn_digit(*c),
        ['十', c] => Some(10 + cn_digit(*c)?),
        _ => None,
    }
}

/// Byte offsets where a paragraph's text is cut so each sub-numbering marker opens its own
/// segment. A marker counts only at a boundary: directly preceded by whitespace or
/// punctuation. Inline notation like `f(2)` never cuts.
pub fn split_points(text: &str) -> Vec<usize> {
    let mut cuts = Vec::new();
    for m in SUB_ANYWHERE_RE.find_iter(text) {
        let start = m.start();
        let before = &text[..start];
        if before.trim().is_empty() {
            continue;
        }
        let Some(prev) = before.chars().next_back() else {
            continue;
        };
        if prev.is_whitespace() || SPLIT_PUNCT.contains(&prev) {
            cuts.push(start);
        }
    }
    cuts
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Heading {
    /// `<n>.`; `marker_end` is the byte offset after the marker.
    Question { number: u32, marker_end: usize },
    /// `(<n>)`
    Sub { number: u32, marker_end: usize },
}

pub fn classify_heading(text: &str) -> Option<Heading> {
    if let Some(c) = QUESTION_RE.captures(text) {
        let m = c.get(0)?;
        // `2.5 …` is a decimal, not a question number.
        let next = text[m.end()..].chars().next();
        if !next.is_some_and(|ch| ch.is_ascii_digit() || ('０'..='９').contains(&ch)) {
            if let Some(number) = parse_number(&c[1]) {
                return Some(Heading::Question {
                    number,
                    marker_end: m.end(),
                });
            }
        }
    }
    let c = SUB_RE.captures(text)?;
    let number = parse_sub_number(&c[1])?;
    Some(Heading::Sub {
        number,
        marker_end: c.get(0)?.end(),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerEntry {
    /// The whole segment is answer text; `sub` is the sub-question it declares, if any.
    Enter { sub: Option<u32> },
    /// A short `答案`/`解析` title line; enters the answer section and is itself dropped.
    TitleLine,
}

pub struct AnswerRule {
    pub name: &'static str,
    apply: fn(&str, bool) -> Option<AnswerEntry>,
}

/// Evaluated top to bottom; the first match wins.
pub const ANSWER_RULES: &[AnswerRule] = &[
    AnswerRule {
        name: "sub-tagged",
        apply: sub_tagged,
    },
    AnswerRule {
        name: "sub-labeled",
        apply: sub_labeled,
    },
    AnswerRule {
        name: "question-tagged",
        apply: question_tagged,
    },
    AnswerRule {
        name: "label",
        apply: label,
    },
    AnswerRule {
        name: "title-line",
        apply: title_line,
    },
];

fn sub_tagged(text: &str, _in_answer: bool) -> Option<AnswerEntry> {
    let c = SUB_TAGGED_RE.captures(text)?;
    Some(AnswerEntry::Enter { sub: parse_number(&c[1]) })
}

fn sub_labeled(text: &str, _in_answer: bool) -> Option<AnswerEntry> {
    let c = SUB_LABELED_RE.captures(text)?;
    Some(AnswerEntry::Enter { sub: parse_number(&c[1]) })
}

fn question_tagged(text: &str, _in_answer: bool) -> Option<AnswerEntry> {
    QUESTION_TAGGED_RE
        .is_match(text)
        .then_some(AnswerEntry::Enter { sub: None })
}

fn label(text: &str, _in_answer: bool) -> Option<AnswerEntry> {
    LABEL_RE
        .is_match(text)
        .then_some(AnswerEntry::Enter { sub: None })
}

fn title_line(text: &str, in_answer: bool) -> Option<AnswerEntry> {
    if in_answer {
        return None;
    }
    let t = text.trim();
    (t.chars().count() < 10 && BARE_ANSWER_WORD_RE.is_match(t)).then_some(AnswerEntry::TitleLine)
}

pub fn match_answer_entry(text: &str, in_answer: bool) -> Option<(&'static str, AnswerEntry)> {
    ANSWER_RULES
        .iter()
        .find_map(|rule| (rule.apply)(text, in_answer).map(|entry| (rule.name, entry)))
}

pub fn is_option(text: &str) -> bool {
    OPTION_RE.is_match(text)
}

/// Splits `A. 1  B. 2  C. 3` into one string per option. Non-option text comes back whole.
pub fn split_options(text: &str) -> Vec<&str> {
    let text = text.trim();
    if !is_option(text) {
        return vec![text];
    }
    let mut parts = Vec::new();
    let mut start = 0;
    for c in NEXT_OPTION_RE.captures_iter(text) {
        let Some(m) = c.get(1) else { continue };
        parts.push(text[start..m.start()].trim());
        start = m.start();
    }
    parts.push(text[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Removes a leading `<n>.` marker.
pub fn strip_question_marker(text: &str) -> &str {
    match QUESTION_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// Removes one leading `【答案】`/`答案:` label.
pub fn strip_leaf_answer_label(text: &str) -> &str {
    match LEAF_ANSWER_LABEL_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}
