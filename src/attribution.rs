//! Post-processing of scanned questions: the answer blob collected on a parent question is
//! partitioned across its sub-questions, and leaf answers lose their leading label.
//!
//! Passes, in order:
//! 1. `【小问n详解】` spans, each running to the next detail marker, `【点睛】`, or the end.
//! 2. Only when pass 1 found nothing: `(n)` extracts inside the `【答案】`, `【分析】` and
//!    `【详解】` sections, labeled by section.
//! 3. `【点睛】` to the end becomes the parent's own answer.
//!
//! When neither pass 1 nor pass 2 attributes anything the parent keeps the whole blob.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Question;
use crate::segment::rules::strip_leaf_answer_label;
use crate::textutil::{join_line, parse_number};

const CLOSING: &str = "【点睛】";

static DETAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"【小问\s*([0-9０-９]+)\s*详解】").expect("detail marker regex"));
static SUB_MARK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[（(]\s*([0-9０-９]+)\s*[）)]").expect("sub mark regex"));

/// `(label, labels that end the section)`
const SECTIONS: &[(&str, &[&str])] = &[
    ("【答案】", &["【解析】", "【分析】", "【详解】", CLOSING]),
    ("【分析】", &["【详解】", CLOSING]),
    ("【详解】", &[CLOSING]),
];

pub fn finalize_questions(questions: Vec<Question>) -> Vec<Question> {
    questions.into_iter().map(finalize_question).collect()
}

pub fn finalize_question(mut q: Question) -> Question {
    let Some(mut subs) = q.sub_questions.take() else {
        q.answers = strip_leaf_answer_label(q.answers.trim()).trim().to_string();
        return q;
    };
    subs.sort_by_key(|s| s.number);

    let blob = std::mem::take(&mut q.answers);
    let mut attributed = false;
    if !blob.trim().is_empty() {
        for sub in subs.iter_mut() {
            if let Some(span) = detail_span(&blob, sub.number) {
                join_line(&mut sub.answers, span);
                attributed = true;
            }
        }
        if !attributed {
            for sub in subs.iter_mut() {
                let parts = section_extracts(&blob, sub.number);
                if !parts.is_empty() {
                    join_line(&mut sub.answers, &parts.join("\n"));
                    attributed = true;
                }
            }
        }
    }

    q.answers = if attributed {
        closing_remark(&blob).unwrap_or_default().to_string()
    } else {
        blob
    };
    log::debug!(
        "q{}: answers {} across {} sub-questions",
        q.number,
        if attributed { "split" } else { "kept" },
        subs.len()
    );
    q.sub_questions = Some(subs);
    q
}

fn detail_span(blob: &str, number: u32) -> Option<&str> {
    let markers: Vec<_> = DETAIL_RE.captures_iter(blob).collect();
    let (i, own) = markers
        .iter()
        .enumerate()
        .find(|(_, c)| parse_number(&c[1]) == Some(number))?;
    let start = own.get(0)?.start();
    let after = own.get(0)?.end();
    let next_detail = markers.get(i + 1).and_then(|c| c.get(0)).map(|m| m.start());
    let closing = blob[after..].find(CLOSING).map(|p| after + p);
    let end = [next_detail, closing]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(blob.len());
    let span = blob[start..end].trim();
    (!span.is_empty()).then_some(span)
}

fn section<'b>(blob: &'b str, label: &str, ends: &[&str]) -> Option<&'b str> {
    let start = blob.find(label)? + label.len();
    let rest = &blob[start..];
    let end = ends
        .iter()
        .filter_map(|e| rest.find(e))
        .min()
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

/// `(n)` markers not written as call notation (`f(2)`).
fn sub_marks(text: &str) -> Vec<(u32, usize, usize)> {
    SUB_MARK_RE
        .captures_iter(text)
        .filter_map(|c| {
            let m = c.get(0)?;
            let prev = text[..m.start()].chars().next_back();
            if prev.is_some_and(|p| p.is_ascii_alphanumeric()) {
                return None;
            }
            Some((parse_number(&c[1])?, m.start(), m.end()))
        })
        .collect()
}

fn sub_extract<'s>(section: &'s str, label: &str, number: u32) -> Option<&'s str> {
    let marks = sub_marks(section);
    let i = marks.iter().position(|(n, _, _)| *n == number)?;
    let from = marks[i].2;
    let to = marks.get(i + 1).map(|m| m.1).unwrap_or(section.len());
    let mut text = &section[from..to];
    if let Some(p) = text.find(label) {
        text = &text[..p];
    }
    let text = text
        .trim()
        .trim_end_matches(|c: char| c == '；' || c == ';')
        .trim();
    (!text.is_empty()).then_some(text)
}

fn section_extracts(blob: &str, number: u32) -> Vec<String> {
    SECTIONS
        .iter()
        .filter_map(|(label, ends)| {
            let body = section(blob, label, ends)?;
            let text = sub_extract(body, label, number)?;
            Some(format!("{label}（{number}）{text}"))
        })
        .collect()
}

fn closing_remark(blob: &str) -> Option<&str> {
    let p = blob.find(CLOSING)?;
    Some(blob[p..].trim())
}
