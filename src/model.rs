use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::textutil::{join_line, placeholder_files};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub id: String,
    pub number: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    pub answers: String,
}

/// One top-level numbered question. `sub_questions` is `None` for leaf questions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub number: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_questions: Option<Vec<SubQuestion>>,
    pub answers: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Content,
    Options,
    Answers,
}

/// Shared text fields of questions and sub-questions.
pub trait QuestionNode {
    fn content_mut(&mut self) -> &mut String;
    fn options_mut(&mut self) -> &mut Vec<QuestionOption>;
    fn answers_mut(&mut self) -> &mut String;

    /// Newline-joins `text` onto a text field, or pushes it as a new option.
    fn append(&mut self, field: Field, text: &str) {
        match field {
            Field::Content => join_line(self.content_mut(), text),
            Field::Answers => join_line(self.answers_mut(), text),
            Field::Options => self.options_mut().push(QuestionOption {
                text: text.to_string(),
            }),
        }
    }
}

impl QuestionNode for Question {
    fn content_mut(&mut self) -> &mut String {
        &mut self.content
    }
    fn options_mut(&mut self) -> &mut Vec<QuestionOption> {
        &mut self.options
    }
    fn answers_mut(&mut self) -> &mut String {
        &mut self.answers
    }
}

impl QuestionNode for SubQuestion {
    fn content_mut(&mut self) -> &mut String {
        &mut self.content
    }
    fn options_mut(&mut self) -> &mut Vec<QuestionOption> {
        &mut self.options
    }
    fn answers_mut(&mut self) -> &mut String {
        &mut self.answers
    }
}

impl SubQuestion {
    pub fn new(id: String, number: u32) -> Self {
        Self {
            id,
            number,
            ..Self::default()
        }
    }
}

impl Question {
    pub fn new(id: String, number: u32) -> Self {
        Self {
            id,
            number,
            ..Self::default()
        }
    }

    pub fn subs(&self) -> &[SubQuestion] {
        self.sub_questions.as_deref().unwrap_or(&[])
    }

    pub fn sub_index(&self, number: u32) -> Option<usize> {
        self.subs().iter().position(|s| s.number == number)
    }

    /// Image files referenced anywhere in this question, first-seen order, no repeats.
    pub fn image_files(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut take = |text: &str| {
            for f in placeholder_files(text) {
                if seen.insert(f.clone()) {
                    out.push(f);
                }
            }
        };
        take(&self.content);
        self.options.iter().for_each(|o| take(&o.text));
        take(&self.answers);
        for sub in self.subs() {
            take(&sub.content);
            sub.options.iter().for_each(|o| take(&o.text));
            take(&sub.answers);
        }
        out
    }
}

/// Keeps the first question seen for every number.
pub fn dedup_by_number(questions: Vec<Question>) -> Vec<Question> {
    let mut seen = HashSet::new();
    questions
        .into_iter()
        .filter(|q| seen.insert(q.number))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{dedup_by_number, Field, Question, QuestionNode, SubQuestion};

    #[test]
    fn append_joins_text_and_pushes_options() {
        let mut q = Question::new("q-01".to_string(), 1);
        q.append(Field::Content, "line one");
        q.append(Field::Content, "line two");
        q.append(Field::Options, "A. 3");
        q.append(Field::Answers, "B");
        assert_eq!(q.content, "line one\nline two");
        assert_eq!(q.options.len(), 1);
        assert_eq!(q.options[0].text, "A. 3");
        assert_eq!(q.answers, "B");
    }

    #[test]
    fn leaf_json_omits_sub_questions_and_empty_options() {
        let q = Question::new("q-01".to_string(), 1);
        let v = serde_json::to_value(&q).expect("json");
        let obj = v.as_object().expect("object");
        assert!(!obj.contains_key("sub_questions"));
        assert!(!obj.contains_key("options"));
        assert_eq!(obj["number"], 1);

        let mut parent = Question::new("q-02".to_string(), 2);
        parent.sub_questions = Some(vec![SubQuestion::new("q-02-01".to_string(), 1)]);
        let v = serde_json::to_value(&parent).expect("json");
        assert_eq!(v["sub_questions"][0]["id"], "q-02-01");
    }

    #[test]
    fn image_files_walk_all_fields_once() {
        let mut q = Question::new("q".to_string(), 1);
        q.content = "见图[IMG:a.png]".to_string();
        q.answers = "[IMG:a.png][IMG:c.png]".to_string();
        let mut sub = SubQuestion::new("q-01".to_string(), 1);
        sub.append(Field::Options, "A. [IMG:b.png]");
        q.sub_questions = Some(vec![sub]);
        assert_eq!(q.image_files(), vec!["a.png", "c.png", "b.png"]);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut a = Question::new("a".to_string(), 3);
        a.content = "first".to_string();
        let mut b = Question::new("b".to_string(), 3);
        b.content = "second".to_string();
        let c = Question::new("c".to_string(), 4);
        let out = dedup_by_number(vec![a, b, c]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "first");
        assert_eq!(out[1].number, 4);
    }
}
