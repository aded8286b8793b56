use crate::docx::blocks::{Block, Paragraph, Table};
use crate::docx::media::ImageSource;
use crate::fragment::{
    drop_text_prefix, flatten, plain_text, render, render_table, split_inlines, ImageSession,
    Inline,
};
use crate::metadata::{question_id, PaperMetadata};
use crate::model::{dedup_by_number, Field, Question, QuestionNode, SubQuestion};
use crate::segment::rules::{
    classify_heading, is_option, match_answer_entry, split_options, split_points,
    strip_question_marker, AnswerEntry, Heading,
};

/// Where the scan is. `Answer::sub` is the sub-question the answer block declared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Stem,
    Answer { sub: Option<u32> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Parent,
    Sub(usize),
}

/// Builds the question tree from body blocks. Questions live in an arena; the scan keeps
/// the index of the current question. Untagged stem text belongs to its newest sub-question.
pub struct Segmenter<'a> {
    meta: &'a PaperMetadata,
    source: &'a dyn ImageSource,
    session: &'a mut ImageSession,
    questions: Vec<Question>,
    current: Option<usize>,
    state: ScanState,
}

impl<'a> Segmenter<'a> {
    pub fn new(
        meta: &'a PaperMetadata,
        source: &'a dyn ImageSource,
        session: &'a mut ImageSession,
    ) -> Self {
        Self {
            meta,
            source,
            session,
            questions: Vec::new(),
            current: None,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn feed(&mut self, block: &Block) {
        match block {
            Block::Paragraph(p) => self.paragraph(p),
            Block::Table(t) => self.table(t),
        }
    }

    /// Questions in first-seen order, one per number.
    pub fn finish(self) -> Vec<Question> {
        dedup_by_number(self.questions)
    }

    fn paragraph(&mut self, paragraph: &Paragraph) {
        let inlines = flatten(paragraph);
        let cuts = split_points(&plain_text(&inlines));
        for segment in split_inlines(&inlines, &cuts) {
            self.segment(&segment);
        }
    }

    fn segment(&mut self, inlines: &[Inline]) {
        let text = plain_text(inlines);
        let heading = classify_heading(&text);
        match heading {
            Some(Heading::Question { number, .. }) => self.open_question(number),
            Some(Heading::Sub { number, .. }) if self.state == ScanState::Stem => {
                self.open_sub(number)
            }
            _ => {}
        }
        let Some(q) = self.current else {
            return;
        };

        let was_answer = matches!(self.state, ScanState::Answer { .. });
        match match_answer_entry(&text, was_answer) {
            Some((rule, AnswerEntry::TitleLine)) => {
                log::debug!("q{}: {rule} enters answers", self.questions[q].number);
                self.state = ScanState::Answer { sub: None };
            }
            Some((rule, AnswerEntry::Enter { sub })) => {
                log::debug!(
                    "q{}: {rule} enters answers (sub {sub:?})",
                    self.questions[q].number
                );
                self.state = ScanState::Answer { sub };
                self.route_answer(q, heading, inlines);
            }
            None if was_answer => self.route_answer(q, heading, inlines),
            None => self.route_stem(q, heading, inlines),
        }
    }

    fn route_stem(&mut self, q: usize, heading: Option<Heading>, inlines: &[Inline]) {
        let (inlines, target) = match heading {
            Some(Heading::Question { marker_end, .. }) => {
                (drop_text_prefix(inlines, marker_end), self.stem_target(q))
            }
            Some(Heading::Sub { number, marker_end }) => {
                let target = self.questions[q]
                    .sub_index(number)
                    .map(Target::Sub)
                    .unwrap_or_else(|| self.stem_target(q));
                (drop_text_prefix(inlines, marker_end), target)
            }
            None => (inlines.to_vec(), self.stem_target(q)),
        };
        let text = self.render_for(q, target, &inlines);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if is_option(text) {
            for option in split_options(text) {
                self.append(q, target, Field::Options, option);
            }
        } else {
            self.append(q, target, Field::Content, text);
        }
    }

    fn route_answer(&mut self, q: usize, heading: Option<Heading>, inlines: &[Inline]) {
        let inlines = match heading {
            Some(Heading::Question { .. }) => {
                let text = plain_text(inlines);
                let marker = text.len() - strip_question_marker(&text).len();
                drop_text_prefix(inlines, marker)
            }
            _ => inlines.to_vec(),
        };
        let target = self.answer_target(q);
        let text = self.render_for(q, target, &inlines);
        let text = text.trim();
        if !text.is_empty() {
            self.append(q, target, Field::Answers, text);
        }
    }

    fn table(&mut self, table: &Table) {
        let Some(q) = self.current else {
            return;
        };
        let (target, field) = match self.state {
            ScanState::Idle => return,
            ScanState::Stem => (self.stem_target(q), Field::Content),
            ScanState::Answer { .. } => (self.answer_target(q), Field::Answers),
        };
        let owner = self.node_id(q, target);
        let text = render_table(table, &owner, self.source, self.session);
        self.append(q, target, field, &text);
    }

    fn open_question(&mut self, number: u32) {
        if let Some(idx) = self.questions.iter().position(|x| x.number == number) {
            log::debug!("resume question {number}");
            self.current = Some(idx);
            if self.state == ScanState::Idle {
                self.state = ScanState::Stem;
            }
            return;
        }
        log::debug!("new question {number}");
        let id = question_id(self.meta, number, None);
        self.questions.push(Question::new(id, number));
        self.current = Some(self.questions.len() - 1);
        self.state = ScanState::Stem;
    }

    fn open_sub(&mut self, number: u32) {
        let Some(q) = self.current else {
            return;
        };
        let question = &mut self.questions[q];
        if question.sub_index(number).is_some() {
            return;
        }
        log::debug!("q{}: new sub-question {number}", question.number);
        let id = question_id(self.meta, question.number, Some(number));
        question
            .sub_questions
            .get_or_insert_with(Vec::new)
            .push(SubQuestion::new(id, number));
    }

    /// The newest sub-question, else the parent.
    fn stem_target(&self, q: usize) -> Target {
        match self.questions[q].subs().len().checked_sub(1) {
            Some(idx) => Target::Sub(idx),
            None => Target::Parent,
        }
    }

    fn answer_target(&self, q: usize) -> Target {
        match self.state {
            ScanState::Answer { sub: Some(n) } => self.questions[q]
                .sub_index(n)
                .map(Target::Sub)
                .unwrap_or_else(|| self.stem_target(q)),
            _ => Target::Parent,
        }
    }

    fn node_id(&self, q: usize, target: Target) -> String {
        let question = &self.questions[q];
        match target {
            Target::Parent => question.id.clone(),
            Target::Sub(i) => question.subs()[i].id.clone(),
        }
    }

    fn render_for(&mut self, q: usize, target: Target, inlines: &[Inline]) -> String {
        let owner = self.node_id(q, target);
        render(inlines, &owner, self.source, self.session)
    }

    fn append(&mut self, q: usize, target: Target, field: Field, text: &str) {
        let question = &mut self.questions[q];
        match target {
            Target::Parent => question.append(field, text),
            Target::Sub(i) => match question.sub_questions.as_mut() {
                Some(subs) => subs[i].append(field, text),
                None => question.append(field, text),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ScanState, Segmenter};
    use crate::docx::blocks::{Block, Paragraph, Run, Table, TableCell, TableRow};
    use crate::fragment::tests::{session_in, MemImages};
    use crate::metadata::PaperMetadata;
    use crate::model::Question;

    fn para(text: &str) -> Block {
        Block::Paragraph(Paragraph::from_text(text))
    }

    fn scan(blocks: &[Block]) -> Vec<Question> {
        let tmp = tempfile::tempdir().expect("tmp");
        let meta = PaperMetadata::default();
        let source = MemImages::default();
        let mut session = session_in(tmp.path());
        let mut seg = Segmenter::new(&meta, &source, &mut session);
        for b in blocks {
            seg.feed(b);
        }
        seg.finish()
    }

    #[test]
    fn multiple_choice_question() {
        let qs = scan(&[
            para("1. What is 2+2?"),
            para("A. 3"),
            para("B. 4"),
            para("【答案】B"),
        ]);
        assert_eq!(qs.len(), 1);
        let q = &qs[0];
        assert_eq!(q.number, 1);
        assert_eq!(q.content, "What is 2+2?");
        let opts: Vec<_> = q.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(opts, vec!["A. 3", "B. 4"]);
        assert_eq!(q.answers, "【答案】B");
        assert!(q.sub_questions.is_none());
    }

    #[test]
    fn text_before_first_question_is_ignored() {
        let qs = scan(&[para("2023年数学试卷"), para("参考答案"), para("1. 题干")]);
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].content, "题干");
    }

    #[test]
    fn sub_questions_take_stem_content() {
        let qs = scan(&[
            para("2. Simplify."),
            para("(1) Part one text"),
            para("more for one"),
            para("(2) Part two text"),
        ]);
        let q = &qs[0];
        assert_eq!(q.content, "Simplify.");
        let subs = q.sub_questions.as_ref().expect("subs");
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].content, "Part one text\nmore for one");
        assert_eq!(subs[1].content, "Part two text");
        assert_eq!(subs[1].id, "0000-未知省份-未知城市-未知学科-未知考试类型-02-02");
    }

    #[test]
    fn merged_paragraph_is_split_at_sub_markers() {
        let qs = scan(&[para("3. 已知f(x)=2x，求f(0)。(1)求a；（2）求b")]);
        let q = &qs[0];
        assert_eq!(q.content, "已知f(x)=2x，求f(0)。");
        let subs = q.sub_questions.as_ref().expect("subs");
        assert_eq!(subs[0].content, "求a；");
        assert_eq!(subs[1].number, 2);
        assert_eq!(subs[1].content, "求b");
        assert!(!q.content.contains("(1)"));
    }

    #[test]
    fn resumed_question_is_not_duplicated() {
        let qs = scan(&[
            para("3. first part"),
            para("4. other"),
            para("3. second part"),
        ]);
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].number, 3);
        assert_eq!(qs[0].content, "first part\nsecond part");
    }

    #[test]
    fn declared_sub_answers_route_to_that_sub() {
        let qs = scan(&[
            para("5. 题干"),
            para("(1) 求x"),
            para("(2) 求y"),
            para("(1) 略【答案】x=1"),
            para("过程一"),
            para("(2)【解析】y=2"),
        ]);
        let q = &qs[0];
        let subs = q.sub_questions.as_ref().expect("subs");
        assert_eq!(subs[0].content, "求x");
        assert_eq!(subs[0].answers, "(1) 略【答案】x=1\n过程一");
        assert_eq!(subs[1].content, "求y");
        assert_eq!(subs[1].answers, "(2)【解析】y=2");
        assert_eq!(q.answers, "");
    }

    #[test]
    fn tagged_answer_segment_goes_wholly_to_answers() {
        let qs = scan(&[para("5. 求值【答案】C"), para("6. 下一题")]);
        assert_eq!(qs[0].content, "");
        assert_eq!(qs[0].answers, "求值【答案】C");
        assert_eq!(qs[1].content, "下一题");
    }

    #[test]
    fn untagged_stem_text_goes_to_newest_sub() {
        let qs = scan(&[
            para("1. 题干"),
            para("(1) a"),
            para("(2) b"),
            para("(1) more a"),
            para("untagged continuation"),
            para("A. 3"),
        ]);
        let subs = qs[0].sub_questions.as_ref().expect("subs");
        assert_eq!(subs[0].content, "a\nmore a");
        assert!(subs[0].options.is_empty());
        assert_eq!(subs[1].content, "b\nuntagged continuation");
        assert_eq!(subs[1].options[0].text, "A. 3");
    }

    #[test]
    fn sub_marker_without_question_is_ignored() {
        let qs = scan(&[para("(1) orphan"), para("答案"), para("1. 题干"), para("(1) x")]);
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].content, "题干");
        let subs = qs[0].sub_questions.as_ref().expect("subs");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].content, "x");
    }

    #[test]
    fn undeclared_answers_collect_on_parent() {
        let qs = scan(&[
            para("6. 题干"),
            para("(1) 求x"),
            para("【答案】(1) 1；(2) 2"),
            para("【点睛】注意"),
        ]);
        let q = &qs[0];
        assert_eq!(q.answers, "【答案】(1) 1；\n(2) 2\n【点睛】注意");
        assert_eq!(q.sub_questions.as_ref().expect("subs").len(), 1);
    }

    #[test]
    fn answer_title_line_is_dropped_and_next_question_resets() {
        let qs = scan(&[
            para("7. 题干"),
            para("解析"),
            para("因为a=1"),
            para("8. 下一题"),
        ]);
        assert_eq!(qs[0].answers, "因为a=1");
        assert_eq!(qs[1].content, "下一题");
        assert_eq!(qs[1].answers, "");
    }

    #[test]
    fn tables_follow_the_scan_state() {
        let table = Block::Table(Table {
            rows: vec![TableRow {
                cells: vec![
                    TableCell {
                        paragraphs: vec![Paragraph::from_text("x")],
                    },
                    TableCell {
                        paragraphs: vec![Paragraph::from_text("(2)")],
                    },
                ],
            }],
        });
        let qs = scan(&[table.clone(), para("9. 如表"), table.clone(), para("【答案】见表"), table]);
        assert_eq!(qs[0].content, "如表\n[表格开始]\nx | (2)\n[表格结束]");
        assert_eq!(qs[0].answers, "【答案】见表\n[表格开始]\nx | (2)\n[表格结束]");
    }

    #[test]
    fn image_at_marker_boundary_stays_with_previous_segment() {
        let tmp = tempfile::tempdir().expect("tmp");
        let meta = PaperMetadata::default();
        let source = MemImages::default().with("rId1", b"fig", "image/png");
        let mut session = session_in(tmp.path());
        let mut seg = Segmenter::new(&meta, &source, &mut session);
        seg.feed(&Block::Paragraph(Paragraph {
            runs: vec![
                Run::text("10. 如图，"),
                Run::image("rId1"),
                Run::text("(1)求角"),
            ],
        }));
        assert_eq!(seg.state(), ScanState::Stem);
        let qs = seg.finish();
        assert!(qs[0].content.starts_with("如图，[IMG:0000-未知省份-未知城市-未知学科-未知考试类型-10_"));
        assert_eq!(qs[0].sub_questions.as_ref().expect("subs")[0].content, "求角");
    }
}
