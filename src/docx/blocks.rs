use crate::docx::xml::{find_attr, XmlEvent, XmlPart};

/// One top-level element of the document body, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

/// A text run plus the image relationship ids embedded in it (after its text).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub image_refs: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
}

impl Paragraph {
    pub fn from_text(text: &str) -> Self {
        Self {
            runs: vec![Run::text(text)],
        }
    }

    /// Plain text of all runs, images excluded.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

impl Run {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            image_refs: Vec::new(),
        }
    }

    pub fn image(rid: &str) -> Self {
        Self {
            text: String::new(),
            image_refs: vec![rid.to_string()],
        }
    }
}

/// Containers whose run children belong to the enclosing paragraph.
fn is_run_container(name: &str) -> bool {
    matches!(
        name,
        "w:hyperlink" | "w:ins" | "w:smartTag" | "w:fldSimple" | "w:customXml"
    )
}

fn is_image_ref_attr(key: &str) -> bool {
    key == "r:embed" || key == "r:id"
}

fn control_text(name: &str, attrs: &[(String, String)]) -> Option<char> {
    match name {
        "w:tab" | "w:ptab" => Some('\t'),
        "w:cr" => Some('\n'),
        "w:br" => {
            let br_type = find_attr(attrs, "w:type").unwrap_or("textWrapping");
            (br_type == "textWrapping").then_some('\n')
        }
        "w:noBreakHyphen" => Some('-'),
        _ => None,
    }
}

#[derive(Default)]
struct RunCapture {
    depth: usize,
    run: Run,
    in_text: bool,
    fallback_depth: Option<usize>,
}

#[derive(Default)]
struct ParaCapture {
    depth: usize,
    para: Paragraph,
    run: Option<RunCapture>,
    math_depth: Option<usize>,
    in_math_text: bool,
}

impl ParaCapture {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            ..Default::default()
        }
    }

    /// `stack` is the element stack *before* `name` is pushed.
    fn on_start(&mut self, stack: &[String], name: &str, attrs: &[(String, String)], empty: bool) {
        let depth = stack.len();
        let parent = stack.last().map(|s| s.as_str()).unwrap_or("");

        if let Some(run) = self.run.as_mut() {
            // mc:Fallback repeats the mc:Choice content (VML copy of the same picture).
            if run.fallback_depth.is_none() && name == "mc:Fallback" && !empty {
                run.fallback_depth = Some(depth + 1);
            }
            if run.fallback_depth.is_some() {
                return;
            }
            for (k, v) in attrs {
                if is_image_ref_attr(k) && !v.trim().is_empty() {
                    run.run.image_refs.push(v.trim().to_string());
                }
            }
            if parent == "w:r" && depth == run.depth {
                if name == "w:t" && !empty {
                    run.in_text = true;
                } else if let Some(ch) = control_text(name, attrs) {
                    run.run.text.push(ch);
                }
            }
            return;
        }

        if name == "w:r" && !empty {
            let direct = depth == self.depth
                || (is_run_container(parent)
                    && stack[self.depth..].iter().all(|s| is_run_container(s)));
            if direct {
                self.run = Some(RunCapture {
                    depth: depth + 1,
                    ..Default::default()
                });
                return;
            }
        }

        if (name == "m:oMath" || name == "m:oMathPara") && !empty && self.math_depth.is_none() {
            self.math_depth = Some(depth + 1);
        }
        if self.math_depth.is_some() && name == "m:t" && !empty {
            self.in_math_text = true;
            self.para.runs.push(Run::default());
        }
    }

    fn on_text(&mut self, text: &str) {
        if let Some(run) = self.run.as_mut() {
            if run.in_text {
                run.run.text.push_str(text);
            }
        } else if self.in_math_text {
            if let Some(last) = self.para.runs.last_mut() {
                last.text.push_str(text);
            }
        }
    }

    /// `depth` is the stack length *including* the element being closed.
    fn on_end(&mut self, name: &str, depth: usize) {
        if let Some(run) = self.run.as_mut() {
            if run.fallback_depth.is_some() {
                if run.fallback_depth == Some(depth) {
                    run.fallback_depth = None;
                }
            } else if name == "w:t" && depth == run.depth + 1 {
                run.in_text = false;
            } else if name == "w:r" && depth == run.depth {
                if let Some(done) = self.run.take() {
                    self.para.runs.push(done.run);
                }
            }
            return;
        }
        if name == "m:t" {
            self.in_math_text = false;
        }
        if self.math_depth == Some(depth) {
            self.math_depth = None;
        }
    }

    fn finish(mut self) -> Paragraph {
        if let Some(run) = self.run.take() {
            self.para.runs.push(run.run);
        }
        self.para.runs.retain(|r| !r.text.is_empty() || !r.image_refs.is_empty());
        self.para
    }
}

struct TableCapture {
    depth: usize,
    table: Table,
    cell_depth: Option<usize>,
}

/// Parse the body of `word/document.xml` into paragraph and table blocks.
pub fn read_body_blocks(part: &XmlPart) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut para: Option<ParaCapture> = None;
    let mut table: Option<TableCapture> = None;

    for ev in &part.events {
        match ev {
            XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs } => {
                let empty = matches!(ev, XmlEvent::Empty { .. });
                if let Some(p) = para.as_mut() {
                    p.on_start(&stack, name, attrs, empty);
                } else if let Some(t) = table.as_mut() {
                    let parent = stack.last().map(|s| s.as_str()).unwrap_or("");
                    if name == "w:tr" && parent == "w:tbl" && stack.len() == t.depth {
                        t.table.rows.push(TableRow::default());
                    } else if name == "w:tc" && parent == "w:tr" && stack.len() == t.depth + 1 {
                        if let Some(row) = t.table.rows.last_mut() {
                            row.cells.push(TableCell::default());
                        }
                        if !empty {
                            t.cell_depth = Some(stack.len() + 1);
                        }
                    } else if name == "w:p" && t.cell_depth == Some(stack.len()) {
                        if empty {
                            push_cell_paragraph(t, Paragraph::default());
                        } else {
                            para = Some(ParaCapture::new(stack.len() + 1));
                        }
                    }
                } else if is_body_level(&stack) {
                    if name == "w:p" {
                        if empty {
                            blocks.push(Block::Paragraph(Paragraph::default()));
                        } else {
                            para = Some(ParaCapture::new(stack.len() + 1));
                        }
                    } else if name == "w:tbl" {
                        if empty {
                            blocks.push(Block::Table(Table::default()));
                        } else {
                            table = Some(TableCapture {
                                depth: stack.len() + 1,
                                table: Table::default(),
                                cell_depth: None,
                            });
                        }
                    }
                }
                if !empty {
                    stack.push(name.clone());
                }
            }
            XmlEvent::Text { text } => {
                if let Some(p) = para.as_mut() {
                    p.on_text(text);
                }
            }
            XmlEvent::End { name } => {
                let depth = stack.len();
                if let Some(p) = para.as_mut() {
                    if name == "w:p" && depth == p.depth {
                        if let Some(done) = para.take() {
                            let done = done.finish();
                            match table.as_mut() {
                                Some(t) => push_cell_paragraph(t, done),
                                None => blocks.push(Block::Paragraph(done)),
                            }
                        }
                    } else {
                        p.on_end(name, depth);
                    }
                } else if let Some(t) = table.as_mut() {
                    if name == "w:tc" && t.cell_depth == Some(depth) {
                        t.cell_depth = None;
                    } else if name == "w:tbl" && depth == t.depth {
                        if let Some(done) = table.take() {
                            blocks.push(Block::Table(done.table));
                        }
                    }
                }
                stack.pop();
            }
        }
    }

    log::debug!("{}: {} body blocks", part.name, blocks.len());
    blocks
}

fn push_cell_paragraph(t: &mut TableCapture, p: Paragraph) {
    if let Some(cell) = t.table.rows.last_mut().and_then(|r| r.cells.last_mut()) {
        cell.paragraphs.push(p);
    }
}

/// Directly under `w:body`, possibly through body-level content controls.
fn is_body_level(stack: &[String]) -> bool {
    let Some(body) = stack.iter().position(|s| s == "w:body") else {
        return false;
    };
    let mut inner = stack[body + 1..].iter();
    loop {
        match (inner.next(), inner.next()) {
            (None, _) => return true,
            (Some(a), Some(b)) if a == "w:sdt" && b == "w:sdtContent" => continue,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{read_body_blocks, Block, Paragraph, Run};
    use crate::docx::xml::parse_xml_part;

    fn doc(body: &str) -> Vec<Block> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="w" xmlns:r="r" xmlns:m="m" xmlns:a="a"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        );
        let part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse");
        read_body_blocks(&part)
    }

    #[test]
    fn paragraphs_and_tables_keep_document_order() {
        let blocks = doc(concat!(
            r#"<w:p><w:r><w:t>1. 题干</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tblPr/><w:tr><w:tc><w:p><w:r><w:t>x</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>y</w:t></w:r></w:p><w:p/></w:tc></w:tr></w:tbl>"#,
            r#"<w:p><w:r><w:t xml:space="preserve">A. 3</w:t></w:r></w:p>"#,
        ));
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], Block::Paragraph(Paragraph::from_text("1. 题干")));
        let Block::Table(t) = &blocks[1] else {
            panic!("expected table");
        };
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0].cells.len(), 2);
        assert_eq!(t.rows[0].cells[0].paragraphs[0].text(), "x");
        assert_eq!(t.rows[0].cells[1].paragraphs.len(), 2);
        assert_eq!(blocks[2], Block::Paragraph(Paragraph::from_text("A. 3")));
    }

    #[test]
    fn collects_run_text_controls_and_image_refs() {
        let blocks = doc(concat!(
            r#"<w:p><w:pPr><w:pStyle w:val="a"/></w:pPr>"#,
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t>如图</w:t><w:tab/><w:br/><w:br w:type="page"/></w:r>"#,
            r#"<w:r><w:drawing><a:graphic><a:blip r:embed="rId7"/></a:graphic></w:drawing></w:r>"#,
            r#"<w:hyperlink r:id="rId99"><w:r><w:t>链接</w:t></w:r></w:hyperlink>"#,
            r#"<w:r><w:object><v:imagedata xmlns:v="v" r:id="rId8"/></w:object><w:t>后</w:t></w:r>"#,
            r#"</w:p>"#,
        ));
        let Block::Paragraph(p) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            p.runs,
            vec![
                Run::text("如图\t\n"),
                Run::image("rId7"),
                Run::text("链接"),
                Run {
                    text: "后".to_string(),
                    image_refs: vec!["rId8".to_string()],
                },
            ]
        );
    }

    #[test]
    fn text_box_text_is_not_run_text_but_its_images_are_kept() {
        let blocks = doc(concat!(
            r#"<w:p><w:r><w:t>外</w:t><w:pict><w:txbxContent><w:p><w:r><w:t>内</w:t><w:drawing><a:blip r:embed="rId3"/></w:drawing></w:r></w:p></w:txbxContent></w:pict></w:r></w:p>"#,
        ));
        let Block::Paragraph(p) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "外");
        assert_eq!(p.runs[0].image_refs, vec!["rId3".to_string()]);
    }

    #[test]
    fn alternate_content_fallback_is_not_counted_twice() {
        let blocks = doc(concat!(
            r#"<w:p><w:r><mc:AlternateContent xmlns:mc="mc"><mc:Choice Requires="wps"><w:drawing><a:blip r:embed="rId5"/></w:drawing></mc:Choice>"#,
            r#"<mc:Fallback><w:pict><v:imagedata xmlns:v="v" r:id="rId5"/></w:pict></mc:Fallback></mc:AlternateContent><w:t>图</w:t></w:r></w:p>"#,
        ));
        let Block::Paragraph(p) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.runs[0].image_refs, vec!["rId5".to_string()]);
        assert_eq!(p.runs[0].text, "图");
    }

    #[test]
    fn office_math_text_becomes_a_run() {
        let blocks = doc(concat!(
            r#"<w:p><w:r><w:t>已知</w:t></w:r><m:oMath><m:r><m:t>x</m:t></m:r><m:r><m:t>+1</m:t></m:r></m:oMath><w:r><w:t>，求值</w:t></w:r></w:p>"#,
        ));
        let Block::Paragraph(p) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "已知x+1，求值");
    }

    #[test]
    fn content_controls_are_transparent() {
        let blocks = doc(concat!(
            r#"<w:sdt><w:sdtPr/><w:sdtContent><w:p><w:r><w:t>2. 内容</w:t></w:r></w:p></w:sdtContent></w:sdt>"#,
            r#"<w:p/>"#,
        ));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], Block::Paragraph(Paragraph::from_text("2. 内容")));
        assert_eq!(blocks[1], Block::Paragraph(Paragraph::default()));
    }
}
