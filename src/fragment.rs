use std::collections::HashMap;

use crate::docx::blocks::{Paragraph, Table};
use crate::docx::media::ImageSource;
use crate::images::{content_hash, ImageStore};
use crate::textutil::image_placeholder;

pub const TABLE_BEGIN: &str = "[表格开始]";
pub const TABLE_END: &str = "[表格结束]";

/// A paragraph flattened into text and image references, in run order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Image(String),
}

/// Flattens runs, merging adjacent text.
pub fn flatten(paragraph: &Paragraph) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::new();
    for run in &paragraph.runs {
        if !run.text.is_empty() {
            match out.last_mut() {
                Some(Inline::Text(prev)) => prev.push_str(&run.text),
                _ => out.push(Inline::Text(run.text.clone())),
            }
        }
        for rid in &run.image_refs {
            out.push(Inline::Image(rid.clone()));
        }
    }
    out
}

pub fn plain_text(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .filter_map(|i| match i {
            Inline::Text(t) => Some(t.as_str()),
            Inline::Image(_) => None,
        })
        .collect()
}

/// Cuts `inlines` at byte offsets of their plain text. Offsets must be increasing char
/// boundaries greater than zero. An image sitting exactly at a cut stays with the segment before it.
pub fn split_inlines(inlines: &[Inline], cuts: &[usize]) -> Vec<Vec<Inline>> {
    let mut segments = Vec::with_capacity(cuts.len() + 1);
    let mut current: Vec<Inline> = Vec::new();
    let mut pos = 0usize;
    let mut k = 0usize;
    for inline in inlines {
        match inline {
            Inline::Image(_) => current.push(inline.clone()),
            Inline::Text(text) => {
                let mut rest = text.as_str();
                while k < cuts.len() && cuts[k] < pos + rest.len() {
                    let at = cuts[k].saturating_sub(pos);
                    let (head, tail) = rest.split_at(at);
                    if !head.is_empty() {
                        current.push(Inline::Text(head.to_string()));
                    }
                    segments.push(std::mem::take(&mut current));
                    pos += at;
                    rest = tail;
                    k += 1;
                }
                if !rest.is_empty() {
                    current.push(Inline::Text(rest.to_string()));
                }
                pos += rest.len();
            }
        }
    }
    segments.push(current);
    segments
}

/// Drops the first `n` bytes of plain text, keeping images that precede the cut.
pub fn drop_text_prefix(inlines: &[Inline], n: usize) -> Vec<Inline> {
    let mut out = Vec::with_capacity(inlines.len());
    let mut remaining = n;
    for inline in inlines {
        match inline {
            Inline::Text(t) if remaining > 0 => {
                if t.len() <= remaining {
                    remaining -= t.len();
                } else {
                    out.push(Inline::Text(t[remaining..].to_string()));
                    remaining = 0;
                }
            }
            other => out.push(other.clone()),
        }
    }
    out
}

/// Per-document image dedup context.
pub struct ImageSession {
    store: ImageStore,
    by_ref: HashMap<String, String>,
    by_hash: HashMap<String, String>,
    files: Vec<String>,
}

impl ImageSession {
    pub fn new(store: ImageStore) -> Self {
        Self {
            store,
            by_ref: HashMap::new(),
            by_hash: HashMap::new(),
            files: Vec::new(),
        }
    }

    /// File name for relationship `rid`, persisting the image on first sight.
    /// `None` when the reference cannot be resolved or written.
    pub fn resolve(&mut self, source: &dyn ImageSource, rid: &str, owner: &str) -> Option<String> {
        if let Some(name) = self.by_ref.get(rid) {
            return Some(name.clone());
        }
        let Some(image) = source.image(rid) else {
            log::warn!("skip unresolved image reference {rid} ({owner})");
            return None;
        };
        let hash = content_hash(image.bytes);
        if let Some(name) = self.by_hash.get(&hash).cloned() {
            log::debug!("image {rid} reuses {name}");
            self.by_ref.insert(rid.to_string(), name.clone());
            return Some(name);
        }
        match self.store.persist(owner, &image) {
            Ok(name) => {
                self.by_ref.insert(rid.to_string(), name.clone());
                self.by_hash.insert(hash, name.clone());
                self.files.push(name.clone());
                Some(name)
            }
            Err(e) => {
                log::warn!("skip image {rid} ({owner}): {e:#}");
                None
            }
        }
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn into_files(self) -> Vec<String> {
        self.files
    }
}

/// Text with `[IMG:<file>]` placeholders at every image position.
pub fn render(
    inlines: &[Inline],
    owner: &str,
    source: &dyn ImageSource,
    session: &mut ImageSession,
) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(t) => out.push_str(t),
            Inline::Image(rid) => {
                if let Some(name) = session.resolve(source, rid, owner) {
                    out.push_str(&image_placeholder(&name));
                }
            }
        }
    }
    out
}

pub fn render_paragraph(
    paragraph: &Paragraph,
    owner: &str,
    source: &dyn ImageSource,
    session: &mut ImageSession,
) -> String {
    render(&flatten(paragraph), owner, source, session)
}

/// `[表格开始]`, one line per row with cells joined by ` | `, then `[表格结束]`.
pub fn render_table(
    table: &Table,
    owner: &str,
    source: &dyn ImageSource,
    session: &mut ImageSession,
) -> String {
    let mut out = String::from(TABLE_BEGIN);
    out.push('\n');
    for row in &table.rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| {
                cell.paragraphs
                    .iter()
                    .map(|p| render_paragraph(p, owner, source, session).trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }
    out.push_str(TABLE_END);
    out
}
