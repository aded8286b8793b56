use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use walkdir::WalkDir;

use crate::attribution::finalize_questions;
use crate::docx::blocks::Block;
use crate::docx::media::ImageSource;
use crate::docx::DocxDocument;
use crate::fragment::ImageSession;
use crate::images::ImageStore;
use crate::metadata::{parse_filename_metadata, PaperMetadata};
use crate::model::Question;
use crate::progress::ConsoleProgress;
use crate::segment::segment_blocks;

use super::PipelineConfig;

/// Everything extracted from one source document.
#[derive(Clone, Debug)]
pub struct Paper {
    pub metadata: PaperMetadata,
    pub questions: Vec<Question>,
    /// Image files written for this paper, in first-seen order.
    pub images: Vec<String>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// `(source, json output)`
    pub written: Vec<(PathBuf, PathBuf)>,
    /// Legacy `.doc` files; converting them is out of scope here.
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.written.len() + self.failed.len()
    }
}

/// Segmentation plus answer attribution over already-loaded blocks.
pub fn extract_blocks(
    blocks: &[Block],
    meta: &PaperMetadata,
    source: &dyn ImageSource,
    session: &mut ImageSession,
) -> Vec<Question> {
    finalize_questions(segment_blocks(blocks, meta, source, session))
}

/// Writes the questions as pretty JSON to `<dir>/<metadata stem>.json`.
pub fn write_paper(paper: &Paper, dir: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output dir: {}", dir.display()))?;
    let path = dir.join(paper.metadata.output_file_name());
    let json = serde_json::to_string_pretty(&paper.questions).context("serialize questions")?;
    std::fs::write(&path, json).with_context(|| format!("write json: {}", path.display()))?;
    Ok(path)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// `(docx files, legacy doc files)` under `dir`, sorted, Word lock files excluded.
pub fn collect_documents(dir: &Path) -> anyhow::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut docx = Vec::new();
    let mut legacy = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("scan folder: {}", dir.display()))?;
        if !entry.file_type().is_file() || file_name_of(entry.path()).starts_with("~$") {
            continue;
        }
        let path = entry.into_path();
        if has_extension(&path, "docx") {
            docx.push(path);
        } else if has_extension(&path, "doc") {
            legacy.push(path);
        }
    }
    Ok((docx, legacy))
}

pub struct ExtractPipeline {
    cfg: PipelineConfig,
    progress: ConsoleProgress,
}

impl ExtractPipeline {
    pub fn new(cfg: PipelineConfig, progress: ConsoleProgress) -> Self {
        Self { cfg, progress }
    }

    /// Reads one `.docx`; image side output goes to the configured images dir.
    pub fn extract_paper(&self, input: &Path) -> anyhow::Result<Paper> {
        let metadata = parse_filename_metadata(&file_name_of(input));
        let doc = DocxDocument::open(input)?;
        let images = doc.images();
        let mut session = ImageSession::new(ImageStore::new(self.cfg.images.clone()));
        let questions = extract_blocks(&doc.blocks, &metadata, &images, &mut session);
        let sub_count: usize = questions.iter().map(|q| q.subs().len()).sum();
        log::info!(
            "{}: {} questions, {} sub-questions, {} images",
            input.display(),
            questions.len(),
            sub_count,
            session.files().len()
        );
        Ok(Paper {
            metadata,
            questions,
            images: session.into_files(),
        })
    }

    pub fn process_document(&self, input: &Path) -> anyhow::Result<(Paper, PathBuf)> {
        self.progress.info(format!("Read DOCX: {}", input.display()));
        let paper = self.extract_paper(input)?;
        let out = write_paper(&paper, &self.cfg.output_dir)?;
        self.progress.info(format!(
            "Saved {} questions: {}",
            paper.questions.len(),
            out.display()
        ));
        Ok((paper, out))
    }

    /// Every document is processed on its own; one failure does not stop the batch.
    pub fn process_folder(&self, dir: &Path) -> anyhow::Result<BatchReport> {
        let (docs, legacy) = collect_documents(dir)?;
        let mut report = BatchReport {
            skipped: legacy,
            ..BatchReport::default()
        };
        for p in &report.skipped {
            log::warn!("skip legacy .doc (convert to .docx first): {}", p.display());
        }
        if docs.is_empty() {
            return Err(anyhow!("no .docx files under {}", dir.display()));
        }
        self.progress
            .info(format!("Found {} .docx files in {}", docs.len(), dir.display()));

        let mut outputs: HashSet<PathBuf> = HashSet::new();
        for (i, doc) in docs.iter().enumerate() {
            self.progress.progress("Documents", i, docs.len());
            match self.process_document(doc) {
                Ok((_, out)) => {
                    if !outputs.insert(out.clone()) {
                        log::warn!(
                            "{} overwrote {} (same metadata as an earlier file)",
                            doc.display(),
                            out.display()
                        );
                    }
                    report.written.push((doc.clone(), out));
                }
                Err(e) => {
                    log::error!("{}: {e:#}", doc.display());
                    report.failed.push((doc.clone(), format!("{e:#}")));
                }
            }
        }
        self.progress.progress("Documents", docs.len(), docs.len());
        self.progress.info(format!(
            "Done: {} written, {} failed, {} skipped",
            report.written.len(),
            report.failed.len(),
            report.skipped.len()
        ));
        Ok(report)
    }
}
