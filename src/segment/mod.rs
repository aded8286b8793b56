mod machine;
pub mod rules;

pub use machine::{ScanState, Segmenter};

use crate::docx::blocks::Block;
use crate::docx::media::ImageSource;
use crate::fragment::ImageSession;
use crate::metadata::PaperMetadata;
use crate::model::Question;

/// Runs the segmentation scan over `blocks` in order.
pub fn segment_blocks(
    blocks: &[Block],
    meta: &PaperMetadata,
    source: &dyn ImageSource,
    session: &mut ImageSession,
) -> Vec<Question> {
    let mut segmenter = Segmenter::new(meta, source, session);
    for block in blocks {
        segmenter.feed(block);
    }
    segmenter.finish()
}
