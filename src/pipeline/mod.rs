mod config;
mod extractor;

pub use config::{init_default_config, PipelineConfig, DEFAULT_OUTPUT_DIR};
pub use extractor::{
    collect_documents, extract_blocks, write_paper, BatchReport, ExtractPipeline, Paper,
};
