use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser};

use exam_extract::pipeline::{init_default_config, ExtractPipeline, PipelineConfig};
use exam_extract::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "exam-extract")]
#[command(about = "Extract exam questions, options, images and answers from .docx papers into JSON", long_about = None)]
struct Args {
    /// Generate a default exam-extract.toml, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .docx file or a folder of papers (searched recursively)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// JSON output directory (default: processed_data/answers)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Image output directory (default: processed_data/images)
    #[arg(long, value_name = "DIR")]
    images_dir: Option<PathBuf>,

    /// Config file path (default: search for exam-extract.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also print the extracted questions as JSON to stdout (single file only)
    #[arg(long)]
    print: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let progress = ConsoleProgress::new(true);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  exam-extract <paper.docx | folder>\n\nTIPS:\n  - File names like 2023年浙江省杭州市中考数学.docx name the output JSON.\n  - Default config search: exam-extract.toml (upwards), or set EXAM_EXTRACT_CONFIG.\n"
            );
            return Ok(());
        }
    };
    if !input.exists() {
        return Err(anyhow!("input not found: {}", input.display()));
    }

    let cfg = PipelineConfig::from_paths_and_args(
        &input,
        args.config,
        args.output_dir,
        args.images_dir,
    )
    .context("build config")?;
    let pipeline = ExtractPipeline::new(cfg, progress);

    if input.is_dir() {
        let report = pipeline.process_folder(&input)?;
        for (doc, err) in &report.failed {
            eprintln!("FAILED {}: {err}", doc.display());
        }
        if report.written.is_empty() {
            return Err(anyhow!(
                "all {} documents failed under {}",
                report.total(),
                input.display()
            ));
        }
        return Ok(());
    }

    let (paper, _) = pipeline.process_document(&input)?;
    if args.print {
        let json =
            serde_json::to_string_pretty(&paper.questions).context("serialize questions")?;
        println!("{json}");
    }
    Ok(())
}
