use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "exam-extract.toml";
pub const CONFIG_ENV_VAR: &str = "EXAM_EXTRACT_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub images: ImagesSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct OutputSection {
    /// JSON output directory. Relative paths resolve against the config file's directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Directory for extracted images.
    #[serde(default)]
    pub images_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ImagesSection {
    /// Media subtypes (`x-wmf`, `x-emf`, ...) that get converted to PNG.
    #[serde(default)]
    pub convert_formats: Option<Vec<String>>,
    /// Converter argv prefix, e.g. `["magick", "convert"]`.
    #[serde(default)]
    pub converter: Option<Vec<String>>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 8) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}
