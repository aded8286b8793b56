use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{
    find_default_config, load_config, AppConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME,
};
use crate::images::{ImageSettings, DEFAULT_IMAGES_DIR};

pub const DEFAULT_OUTPUT_DIR: &str = "processed_data/answers";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub workdir: PathBuf,
    /// Config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub images: ImageSettings,
}

impl PipelineConfig {
    /// CLI values win over the config file, which wins over built-in defaults.
    pub fn from_paths_and_args(
        input: &Path,
        config_path: Option<PathBuf>,
        output_dir: Option<PathBuf>,
        images_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let workdir = if input.is_dir() {
            input.to_path_buf()
        } else {
            input
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        };
        let workdir = workdir.canonicalize().unwrap_or(workdir);

        let cfg_file = config_path
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, CONFIG_FILE_NAME));

        let mut file_cfg = AppConfig::default();
        let mut loaded = None;
        if let Some(p) = cfg_file {
            if p.exists() {
                file_cfg = load_config(&p)?;
                log::info!("config: {}", p.display());
                loaded = Some(p);
            } else {
                log::warn!("config not found, using defaults: {}", p.display());
            }
        }
        let config_dir = loaded
            .as_deref()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf());
        let from_file = |p: &PathBuf| match config_dir.as_ref() {
            Some(dir) if p.is_relative() => dir.join(p),
            _ => p.clone(),
        };

        let output_dir = output_dir
            .or_else(|| file_cfg.output.dir.as_ref().map(&from_file))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let images_dir = images_dir
            .or_else(|| file_cfg.output.images_dir.as_ref().map(&from_file))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGES_DIR));

        let defaults = ImageSettings::default();
        let images = ImageSettings {
            dir: images_dir,
            convert_formats: file_cfg
                .images
                .convert_formats
                .clone()
                .unwrap_or(defaults.convert_formats),
            converter: file_cfg
                .images
                .converter
                .clone()
                .filter(|argv| !argv.is_empty())
                .unwrap_or(defaults.converter),
        };

        Ok(Self {
            workdir,
            config_path: loaded,
            output_dir,
            images,
        })
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[output]
# One JSON file per paper: <year>-<province>-<city>-<subject>-<exam_type>.json
# Relative paths are resolved against this file's directory.
dir = "processed_data/answers"
images_dir = "processed_data/images"

[images]
# Media subtypes converted to PNG after extraction. The original file is kept when
# conversion fails.
convert_formats = ["x-wmf", "x-emf"]
# Converter command; the input and output paths are appended.
converter = ["magick", "convert"]
"#;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{init_default_config, PipelineConfig, DEFAULT_CONFIG_TOML};
    use crate::config::AppConfig;

    #[test]
    fn default_config_parses() {
        let cfg: AppConfig = toml::from_str(DEFAULT_CONFIG_TOML).expect("toml");
        assert_eq!(
            cfg.images.convert_formats,
            Some(vec!["x-wmf".to_string(), "x-emf".to_string()])
        );
        assert_eq!(cfg.output.dir, Some(PathBuf::from("processed_data/answers")));
    }

    #[test]
    fn init_does_not_overwrite_without_force() {
        let tmp = tempfile::tempdir().expect("tmp");
        let p = init_default_config(tmp.path(), false).expect("init");
        std::fs::write(&p, "# mine\n").expect("write");
        init_default_config(tmp.path(), false).expect("init again");
        assert_eq!(std::fs::read_to_string(&p).expect("read"), "# mine\n");
        init_default_config(tmp.path(), true).expect("force");
        assert_eq!(std::fs::read_to_string(&p).expect("read"), DEFAULT_CONFIG_TOML);
    }

    #[test]
    fn file_values_resolve_against_config_dir_and_cli_wins() {
        let tmp = tempfile::tempdir().expect("tmp");
        let cfg_path = tmp.path().join("exam-extract.toml");
        std::fs::write(
            &cfg_path,
            "[output]\ndir = \"json\"\nimages_dir = \"img\"\n[images]\nconverter = []\n",
        )
        .expect("write");
        let input = tmp.path().join("paper.docx");

        let cfg = PipelineConfig::from_paths_and_args(&input, Some(cfg_path.clone()), None, None)
            .expect("cfg");
        assert_eq!(cfg.output_dir, tmp.path().join("json"));
        assert_eq!(cfg.images.dir, tmp.path().join("img"));
        assert_eq!(cfg.images.converter, vec!["magick", "convert"]);
        assert_eq!(cfg.config_path.as_deref(), Some(cfg_path.as_path()));

        let cfg = PipelineConfig::from_paths_and_args(
            &input,
            Some(cfg_path),
            Some(PathBuf::from("cli-out")),
            None,
        )
        .expect("cfg");
        assert_eq!(cfg.output_dir, PathBuf::from("cli-out"));
    }
}
