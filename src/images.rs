use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context};
use sha2::{Digest, Sha256};

use crate::docx::media::EmbeddedImage;

pub const DEFAULT_IMAGES_DIR: &str = "processed_data/images";

#[derive(Clone, Debug)]
pub struct ImageSettings {
    pub dir: PathBuf,
    /// Media subtypes (`x-wmf`, ...) converted to PNG after writing.
    pub convert_formats: Vec<String>,
    /// Converter argv prefix; input and output paths are appended.
    pub converter: Vec<String>,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_IMAGES_DIR),
            convert_formats: vec!["x-wmf".to_string(), "x-emf".to_string()],
            converter: vec!["magick".to_string(), "convert".to_string()],
        }
    }
}

/// First 8 hex chars of the SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let mut h = hex::encode(hasher.finalize());
    h.truncate(8);
    h
}

/// Writes image files named by owner id and content hash.
pub struct ImageStore {
    settings: ImageSettings,
}

impl ImageStore {
    pub fn new(settings: ImageSettings) -> Self {
        Self { settings }
    }

    pub fn dir(&self) -> &Path {
        &self.settings.dir
    }

    fn needs_conversion(&self, format: &str) -> bool {
        self.settings
            .convert_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(format))
    }

    /// Persists `image` (at most once per name) and returns the file name to reference.
    pub fn persist(&self, owner: &str, image: &EmbeddedImage<'_>) -> anyhow::Result<String> {
        let dir = self.dir();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create images dir: {}", dir.display()))?;

        let stem = format!("{owner}_{}", content_hash(image.bytes));
        let format = sanitize_extension(image.format());
        let file_name = format!("{stem}.{format}");
        let path = dir.join(&file_name);

        if !self.needs_conversion(&format) {
            write_new(&path, image.bytes)?;
            return Ok(file_name);
        }

        let png_name = format!("{stem}.png");
        let png_path = dir.join(&png_name);
        if png_path.exists() {
            return Ok(png_name);
        }
        write_new(&path, image.bytes)?;
        match self.convert(&path, &png_path) {
            Ok(()) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    log::debug!("keep {}: {e}", path.display());
                }
                Ok(png_name)
            }
            Err(e) => {
                log::warn!("image conversion failed, keeping {file_name}: {e:#}");
                Ok(file_name)
            }
        }
    }

    fn convert(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        let (program, args) = self
            .settings
            .converter
            .split_first()
            .ok_or_else(|| anyhow!("no image converter configured"))?;
        let status = Command::new(program)
            .args(args)
            .arg(input)
            .arg(output)
            .status()
            .with_context(|| format!("run converter: {program}"))?;
        if !status.success() {
            return Err(anyhow!("{program} exited with {status}"));
        }
        if !output.exists() {
            return Err(anyhow!("{program} produced no output: {}", output.display()));
        }
        Ok(())
    }
}

/// Create-if-absent; an existing file of the same name already holds the same bytes.
fn write_new(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut f) => f
            .write_all(bytes)
            .with_context(|| format!("write image: {}", path.display())),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e).with_context(|| format!("create image: {}", path.display())),
    }
}

fn sanitize_extension(format: &str) -> String {
    let ext: String = format
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        "bin".to_string()
    } else {
        ext
    }
}

#[cfg(test)]
mod tests {
    use super::{content_hash, ImageSettings, ImageStore};
    use crate::docx::media::EmbeddedImage;

    fn store(dir: &std::path::Path, converter: &[&str]) -> ImageStore {
        ImageStore::new(ImageSettings {
            dir: dir.to_path_buf(),
            converter: converter.iter().map(|s| s.to_string()).collect(),
            ..ImageSettings::default()
        })
    }

    #[test]
    fn hash_is_stable_and_short() {
        let h = content_hash(b"abc");
        assert_eq!(h, "ba7816bf");
        assert_eq!(content_hash(b"abc"), h);
        assert_ne!(content_hash(b"abd"), h);
    }

    #[test]
    fn persists_once_per_name() {
        let tmp = tempfile::tempdir().expect("tmp");
        let store = store(tmp.path(), &[]);
        let img = EmbeddedImage {
            bytes: b"png-bytes",
            content_type: "image/png".to_string(),
        };
        let name = store.persist("q-01", &img).expect("persist");
        assert_eq!(name, format!("q-01_{}.png", content_hash(b"png-bytes")));
        let again = store.persist("q-01", &img).expect("persist again");
        assert_eq!(again, name);
        let files: Vec<_> = std::fs::read_dir(tmp.path()).expect("dir").collect();
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(tmp.path().join(&name)).expect("read"), b"png-bytes");
    }

    #[test]
    fn failed_conversion_keeps_original() {
        let tmp = tempfile::tempdir().expect("tmp");
        let store = store(tmp.path(), &["exam-extract-no-such-converter"]);
        let img = EmbeddedImage {
            bytes: b"wmf-bytes",
            content_type: "image/x-wmf".to_string(),
        };
        let name = store.persist("q-02", &img).expect("persist");
        assert!(name.ends_with(".x-wmf"));
        assert!(tmp.path().join(&name).exists());
    }

    #[cfg(unix)]
    #[test]
    fn converted_image_replaces_original() {
        let tmp = tempfile::tempdir().expect("tmp");
        let store = store(tmp.path(), &["cp"]);
        let img = EmbeddedImage {
            bytes: b"emf-bytes",
            content_type: "image/x-emf".to_string(),
        };
        let name = store.persist("q-03", &img).expect("persist");
        assert_eq!(name, format!("q-03_{}.png", content_hash(b"emf-bytes")));
        let again = store.persist("q-03", &img).expect("persist again");
        assert_eq!(again, name);
        let files: Vec<String> = std::fs::read_dir(tmp.path())
            .expect("dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec![name]);
    }
}
