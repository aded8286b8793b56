use std::collections::HashMap;

use crate::docx::package::DocxPackage;
use crate::docx::xml::{find_attr, XmlEvent, XmlPart};

/// Image bytes plus declared media type (`image/png`, `image/x-wmf`, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedImage<'a> {
    pub bytes: &'a [u8],
    pub content_type: String,
}

impl EmbeddedImage<'_> {
    /// Subtype after the slash; used as the file extension.
    pub fn format(&self) -> &str {
        self.content_type
            .rsplit_once('/')
            .map(|(_, sub)| sub)
            .unwrap_or(self.content_type.as_str())
    }
}

/// Resolves an image relationship id of the main document part.
pub trait ImageSource {
    fn image(&self, rid: &str) -> Option<EmbeddedImage<'_>>;
}

/// Relationship targets and content types of `word/document.xml`.
#[derive(Default)]
pub struct MediaIndex {
    targets: HashMap<String, String>,
    overrides: HashMap<String, String>,
    defaults: HashMap<String, String>,
}

impl MediaIndex {
    pub fn from_parts(rels: Option<&XmlPart>, content_types: Option<&XmlPart>) -> Self {
        let mut index = Self::default();
        if let Some(rels) = rels {
            for ev in &rels.events {
                let (XmlEvent::Empty { name, attrs } | XmlEvent::Start { name, attrs }) = ev else {
                    continue;
                };
                if name != "Relationship" {
                    continue;
                }
                if find_attr(attrs, "TargetMode") == Some("External") {
                    continue;
                }
                let id = find_attr(attrs, "Id").unwrap_or("").trim();
                let target = find_attr(attrs, "Target").unwrap_or("").trim();
                if id.is_empty() || target.is_empty() {
                    continue;
                }
                index
                    .targets
                    .insert(id.to_string(), normalize_target("word/", target));
            }
        }
        if let Some(ct) = content_types {
            for ev in &ct.events {
                let (XmlEvent::Empty { name, attrs } | XmlEvent::Start { name, attrs }) = ev else {
                    continue;
                };
                let Some(content_type) = find_attr(attrs, "ContentType") else {
                    continue;
                };
                if name == "Override" {
                    if let Some(part) = find_attr(attrs, "PartName") {
                        index.overrides.insert(
                            part.trim_start_matches('/').to_string(),
                            content_type.to_string(),
                        );
                    }
                } else if name == "Default" {
                    if let Some(ext) = find_attr(attrs, "Extension") {
                        index
                            .defaults
                            .insert(ext.to_ascii_lowercase(), content_type.to_string());
                    }
                }
            }
        }
        index
    }

    pub fn target(&self, rid: &str) -> Option<&str> {
        self.targets.get(rid).map(|s| s.as_str())
    }

    pub fn content_type(&self, part_name: &str) -> Option<String> {
        if let Some(ct) = self.overrides.get(part_name) {
            return Some(ct.clone());
        }
        let ext = part_name.rsplit_once('.')?.1.to_ascii_lowercase();
        self.defaults
            .get(&ext)
            .cloned()
            .or_else(|| guess_image_type(&ext).map(|s| s.to_string()))
    }
}

fn normalize_target(base: &str, target: &str) -> String {
    let mut t = target.replace('\\', "/");
    if let Some(abs) = t.strip_prefix('/') {
        return abs.to_string();
    }
    while let Some(rest) = t.strip_prefix("../") {
        t = rest.to_string();
    }
    format!("{base}{t}")
}

fn guess_image_type(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "wmf" => "image/x-wmf",
        "emf" => "image/x-emf",
        "svg" => "image/svg+xml",
        _ => return None,
    })
}

/// `ImageSource` over a loaded package.
pub struct PackageImages<'p> {
    pub package: &'p DocxPackage,
    pub index: &'p MediaIndex,
}

impl ImageSource for PackageImages<'_> {
    fn image(&self, rid: &str) -> Option<EmbeddedImage<'_>> {
        let part_name = self.index.target(rid)?;
        let content_type = self.index.content_type(part_name)?;
        if !content_type.starts_with("image/") {
            return None;
        }
        let bytes = self.package.part(part_name)?;
        Some(EmbeddedImage {
            bytes,
            content_type,
        })
    }
}
