pub mod blocks;
pub mod media;
pub mod package;
pub mod xml;

use std::path::Path;

use anyhow::Context;

use blocks::{read_body_blocks, Block};
use media::{MediaIndex, PackageImages};
use package::DocxPackage;
use xml::parse_xml_part;

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// A loaded `.docx`: body blocks in order plus access to the embedded images.
pub struct DocxDocument {
    package: DocxPackage,
    pub blocks: Vec<Block>,
    index: MediaIndex,
}

impl DocxDocument {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let package = DocxPackage::read(path)?;
        Self::from_package(package).with_context(|| format!("load docx: {}", path.display()))
    }

    pub fn from_package(package: DocxPackage) -> anyhow::Result<Self> {
        let doc_bytes = package.require_part(DOCUMENT_PART)?;
        let doc = parse_xml_part(DOCUMENT_PART, doc_bytes)
            .with_context(|| format!("parse {DOCUMENT_PART}"))?;
        let blocks = read_body_blocks(&doc);

        let rels = package
            .part(DOCUMENT_RELS_PART)
            .map(|b| parse_xml_part(DOCUMENT_RELS_PART, b))
            .transpose()
            .with_context(|| format!("parse {DOCUMENT_RELS_PART}"))?;
        let content_types = package
            .part(CONTENT_TYPES_PART)
            .map(|b| parse_xml_part(CONTENT_TYPES_PART, b))
            .transpose()
            .with_context(|| format!("parse {CONTENT_TYPES_PART}"))?;
        let index = MediaIndex::from_parts(rels.as_ref(), content_types.as_ref());

        Ok(Self {
            package,
            blocks,
            index,
        })
    }

    pub fn images(&self) -> PackageImages<'_> {
        PackageImages {
            package: &self.package,
            index: &self.index,
        }
    }
}
