//! Artifact types flowing through the pipeline.
//!
//! A [`SourceArtifact`] is a discovered input file, an [`Artifact`] is the
//! value threaded from one transform unit to the next, and an
//! [`OutputArtifact`] is a fully resolved file ready to be written.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The declared kind of an asset.
///
/// Transform units declare which kind they accept and which they produce;
/// chains are validated by comparing these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// JavaScript sources
    Script,
    /// Sass sources (indented `.sass` or braced `.scss`)
    Sass,
    /// Plain CSS
    Style,
    /// HTML templates before variable/asset substitution
    Template,
    /// Rendered HTML
    Markup,
    /// Raster images
    Image,
    /// Web fonts
    Font,
    /// Vector graphics (SVG)
    Vector,
    /// Anything else, copied verbatim
    Other,
}

impl AssetKind {
    /// Infer a kind from a file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "js" | "mjs" | "cjs" => AssetKind::Script,
            "sass" | "scss" => AssetKind::Sass,
            "css" => AssetKind::Style,
            "html" | "htm" => AssetKind::Template,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "bmp" | "ico" => AssetKind::Image,
            "woff" | "woff2" | "ttf" | "otf" | "eot" => AssetKind::Font,
            "svg" => AssetKind::Vector,
            _ => AssetKind::Other,
        }
    }

    /// Default extension used when a unit turns an artifact into this kind.
    ///
    /// Returns `None` for kinds that keep whatever extension they had.
    pub fn default_extension(&self) -> Option<&'static str> {
        match self {
            AssetKind::Script => Some("js"),
            AssetKind::Sass => Some("scss"),
            AssetKind::Style => Some("css"),
            AssetKind::Template | AssetKind::Markup => Some("html"),
            AssetKind::Vector => Some("svg"),
            AssetKind::Image | AssetKind::Font | AssetKind::Other => None,
        }
    }

    /// Whether content of this kind is text that may carry a source map comment.
    pub fn supports_source_map(&self) -> bool {
        matches!(self, AssetKind::Script | AssetKind::Style)
    }

    /// Lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Script => "script",
            AssetKind::Sass => "sass",
            AssetKind::Style => "style",
            AssetKind::Template => "template",
            AssetKind::Markup => "markup",
            AssetKind::Image => "image",
            AssetKind::Font => "font",
            AssetKind::Vector => "vector",
            AssetKind::Other => "other",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single discovered input file. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArtifact {
    /// Path relative to the source root
    pub path: PathBuf,
    /// Declared kind (from the matching rule)
    pub kind: AssetKind,
    /// Raw file contents
    pub content: Vec<u8>,
}

impl SourceArtifact {
    pub fn new(path: impl Into<PathBuf>, kind: AssetKind, content: impl Into<Vec<u8>>) -> Self {
        Self { path: path.into(), kind, content: content.into() }
    }

    /// Convert into the value handed to the first unit of a chain.
    pub fn to_artifact(&self) -> Artifact {
        Artifact {
            path: self.path.clone(),
            kind: self.kind,
            content: self.content.clone(),
            source_map: None,
        }
    }
}

/// Intermediate value passed between transform units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Logical path relative to the source root. Units update the extension
    /// when they change the kind (`style.sass` becomes `style.css`).
    pub path: PathBuf,
    /// Current kind
    pub kind: AssetKind,
    /// Current contents
    pub content: Vec<u8>,
    /// Source map (v3 JSON) describing the last unit that produced one
    pub source_map: Option<String>,
}

impl Artifact {
    /// Content as UTF-8 text.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.content)
    }

    /// Produce a derived artifact with new kind and content.
    ///
    /// The extension follows the new kind when it differs from the old one.
    pub fn derive(&self, kind: AssetKind, content: impl Into<Vec<u8>>) -> Artifact {
        let path = if kind != self.kind {
            match kind.default_extension() {
                Some(ext) => self.path.with_extension(ext),
                None => self.path.clone(),
            }
        } else {
            self.path.clone()
        };
        Artifact { path, kind, content: content.into(), source_map: None }
    }

    /// Attach a source map.
    pub fn with_source_map(mut self, map: String) -> Self {
        self.source_map = Some(map);
        self
    }
}

/// A produced file with its final destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputArtifact {
    /// Destination relative to the output root
    pub destination: PathBuf,
    /// Source file (relative to the source root) this output came from
    pub source: PathBuf,
    /// Kind of the produced content
    pub kind: AssetKind,
    /// Bytes to write
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl OutputArtifact {
    /// Destination rendered with `/` separators, as used in URLs and manifests.
    pub fn url_path(&self) -> String {
        to_slash(&self.destination)
    }
}

/// Render a relative path with forward slashes regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
