//! Output path templates.
//!
//! Derives an output location from a source path, the produced artifact and
//! a naming template such as `css/[name].[hash].[ext]`.
//!
//! Supported tokens:
//! - `[name]` - file stem of the produced artifact
//! - `[ext]` - extension of the produced artifact (follows the produced kind)
//! - `[path]` - directory of the source relative to the source root, with a
//!   trailing `/` (empty at the root)
//! - `[hash]`, `[contenthash]` - hex SHA-256 prefix of the output content,
//!   optionally with a length: `[hash:12]`

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::artifact::to_slash;

/// Default number of hex characters rendered for `[hash]`.
pub const DEFAULT_HASH_LENGTH: usize = 8;

/// Error parsing an output template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("output template is empty")]
    Empty,
    #[error("unknown token '[{0}]' in output template")]
    UnknownToken(String),
    #[error("unterminated '[' in output template '{0}'")]
    Unterminated(String),
    #[error("invalid hash length '{0}' (expected 1-64)")]
    HashLength(String),
    #[error("output template '{0}' must be relative and must not contain '..'")]
    EscapesOutput(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Name,
    Ext,
    Path,
    Hash(usize),
}

/// A parsed output naming template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl OutputTemplate {
    /// Parse a template string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if raw.trim().is_empty() {
            return Err(TemplateError::Empty);
        }
        if raw.starts_with('/') || raw.starts_with('\\') || raw.split('/').any(|part| part == "..")
        {
            return Err(TemplateError::EscapesOutput(raw.to_string()));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some(open) = rest.find('[') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close =
                after.find(']').ok_or_else(|| TemplateError::Unterminated(raw.to_string()))?;
            let token = &after[..close];

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(parse_token(token)?);
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { raw: raw.to_string(), segments })
    }

    /// The template as written in the configuration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the template contains a content hash token.
    pub fn uses_hash(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Hash(_)))
    }

    /// Resolve a destination path (relative to the output root).
    ///
    /// # Arguments
    /// - `source` - source path relative to the source root (drives `[path]`)
    /// - `artifact` - logical path of the produced artifact (drives `[name]`/`[ext]`)
    /// - `content` - produced bytes (drives `[hash]`)
    /// - `hash_names` - when false, hash tokens render empty and drop one
    ///   adjacent separator
    pub fn resolve(
        &self,
        source: &Path,
        artifact: &Path,
        content: &[u8],
        hash_names: bool,
    ) -> PathBuf {
        let mut out = String::new();
        let mut drop_leading_separator = false;

        for segment in &self.segments {
            let rendered = match segment {
                Segment::Literal(text) => {
                    let text = if drop_leading_separator {
                        text.strip_prefix(is_separator).unwrap_or(text)
                    } else {
                        text
                    };
                    drop_leading_separator = false;
                    out.push_str(text);
                    continue;
                }
                Segment::Name => artifact
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                Segment::Ext => artifact
                    .extension()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                Segment::Path => match source.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => {
                        format!("{}/", to_slash(parent))
                    }
                    _ => String::new(),
                },
                Segment::Hash(len) if hash_names => content_hash(content, *len),
                Segment::Hash(_) => String::new(),
            };

            if rendered.is_empty() && !matches!(segment, Segment::Path | Segment::Name) {
                // Collapse `style.[hash].css` to `style.css`.
                if out.ends_with(is_separator) {
                    out.pop();
                } else {
                    drop_leading_separator = true;
                }
            } else {
                drop_leading_separator = false;
                out.push_str(&rendered);
            }
        }

        out.split('/').filter(|part| !part.is_empty() && *part != ".").collect()
    }
}

impl FromStr for OutputTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OutputTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '-' | '_')
}

fn parse_token(token: &str) -> Result<Segment, TemplateError> {
    let (name, arg) = match token.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (token, None),
    };

    match (name, arg) {
        ("name", None) => Ok(Segment::Name),
        ("ext", None) => Ok(Segment::Ext),
        ("path", None) => Ok(Segment::Path),
        ("hash" | "contenthash", None) => Ok(Segment::Hash(DEFAULT_HASH_LENGTH)),
        ("hash" | "contenthash", Some(len)) => match len.parse::<usize>() {
            Ok(n) if (1..=64).contains(&n) => Ok(Segment::Hash(n)),
            _ => Err(TemplateError::HashLength(len.to_string())),
        },
        _ => Err(TemplateError::UnknownToken(token.to_string())),
    }
}

/// Public URL of a destination (relative to the output root, `/`-separated).
///
/// An empty `public_path` yields a root-relative URL.
pub fn public_url(public_path: &str, destination: &str) -> String {
    if public_path.is_empty() {
        format!("/{}", destination)
    } else if public_path.ends_with('/') {
        format!("{}{}", public_path, destination)
    } else {
        format!("{}/{}", public_path, destination)
    }
}

/// Hex SHA-256 of `content`, truncated to `len` characters.
pub fn content_hash(content: &[u8], len: usize) -> String {
    let digest = Sha256::digest(content);
    let mut hex = String::with_capacity(64);
    for byte in digest.iter() {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex.truncate(len.min(64));
    hex
}
