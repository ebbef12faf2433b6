//! Template unit: HTML with `{{ ... }}` placeholders.
//!
//! - `{{ name }}` expands a variable from `[templates.vars]`
//! - `{{ mode }}` and `{{ public_path }}` are always defined
//! - `{{ asset "img/logo.png" }}` expands to the public path of that source's
//!   primary output. Paths are relative to the source root; paths starting
//!   with `./` or `../` are relative to the template's directory.
//!
//! Unknown variables and assets are errors, so a typo never ships a broken
//! link.

use regex::{Captures, Regex};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use super::{Transform, TransformError, TransformOptions};
use crate::artifact::{to_slash, Artifact, AssetKind};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{\s*(?:asset\s+"([^"]*)"|([A-Za-z_][A-Za-z0-9_.-]*))\s*\}\}"#)
        .expect("placeholder regex is valid")
});

/// `template`: template → markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateUnit;

impl Transform for TemplateUnit {
    fn name(&self) -> &str {
        "template"
    }

    fn accepts(&self) -> AssetKind {
        AssetKind::Template
    }

    fn produces(&self) -> AssetKind {
        AssetKind::Markup
    }

    fn needs_assets(&self) -> bool {
        true
    }

    fn apply(
        &self,
        input: Artifact,
        options: &TransformOptions,
    ) -> Result<Vec<Artifact>, TransformError> {
        let source = input.text().map_err(TransformError::not_utf8)?;
        let rendered = render(source, &input.path, options)?;
        Ok(vec![input.derive(AssetKind::Markup, rendered)])
    }
}

/// Normalize an asset reference to a source-root-relative key.
fn asset_key(template: &Path, reference: &str) -> String {
    let reference = reference.trim();
    let joined = if reference.starts_with("./") || reference.starts_with("../") {
        template.parent().unwrap_or(Path::new("")).join(reference)
    } else {
        PathBuf::from(reference.trim_start_matches('/'))
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
            _ => {}
        }
    }
    to_slash(&normalized)
}

fn render(source: &str, path: &Path, options: &TransformOptions) -> Result<String, TransformError> {
    let mut error = None;

    let rendered = PLACEHOLDER.replace_all(source, |caps: &Captures| {
        if error.is_some() {
            return String::new();
        }
        let whole = caps.get(0).map_or(0, |m| m.start());
        let line = source[..whole].matches('\n').count() + 1;

        if let Some(reference) = caps.get(1) {
            let key = asset_key(path, reference.as_str());
            match options.assets.get(&key) {
                Some(public) => return public.clone(),
                None => {
                    error = Some(TransformError::with_line(
                        line,
                        format!("unknown asset \"{}\"", reference.as_str()),
                    ));
                    return String::new();
                }
            }
        }

        let name = caps.get(2).map_or("", |m| m.as_str());
        match name {
            "mode" => options.mode.as_str().to_string(),
            "public_path" => options.public_path.clone(),
            _ => match options.vars.get(name) {
                Some(value) => value.clone(),
                None => {
                    let message = format!("undefined variable '{}'", name);
                    error = Some(TransformError::with_line(line, message));
                    String::new()
                }
            },
        }
    });

    match error {
        Some(err) => Err(err),
        None => Ok(rendered.into_owned()),
    }
}
