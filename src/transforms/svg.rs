//! SVG optimizer (`svgo`).
//!
//! A conservative subset of what svgo does by default: strip the XML
//! prolog, doctype, comments, `<title>`/`<desc>`/`<metadata>`, editor
//! (Inkscape/Sodipodi) elements and attributes, empty attributes and empty
//! groups; collapse whitespace between tags; drop the root `width`/`height`
//! when a `viewBox` makes them redundant.

use regex::Regex;
use std::sync::LazyLock;

use super::{Stage, Transform, TransformError, TransformOptions};
use crate::artifact::{Artifact, AssetKind};

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("svg pattern is valid")
}

static PROLOG: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"(?s)<\?xml.*?\?>"),
        pattern(r"(?is)<!DOCTYPE[^>\[]*(\[.*?\])?\s*>"),
        pattern(r"(?s)<!--.*?-->"),
    ]
});

static NON_RENDERING: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["title", "desc", "metadata"]
        .iter()
        .flat_map(|name| {
            [
                pattern(&format!(r"(?is)<{name}\b[^>]*/>")),
                pattern(&format!(r"(?is)<{name}\b[^>]*>.*?</{name}\s*>")),
            ]
        })
        .chain([
            pattern(r"(?is)<(?:sodipodi|inkscape):[\w.-]+\b[^>]*/>"),
            pattern(concat!(
                r"(?is)<(?:sodipodi|inkscape):[\w.-]+\b[^>]*>",
                r".*?</(?:sodipodi|inkscape):[\w.-]+\s*>",
            )),
        ])
        .collect()
});

static EDITOR_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r#"\s+(?:xmlns:)?(?:sodipodi|inkscape)(?::[\w.-]+)?\s*=\s*("[^"]*"|'[^']*')"#)
});

static EMPTY_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| pattern(r#"\s+[\w:.-]+\s*=\s*(""|'')"#));

static EMPTY_GROUP: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?s)<g\b[^>]*/>|<g\b[^>]*>\s*</g\s*>"));

static BETWEEN_TAGS: LazyLock<Regex> = LazyLock::new(|| pattern(r">\s+<"));

static ROOT: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?s)<svg\b[^>]*>"));

static ROOT_SIZE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"\s+(?:width|height)\s*=\s*("[^"]*"|'[^']*')"#));

/// `svgo`: vector → vector, minify stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgOptimize;

impl Transform for SvgOptimize {
    fn name(&self) -> &str {
        "svgo"
    }

    fn accepts(&self) -> AssetKind {
        AssetKind::Vector
    }

    fn produces(&self) -> AssetKind {
        AssetKind::Vector
    }

    fn stage(&self) -> Stage {
        Stage::Minify
    }

    fn apply(
        &self,
        input: Artifact,
        _options: &TransformOptions,
    ) -> Result<Vec<Artifact>, TransformError> {
        let svg = input.text().map_err(TransformError::not_utf8)?;
        let optimized = optimize_svg(svg)?;
        Ok(vec![input.derive(AssetKind::Vector, optimized)])
    }
}

/// Optimize an SVG document.
pub fn optimize_svg(svg: &str) -> Result<String, TransformError> {
    if !svg.contains("<svg") {
        return Err(TransformError::new("no <svg> element found"));
    }

    let mut doc = svg.to_string();
    for re in PROLOG.iter().chain(NON_RENDERING.iter()) {
        doc = re.replace_all(&doc, "").into_owned();
    }
    doc = EDITOR_ATTRIBUTE.replace_all(&doc, "").into_owned();
    doc = EMPTY_ATTRIBUTE.replace_all(&doc, "").into_owned();

    // Removing one empty group can empty its parent.
    loop {
        let next = EMPTY_GROUP.replace_all(&doc, "").into_owned();
        if next == doc {
            break;
        }
        doc = next;
    }

    doc = BETWEEN_TAGS.replace_all(&doc, "><").into_owned();

    let root = ROOT
        .find(&doc)
        .filter(|root| root.as_str().contains("viewBox"))
        .map(|root| (root.range(), ROOT_SIZE.replace_all(root.as_str(), "").into_owned()));
    if let Some((range, trimmed)) = root {
        doc.replace_range(range, &trimmed);
    }

    Ok(doc.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const INKSCAPE: &str = r##"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<!-- Created with Inkscape -->
<svg
   xmlns="http://www.w3.org/2000/svg"
   xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
   xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
   width="24" height="24" viewBox="0 0 24 24" class=""
   inkscape:version="1.2">
  <title>Icon</title>
  <desc>An icon</desc>
  <metadata><rdf:RDF/></metadata>
  <sodipodi:namedview id="nv" pagecolor="#ffffff"/>
  <g inkscape:label="Layer 1">
    <path d="M0 0h24v24H0z"/>
  </g>
  <g><g></g></g>
</svg>
"##;

    #[test]
    fn test_optimize_inkscape_output() {
        let out = optimize_svg(INKSCAPE).unwrap();
        assert_eq!(
            out,
            r#"<svg
   xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><g><path d="M0 0h24v24H0z"/></g></svg>"#
        );
    }

    #[test]
    fn test_keeps_size_without_viewbox() {
        let svg = r#"<svg width="10" height="10"><rect width="10" height="10"/></svg>"#;
        assert_eq!(optimize_svg(svg).unwrap(), svg);
    }

    #[test]
    fn test_rejects_non_svg() {
        assert!(optimize_svg("<html></html>").is_err());
    }

    #[test]
    fn test_doctype_with_internal_subset() {
        let out = optimize_svg("<!DOCTYPE svg [ <!ENTITY a \"b\"> ]>\n<svg/>").unwrap();
        assert_eq!(out, "<svg/>");
    }
}
