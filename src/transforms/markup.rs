//! HTML minifier (`html-minify`).
//!
//! Removes comments, keeping Internet Explorer conditional comments, and
//! collapses whitespace in text. Whitespace-only text spanning a line break
//! is dropped entirely. The contents of `pre`, `textarea`, `script` and
//! `style` elements are copied verbatim.

use super::{Stage, Transform, TransformError, TransformOptions};
use crate::artifact::{Artifact, AssetKind};

/// Elements whose content must not be touched.
const RAW_ELEMENTS: &[&str] = &["pre", "textarea", "script", "style"];

/// `html-minify`: markup → markup, minify stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlMinify;

impl Transform for HtmlMinify {
    fn name(&self) -> &str {
        "html-minify"
    }

    fn accepts(&self) -> AssetKind {
        AssetKind::Markup
    }

    fn produces(&self) -> AssetKind {
        AssetKind::Markup
    }

    fn stage(&self) -> Stage {
        Stage::Minify
    }

    fn apply(
        &self,
        input: Artifact,
        _options: &TransformOptions,
    ) -> Result<Vec<Artifact>, TransformError> {
        let html = input.text().map_err(TransformError::not_utf8)?;
        let minified = minify_html(html)?;
        Ok(vec![input.derive(AssetKind::Markup, minified)])
    }
}

fn line_at(html: &str, offset: usize) -> usize {
    html[..offset].matches('\n').count() + 1
}

/// End offset (exclusive) of the tag starting at `start`, honoring quoted
/// attribute values.
fn tag_end(html: &str, start: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (offset, c) in html[start..].char_indices() {
        match (c, quote) {
            ('"' | '\'', None) => quote = Some(c),
            (q, Some(open)) if q == open => quote = None,
            ('>', None) => return Some(start + offset + 1),
            _ => {}
        }
    }
    None
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn collapse_text(text: &str, out: &mut String) {
    if text.trim().is_empty() {
        if !text.contains('\n') && !text.is_empty() {
            out.push(' ');
        }
        return;
    }

    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
}

/// Minify an HTML document.
pub fn minify_html(html: &str) -> Result<String, TransformError> {
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while pos < html.len() {
        let Some(relative) = html[pos..].find('<') else {
            collapse_text(&html[pos..], &mut out);
            break;
        };
        let start = pos + relative;
        collapse_text(&html[pos..start], &mut out);

        if html[start..].starts_with("<!--") {
            let end = html[start..]
                .find("-->")
                .map(|i| start + i + 3)
                .ok_or_else(|| {
                    TransformError::with_line(line_at(html, start), "unterminated comment")
                })?;
            let comment = &html[start..end];
            if comment.starts_with("<!--[if") || comment.ends_with("<![endif]-->") {
                out.push_str(comment);
            }
            pos = end;
            continue;
        }

        let end = tag_end(html, start)
            .ok_or_else(|| TransformError::with_line(line_at(html, start), "unterminated tag"))?;
        let tag = &html[start..end];
        out.push_str(tag);
        pos = end;

        let name = tag_name(tag);
        if RAW_ELEMENTS.contains(&name.as_str()) && !tag.ends_with("/>") {
            let closing = format!("</{}", name);
            let Some(close) = lower[pos..].find(&closing) else {
                return Err(TransformError::with_line(
                    line_at(html, start),
                    format!("unclosed <{}> element", name),
                ));
            };
            out.push_str(&html[pos..pos + close]);
            pos += close;
        }
    }

    Ok(out.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_inter_tag_whitespace() {
        let html = "<!DOCTYPE html>\n<html>\n  <body>\n    \
                    <p>Hello   <b>big</b>  world</p>\n  </body>\n</html>\n";
        assert_eq!(
            minify_html(html).unwrap(),
            "<!DOCTYPE html><html><body><p>Hello <b>big</b> world</p></body></html>"
        );
    }

    #[test]
    fn test_removes_comments_keeps_conditionals() {
        let html =
            "<p>a</p><!-- note --><!--[if lt IE 9]><script src=\"x.js\"></script><![endif]-->";
        assert_eq!(
            minify_html(html).unwrap(),
            "<p>a</p><!--[if lt IE 9]><script src=\"x.js\"></script><![endif]-->"
        );
    }

    #[test]
    fn test_preserves_raw_elements() {
        let html = "<pre>  keep\n   this </pre>\n<script>\n  if (a  <  b) {}\n</script>";
        assert_eq!(
            minify_html(html).unwrap(),
            "<pre>  keep\n   this </pre><script>\n  if (a  <  b) {}\n</script>"
        );
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let html = "<a title=\"a > b\">x</a>";
        assert_eq!(minify_html(html).unwrap(), html);
    }

    #[test]
    fn test_errors() {
        assert_eq!(minify_html("<p>\n<!-- open").unwrap_err().line, Some(2));
        assert!(minify_html("<a href=\"x\"").is_err());
        assert!(minify_html("<style> a {}").is_err());
    }

    #[test]
    fn test_is_minify_stage() {
        assert_eq!(HtmlMinify.stage(), Stage::Minify);
    }
}
