//! Script unit.
//!
//! JavaScript is not bundled or transpiled. The unit validates that strings,
//! template literals, regular expressions and comments are terminated, and in
//! minify mode strips comments and collapses whitespace. Line breaks are kept
//! (one per run of whitespace) so automatic semicolon insertion behaves the
//! same before and after minification. `/*! ... */` license comments survive.
//!
//! Source maps are line-granular: every generated line points at the source
//! line its first token came from.

use super::{Transform, TransformError, TransformOptions};
use crate::artifact::{to_slash, Artifact, AssetKind};

/// Keywords after which a `/` starts a regular expression.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// `script`: script → script.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptUnit;

impl Transform for ScriptUnit {
    fn name(&self) -> &str {
        "script"
    }

    fn accepts(&self) -> AssetKind {
        AssetKind::Script
    }

    fn produces(&self) -> AssetKind {
        AssetKind::Script
    }

    fn apply(
        &self,
        input: Artifact,
        options: &TransformOptions,
    ) -> Result<Vec<Artifact>, TransformError> {
        let source = input.text().map_err(TransformError::not_utf8)?;
        let scanned = scan(source)?;

        let (code, lines) = if options.minify {
            (scanned.text, scanned.lines)
        } else {
            let count = source.lines().count().max(1);
            (source.to_string(), (0..count).collect())
        };

        let mut output = input.derive(AssetKind::Script, code);
        if options.source_maps {
            output = output.with_source_map(line_source_map(&input, source, &lines));
        }
        Ok(vec![output])
    }
}

// ============================================================================
// Scanner
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Prev {
    Start,
    Word(String),
    Punct(char),
    Literal,
}

impl Prev {
    fn allows_regex(&self) -> bool {
        match self {
            Prev::Start => true,
            Prev::Word(word) => REGEX_KEYWORDS.contains(&word.as_str()),
            Prev::Punct(c) => "(,=:[!&|?{;+-*%<>~^".contains(*c),
            Prev::Literal => false,
        }
    }
}

/// Minified output plus, for every generated line, its 0-based source line.
#[derive(Debug, Default)]
struct Scanned {
    text: String,
    lines: Vec<usize>,
    pending_space: bool,
    pending_newline: bool,
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || !c.is_ascii()
}

fn needs_space(before: char, after: char) -> bool {
    (is_ident(before) && is_ident(after))
        || (before == '+' && after == '+')
        || (before == '-' && after == '-')
        || (before == '/' && after == '/')
}

impl Scanned {
    fn push(&mut self, token: &str, line: usize) {
        let Some(first) = token.chars().next() else {
            return;
        };

        if let Some(last) = self.text.chars().last() {
            if self.pending_newline {
                self.text.push('\n');
                self.lines.push(line);
            } else if self.pending_space && needs_space(last, first) {
                self.text.push(' ');
            }
        }
        if self.lines.is_empty() {
            self.lines.push(line);
        }
        self.pending_space = false;
        self.pending_newline = false;

        for (offset, _) in token.match_indices('\n').enumerate() {
            self.lines.push(line + offset + 1);
        }
        self.text.push_str(token);
    }
}

fn collect(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect()
}

fn count_newlines(chars: &[char]) -> usize {
    chars.iter().filter(|&&c| c == '\n').count()
}

/// Scan a script, returning its minified form.
fn scan(source: &str) -> Result<Scanned, TransformError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = Scanned::default();
    let mut prev = Prev::Start;
    let mut line = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            out.pending_newline = true;
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            out.pending_space = true;
            i += 1;
            continue;
        }

        match c {
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = i;
                let mut j = i + 2;
                while j + 1 < chars.len() && !(chars[j] == '*' && chars[j + 1] == '/') {
                    j += 1;
                }
                if j + 1 >= chars.len() {
                    return Err(TransformError::with_line(line + 1, "unterminated comment"));
                }
                let end = j + 2;
                if chars.get(start + 2) == Some(&'!') {
                    out.push(&collect(&chars, start, end), line);
                    out.pending_newline = true;
                } else {
                    out.pending_space = true;
                }
                line += count_newlines(&chars[start..end]);
                i = end;
            }
            '/' if prev.allows_regex() => {
                let start = i;
                let mut j = i + 1;
                let mut in_class = false;
                loop {
                    match chars.get(j) {
                        None | Some('\n') => {
                            return Err(TransformError::with_line(
                                line + 1,
                                "unterminated regular expression",
                            ))
                        }
                        Some('\\') => j += 2,
                        Some('[') => {
                            in_class = true;
                            j += 1;
                        }
                        Some(']') => {
                            in_class = false;
                            j += 1;
                        }
                        Some('/') if !in_class => {
                            j += 1;
                            break;
                        }
                        Some(_) => j += 1,
                    }
                }
                while j < chars.len() && chars[j].is_ascii_alphabetic() {
                    j += 1;
                }
                out.push(&collect(&chars, start, j), line);
                prev = Prev::Literal;
                i = j;
            }
            '"' | '\'' => {
                let start = i;
                let mut j = i + 1;
                let mut continued = 0;
                loop {
                    match chars.get(j) {
                        None | Some('\n') => {
                            let message = "unterminated string literal";
                            return Err(TransformError::with_line(line + 1, message));
                        }
                        Some('\\') => {
                            if chars.get(j + 1) == Some(&'\n') {
                                continued += 1;
                            }
                            j += 2;
                        }
                        Some(&q) if q == c => {
                            j += 1;
                            break;
                        }
                        Some(_) => j += 1,
                    }
                }
                out.push(&collect(&chars, start, j), line);
                line += continued;
                prev = Prev::Literal;
                i = j;
            }
            '`' => {
                let start = i;
                let mut j = i + 1;
                let mut depth = 0usize;
                loop {
                    match chars.get(j) {
                        None => {
                            let message = "unterminated template literal";
                            return Err(TransformError::with_line(line + 1, message));
                        }
                        Some('\\') => j += 2,
                        Some('$') if depth == 0 && chars.get(j + 1) == Some(&'{') => {
                            depth = 1;
                            j += 2;
                        }
                        Some('{') if depth > 0 => {
                            depth += 1;
                            j += 1;
                        }
                        Some('}') if depth > 0 => {
                            depth -= 1;
                            j += 1;
                        }
                        Some('`') if depth == 0 => {
                            j += 1;
                            break;
                        }
                        Some(_) => j += 1,
                    }
                }
                let end = j.min(chars.len());
                out.push(&collect(&chars, start, end), line);
                line += count_newlines(&chars[start..end]);
                prev = Prev::Literal;
                i = end;
            }
            _ if is_ident(c) => {
                let start = i;
                while i < chars.len() && is_ident(chars[i]) {
                    i += 1;
                }
                let word = collect(&chars, start, i);
                out.push(&word, line);
                prev = Prev::Word(word);
            }
            _ => {
                let mut buf = [0u8; 4];
                out.push(c.encode_utf8(&mut buf), line);
                prev = Prev::Punct(c);
                i += 1;
            }
        }
    }

    Ok(out)
}

// ============================================================================
// Source maps
// ============================================================================

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn vlq(value: i64, out: &mut String) {
    let mut v = if value < 0 { ((-value) << 1) | 1 } else { value << 1 };
    loop {
        let mut digit = (v & 31) as usize;
        v >>= 5;
        if v > 0 {
            digit |= 32;
        }
        out.push(BASE64[digit] as char);
        if v == 0 {
            break;
        }
    }
}

/// Encode one segment per generated line, each at column 0 of its source line.
fn line_mappings(lines: &[usize]) -> String {
    let mut mappings = String::new();
    let mut previous = 0i64;
    for (index, &line) in lines.iter().enumerate() {
        if index > 0 {
            mappings.push(';');
        }
        mappings.push_str("AA");
        vlq(line as i64 - previous, &mut mappings);
        mappings.push('A');
        previous = line as i64;
    }
    mappings
}

fn line_source_map(input: &Artifact, source: &str, lines: &[usize]) -> String {
    let file = input
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    serde_json::json!({
        "version": 3,
        "file": file,
        "sources": [to_slash(&input.path)],
        "sourcesContent": [source],
        "names": [],
        "mappings": line_mappings(lines),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::SourceArtifact;

    fn run(source: &str, options: &TransformOptions) -> Result<Artifact, TransformError> {
        let input = SourceArtifact::new("js/app.js", AssetKind::Script, source).to_artifact();
        ScriptUnit.apply(input, options).map(|mut out| out.remove(0))
    }

    fn minify(source: &str) -> String {
        let options = TransformOptions { minify: true, ..Default::default() };
        String::from_utf8(run(source, &options).unwrap().content).unwrap()
    }

    #[test]
    fn test_minify_collapses_whitespace_and_comments() {
        let source = "function add(a, b) {\n  // sum\n  return a + b;\n}\n";
        assert_eq!(minify(source), "function add(a,b){\nreturn a+b;\n}");
    }

    #[test]
    fn test_minify_keeps_strings_intact() {
        assert_eq!(
            minify("var s = 'a  //  b';  var t = \"x /* y */\";"),
            "var s='a  //  b';var t=\"x /* y */\";"
        );
    }

    #[test]
    fn test_minify_keeps_license_comments() {
        let out = minify("/*! (c) Example */\n/* drop */\nvar a = 1;");
        assert_eq!(out, "/*! (c) Example */\nvar a=1;");
    }

    #[test]
    fn test_minify_regex_literal() {
        assert_eq!(minify("var re = /a\\/b [/]/g; x = a / b / c;"), "var re=/a\\/b [/]/g;x=a/b/c;");
        assert_eq!(minify("return /\\d+/.test(s)"), "return/\\d+/.test(s)");
    }

    #[test]
    fn test_minify_template_literal() {
        assert_eq!(minify("let t = `a ${ {b: 1}.b }  c`;"), "let t=`a ${ {b: 1}.b }  c`;");
    }

    #[test]
    fn test_minify_separates_increments() {
        assert_eq!(minify("a + +b; c - -d"), "a+ +b;c- -d");
    }

    #[test]
    fn test_development_leaves_code_unchanged() {
        let source = "// keep\nconsole.log( 1 );\n";
        let out = run(source, &TransformOptions::default()).unwrap();
        assert_eq!(out.text().unwrap(), source);
    }

    #[test]
    fn test_unterminated_literals() {
        let err = run("var a = 1;\nvar b = 'oops;\n", &TransformOptions::default()).unwrap_err();
        assert_eq!(err.line, Some(2));
        assert_eq!(err.message, "unterminated string literal");

        assert!(run("/* open", &TransformOptions::default()).is_err());
        assert!(run("x = `open", &TransformOptions::default()).is_err());
        assert!(run("x = /open\n", &TransformOptions::default()).is_err());
    }

    #[test]
    fn test_identity_source_map() {
        let options = TransformOptions { source_maps: true, ..Default::default() };
        let out = run("a();\nb();\nc();\n", &options).unwrap();
        let map: serde_json::Value =
            serde_json::from_str(out.source_map.as_deref().unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["sources"][0], "js/app.js");
        assert_eq!(map["mappings"], "AAAA;AACA;AACA");
    }

    #[test]
    fn test_minified_source_map_tracks_lines() {
        let options = TransformOptions { minify: true, source_maps: true, ..Default::default() };
        let out = run("a();\n\n\nb();\n", &options).unwrap();
        assert_eq!(out.text().unwrap(), "a();\nb();");
        let map: serde_json::Value =
            serde_json::from_str(out.source_map.as_deref().unwrap()).unwrap();
        assert_eq!(map["mappings"], "AAAA;AAGA");
    }

    #[test]
    fn test_vlq() {
        let mut s = String::new();
        vlq(0, &mut s);
        vlq(1, &mut s);
        vlq(-1, &mut s);
        vlq(16, &mut s);
        assert_eq!(s, "ACDgB");
    }
}
