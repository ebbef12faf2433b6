//! Sass unit.
//!
//! Compiles the commonly used subset of Sass to plain CSS:
//!
//! - `//` line comments and `/* */` block comments
//! - `$variables`, including `!default` and `!global` flags and block scoping
//! - `#{...}` interpolation in selectors, property names, values and preludes
//! - nested rules with the `&` parent selector
//! - at-rules nested inside style rules (`@media`, `@supports`), which bubble
//!   up around the enclosing selector
//! - the indented `.sass` syntax, converted to braces by indentation
//!
//! Mixins, `@extend`, functions and control directives are rejected with a
//! [`TransformError`]. Values are substituted textually; no arithmetic is done.
//! `@import` and other bodiless at-rules are passed through.

use std::collections::BTreeMap;

use super::{Transform, TransformError, TransformOptions};
use crate::artifact::{Artifact, AssetKind};

/// At-rules whose semantics would require a full Sass evaluator.
const UNSUPPORTED_AT_RULES: &[&str] = &[
    "mixin", "include", "content", "extend", "function", "return", "if", "else", "each", "for",
    "while", "use", "forward", "at-root", "debug", "warn", "error",
];

/// `sass`: sass → style.
#[derive(Debug, Clone, Copy, Default)]
pub struct SassUnit;

impl Transform for SassUnit {
    fn name(&self) -> &str {
        "sass"
    }

    fn accepts(&self) -> AssetKind {
        AssetKind::Sass
    }

    fn produces(&self) -> AssetKind {
        AssetKind::Style
    }

    fn apply(
        &self,
        input: Artifact,
        _options: &TransformOptions,
    ) -> Result<Vec<Artifact>, TransformError> {
        let source = input.text().map_err(TransformError::not_utf8)?;
        let indented = input
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sass"));

        let css = compile(source, indented)?;
        Ok(vec![input.derive(AssetKind::Style, css)])
    }
}

/// Compile Sass source to expanded CSS.
///
/// `indented` selects the whitespace-sensitive `.sass` syntax.
pub fn compile(source: &str, indented: bool) -> Result<String, TransformError> {
    let stripped = strip_comments(source)?;
    let braced = if indented { indented_to_braced(&stripped)? } else { stripped };

    let nodes = Parser::new(&braced).parse()?;

    let mut evaluator = Evaluator { scopes: vec![BTreeMap::new()] };
    let mut out = Vec::new();
    evaluator.eval_children(&nodes, &[], false, &mut out)?;

    let mut css = String::new();
    render(&out, 0, &mut css);
    Ok(css)
}

// ============================================================================
// Comments and indented syntax
// ============================================================================

/// Remove comments, keeping newlines so line numbers survive.
///
/// `//` inside parentheses is kept so `url(http://...)` is not truncated.
fn strip_comments(source: &str) -> Result<String, TransformError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    let mut line = 1;
    let mut parens = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let start = line;
                out.push(c);
                i += 1;
                loop {
                    match chars.get(i) {
                        None | Some('\n') => {
                            return Err(TransformError::with_line(start, "unterminated string"))
                        }
                        Some('\\') => {
                            out.push('\\');
                            if let Some(&next) = chars.get(i + 1) {
                                out.push(next);
                            }
                            i += 2;
                        }
                        Some(&ch) => {
                            out.push(ch);
                            i += 1;
                            if ch == c {
                                break;
                            }
                        }
                    }
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(TransformError::with_line(start, "unterminated comment"))
                        }
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => {
                            out.push('\n');
                            line += 1;
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            '/' if chars.get(i + 1) == Some(&'/') && parens == 0 => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            _ => {
                match c {
                    '(' => parens += 1,
                    ')' => parens = parens.saturating_sub(1),
                    '\n' => line += 1,
                    _ => {}
                }
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(out)
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Convert indented syntax to braced syntax line by line.
///
/// A line followed by a more deeply indented line opens a block; every
/// other line is a statement.
fn indented_to_braced(source: &str) -> Result<String, TransformError> {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = String::with_capacity(source.len() + lines.len() * 2);
    let mut stack: Vec<usize> = vec![0];

    for (idx, raw) in lines.iter().enumerate() {
        let content = raw.trim();
        if content.is_empty() {
            out.push('\n');
            continue;
        }

        let indent = indent_of(raw);
        while stack.len() > 1 && indent < stack[stack.len() - 1] {
            stack.pop();
            out.push_str("} ");
        }
        if indent != stack[stack.len() - 1] {
            return Err(TransformError::with_line(idx + 1, "inconsistent indentation"));
        }
        if content.starts_with('=') || content.starts_with('+') {
            return Err(TransformError::with_line(idx + 1, "mixins are not supported"));
        }

        let next_indent =
            lines[idx + 1..].iter().find(|l| !l.trim().is_empty()).map(|l| indent_of(l));
        out.push_str(content);
        match next_indent {
            Some(next) if next > indent => {
                out.push_str(" {");
                stack.push(next);
            }
            _ => out.push(';'),
        }
        out.push('\n');
    }

    for _ in 1..stack.len() {
        out.push('}');
    }
    Ok(out)
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Decl { name: String, value: String, line: usize },
    Var { name: String, value: String, line: usize },
    Rule { selector: String, children: Vec<Node>, line: usize },
    At { name: String, prelude: String, body: Option<Vec<Node>>, line: usize },
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self { chars: source.chars().collect(), pos: 0, line: 1 }
    }

    fn parse(mut self) -> Result<Vec<Node>, TransformError> {
        self.block(None)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if self.peek() == Some('\n') {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Parse statements until the closing brace of a block opened at
    /// `opened`, or until end of input at the top level.
    fn block(&mut self, opened: Option<usize>) -> Result<Vec<Node>, TransformError> {
        let mut nodes = Vec::new();

        loop {
            self.skip_whitespace();
            let line = self.line;
            match (self.peek(), opened) {
                (None, Some(open_line)) => {
                    return Err(TransformError::with_line(open_line, "unclosed block"))
                }
                (None, None) => return Ok(nodes),
                (Some('}'), Some(_)) => {
                    self.bump();
                    return Ok(nodes);
                }
                (Some('}'), None) => return Err(TransformError::with_line(line, "unexpected '}'")),
                (Some(';'), _) => {
                    self.bump();
                    continue;
                }
                _ => {}
            }

            let (text, end) = self.read_chunk()?;
            let text = text.trim();

            if end == Some('{') {
                self.bump();
                let children = self.block(Some(line))?;
                match text.strip_prefix('@') {
                    Some(rest) => nodes.push(at_rule(rest, Some(children), line)?),
                    None if text.is_empty() => {
                        let message = "expected a selector before '{'";
                        return Err(TransformError::with_line(line, message));
                    }
                    None => nodes.push(Node::Rule { selector: text.to_string(), children, line }),
                }
            } else {
                if end == Some(';') {
                    self.bump();
                }
                nodes.push(statement(text, line)?);
            }
        }
    }

    /// Read up to the next `{`, `;` or `}` outside strings, parentheses and
    /// interpolation. The terminator is not consumed.
    fn read_chunk(&mut self) -> Result<(String, Option<char>), TransformError> {
        let mut text = String::new();
        let mut parens = 0usize;
        let mut interpolation = 0usize;

        while let Some(c) = self.peek() {
            match c {
                '{' | ';' | '}' if parens == 0 && interpolation == 0 => return Ok((text, Some(c))),
                '#' if self.peek_at(1) == Some('{') => {
                    interpolation += 1;
                    text.push_str("#{");
                    self.bump();
                    self.bump();
                    continue;
                }
                '}' => interpolation = interpolation.saturating_sub(1),
                '(' => parens += 1,
                ')' => parens = parens.saturating_sub(1),
                '"' | '\'' => {
                    text.push(c);
                    self.bump();
                    while let Some(ch) = self.peek() {
                        text.push(ch);
                        self.bump();
                        if ch == '\\' {
                            if let Some(escaped) = self.peek() {
                                text.push(escaped);
                                self.bump();
                            }
                        } else if ch == c {
                            break;
                        }
                    }
                    continue;
                }
                _ => {}
            }
            text.push(c);
            self.bump();
        }

        Ok((text, None))
    }
}

fn at_rule(rest: &str, body: Option<Vec<Node>>, line: usize) -> Result<Node, TransformError> {
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(rest.len());
    let name = &rest[..name_len];
    if name.is_empty() {
        return Err(TransformError::with_line(line, "expected an at-rule name after '@'"));
    }
    if UNSUPPORTED_AT_RULES.contains(&name) {
        return Err(TransformError::with_line(line, format!("@{} is not supported", name)));
    }
    Ok(Node::At {
        name: name.to_string(),
        prelude: rest[name_len..].trim().to_string(),
        body,
        line,
    })
}

fn statement(text: &str, line: usize) -> Result<Node, TransformError> {
    if let Some(rest) = text.strip_prefix('@') {
        return at_rule(rest, None, line);
    }

    let (name, value) = text
        .split_once(':')
        .ok_or_else(|| {
            TransformError::with_line(line, format!("expected a declaration, found '{}'", text))
        })?;
    let (name, value) = (name.trim(), value.trim());

    if let Some(var) = name.strip_prefix('$') {
        if var.is_empty() || value.is_empty() {
            let message = format!("invalid variable declaration '{}'", text);
            return Err(TransformError::with_line(line, message));
        }
        return Ok(Node::Var { name: var.to_string(), value: value.to_string(), line });
    }
    if name.is_empty() {
        return Err(TransformError::with_line(line, format!("missing property name in '{}'", text)));
    }
    Ok(Node::Decl { name: name.to_string(), value: value.to_string(), line })
}

// ============================================================================
// Evaluation
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum CssNode {
    Rule { selectors: Vec<String>, decls: Vec<(String, String)> },
    Decl(String, String),
    At { name: String, prelude: String, body: Option<Vec<CssNode>> },
}

struct Evaluator {
    /// Index 0 is the global scope.
    scopes: Vec<BTreeMap<String, String>>,
}

/// Sass treats `-` and `_` in variable names as the same character.
fn variable_key(name: &str) -> String {
    name.replace('_', "-")
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    let quoted = matches!(bytes.first(), Some(b'"' | b'\''));
    if bytes.len() >= 2 && quoted && bytes[bytes.len() - 1] == bytes[0] {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

impl Evaluator {
    fn lookup(&self, key: &str) -> Option<&String> {
        self.scopes.iter().rev().find_map(|scope| scope.get(key))
    }

    fn assign(&mut self, name: &str, raw: &str, line: usize) -> Result<(), TransformError> {
        let mut value = raw.trim();
        let mut default = false;
        let mut global = false;
        loop {
            if let Some(rest) = value.strip_suffix("!default") {
                default = true;
                value = rest.trim_end();
            } else if let Some(rest) = value.strip_suffix("!global") {
                global = true;
                value = rest.trim_end();
            } else {
                break;
            }
        }

        let key = variable_key(name);
        if default && self.lookup(&key).is_some_and(|v| v != "null") {
            return Ok(());
        }

        let value = self.substitute(value, line)?;
        let depth = self.scopes.len();
        let target = if global {
            0
        } else {
            (1..depth).rev().find(|&i| self.scopes[i].contains_key(&key)).unwrap_or(depth - 1)
        };
        self.scopes[target].insert(key, value);
        Ok(())
    }

    /// Replace `$variables` (outside strings) and `#{...}` interpolation.
    fn substitute(&self, text: &str, line: usize) -> Result<String, TransformError> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c == '#' && chars.get(i + 1) == Some(&'{') {
                let mut depth = 1;
                let mut j = i + 2;
                while j < chars.len() {
                    match chars[j] {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(TransformError::with_line(line, "unterminated interpolation"));
                }
                let inner: String = chars[i + 2..j].iter().collect();
                let value = self.substitute(inner.trim(), line)?;
                out.push_str(unquote(&value));
                i = j + 1;
                continue;
            }

            match (c, quote) {
                ('"' | '\'', None) => quote = Some(c),
                (q, Some(open)) if q == open => quote = None,
                ('\\', Some(_)) => {
                    out.push(c);
                    if let Some(&next) = chars.get(i + 1) {
                        out.push(next);
                    }
                    i += 2;
                    continue;
                }
                ('$', None)
                    if chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
                {
                    let mut j = i + 1;
                    while j < chars.len() && is_ident_char(chars[j]) {
                        j += 1;
                    }
                    let name: String = chars[i + 1..j].iter().collect();
                    let value = self.lookup(&variable_key(&name)).ok_or_else(|| {
                        TransformError::with_line(line, format!("undefined variable ${}", name))
                    })?;
                    out.push_str(value);
                    i = j;
                    continue;
                }
                _ => {}
            }

            out.push(c);
            i += 1;
        }

        Ok(out)
    }

    fn eval_block(
        &mut self,
        nodes: &[Node],
        parents: &[String],
        in_at_rule: bool,
        out: &mut Vec<CssNode>,
    ) -> Result<(), TransformError> {
        self.scopes.push(BTreeMap::new());
        let result = self.eval_children(nodes, parents, in_at_rule, out);
        self.scopes.pop();
        result
    }

    fn eval_children(
        &mut self,
        nodes: &[Node],
        parents: &[String],
        in_at_rule: bool,
        out: &mut Vec<CssNode>,
    ) -> Result<(), TransformError> {
        let rule_index = if parents.is_empty() {
            None
        } else {
            out.push(CssNode::Rule { selectors: parents.to_vec(), decls: Vec::new() });
            Some(out.len() - 1)
        };

        for node in nodes {
            match node {
                Node::Var { name, value, line } => self.assign(name, value, *line)?,
                Node::Decl { name, value, line } => {
                    let name = self.substitute(name, *line)?;
                    let value = self.substitute(value, *line)?;
                    match rule_index {
                        Some(index) => {
                            if let Some(CssNode::Rule { decls, .. }) = out.get_mut(index) {
                                decls.push((name, value));
                            }
                        }
                        None if in_at_rule => out.push(CssNode::Decl(name, value)),
                        None => {
                            return Err(TransformError::with_line(
                                *line,
                                format!("declaration '{}' is not inside a rule", name),
                            ))
                        }
                    }
                }
                Node::Rule { selector, children, line } => {
                    let selector = self.substitute(selector, *line)?;
                    let selectors = nest_selectors(parents, &selector, *line)?;
                    self.eval_block(children, &selectors, false, out)?;
                }
                Node::At { name, prelude, body, line } => {
                    let prelude = self.substitute(prelude, *line)?;
                    match body {
                        None => out.push(CssNode::At { name: name.clone(), prelude, body: None }),
                        Some(children) => {
                            // Keyframe selectors never combine with the enclosing rule.
                            let inner_parents =
                                if name.ends_with("keyframes") { &[][..] } else { parents };
                            let mut inner = Vec::new();
                            self.eval_block(children, inner_parents, true, &mut inner)?;
                            if !inner.is_empty() {
                                out.push(CssNode::At {
                                    name: name.clone(),
                                    prelude,
                                    body: Some(inner),
                                });
                            }
                        }
                    }
                }
            }
        }

        if let Some(index) = rule_index {
            if matches!(out.get(index), Some(CssNode::Rule { decls, .. }) if decls.is_empty()) {
                out.remove(index);
            }
        }
        Ok(())
    }
}

/// Split on commas outside parentheses, brackets and strings.
fn split_selector_list(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        match (c, quote) {
            (q, Some(open)) if q == open => quote = None,
            (_, Some(_)) => {}
            ('"' | '\'', None) => quote = Some(c),
            ('(' | '[', None) => depth += 1,
            (')' | ']', None) => depth = depth.saturating_sub(1),
            (',', None) if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);

    parts.into_iter().map(|p| p.split_whitespace().collect::<Vec<_>>().join(" ")).collect()
}

/// Combine a nested selector list with its parents (cartesian product,
/// parents outermost).
fn nest_selectors(
    parents: &[String],
    selector: &str,
    line: usize,
) -> Result<Vec<String>, TransformError> {
    let children = split_selector_list(selector);
    if children.iter().any(String::is_empty) {
        return Err(TransformError::with_line(line, format!("empty selector in '{}'", selector)));
    }

    if parents.is_empty() {
        if children.iter().any(|c| c.contains('&')) {
            return Err(TransformError::with_line(
                line,
                "top-level selectors may not contain the parent selector '&'",
            ));
        }
        return Ok(children);
    }

    let mut combined = Vec::with_capacity(parents.len() * children.len());
    for parent in parents {
        for child in &children {
            if child.contains('&') {
                combined.push(child.replace('&', parent));
            } else {
                combined.push(format!("{} {}", parent, child));
            }
        }
    }
    Ok(combined)
}

fn render(nodes: &[CssNode], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);

    for node in nodes {
        match node {
            CssNode::Rule { selectors, decls } => {
                out.push_str(&format!("{}{} {{\n", indent, selectors.join(", ")));
                for (name, value) in decls {
                    out.push_str(&format!("{}  {}: {};\n", indent, name, value));
                }
                out.push_str(&format!("{}}}\n", indent));
            }
            CssNode::Decl(name, value) => {
                out.push_str(&format!("{}{}: {};\n", indent, name, value));
            }
            CssNode::At { name, prelude, body } => {
                let head = if prelude.is_empty() {
                    format!("@{}", name)
                } else {
                    format!("@{} {}", name, prelude)
                };
                match body {
                    None => out.push_str(&format!("{}{};\n", indent, head)),
                    Some(children) => {
                        out.push_str(&format!("{}{} {{\n", indent, head));
                        render(children, depth + 1, out);
                        out.push_str(&format!("{}}}\n", indent));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scss(source: &str) -> String {
        compile(source, false).unwrap()
    }

    #[test]
    fn test_variables_and_nesting() {
        let css = scss(
            r#"
$primary: #333;
$pad: 4px;

.card {
  color: $primary;
  .title { padding: $pad 0; }
}
"#,
        );
        assert_eq!(css, ".card {\n  color: #333;\n}\n.card .title {\n  padding: 4px 0;\n}\n");
    }

    #[test]
    fn test_parent_selector() {
        let css = scss("a { color: red; &:hover { color: blue; } &-icon { width: 1em; } }");
        assert!(css.contains("a:hover {\n  color: blue;\n}"));
        assert!(css.contains("a-icon {\n  width: 1em;\n}"));
    }

    #[test]
    fn test_selector_list_product() {
        let css = scss(".a, .b { .c, .d { x: y } }");
        assert_eq!(css, ".a .c, .a .d, .b .c, .b .d {\n  x: y;\n}\n");
    }

    #[test]
    fn test_media_bubbles_out_of_rule() {
        let css =
            scss("$bp: 600px;\n.nav { display: none; @media (min-width: $bp) { display: flex; } }");
        assert_eq!(
            css,
            ".nav {\n  display: none;\n}\n\
             @media (min-width: 600px) {\n  .nav {\n    display: flex;\n  }\n}\n"
        );
    }

    #[test]
    fn test_font_face_and_keyframes() {
        let css = scss(
            "@font-face { font-family: \"Inter\"; src: url(inter.woff2); }\n\
             @keyframes spin { from { transform: rotate(0) } to { transform: rotate(1turn) } }",
        );
        let font_face = "@font-face {\n  font-family: \"Inter\";\n  src: url(inter.woff2);\n}\n";
        assert!(css.starts_with(font_face));
        assert!(css.contains("@keyframes spin {\n  from {\n    transform: rotate(0);\n  }\n"));
    }

    #[test]
    fn test_default_and_global_flags() {
        let css = scss(
            "$size: 10px;\n$size: 20px !default;\n$other: 1 !default;\n\
             .a { $inner: 2 !global; w: $size; h: $other; }\n.b { v: $inner; }",
        );
        assert!(css.contains("w: 10px;"));
        assert!(css.contains("h: 1;"));
        assert!(css.contains(".b {\n  v: 2;\n}"));
    }

    #[test]
    fn test_local_variables_do_not_leak() {
        let err = compile(".a { $local: 1; }\n.b { x: $local; }", false).unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(err.message.contains("$local"));
    }

    #[test]
    fn test_undefined_variable_reports_line() {
        let err = compile("a {\n  color: red;\n  margin: $gap;\n}", false).unwrap_err();
        assert_eq!(err.line, Some(3));
        assert_eq!(err.message, "undefined variable $gap");
    }

    #[test]
    fn test_interpolation() {
        let css = scss(
            "$side: left;\n$name: \"btn\";\n\
             .#{$name} { margin-#{$side}: 0; content: \"#{$side}\"; }",
        );
        assert_eq!(css, ".btn {\n  margin-left: 0;\n  content: \"left\";\n}\n");
    }

    #[test]
    fn test_hyphen_underscore_equivalent() {
        let css = scss("$main_color: red;\na { color: $main-color; }");
        assert!(css.contains("color: red;"));
    }

    #[test]
    fn test_comments_removed() {
        let css = scss(
            "// header\n/* block\ncomment */\n\
             a { b: url(http://x.test/a.png); // trailing\n}",
        );
        assert_eq!(css, "a {\n  b: url(http://x.test/a.png);\n}\n");
    }

    #[test]
    fn test_attribute_selector_with_dollar() {
        let css = scss("a[href$=\".pdf\"] { x: y }");
        assert!(css.starts_with("a[href$=\".pdf\"] {"));
    }

    #[test]
    fn test_import_passes_through() {
        let css = scss("@charset \"utf-8\";\n@import url(\"reset.css\");\na { b: c }");
        assert!(css.starts_with("@charset \"utf-8\";\n@import url(\"reset.css\");\n"));
    }

    #[test]
    fn test_rejects_mixins() {
        let err = compile("@mixin round { border-radius: 4px; }", false).unwrap_err();
        assert_eq!(err.message, "@mixin is not supported");
        let err = compile("a {\n  @include round;\n}", false).unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(compile("a { @extend .b; }", false).is_err());
        assert!(compile("@each $x in a, b { .#{$x} { y: z } }", false).is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(compile("a {\n  b: c;\n", false).unwrap_err().message, "unclosed block");
        assert!(compile("a { b: c; } }", false).is_err());
        assert!(compile("a { just-a-word }", false).is_err());
        assert!(compile("color: red;", false).is_err());
        assert!(compile("/* never closed", false).is_err());
        assert!(compile("& { x: y }", false).is_err());
    }

    #[test]
    fn test_indented_syntax() {
        let source = "$accent: teal\n\nnav\n  ul\n    margin: 0\n  a\n    color: $accent\n    \
                      &:hover\n      color: black\n";
        let css = compile(source, true).unwrap();
        assert_eq!(
            css,
            "nav ul {\n  margin: 0;\n}\nnav a {\n  color: teal;\n}\n\
             nav a:hover {\n  color: black;\n}\n"
        );
    }

    #[test]
    fn test_indented_syntax_errors() {
        let err = compile("a\n    b: c\n  d: e\n", true).unwrap_err();
        assert_eq!(err.line, Some(3));
        assert!(compile("=mixin\n  a: b\n", true).is_err());
    }

    #[test]
    fn test_unit_uses_extension_for_syntax() {
        let input = crate::artifact::SourceArtifact::new(
            "sass/style.sass",
            AssetKind::Sass,
            "body\n  margin: 0\n",
        )
        .to_artifact();
        let out = SassUnit.apply(input, &TransformOptions::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, AssetKind::Style);
        assert_eq!(out[0].path, std::path::PathBuf::from("sass/style.css"));
        assert_eq!(out[0].text().unwrap(), "body {\n  margin: 0;\n}\n");
    }
}
