/// Source Normalizer - Auto-Wrapping of Learner Snippets
///
/// Makes a bare snippet executable for its target language:
/// - JavaScript flagged as browser code gets DOM stubs prepended
/// - Java and C# statements get wrapped in a class with an entry point
/// - Python and non-browser JavaScript pass through untouched
///
/// Every transform is syntax-level and leaves already well-formed programs
/// unchanged. The rewrite rules are regex heuristics: a `print(...)` call
/// spanning several lines or nesting another `print(` may not translate.
mod csharp;
mod java;
mod javascript;

pub use java::DEFAULT_ENTRY_CLASS;

use quest_common::{JsEnvironmentKind, Language};
use regex::Regex;
use std::borrow::Cow;

/// Source after language-specific wrapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSource {
    pub language: Language,
    pub code: String,
    /// Class holding the entry point (Java only)
    pub entry_class: Option<String>,
    /// True when the normalizer changed the submission
    pub rewritten: bool,
}

impl NormalizedSource {
    fn unchanged(language: Language, code: &str) -> Self {
        Self {
            language,
            code: code.to_string(),
            entry_class: None,
            rewritten: false,
        }
    }
}

/// Normalize a submission for `language`. `environment` is only consulted
/// for JavaScript.
pub fn normalize(
    language: Language,
    source: &str,
    environment: Option<JsEnvironmentKind>,
) -> NormalizedSource {
    match language {
        Language::Python => NormalizedSource::unchanged(language, source),
        Language::Javascript => javascript::normalize(source, environment),
        Language::Java => java::normalize(source),
        Language::Csharp => csharp::normalize(source),
    }
}

/// A single regex rewrite applied line-wise over a snippet
pub(crate) struct RewriteRule {
    pattern: Regex,
    replacement: &'static str,
}

impl RewriteRule {
    pub(crate) fn new(pattern: &str, replacement: &'static str) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("invalid rewrite pattern"),
            replacement,
        }
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(text, self.replacement)
    }
}

/// Apply every rule in order
pub(crate) fn apply_rules(rules: &[RewriteRule], text: &str) -> String {
    rules
        .iter()
        .fold(text.to_string(), |acc, rule| rule.apply(&acc).into_owned())
}

/// Split leading directive lines (`import ...;` / `using ...;`) off the body
/// so they can be placed above a generated class.
pub(crate) fn split_directives<'a>(source: &'a str, keyword: &str) -> (Vec<&'a str>, Vec<&'a str>) {
    let mut directives = Vec::new();
    let mut lines = source.lines().peekable();

    while let Some(&line) = lines.peek() {
        let trimmed = line.trim();
        let is_directive = trimmed
            .strip_prefix(keyword)
            .map(|rest| rest.starts_with(char::is_whitespace) && trimmed.ends_with(';'))
            .unwrap_or(false);
        if is_directive {
            directives.push(trimmed);
            lines.next();
        } else if trimmed.is_empty() && !directives.is_empty() {
            lines.next();
        } else {
            break;
        }
    }

    (directives, lines.collect())
}

/// Blank out comments and string/char literals, keeping every byte offset
/// and newline, so structural patterns only see code.
///
/// Handles `//`, `/* */` and line-leading `#` comments, escaped `"..."` and
/// `'...'` literals (which never run past the end of a line), `"""` text
/// blocks and C# verbatim `@"..."` strings.
pub(crate) fn mask_literals(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut masked = bytes.to_vec();
    let mut i = 0;
    let mut line_start = true;

    while i < bytes.len() {
        let b = bytes[i];
        let end = match b {
            b'/' if bytes.get(i + 1) == Some(&b'/') => line_end(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2),
            b'#' if line_start => line_end(bytes, i),
            b'"' if bytes[i..].starts_with(b"\"\"\"") => find_from(bytes, i + 3, b"\"\"\"").map_or(bytes.len(), |p| p + 3),
            b'"' if is_verbatim(bytes, i) => verbatim_end(bytes, i + 1),
            b'"' | b'\'' => quoted_end(bytes, i + 1, b),
            _ => {
                if b == b'\n' {
                    line_start = true;
                } else if !b.is_ascii_whitespace() {
                    line_start = false;
                }
                i += 1;
                continue;
            }
        };

        for byte in &mut masked[i..end] {
            if *byte != b'\n' {
                *byte = b' ';
            }
        }
        line_start = false;
        i = end;
    }

    // Only ASCII bytes inside whole literals were replaced
    String::from_utf8(masked).unwrap_or_else(|_| source.to_string())
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    find_from(bytes, from, b"\n").unwrap_or(bytes.len())
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}

fn is_verbatim(bytes: &[u8], quote: usize) -> bool {
    match quote {
        0 => false,
        1 => bytes[0] == b'@',
        _ => bytes[quote - 1] == b'@' || (bytes[quote - 1] == b'$' && bytes[quote - 2] == b'@'),
    }
}

/// End of a verbatim string; `""` is an escaped quote
fn verbatim_end(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// End of a `"` or `'` literal, stopping at the line end when unterminated
fn quoted_end(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Indent each non-empty line by `depth` levels of four spaces
pub(crate) fn indent(lines: &[&str], depth: usize) -> String {
    let pad = "    ".repeat(depth);
    lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", pad, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
