/// Environment Classifier - JavaScript Runtime Detection
///
/// Labels a JavaScript snippet as browser, Node, or vanilla code by testing
/// it against ordered pattern groups. The first group with any matching
/// pattern wins, so a snippet that touches both the DOM and Node modules is
/// always reported as `Browser`.
use lazy_static::lazy_static;
use quest_common::JsEnvironmentKind;
use regex::Regex;
use tracing::debug;

/// One labelled group of source patterns
pub struct PatternGroup {
    pub kind: JsEnvironmentKind,
    patterns: Vec<Regex>,
}

impl PatternGroup {
    fn new(kind: JsEnvironmentKind, patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)).expect("invalid classifier pattern"))
            .collect();
        Self { kind, patterns }
    }

    /// First pattern in this group that matches, if any
    fn first_match(&self, source: &str) -> Option<&Regex> {
        self.patterns.iter().find(|p| p.is_match(source))
    }
}

lazy_static! {
    /// Evaluated top to bottom. Order is the tie-break policy.
    static ref GROUPS: Vec<PatternGroup> = vec![
        PatternGroup::new(
            JsEnvironmentKind::Browser,
            &[
                r"\bdocument\.",
                r"\bwindow\.",
                r"\balert\s*\(",
                r"\bprompt\s*\(",
                r"\bconfirm\s*\(",
                r"\blocalStorage\.",
                r"\bsessionStorage\.",
                r"\.getElementById\s*\(",
                r"\.querySelector(?:All)?\s*\(",
                r"\.addEventListener\s*\(",
                // No `fetch(`: Node 18+ ships a global fetch
                r"<\s*(?:html|body|div|script)\b",
            ],
        ),
        PatternGroup::new(
            JsEnvironmentKind::Node,
            &[
                r"\brequire\s*\(",
                r"\bmodule\.exports\b",
                r"\bexports\.",
                r"\bprocess\.",
                r"\b__dirname\b",
                r"\b__filename\b",
                r"\bfs\.",
                r"\bpath\.",
            ],
        ),
    ];
}

/// Classify a JavaScript source. Falls back to `Vanilla` when no group matches.
pub fn classify(source: &str) -> JsEnvironmentKind {
    for group in GROUPS.iter() {
        if let Some(pattern) = group.first_match(source) {
            debug!(environment = %group.kind, pattern = pattern.as_str(), "Classified JavaScript source");
            return group.kind;
        }
    }
    JsEnvironmentKind::Vanilla
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_query_is_browser() {
        let source = r#"const el = document.getElementById("title"); el.textContent = "hi";"#;
        assert_eq!(classify(source), JsEnvironmentKind::Browser);
    }

    #[test]
    fn test_require_is_node() {
        let source = "const fs = require('fs');\nconsole.log(fs.existsSync('.'));";
        assert_eq!(classify(source), JsEnvironmentKind::Node);
    }

    #[test]
    fn test_plain_console_log_is_vanilla() {
        assert_eq!(classify(r#"console.log("hi")"#), JsEnvironmentKind::Vanilla);
        assert_eq!(classify("let x = [1, 2, 3].map(n => n * 2);"), JsEnvironmentKind::Vanilla);
    }

    #[test]
    fn test_fetch_alone_is_vanilla() {
        let source = "fetch('https://example.com/data').then(r => r.json());";
        assert_eq!(classify(source), JsEnvironmentKind::Vanilla);
    }

    #[test]
    fn test_browser_wins_over_node() {
        let source = "const path = require('path');\nwindow.location.href = path.join('a', 'b');";
        assert_eq!(classify(source), JsEnvironmentKind::Browser);

        let source = "module.exports = () => alert('x');";
        assert_eq!(classify(source), JsEnvironmentKind::Browser);
    }

    #[test]
    fn test_inline_html_is_browser() {
        let source = "const markup = '<div class=\"card\">hello</div>';";
        assert_eq!(classify(source), JsEnvironmentKind::Browser);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(classify("Document.title = 'x';"), JsEnvironmentKind::Browser);
        assert_eq!(classify("const os = REQUIRE('os');"), JsEnvironmentKind::Node);
    }

    #[test]
    fn test_identifier_suffixes_do_not_match() {
        // `mydocument.` and `subprocess.` are not DOM/Node markers
        let source = "const mydocument = {}; mydocument.x = 1; const subprocess = {}; subprocess.y = 2;";
        assert_eq!(classify(source), JsEnvironmentKind::Vanilla);
    }
}
