use super::{apply_rules, indent, mask_literals, split_directives, NormalizedSource, RewriteRule};
use lazy_static::lazy_static;
use quest_common::Language;
use regex::Regex;
use std::ops::Range;

pub const DEFAULT_ENTRY_CLASS: &str = "Main";

lazy_static! {
    static ref CLASS_DECLARATION: Regex = Regex::new(
        r"((?:\b(?:public|protected|private|final|abstract|static|sealed|strictfp)\s+)*)\bclass\s+([A-Za-z_$][\w$]*)"
    )
    .expect("invalid pattern");
    static ref MAIN_METHOD: Regex =
        Regex::new(r"\bstatic\s+void\s+main\s*\(").expect("invalid pattern");
    /// Python-isms in bare statements, applied in order
    static ref BARE_STATEMENT_RULES: Vec<RewriteRule> = vec![
        RewriteRule::new(r"(^|[^.\w$])print\s*\(", "${1}System.out.println("),
        RewriteRule::new(r"(?m)^([ \t]*)#[ \t]?", "${1}// "),
    ];
}

/// A class declared at brace depth zero
#[derive(Debug)]
struct TopLevelClass {
    /// Modifiers through the class name
    declaration: Range<usize>,
    modifiers: Range<usize>,
    name: Range<usize>,
    /// Opening brace through closing brace
    body: Range<usize>,
}

impl TopLevelClass {
    fn is_public(&self, code: &str) -> bool {
        code[self.modifiers.clone()].split_whitespace().any(|m| m == "public")
    }

    fn encloses(&self, pos: usize) -> bool {
        self.body.contains(&pos)
    }
}

pub(super) fn normalize(source: &str) -> NormalizedSource {
    // Structure is read from code only: literals and comments are blanked
    let code = mask_literals(source);
    let classes = top_level_classes(&code);
    let main_at = MAIN_METHOD.find(&code).map(|m| m.start());
    let holder = main_at.and_then(|pos| classes.iter().find(|c| c.encloses(pos)));

    // Already public: keep as-is, run the public class holding main (or the
    // first public one)
    let public = holder
        .filter(|c| c.is_public(&code))
        .or_else(|| classes.iter().find(|c| c.is_public(&code)));
    if let Some(class) = public {
        return NormalizedSource {
            language: Language::Java,
            code: source.to_string(),
            entry_class: Some(source[class.name.clone()].to_string()),
            rewritten: false,
        };
    }

    if let Some(target) = holder.or_else(|| classes.first()) {
        return wrapped(publicize_class(source, &code, target));
    }

    let (directives, body) = split_directives(source, "import");

    if main_at.is_some() {
        return wrapped(render(&directives, &format!(
            "public class {} {{\n{}\n}}\n",
            DEFAULT_ENTRY_CLASS,
            indent(&body, 1)
        )));
    }

    let translated = apply_rules(&BARE_STATEMENT_RULES, &body.join("\n"));
    let lines: Vec<&str> = translated.lines().collect();
    wrapped(render(&directives, &format!(
        "public class {} {{\n    public static void main(String[] args) {{\n{}\n    }}\n}}\n",
        DEFAULT_ENTRY_CLASS,
        indent(&lines, 2)
    )))
}

/// Class declarations outside every brace pair, in source order
fn top_level_classes(code: &str) -> Vec<TopLevelClass> {
    let bytes = code.as_bytes();
    let mut classes: Vec<TopLevelClass> = Vec::new();
    let mut depth = 0usize;
    let mut scanned = 0;

    for captures in CLASS_DECLARATION.captures_iter(code) {
        let (Some(whole), Some(modifiers), Some(name)) = (captures.get(0), captures.get(1), captures.get(2)) else {
            continue;
        };
        if whole.start() < scanned {
            continue;
        }
        depth = brace_depth_after(&bytes[scanned..whole.start()], depth);
        scanned = whole.start();
        if depth > 0 {
            continue;
        }

        let body = class_body(bytes, whole.end());
        classes.push(TopLevelClass {
            declaration: whole.range(),
            modifiers: modifiers.range(),
            name: name.range(),
            body: body.clone(),
        });
        // Nothing inside this body is top-level
        scanned = body.end.max(whole.end());
    }

    classes
}

fn brace_depth_after(bytes: &[u8], mut depth: usize) -> usize {
    for &b in bytes {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

/// Range from the first `{` at or after `from` to its matching `}`; runs to
/// the end of the text when unbalanced
fn class_body(bytes: &[u8], from: usize) -> Range<usize> {
    let Some(open) = bytes[from..].iter().position(|&b| b == b'{').map(|p| from + p) else {
        return bytes.len()..bytes.len();
    };

    let mut depth = 0usize;
    for (offset, &b) in bytes[open..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return open..open + offset + 1;
                }
            }
            _ => {}
        }
    }
    open..bytes.len()
}

/// Make `target` the public `Main` class. Uses of the old name in code are
/// renamed with it; literals and comments are left alone.
fn publicize_class(source: &str, code: &str, target: &TopLevelClass) -> String {
    let modifiers: Vec<&str> = code[target.modifiers.clone()]
        .split_whitespace()
        .filter(|m| !matches!(*m, "public" | "protected" | "private"))
        .collect();
    let mut declaration = String::from("public ");
    for modifier in modifiers {
        declaration.push_str(modifier);
        declaration.push(' ');
    }
    declaration.push_str("class ");
    declaration.push_str(DEFAULT_ENTRY_CLASS);

    let old_name = &code[target.name.clone()];
    let mut edits: Vec<(Range<usize>, &str)> = vec![(target.declaration.clone(), declaration.as_str())];
    if old_name != DEFAULT_ENTRY_CLASS {
        if let Ok(uses) = Regex::new(&format!(r"(?:^|[^\w$]){}(?:[^\w$]|$)", regex::escape(old_name))) {
            let mut at = 0;
            while let Some(m) = uses.find_at(code, at) {
                // Trim the boundary characters off the match
                let start = m.start() + m.as_str().find(old_name).unwrap_or(0);
                let range = start..start + old_name.len();
                if range.start >= target.declaration.end || range.end <= target.declaration.start {
                    edits.push((range.clone(), DEFAULT_ENTRY_CLASS));
                }
                at = range.end;
            }
        }
    }
    edits.sort_by_key(|(range, _)| range.start);

    let mut rewritten = String::with_capacity(source.len() + 16);
    let mut copied = 0;
    for (range, replacement) in edits {
        if range.start < copied {
            continue;
        }
        rewritten.push_str(&source[copied..range.start]);
        rewritten.push_str(replacement);
        copied = range.end;
    }
    rewritten.push_str(&source[copied..]);
    rewritten
}

fn render(directives: &[&str], class_body: &str) -> String {
    if directives.is_empty() {
        class_body.to_string()
    } else {
        format!("{}\n\n{}", directives.join("\n"), class_body)
    }
}

fn wrapped(code: String) -> NormalizedSource {
    NormalizedSource {
        language: Language::Java,
        code,
        entry_class: Some(DEFAULT_ENTRY_CLASS.to_string()),
        rewritten: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_main_is_unchanged() {
        let source = "public class Main { public static void main(String[] args){ System.out.println(\"hi\"); } }";
        let normalized = normalize(source);

        assert_eq!(normalized.code, source);
        assert_eq!(normalized.entry_class.as_deref(), Some("Main"));
        assert!(!normalized.rewritten);
    }

    #[test]
    fn test_public_class_name_is_captured() {
        let source = "public final class HelloWorld {\n    public static void main(String[] args) {}\n}\n";
        let normalized = normalize(source);

        assert_eq!(normalized.code, source);
        assert_eq!(normalized.entry_class.as_deref(), Some("HelloWorld"));
    }

    #[test]
    fn test_bare_statement_is_wrapped() {
        let normalized = normalize("System.out.println(\"hi\");");

        assert_eq!(
            normalized.code,
            "public class Main {\n    public static void main(String[] args) {\n        System.out.println(\"hi\");\n    }\n}\n"
        );
        assert_eq!(normalized.entry_class.as_deref(), Some("Main"));
        assert!(normalized.rewritten);
    }

    #[test]
    fn test_wrapping_is_idempotent() {
        let once = normalize("int x = 2;\nSystem.out.println(x * 21);");
        let twice = normalize(&once.code);

        assert_eq!(once.code, twice.code);
        assert!(!twice.rewritten);
    }

    #[test]
    fn test_python_style_print_and_comments_are_translated() {
        let normalized = normalize("# say hello\nprint(\"hello\");\nSystem.out.print(\"x\");");

        assert!(normalized.code.contains("        // say hello"));
        assert!(normalized.code.contains("        System.out.println(\"hello\");"));
        assert!(normalized.code.contains("        System.out.print(\"x\");"));
        assert!(!normalized.code.contains("System.out.System.out"));
    }

    #[test]
    fn test_non_public_class_becomes_public_main() {
        let source = "class Greeter {\n    public static void main(String[] args) {\n        System.out.println(\"hi\");\n    }\n}\n";
        let normalized = normalize(source);

        assert!(normalized.code.starts_with("public class Main {"));
        assert_eq!(normalized.entry_class.as_deref(), Some("Main"));
    }

    #[test]
    fn test_class_holding_main_is_the_one_renamed() {
        let source = "class Helper {\n    static int twice(int x) { return 2 * x; }\n}\n\nclass App {\n    public static void main(String[] args) {\n        System.out.println(Helper.twice(21));\n    }\n}\n";
        let normalized = normalize(source);

        assert!(normalized.code.contains("class Helper {"));
        assert!(normalized.code.contains("public class Main {"));
        assert!(!normalized.code.contains("class App"));
    }

    #[test]
    fn test_main_without_class_is_wrapped() {
        let source = "public static void main(String[] args) {\n    System.out.println(\"hi\");\n}";
        let normalized = normalize(source);

        assert_eq!(
            normalized.code,
            "public class Main {\n    public static void main(String[] args) {\n        System.out.println(\"hi\");\n    }\n}\n"
        );
    }

    #[test]
    fn test_imports_are_hoisted() {
        let source = "import java.util.List;\nList<Integer> xs = List.of(1, 2);\nSystem.out.println(xs);";
        let normalized = normalize(source);

        assert!(normalized.code.starts_with("import java.util.List;\n\npublic class Main {"));
        assert!(normalized.code.contains("        List<Integer> xs = List.of(1, 2);"));
    }

    #[test]
    fn test_nested_class_before_main_is_left_alone() {
        let source = "class Solution {\n    static class Node { int v; }\n    public static void main(String[] args) {\n        Node n = new Node();\n        n.v = 7;\n        System.out.println(n.v);\n    }\n}\n";
        let normalized = normalize(source);

        assert_eq!(normalized.code, source.replacen("class Solution", "public class Main", 1));
        assert!(normalized.code.contains("    static class Node { int v; }"));
        assert_eq!(normalized.entry_class.as_deref(), Some("Main"));
    }

    #[test]
    fn test_public_class_with_public_nested_class() {
        let source = "public class App {\n    public static class Inner {}\n    public static void main(String[] args) {}\n}\n";
        let normalized = normalize(source);

        assert_eq!(normalized.code, source);
        assert_eq!(normalized.entry_class.as_deref(), Some("App"));
    }

    #[test]
    fn test_renamed_class_references_follow() {
        let source = "class Counter {\n    static int n;\n    public static void main(String[] args) {\n        Counter.n = 2;\n        System.out.println(\"Counter=\" + Counter.n);\n    }\n}\n";
        let normalized = normalize(source);

        assert!(normalized.code.starts_with("public class Main {"));
        assert!(normalized.code.contains("        Main.n = 2;"));
        assert!(normalized.code.contains("System.out.println(\"Counter=\" + Main.n);"));
    }

    #[test]
    fn test_class_mentioned_in_string_is_not_a_declaration() {
        let source = "System.out.println(\"public class Foo\");";
        let normalized = normalize(source);

        assert_eq!(normalized.entry_class.as_deref(), Some("Main"));
        assert_eq!(
            normalized.code,
            "public class Main {\n    public static void main(String[] args) {\n        System.out.println(\"public class Foo\");\n    }\n}\n"
        );
    }

    #[test]
    fn test_class_mentioned_in_comment_is_not_a_declaration() {
        let normalized = normalize("// class Greeter would go here\nSystem.out.println(\"hi\");");

        assert!(normalized.code.starts_with("public class Main {\n    public static void main(String[] args) {"));
        assert!(normalized.code.contains("        // class Greeter would go here"));
    }
}
