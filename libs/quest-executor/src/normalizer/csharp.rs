use super::{apply_rules, indent, mask_literals, split_directives, NormalizedSource, RewriteRule};
use lazy_static::lazy_static;
use quest_common::Language;
use regex::Regex;

const USING_SYSTEM: &str = "using System;";

lazy_static! {
    static ref CLASS_DECLARATION: Regex =
        Regex::new(r"\bclass\s+[A-Za-z_]\w*").expect("invalid pattern");
    static ref HAS_USING_SYSTEM: Regex =
        Regex::new(r"(?m)^\s*using\s+System\s*;").expect("invalid pattern");
    static ref MAIN_METHOD: Regex =
        Regex::new(r"\bstatic\s+(?:async\s+)?(?:void|int|Task(?:<int>)?)\s+Main\s*\(")
            .expect("invalid pattern");
    static ref BARE_STATEMENT_RULES: Vec<RewriteRule> = vec![
        RewriteRule::new(r"(^|[^.\w])print\s*\(", "${1}Console.WriteLine("),
        RewriteRule::new(r"(?m)^([ \t]*)#[ \t]?", "${1}// "),
    ];
}

pub(super) fn normalize(source: &str) -> NormalizedSource {
    // Structure is read from code only: literals and comments are blanked
    let code = mask_literals(source);

    if CLASS_DECLARATION.is_match(&code) {
        if HAS_USING_SYSTEM.is_match(&code) {
            return NormalizedSource::unchanged(Language::Csharp, source);
        }
        return rewritten(format!("{}\n{}", USING_SYSTEM, source));
    }

    let (directives, body) = split_directives(source, "using");
    let prelude = with_using_system(directives);

    if MAIN_METHOD.is_match(&code) {
        return rewritten(format!(
            "{}\n\nclass Program\n{{\n{}\n}}\n",
            prelude,
            indent(&body, 1)
        ));
    }

    let translated = apply_rules(&BARE_STATEMENT_RULES, &body.join("\n"));
    let lines: Vec<&str> = translated.lines().collect();
    rewritten(format!(
        "{}\n\nclass Program\n{{\n    static void Main()\n    {{\n{}\n    }}\n}}\n",
        prelude,
        indent(&lines, 2)
    ))
}

fn with_using_system(mut directives: Vec<&str>) -> String {
    if !directives.iter().any(|d| HAS_USING_SYSTEM.is_match(d)) {
        directives.insert(0, USING_SYSTEM);
    }
    directives.join("\n")
}

fn rewritten(code: String) -> NormalizedSource {
    NormalizedSource {
        language: Language::Csharp,
        code,
        entry_class: None,
        rewritten: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_program_is_unchanged() {
        let source = "using System;\n\nclass Program\n{\n    static void Main()\n    {\n        Console.WriteLine(\"hi\");\n    }\n}\n";
        let normalized = normalize(source);

        assert_eq!(normalized.code, source);
        assert!(!normalized.rewritten);
    }

    #[test]
    fn test_class_without_using_gets_prelude() {
        let source = "class Program { static void Main() { Console.WriteLine(1); } }";
        let normalized = normalize(source);

        assert_eq!(normalized.code, format!("using System;\n{}", source));
        assert!(normalize(&normalized.code).code == normalized.code);
    }

    #[test]
    fn test_main_without_class_is_wrapped() {
        let source = "static void Main()\n{\n    Console.WriteLine(\"hi\");\n}";
        let normalized = normalize(source);

        assert_eq!(
            normalized.code,
            "using System;\n\nclass Program\n{\n    static void Main()\n    {\n        Console.WriteLine(\"hi\");\n    }\n}\n"
        );
    }

    #[test]
    fn test_bare_statements_are_translated_and_wrapped() {
        let normalized = normalize("# greet\nprint(\"hi\");");

        assert_eq!(
            normalized.code,
            "using System;\n\nclass Program\n{\n    static void Main()\n    {\n        // greet\n        Console.WriteLine(\"hi\");\n    }\n}\n"
        );
        assert_eq!(normalize(&normalized.code).code, normalized.code);
    }

    #[test]
    fn test_existing_usings_are_kept_once() {
        let normalized = normalize("using System;\nusing System.Linq;\nvar xs = new[] { 3, 1, 2 };\nConsole.WriteLine(xs.Max());");

        assert!(normalized.code.starts_with("using System;\nusing System.Linq;\n\nclass Program"));
        assert_eq!(normalized.code.matches("using System;").count(), 1);
    }

    #[test]
    fn test_class_mentioned_in_string_is_not_a_declaration() {
        let normalized = normalize("Console.WriteLine(\"class X\");");

        assert_eq!(
            normalized.code,
            "using System;\n\nclass Program\n{\n    static void Main()\n    {\n        Console.WriteLine(\"class X\");\n    }\n}\n"
        );
    }

    #[test]
    fn test_commented_markers_are_ignored() {
        let source = "// using System; class Old\nConsole.WriteLine(@\"static void Main(\");";
        let normalized = normalize(source);

        assert!(normalized.code.starts_with("using System;\n\nclass Program\n{\n    static void Main()\n    {\n"));
        assert!(normalized.code.contains("        // using System; class Old"));
    }
}
