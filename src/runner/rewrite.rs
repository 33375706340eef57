//! Trailing-call rewrite for generated code.
//!
//! Models often define an async `main`-style function and invoke it on the
//! last line without `await`. Inside the sandbox's async wrapper that call's
//! promise would be dropped, and execution would finish before the database
//! work does. This transform awaits exactly that one shape and nothing else.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

fn bare_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\s*)([A-Za-z_$][A-Za-z0-9_$]*)\(\);\s*$").expect("valid bare call regex")
    })
}

/// Prefix the last non-blank line with `await` when it is a bare
/// `identifier();` call. Any other code is returned unchanged. Line endings,
/// including `\r\n`, are kept as they are.
pub fn await_trailing_call(code: &str) -> Cow<'_, str> {
    let lines: Vec<&str> = code.split_inclusive('\n').collect();
    let Some(last_idx) = lines.iter().rposition(|line| !line.trim().is_empty()) else {
        return Cow::Borrowed(code);
    };

    let line = lines[last_idx];
    let content = line.trim_end_matches(['\r', '\n']);
    let ending = &line[content.len()..];

    let Some(captures) = bare_call_pattern().captures(content) else {
        return Cow::Borrowed(code);
    };

    let indent = captures.get(1).map_or("", |m| m.as_str());
    let callee = captures.get(2).map_or("", |m| m.as_str());

    let mut out = String::with_capacity(code.len() + 6);
    out.extend(lines[..last_idx].iter().copied());
    out.push_str(indent);
    out.push_str("await ");
    out.push_str(callee);
    out.push_str("();");
    out.push_str(ending);
    out.extend(lines[last_idx + 1..].iter().copied());
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_trailing_call_is_awaited() {
        let code = "async function runIt() {\n  await client.db('x');\n}\nrunIt();";
        let rewritten = await_trailing_call(code);
        assert!(matches!(rewritten, Cow::Owned(_)));
        assert_eq!(
            rewritten,
            "async function runIt() {\n  await client.db('x');\n}\nawait runIt();"
        );
    }

    #[test]
    fn test_trailing_whitespace_and_newlines() {
        let code = "async function main() {}\n  main();  \n\n";
        assert_eq!(
            await_trailing_call(code),
            "async function main() {}\n  await main();\n\n"
        );
    }

    #[test]
    fn test_crlf_line_endings_are_kept() {
        let code = "async function main() {\r\n  await client.connect();\r\n}\r\nmain();\r\n";
        assert_eq!(
            await_trailing_call(code),
            "async function main() {\r\n  await client.connect();\r\n}\r\nawait main();\r\n"
        );
        assert_eq!(await_trailing_call("main();\r\n\r\n"), "await main();\r\n\r\n");
    }

    #[test]
    fn test_already_awaited_call_is_unchanged() {
        let code = "async function runIt() {}\nawait runIt();";
        assert!(matches!(await_trailing_call(code), Cow::Borrowed(_)));
    }

    #[test]
    fn test_other_statement_shapes_are_unchanged() {
        for code in [
            "runIt(client);",
            "runIt()",
            "main().catch(console.error);",
            "obj.run();",
            "const x = runIt();",
            "return runIt();",
            "runIt(); // go",
            "}",
            "",
        ] {
            assert_eq!(await_trailing_call(code), code, "rewrote {:?}", code);
        }
    }

    #[test]
    fn test_only_last_line_is_considered() {
        let code = "runIt();\nconsole.log('done');";
        assert_eq!(await_trailing_call(code), code);
    }

    #[test]
    fn test_dollar_and_underscore_identifiers() {
        assert_eq!(await_trailing_call("$run_1();"), "await $run_1();");
    }
}
