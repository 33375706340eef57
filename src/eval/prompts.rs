//! Prompt construction for the three approaches.

use crate::llm::Message;

/// System prompt shared by every approach.
pub const SYSTEM_PROMPT: &str = "You are an expert MongoDB developer writing Node.js code.

Respond with a single JavaScript snippet and nothing else.

The snippet runs inside an async function, so top-level `await` is allowed.
A connected MongoClient is available as the variable `client`; do not create
or close your own client. The `mongodb` package can be loaded with
`require('mongodb')`. No other modules, no filesystem and no network access
are available.";

/// Task prompt with no extra context.
pub fn baseline_prompt(prompt: &str) -> String {
    prompt.to_string()
}

/// Task prompt followed by reference documentation.
pub fn documentation_prompt(prompt: &str, documentation: &str) -> String {
    format!(
        "{}\n\nUse the following reference documentation:\n\n<documentation>\n{}\n</documentation>",
        prompt, documentation
    )
}

/// One skill file, labelled with its path.
pub fn skill_section(path: &str, content: &str) -> String {
    format!("## Skill: {}\n\n{}", path, content.trim_end())
}

/// Task prompt followed by the concatenated skill sections.
pub fn skill_prompt(prompt: &str, sections: &[String]) -> String {
    format!(
        "{}\n\nApply the following skill guidance:\n\n<skill>\n{}\n</skill>",
        prompt,
        sections.join("\n\n")
    )
}

/// Full message list for a generation request.
pub fn build_messages(user_prompt: String) -> Vec<Message> {
    vec![Message::system(SYSTEM_PROMPT), Message::user(user_prompt)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documentation_prompt_keeps_task_first() {
        let prompt = documentation_prompt("Create an index.", "Docs body");
        assert!(prompt.starts_with("Create an index.\n\n"));
        assert!(prompt.contains("<documentation>\nDocs body\n</documentation>"));
    }

    #[test]
    fn test_skill_prompt_labels_each_file() {
        let sections = vec![
            skill_section("skills/a.md", "Rule A\n"),
            skill_section("skills/b.md", "Rule B"),
        ];
        let prompt = skill_prompt("Create an index.", &sections);

        assert!(prompt.contains("## Skill: skills/a.md\n\nRule A\n\n## Skill: skills/b.md\n\nRule B"));
    }

    #[test]
    fn test_build_messages_roles() {
        let messages = build_messages(baseline_prompt("Do it"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1], Message::user("Do it"));
    }
}
