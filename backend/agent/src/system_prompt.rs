//! System prompt assembly.

use agentforge_core::ToolRegistry;

pub struct PromptBuilder;

impl PromptBuilder {
    /// Append the available tools and the textual call format to the base prompt.
    pub fn build(base: &str, tools: &ToolRegistry) -> String {
        if tools.is_empty() {
            return base.to_string();
        }

        let listing = tools
            .list()
            .into_iter()
            .filter_map(|name| tools.get(&name))
            .map(|tool| {
                let description = tool.description();
                if description.is_empty() {
                    format!("- {}", tool.name())
                } else {
                    format!("- {}: {}", tool.name(), description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\n\nTools available:\n{}\n\nTo call a tool, reply with a single JSON object: \
             {{\"tool\": \"<name>\", \"args\": {{...}}}}. Reply in plain text when you are done.",
            base, listing
        )
    }
}
