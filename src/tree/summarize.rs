//! Summarization prompt assembly.
//!
//! Builds the request text for compacting a span of conversation into a
//! structured summary. The model call itself belongs to the provider layer;
//! this module only formats.

use crate::types::{Message, Role};

const SUMMARIZATION_PROMPT: &str = r#"Create a structured summary of this conversation so that work can continue from the summary alone.

Cover, as separate sections:
1. **Goal**: what the user is trying to accomplish
2. **Constraints**: requirements, preferences, and limits stated along the way
3. **Progress**: what has been done so far, including files touched
4. **Decisions**: choices made and the reasons given for them
5. **Next steps**: what remains, in the order it should happen

Be concise but keep every detail needed to continue without re-reading the original turns."#;

const MAX_BLOCK_CHARS: usize = 2000;

/// Build the full summarization request for a span of messages.
pub fn summarization_request(messages: &[Message]) -> String {
    let mut request = String::from(SUMMARIZATION_PROMPT);
    request.push_str("\n\n---\n\n");

    for message in messages {
        let role = match message.role() {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::ToolResult => "Tool",
        };
        request.push_str(role);
        request.push_str(":\n");

        let text = message.text();
        if text.len() > MAX_BLOCK_CHARS {
            let cut = text
                .char_indices()
                .map(|(i, _)| i)
                .find(|&i| i >= MAX_BLOCK_CHARS)
                .unwrap_or(text.len());
            request.push_str(&text[..cut]);
            request.push_str("... [truncated]");
        } else {
            request.push_str(&text);
        }
        request.push_str("\n\n");
    }

    request
}
