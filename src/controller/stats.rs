//! Aggregate statistics over the conversation's loaded messages.

use std::path::PathBuf;

use serde::Serialize;

use crate::types::{Message, SessionId, TokenUsage};

/// Per-session counters and usage totals.
///
/// Built from the conversation's in-memory message list, not the tree, so
/// turns that never finalized are excluded.
#[derive(Clone, Debug, Serialize)]
pub struct SessionStats {
    /// Session id from the tree header
    pub session_id: SessionId,
    /// Log file path; `None` for in-memory trees
    pub session_path: Option<PathBuf>,
    /// The branch appends currently default to
    pub active_branch: String,
    /// Loaded user messages
    pub user_messages: usize,
    /// Loaded assistant messages
    pub assistant_messages: usize,
    /// Loaded tool-result messages
    pub tool_results: usize,
    /// Tool calls across assistant messages
    pub tool_calls: usize,
    /// Accumulated token usage across assistant messages
    pub usage: TokenUsage,
    /// Input + output token total
    pub total_tokens: u64,
    /// Accumulated cost across assistant messages
    pub total_cost_usd: f64,
}

impl SessionStats {
    pub(crate) fn build(
        messages: &[Message],
        session_id: SessionId,
        session_path: Option<PathBuf>,
        active_branch: String,
    ) -> Self {
        let mut user_messages = 0;
        let mut assistant_messages = 0;
        let mut tool_results = 0;
        let mut tool_calls = 0;
        let mut usage = TokenUsage::default();
        let mut total_cost_usd = 0.0;

        for message in messages {
            match message {
                Message::User(_) => user_messages += 1,
                Message::Assistant(m) => {
                    assistant_messages += 1;
                    tool_calls += message.tool_calls().len();
                    usage.add(&m.usage);
                    total_cost_usd += m.cost_usd.unwrap_or(0.0);
                }
                Message::ToolResult(_) => tool_results += 1,
            }
        }

        Self {
            session_id,
            session_path,
            active_branch,
            user_messages,
            assistant_messages,
            tool_results,
            tool_calls,
            usage,
            total_tokens: usage.total(),
            total_cost_usd,
        }
    }
}
