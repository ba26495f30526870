//! Context projection: linearizing a lineage into model-ready messages.

use std::collections::HashSet;
use std::sync::Arc;

use super::node::{ContextBehavior, Node};
use crate::types::{Message, NodeId};

/// Caller-supplied projection over a full lineage.
pub type ContextFn = Arc<dyn Fn(&[&Node]) -> Vec<Message> + Send + Sync>;

/// How a lineage is turned back into a message sequence.
#[derive(Clone, Default)]
pub enum ContextStrategy {
    /// One message per node: messages verbatim, merges and summaries as
    /// synthesized assistant turns, markers skipped
    #[default]
    Full,
    /// The last `count` message nodes, verbatim
    Recent {
        /// Number of trailing messages to keep
        count: usize,
    },
    /// Everything strictly after the named checkpoint; [`Full`](Self::Full)
    /// when the checkpoint is absent
    SinceCheckpoint {
        /// Checkpoint name to scan for
        name: String,
    },
    /// Full rules with summarized messages replaced by their summary text
    UseSummaries,
    /// Caller-supplied projection, applied to the raw lineage
    Custom(ContextFn),
}

impl std::fmt::Debug for ContextStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "Full"),
            Self::Recent { count } => f.debug_struct("Recent").field("count", count).finish(),
            Self::SinceCheckpoint { name } => f
                .debug_struct("SinceCheckpoint")
                .field("name", name)
                .finish(),
            Self::UseSummaries => write!(f, "UseSummaries"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Apply a strategy to an ordered lineage (root first).
pub fn project(lineage: &[&Node], strategy: &ContextStrategy) -> Vec<Message> {
    match strategy {
        ContextStrategy::Full => project_full(lineage, &HashSet::new()),
        ContextStrategy::Recent { count } => {
            if *count == 0 {
                return Vec::new();
            }
            let messages: Vec<Message> = lineage
                .iter()
                .filter_map(|n| n.as_message().cloned())
                .collect();
            let skip = messages.len().saturating_sub(*count);
            messages.into_iter().skip(skip).collect()
        }
        ContextStrategy::SinceCheckpoint { name } => {
            // The occurrence nearest the head wins when names repeat.
            let at = lineage.iter().rposition(
                |n| matches!(n, Node::Checkpoint(c) if c.name == *name),
            );
            match at {
                Some(idx) => project_full(&lineage[idx + 1..], &HashSet::new()),
                None => project_full(lineage, &HashSet::new()),
            }
        }
        ContextStrategy::UseSummaries => {
            let summarized: HashSet<&NodeId> = lineage
                .iter()
                .filter_map(|n| match n {
                    Node::Summary(s) => Some(s.summarizes.iter()),
                    _ => None,
                })
                .flatten()
                .collect();
            project_full(lineage, &summarized)
        }
        ContextStrategy::Custom(f) => f(lineage),
    }
}

/// Full-projection rules, skipping message nodes listed in `summarized`.
fn project_full(nodes: &[&Node], summarized: &HashSet<&NodeId>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Message(n) => {
                if !summarized.contains(&n.common.id) {
                    messages.push(n.message.clone());
                }
            }
            Node::Merge(n) => {
                messages.push(Message::assistant(format!(
                    "[Merged from {}]: {}",
                    n.from_branch, n.content
                )));
            }
            Node::Summary(n) => {
                messages.push(Message::assistant(format!("[Summary]: {}", n.content)));
            }
            Node::Provider(_) | Node::Checkpoint(_) => {}
            Node::Custom(n) => match n.context_behavior {
                ContextBehavior::Terminal => break,
                // Include is only meaningful to custom strategies.
                ContextBehavior::Include | ContextBehavior::Skip => {}
            },
        }
    }
    messages
}
