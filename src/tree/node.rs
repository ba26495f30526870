//! Typed nodes of the session tree.
//!
//! Every node flattens a [`NodeCommon`] carrying its id, parent pointer, the
//! branch it was added on, and a timestamp. The `branch` field labels which
//! branch the node was appended on, not which branches can see it; branches
//! share ancestors freely.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Message, NodeId, ProviderChoice, Role, SessionId};

/// Fields shared by every node variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeCommon {
    /// Node id, unique within the tree
    pub id: NodeId,
    /// Parent node id; `None` only for the first node of a lineage
    pub parent_id: Option<NodeId>,
    /// The branch this node was appended on
    pub branch: String,
    /// When the node was appended
    pub timestamp: DateTime<Utc>,
}

/// A finalized conversation turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageNode {
    #[serde(flatten)]
    pub common: NodeCommon,
    /// The message payload
    pub message: Message,
}

/// Records a model/configuration switch at this point in history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderNode {
    #[serde(flatten)]
    pub common: NodeCommon,
    /// Provider family
    pub api: String,
    /// Model identifier
    pub model_id: String,
    /// Provider-specific options
    #[serde(default)]
    pub provider_options: serde_json::Value,
}

/// Compressed stand-in for a set of earlier nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryNode {
    #[serde(flatten)]
    pub common: NodeCommon,
    /// The summary text
    pub content: String,
    /// Ids of the nodes this summary replaces
    pub summarizes: Vec<NodeId>,
}

/// Narrative record that another branch was folded in here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeNode {
    #[serde(flatten)]
    pub common: NodeCommon,
    /// Prose summary of the merged work
    pub content: String,
    /// The branch that was merged
    pub from_branch: String,
    /// Head of the merged branch at merge time (by value, not a pointer)
    pub from_head_id: NodeId,
}

/// Named marker for recall and navigation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointNode {
    #[serde(flatten)]
    pub common: NodeCommon,
    /// Checkpoint name
    pub name: String,
    /// Arbitrary caller metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// How a custom node participates in context projection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextBehavior {
    /// Offered to custom strategies
    #[default]
    Include,
    /// Never projected
    Skip,
    /// Projection stops at this node
    Terminal,
}

/// Extension slot for caller-defined node types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomNode {
    #[serde(flatten)]
    pub common: NodeCommon,
    /// Caller-defined discriminator
    pub subtype: String,
    /// Opaque payload
    pub data: serde_json::Value,
    /// Projection participation
    #[serde(default)]
    pub context_behavior: ContextBehavior,
}

/// One typed record in the tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Message(MessageNode),
    Provider(ProviderNode),
    Summary(SummaryNode),
    Merge(MergeNode),
    Checkpoint(CheckpointNode),
    Custom(CustomNode),
}

impl Node {
    /// The shared fields of this node
    pub fn common(&self) -> &NodeCommon {
        match self {
            Self::Message(n) => &n.common,
            Self::Provider(n) => &n.common,
            Self::Summary(n) => &n.common,
            Self::Merge(n) => &n.common,
            Self::Checkpoint(n) => &n.common,
            Self::Custom(n) => &n.common,
        }
    }

    /// Node id
    pub fn id(&self) -> &NodeId {
        &self.common().id
    }

    /// Parent node id
    pub fn parent_id(&self) -> Option<&NodeId> {
        self.common().parent_id.as_ref()
    }

    /// The branch this node was appended on
    pub fn branch(&self) -> &str {
        &self.common().branch
    }

    /// Append timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.common().timestamp
    }

    /// The message payload, for message nodes
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(n) => Some(&n.message),
            _ => None,
        }
    }

    /// Whether this is a message node with an assistant-role payload
    pub fn is_assistant_message(&self) -> bool {
        matches!(self.as_message(), Some(m) if m.role() == Role::Assistant)
    }
}

/// The first record of every tree: identity and optional initial provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeHeader {
    /// Session id
    pub id: SessionId,
    /// Working directory the session belongs to
    pub cwd: PathBuf,
    /// Creation time
    pub created: DateTime<Utc>,
    /// The branch appends default to when none was ever switched to
    pub default_branch: String,
    /// Initial provider family, if recorded at creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    /// Initial model id, if recorded at creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Initial provider options, if recorded at creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_options: Option<serde_json::Value>,
}

impl TreeHeader {
    /// The initial provider triple, when the header records a complete one
    pub fn initial_provider(&self) -> Option<ProviderChoice> {
        match (&self.api, &self.model_id) {
            (Some(api), Some(model_id)) => Some(ProviderChoice {
                api: api.clone(),
                model_id: model_id.clone(),
                options: self
                    .provider_options
                    .clone()
                    .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            }),
            _ => None,
        }
    }
}

/// Marks a branch switch; the last marker in the log wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveBranchMarker {
    /// The branch switched to
    pub branch: String,
    /// When the switch happened
    pub timestamp: DateTime<Utc>,
}

/// Derived per-branch information.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Branch name
    pub name: String,
    /// Id of the branch head, when the branch has nodes
    pub head_node_id: Option<NodeId>,
    /// Number of message nodes appended on this branch
    pub message_count: usize,
    /// Timestamp of the first node on this branch
    pub created: Option<DateTime<Utc>>,
    /// Timestamp of the last node on this branch
    pub last_modified: Option<DateTime<Utc>>,
}
