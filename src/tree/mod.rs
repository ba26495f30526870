//! The session tree: a persistent, append-only, branching history of
//! conversation nodes with pluggable context projection.

pub mod context;
pub mod node;
pub mod persistence;
pub mod session_tree;
pub mod summarize;

pub use context::{ContextFn, ContextStrategy};
pub use node::{
    ActiveBranchMarker, BranchInfo, CheckpointNode, ContextBehavior, CustomNode, MergeNode,
    MessageNode, Node, NodeCommon, ProviderNode, SummaryNode, TreeHeader,
};
pub use persistence::SessionSummary;
pub use session_tree::SessionTree;

use std::path::PathBuf;

use thiserror::Error;

use crate::types::NodeId;

/// Errors surfaced by session tree operations
#[derive(Error, Debug)]
pub enum TreeError {
    /// Branch neither has nodes, nor is pending, nor is the default
    #[error("Unknown branch: {name}")]
    UnknownBranch {
        /// The branch name that failed to resolve
        name: String,
    },

    /// A branch with this name already exists or is pending
    #[error("Branch already exists: {name}")]
    BranchAlreadyExists {
        /// The conflicting branch name
        name: String,
    },

    /// A node id failed to resolve
    #[error("Unknown node: {id}")]
    UnknownNode {
        /// The id that failed to resolve
        id: NodeId,
    },

    /// Merge requested from a branch with no nodes
    #[error("Cannot merge from empty branch: {branch}")]
    EmptyMergeSource {
        /// The empty source branch
        branch: String,
    },

    /// The session log file does not exist
    #[error("Session file missing: {path}")]
    SessionFileMissing {
        /// The path that was opened
        path: PathBuf,
    },

    /// The session log file has no header record
    #[error("Session header missing in {path}")]
    SessionHeaderMissing {
        /// The path that was opened
        path: PathBuf,
    },

    /// Log file read or write failed
    #[error("Persistence error: {message}")]
    Persistence {
        /// Description of the failure
        message: String,
    },

    /// Record serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TreeError {
    /// Stable kind tag for display and matching
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownBranch { .. } => "unknown_branch",
            Self::BranchAlreadyExists { .. } => "branch_already_exists",
            Self::UnknownNode { .. } => "unknown_node",
            Self::EmptyMergeSource { .. } => "empty_merge_source",
            Self::SessionFileMissing { .. } => "session_file_missing",
            Self::SessionHeaderMissing { .. } => "session_header_missing",
            Self::Persistence { .. } => "persistence_io",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Result type for tree operations
pub type TreeResult<T> = std::result::Result<T, TreeError>;
