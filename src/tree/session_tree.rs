//! The session tree store.
//!
//! A [`SessionTree`] owns every node of one agent session. Appends resolve
//! their parent pointer from the target branch (consuming a pending-branch
//! anchor when one exists), records stream to an append-only log once the
//! lazy-flush threshold is crossed, and projections linearize a lineage
//! under a [`ContextStrategy`](super::ContextStrategy).
//!
//! A log file is owned by exactly one tree instance; opening the same file
//! from two trees simultaneously is undefined.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::context::{self, ContextStrategy};
use super::node::{
    ActiveBranchMarker, BranchInfo, CheckpointNode, ContextBehavior, CustomNode, MergeNode,
    MessageNode, Node, NodeCommon, ProviderNode, SummaryNode, TreeHeader,
};
use super::persistence::{
    self, Record, SessionSummary, append_records_sync, list_sessions_sync, read_records_sync,
};
use super::{TreeError, TreeResult};
use crate::types::{Message, NodeId, ProviderChoice, SessionId};

/// The branch every fresh tree starts on.
pub const DEFAULT_BRANCH: &str = "main";

/// Branching, append-only history store for one agent session.
#[derive(Debug)]
pub struct SessionTree {
    header: TreeHeader,
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    active_branch: String,
    /// Branches registered but not yet materialized: name -> anchor node.
    /// In-memory only; a pending branch that never receives a node is lost
    /// on reload because the log never recorded it.
    pending_branches: HashMap<String, Option<NodeId>>,
    path: Option<PathBuf>,
    buffered: Vec<Record>,
    flushed: bool,
}

impl SessionTree {
    /// Create a fresh tree persisted under `agent_dir`.
    ///
    /// The session directory is created now; the log file itself is not
    /// written until the first assistant message is appended.
    pub async fn create(
        cwd: impl Into<PathBuf>,
        agent_dir: &Path,
        initial_provider: Option<ProviderChoice>,
    ) -> TreeResult<Self> {
        let cwd = cwd.into();
        let dir = persistence::sessions_dir(agent_dir, &cwd);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| TreeError::Persistence {
                message: format!("Failed to create session directory {}: {}", dir.display(), e),
            })?;

        let header = Self::new_header(cwd, initial_provider);
        let path = dir.join(persistence::session_file_name(header.created, &header.id));
        Ok(Self::from_header(header, Some(path)))
    }

    /// Create a tree with persistence disabled.
    pub fn in_memory(cwd: Option<PathBuf>, initial_provider: Option<ProviderChoice>) -> Self {
        let cwd = cwd.unwrap_or_else(|| PathBuf::from("."));
        Self::from_header(Self::new_header(cwd, initial_provider), None)
    }

    fn new_header(cwd: PathBuf, initial_provider: Option<ProviderChoice>) -> TreeHeader {
        let (api, model_id, provider_options) = match initial_provider {
            Some(p) => (Some(p.api), Some(p.model_id), Some(p.options)),
            None => (None, None, None),
        };
        TreeHeader {
            id: SessionId::new(),
            cwd,
            created: Utc::now(),
            default_branch: DEFAULT_BRANCH.to_string(),
            api,
            model_id,
            provider_options,
        }
    }

    fn from_header(header: TreeHeader, path: Option<PathBuf>) -> Self {
        let buffered = if path.is_some() {
            vec![Record::Tree(header.clone())]
        } else {
            Vec::new()
        };
        Self {
            active_branch: header.default_branch.clone(),
            header,
            nodes: Vec::new(),
            index: HashMap::new(),
            pending_branches: HashMap::new(),
            path,
            buffered,
            flushed: false,
        }
    }

    /// Open a tree from an existing log file.
    ///
    /// Malformed lines and nodes with unresolvable parents are dropped with
    /// a diagnostic; the header must be present or opening fails.
    pub async fn open(path: impl Into<PathBuf>) -> TreeResult<Self> {
        let path = path.into();
        let read_path = path.clone();
        let records = tokio::task::spawn_blocking(move || read_records_sync(&read_path))
            .await
            .map_err(|e| TreeError::Persistence {
                message: format!("Task join error: {}", e),
            })??;

        let mut header: Option<TreeHeader> = None;
        let mut nodes: Vec<Node> = Vec::with_capacity(records.len());
        let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(records.len());
        let mut active: Option<String> = None;

        for record in records {
            match record {
                Record::Tree(h) => {
                    if header.is_none() {
                        header = Some(h);
                    } else {
                        tracing::warn!(path = %path.display(), "Ignoring duplicate header record");
                    }
                }
                Record::Active(marker) => active = Some(marker.branch),
                other => {
                    let Some(node) = other.into_node() else {
                        continue;
                    };
                    if let Some(parent) = node.parent_id()
                        && !index.contains_key(parent)
                    {
                        tracing::warn!(
                            node = %node.id(),
                            parent = %parent,
                            "Dropping node with unresolvable parent"
                        );
                        continue;
                    }
                    index.insert(node.id().clone(), nodes.len());
                    nodes.push(node);
                }
            }
        }

        let header = header.ok_or_else(|| TreeError::SessionHeaderMissing { path: path.clone() })?;

        Ok(Self {
            active_branch: active.unwrap_or_else(|| header.default_branch.clone()),
            header,
            nodes,
            index,
            pending_branches: HashMap::new(),
            path: Some(path),
            buffered: Vec::new(),
            flushed: true,
        })
    }

    /// Open the most recently modified session for `cwd`, if any.
    pub async fn find_recent(cwd: &Path, agent_dir: &Path) -> Option<Self> {
        for summary in Self::list_sessions(cwd, agent_dir).await {
            match Self::open(&summary.path).await {
                Ok(tree) => return Some(tree),
                Err(e) => {
                    tracing::warn!(path = %summary.path.display(), error = %e, "Skipping unopenable session");
                }
            }
        }
        None
    }

    /// Resume the most recent session for `cwd`, or create a fresh one.
    pub async fn continue_recent(
        cwd: &Path,
        agent_dir: &Path,
        initial_provider: Option<ProviderChoice>,
    ) -> TreeResult<Self> {
        match Self::find_recent(cwd, agent_dir).await {
            Some(tree) => Ok(tree),
            None => Self::create(cwd.to_path_buf(), agent_dir, initial_provider).await,
        }
    }

    /// List stored sessions for `cwd`, most recently modified first.
    pub async fn list_sessions(cwd: &Path, agent_dir: &Path) -> Vec<SessionSummary> {
        let cwd = cwd.to_path_buf();
        let agent_dir = agent_dir.to_path_buf();
        tokio::task::spawn_blocking(move || list_sessions_sync(&agent_dir, &cwd))
            .await
            .unwrap_or_default()
    }

    /// A fresh tree rooted in the same working directory.
    ///
    /// The old log file persists on disk; this tree's handle is unaffected.
    pub async fn reset(&self, agent_dir: &Path) -> TreeResult<Self> {
        if self.path.is_none() {
            return Ok(Self::in_memory(Some(self.header.cwd.clone()), None));
        }
        Self::create(self.header.cwd.clone(), agent_dir, None).await
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The tree header
    pub fn header(&self) -> &TreeHeader {
        &self.header
    }

    /// Session id from the header
    pub fn session_id(&self) -> &SessionId {
        &self.header.id
    }

    /// Working directory from the header
    pub fn cwd(&self) -> &Path {
        &self.header.cwd
    }

    /// The branch appends currently default to
    pub fn active_branch(&self) -> &str {
        &self.active_branch
    }

    /// Path of the log file; `None` for in-memory trees
    pub fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether buffered records have reached the log file
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Total node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Count of message nodes across all branches
    pub fn message_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.as_message().is_some()).count()
    }

    /// Look up a node by id
    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// The last node appended on a branch (the active branch by default)
    pub fn get_head_node(&self, branch: Option<&str>) -> Option<&Node> {
        let branch = branch.unwrap_or(&self.active_branch);
        self.nodes.iter().rev().find(|n| n.branch() == branch)
    }

    /// The ordered chain `[root, …, node]`, or empty for an unknown id.
    pub fn get_lineage(&self, id: &NodeId) -> Vec<&Node> {
        let mut chain = Vec::new();
        let mut current = self.index.get(id).copied();
        // Append-time validation rules out cycles; the cap guards a log
        // damaged by hand.
        while let Some(idx) = current {
            chain.push(&self.nodes[idx]);
            if chain.len() > self.nodes.len() {
                break;
            }
            current = self.nodes[idx]
                .parent_id()
                .and_then(|p| self.index.get(p))
                .copied();
        }
        chain.reverse();
        chain
    }

    /// Direct children of a node
    pub fn get_children(&self, id: &NodeId) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.parent_id() == Some(id))
            .collect()
    }

    /// The provider in effect at a branch head.
    ///
    /// The most recent provider node on the lineage wins; the header's
    /// initial provider is the fallback.
    pub fn last_provider(&self, branch: Option<&str>) -> Option<ProviderChoice> {
        if let Some(head) = self.get_head_node(branch) {
            let head_id = head.id().clone();
            for node in self.get_lineage(&head_id).iter().rev() {
                if let Node::Provider(p) = node {
                    return Some(ProviderChoice {
                        api: p.api.clone(),
                        model_id: p.model_id.clone(),
                        options: p.provider_options.clone(),
                    });
                }
            }
        }
        self.header.initial_provider()
    }

    /// Per-branch information: the default branch, every branch with nodes,
    /// and pending branches.
    pub fn list_branches(&self) -> Vec<BranchInfo> {
        let mut infos: Vec<BranchInfo> = vec![BranchInfo {
            name: self.header.default_branch.clone(),
            head_node_id: None,
            message_count: 0,
            created: None,
            last_modified: None,
        }];

        for node in &self.nodes {
            let idx = match infos.iter().position(|i| i.name == node.branch()) {
                Some(idx) => idx,
                None => {
                    infos.push(BranchInfo {
                        name: node.branch().to_string(),
                        head_node_id: None,
                        message_count: 0,
                        created: None,
                        last_modified: None,
                    });
                    infos.len() - 1
                }
            };
            let info = &mut infos[idx];
            info.head_node_id = Some(node.id().clone());
            if node.as_message().is_some() {
                info.message_count += 1;
            }
            if info.created.is_none() {
                info.created = Some(node.timestamp());
            }
            info.last_modified = Some(node.timestamp());
        }

        for name in self.pending_branches.keys() {
            if !infos.iter().any(|i| &i.name == name) {
                infos.push(BranchInfo {
                    name: name.clone(),
                    head_node_id: None,
                    message_count: 0,
                    created: None,
                    last_modified: None,
                });
            }
        }

        infos
    }

    /// Information for one branch, when it exists in any form
    pub fn branch_info(&self, name: &str) -> Option<BranchInfo> {
        self.list_branches().into_iter().find(|i| i.name == name)
    }

    /// Project the lineage to a branch head into a message sequence.
    pub fn build_context(&self, branch: Option<&str>, strategy: &ContextStrategy) -> Vec<Message> {
        let Some(head) = self.get_head_node(branch) else {
            return Vec::new();
        };
        let head_id = head.id().clone();
        let lineage = self.get_lineage(&head_id);
        context::project(&lineage, strategy)
    }

    // ------------------------------------------------------------------
    // Branch operations
    // ------------------------------------------------------------------

    fn branch_exists(&self, name: &str) -> bool {
        name == self.header.default_branch
            || self.pending_branches.contains_key(name)
            || self.nodes.iter().any(|n| n.branch() == name)
    }

    /// Register a branch diverging at `from_node_id` (default: the head of
    /// the active branch). No node is written; the first append on the new
    /// branch consumes the anchor.
    pub fn create_branch(&mut self, name: &str, from_node_id: Option<&NodeId>) -> TreeResult<()> {
        if self.branch_exists(name) {
            return Err(TreeError::BranchAlreadyExists {
                name: name.to_string(),
            });
        }
        let anchor = match from_node_id {
            Some(id) => {
                if !self.index.contains_key(id) {
                    return Err(TreeError::UnknownNode { id: id.clone() });
                }
                Some(id.clone())
            }
            None => self.get_head_node(None).map(|n| n.id().clone()),
        };
        self.pending_branches.insert(name.to_string(), anchor);
        tracing::debug!(branch = name, "Registered pending branch");
        Ok(())
    }

    /// Make `name` the branch appends default to and record the switch.
    pub async fn switch_branch(&mut self, name: &str) -> TreeResult<()> {
        if !self.branch_exists(name) {
            return Err(TreeError::UnknownBranch {
                name: name.to_string(),
            });
        }
        self.active_branch = name.to_string();
        self.persist(Record::Active(ActiveBranchMarker {
            branch: name.to_string(),
            timestamp: Utc::now(),
        }))
        .await
    }

    /// Fold `from_branch` into `into_branch` (default: active) as a single
    /// narrative node. No message-level rebase happens.
    pub async fn merge(
        &mut self,
        from_branch: &str,
        summary: impl Into<String>,
        into_branch: Option<&str>,
    ) -> TreeResult<MergeNode> {
        let from_head_id = self
            .get_head_node(Some(from_branch))
            .map(|n| n.id().clone())
            .ok_or_else(|| TreeError::EmptyMergeSource {
                branch: from_branch.to_string(),
            })?;

        let branch = into_branch.unwrap_or(&self.active_branch).to_string();
        let parent_id = self.resolve_parent(&branch)?;
        let node = MergeNode {
            common: self.new_common(parent_id, branch),
            content: summary.into(),
            from_branch: from_branch.to_string(),
            from_head_id,
        };
        self.insert(Node::Merge(node.clone()), Record::Merge(node.clone()))
            .await?;
        Ok(node)
    }

    // ------------------------------------------------------------------
    // Appends
    // ------------------------------------------------------------------

    /// Append a finalized message on `branch` (default: active).
    ///
    /// A message-carried id becomes the node id; otherwise one is generated.
    pub async fn append_message(
        &mut self,
        message: Message,
        branch: Option<&str>,
    ) -> TreeResult<MessageNode> {
        let branch = branch.unwrap_or(&self.active_branch).to_string();
        let parent_id = self.resolve_parent(&branch)?;
        let id = message.id().cloned().unwrap_or_default();
        let node = MessageNode {
            common: NodeCommon {
                id,
                parent_id,
                branch,
                timestamp: Utc::now(),
            },
            message,
        };
        self.insert(Node::Message(node.clone()), Record::Message(node.clone()))
            .await?;
        Ok(node)
    }

    /// Record a model/configuration switch on `branch` (default: active).
    pub async fn append_provider(
        &mut self,
        api: impl Into<String>,
        model_id: impl Into<String>,
        provider_options: serde_json::Value,
        branch: Option<&str>,
    ) -> TreeResult<ProviderNode> {
        let branch = branch.unwrap_or(&self.active_branch).to_string();
        let parent_id = self.resolve_parent(&branch)?;
        let node = ProviderNode {
            common: self.new_common(parent_id, branch),
            api: api.into(),
            model_id: model_id.into(),
            provider_options,
        };
        self.insert(Node::Provider(node.clone()), Record::Provider(node.clone()))
            .await?;
        Ok(node)
    }

    /// Append a summary standing in for the listed nodes.
    pub async fn append_summary(
        &mut self,
        content: impl Into<String>,
        summarizes: Vec<NodeId>,
        branch: Option<&str>,
    ) -> TreeResult<SummaryNode> {
        let branch = branch.unwrap_or(&self.active_branch).to_string();
        let parent_id = self.resolve_parent(&branch)?;
        let node = SummaryNode {
            common: self.new_common(parent_id, branch),
            content: content.into(),
            summarizes,
        };
        self.insert(Node::Summary(node.clone()), Record::Summary(node.clone()))
            .await?;
        Ok(node)
    }

    /// Append a named checkpoint marker.
    pub async fn append_checkpoint(
        &mut self,
        name: impl Into<String>,
        metadata: Option<HashMap<String, serde_json::Value>>,
        branch: Option<&str>,
    ) -> TreeResult<CheckpointNode> {
        let branch = branch.unwrap_or(&self.active_branch).to_string();
        let parent_id = self.resolve_parent(&branch)?;
        let node = CheckpointNode {
            common: self.new_common(parent_id, branch),
            name: name.into(),
            metadata: metadata.unwrap_or_default(),
        };
        self.insert(
            Node::Checkpoint(node.clone()),
            Record::Checkpoint(node.clone()),
        )
        .await?;
        Ok(node)
    }

    /// Append a caller-defined node.
    pub async fn append_custom(
        &mut self,
        subtype: impl Into<String>,
        data: serde_json::Value,
        context_behavior: Option<ContextBehavior>,
        branch: Option<&str>,
    ) -> TreeResult<CustomNode> {
        let branch = branch.unwrap_or(&self.active_branch).to_string();
        let parent_id = self.resolve_parent(&branch)?;
        let node = CustomNode {
            common: self.new_common(parent_id, branch),
            subtype: subtype.into(),
            data,
            context_behavior: context_behavior.unwrap_or_default(),
        };
        self.insert(Node::Custom(node.clone()), Record::Custom(node.clone()))
            .await?;
        Ok(node)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn new_common(&self, parent_id: Option<NodeId>, branch: String) -> NodeCommon {
        NodeCommon {
            id: NodeId::new(),
            parent_id,
            branch,
            timestamp: Utc::now(),
        }
    }

    /// Pick the parent for the next node on `branch`: a pending anchor is
    /// consumed first, then the branch head, then none.
    fn resolve_parent(&mut self, branch: &str) -> TreeResult<Option<NodeId>> {
        let Some(anchor) = self.pending_branches.get(branch).cloned() else {
            return Ok(self.get_head_node(Some(branch)).map(|n| n.id().clone()));
        };
        if let Some(id) = &anchor
            && !self.index.contains_key(id)
        {
            return Err(TreeError::UnknownNode { id: id.clone() });
        }
        self.pending_branches.remove(branch);
        Ok(anchor)
    }

    async fn insert(&mut self, node: Node, record: Record) -> TreeResult<()> {
        self.index.insert(node.id().clone(), self.nodes.len());
        self.nodes.push(node);
        self.persist(record).await
    }

    /// Buffer records until the first assistant message, then stream.
    async fn persist(&mut self, record: Record) -> TreeResult<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        if self.flushed {
            return Self::write_records(path, vec![record]).await;
        }

        let crosses_threshold = record.is_assistant_message();
        self.buffered.push(record);
        if crosses_threshold {
            Self::write_records(path.clone(), self.buffered.clone()).await?;
            self.buffered.clear();
            self.flushed = true;
            tracing::debug!(path = %path.display(), "Session log flushed");
        }
        Ok(())
    }

    async fn write_records(path: PathBuf, records: Vec<Record>) -> TreeResult<()> {
        tokio::task::spawn_blocking(move || append_records_sync(&path, &records))
            .await
            .map_err(|e| TreeError::Persistence {
                message: format!("Task join error: {}", e),
            })?
    }
}
