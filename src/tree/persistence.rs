//! Append-only newline-delimited record log.
//!
//! One file per tree under `<agent_dir>/sessions/<sanitized_cwd>/`, one JSON
//! object per line, first line the header. The log is a behavioral record,
//! not a ledger: blank lines are ignored and malformed lines are skipped
//! with a diagnostic so a damaged file still loads partially.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node::{
    ActiveBranchMarker, CheckpointNode, CustomNode, MergeNode, MessageNode, Node, ProviderNode,
    SummaryNode, TreeHeader,
};
use super::{TreeError, TreeResult};
use crate::types::{Message, Role, SessionId};

/// One line of the session log.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// The header; exactly one per tree, always the first record
    Tree(TreeHeader),
    Message(MessageNode),
    Provider(ProviderNode),
    Summary(SummaryNode),
    Merge(MergeNode),
    Checkpoint(CheckpointNode),
    Custom(CustomNode),
    /// Active-branch marker; the last one in the log wins
    Active(ActiveBranchMarker),
}

impl Record {
    pub fn from_node(node: &Node) -> Self {
        match node {
            Node::Message(n) => Record::Message(n.clone()),
            Node::Provider(n) => Record::Provider(n.clone()),
            Node::Summary(n) => Record::Summary(n.clone()),
            Node::Merge(n) => Record::Merge(n.clone()),
            Node::Checkpoint(n) => Record::Checkpoint(n.clone()),
            Node::Custom(n) => Record::Custom(n.clone()),
        }
    }

    pub fn into_node(self) -> Option<Node> {
        match self {
            Record::Message(n) => Some(Node::Message(n)),
            Record::Provider(n) => Some(Node::Provider(n)),
            Record::Summary(n) => Some(Node::Summary(n)),
            Record::Merge(n) => Some(Node::Merge(n)),
            Record::Checkpoint(n) => Some(Node::Checkpoint(n)),
            Record::Custom(n) => Some(Node::Custom(n)),
            Record::Tree(_) | Record::Active(_) => None,
        }
    }

    /// Whether this record crosses the lazy-flush threshold
    pub fn is_assistant_message(&self) -> bool {
        matches!(self, Record::Message(n) if n.message.role() == Role::Assistant)
    }
}

/// Encode a working directory for use as a directory name.
///
/// Drops the leading path separator, replaces remaining separators and
/// colons with dashes, and wraps the result in `--…--`.
pub fn sanitize_cwd(cwd: &Path) -> String {
    let raw = cwd.to_string_lossy();
    let trimmed = raw.trim_start_matches(['/', '\\']);
    let encoded = trimmed.replace(['/', '\\', ':'], "-");
    format!("--{}--", encoded)
}

/// Directory holding the session logs for one working directory.
pub fn sessions_dir(agent_dir: &Path, cwd: &Path) -> PathBuf {
    agent_dir.join("sessions").join(sanitize_cwd(cwd))
}

/// File name for a session log; uniqueness comes from the id, not the time.
pub fn session_file_name(created: DateTime<Utc>, id: &SessionId) -> String {
    format!("{}_{}.jsonl", created.format("%Y-%m-%dT%H-%M-%S-%3fZ"), id)
}

pub(crate) fn read_records_sync(path: &Path) -> TreeResult<Vec<Record>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TreeError::SessionFileMissing {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(TreeError::Persistence {
                message: format!("Failed to open {}: {}", path.display(), e),
            });
        }
    };

    let reader = BufReader::with_capacity(64 * 1024, file);
    let mut records = Vec::with_capacity(128);

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| TreeError::Persistence {
            message: format!("Read error at line {}: {}", line_num + 1, e),
        })?;

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Record>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = line_num + 1,
                    error = %e,
                    "Skipping malformed session record"
                );
            }
        }
    }

    Ok(records)
}

pub(crate) fn append_records_sync(path: &Path, records: &[Record]) -> TreeResult<()> {
    if records.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TreeError::Persistence {
            message: format!("Failed to create directory {}: {}", parent.display(), e),
        })?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TreeError::Persistence {
            message: format!("Failed to open {} for writing: {}", path.display(), e),
        })?;

    let mut writer = std::io::BufWriter::with_capacity(64 * 1024, file);

    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writeln!(writer).map_err(|e| TreeError::Persistence {
            message: format!("Write failed: {}", e),
        })?;
    }

    writer.flush().map_err(|e| TreeError::Persistence {
        message: format!("Flush failed: {}", e),
    })
}

/// Display-oriented summary of one stored session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Path of the log file
    pub path: PathBuf,
    /// Session id from the header
    pub id: SessionId,
    /// Working directory from the header
    pub cwd: PathBuf,
    /// Creation time from the header
    pub created: DateTime<Utc>,
    /// Number of message nodes in the log
    pub message_count: usize,
    /// Text of the first user message, for display
    pub first_user_text: Option<String>,
    /// File modification time
    pub modified: DateTime<Utc>,
}

/// Scan a sessions directory, most recently modified first.
///
/// Files without a parsable header are skipped.
pub(crate) fn list_sessions_sync(agent_dir: &Path, cwd: &Path) -> Vec<SessionSummary> {
    let dir = sessions_dir(agent_dir, cwd);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut summaries = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let records = match read_records_sync(&path) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable session");
                continue;
            }
        };

        if let Some(summary) = summarize_records(path, modified, &records) {
            summaries.push(summary);
        }
    }

    summaries.sort_by(|a, b| b.modified.cmp(&a.modified));
    summaries
}

fn summarize_records(
    path: PathBuf,
    modified: DateTime<Utc>,
    records: &[Record],
) -> Option<SessionSummary> {
    let header = records.iter().find_map(|r| match r {
        Record::Tree(h) => Some(h),
        _ => None,
    })?;

    let mut message_count = 0;
    let mut first_user_text = None;
    for record in records {
        if let Record::Message(node) = record {
            message_count += 1;
            if first_user_text.is_none()
                && let Message::User(_) = &node.message
            {
                first_user_text = Some(node.message.text());
            }
        }
    }

    Some(SessionSummary {
        path,
        id: header.id.clone(),
        cwd: header.cwd.clone(),
        created: header.created,
        message_count,
        first_user_text,
        modified,
    })
}
