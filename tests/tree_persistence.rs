//! Persistence behavior of the session tree: lazy flush, log layout,
//! reopen fidelity, and session listing.

use std::path::{Path, PathBuf};

use agent_sessions::{
    AssistantMessage, ContextStrategy, Message, ProviderChoice, SessionTree, StopReason,
    TokenUsage,
};
use tempfile::TempDir;

mod common;

fn empty_assistant(id: &str) -> Message {
    Message::Assistant(AssistantMessage {
        id: Some(id.into()),
        content: vec![],
        usage: TokenUsage::default(),
        cost_usd: None,
        stop_reason: StopReason::Stop,
    })
}

#[tokio::test]
async fn lazy_flush_demarcation() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let provider = ProviderChoice::new("openai", "gpt-4")
        .with_options(serde_json::json!({"temperature": 0.7}));
    let mut tree = SessionTree::create("/tmp/project", tmp.path(), Some(provider))
        .await
        .unwrap();
    let path = tree.file_path().unwrap().to_path_buf();

    tree.append_message(Message::user("Hello").with_id("u1"), None)
        .await
        .unwrap();
    assert!(!path.exists(), "no file before the first assistant message");

    tree.append_message(empty_assistant("a1"), None)
        .await
        .unwrap();
    assert!(path.exists());

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);

    let header: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(header["type"], "tree");
    assert_eq!(header["api"], "openai");
    assert_eq!(header["model_id"], "gpt-4");
    assert_eq!(header["provider_options"]["temperature"], 0.7);

    let user: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(user["type"], "message");
    assert_eq!(user["id"], "u1");

    let assistant: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(assistant["type"], "message");
    assert_eq!(assistant["id"], "a1");
}

#[tokio::test]
async fn no_file_for_marker_only_records() {
    let tmp = TempDir::new().unwrap();
    let mut tree = SessionTree::create("/tmp/project", tmp.path(), None)
        .await
        .unwrap();
    let path = tree.file_path().unwrap().to_path_buf();

    tree.append_message(Message::user("only a user turn"), None)
        .await
        .unwrap();
    tree.append_checkpoint("mark", None, None).await.unwrap();
    tree.create_branch("side", None).unwrap();
    tree.switch_branch("side").await.unwrap();

    assert!(!path.exists());

    // The threshold message flushes everything buffered so far, in order.
    tree.append_message(empty_assistant("a1"), None)
        .await
        .unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    let types: Vec<String> = content
        .lines()
        .map(|l| {
            serde_json::from_str::<serde_json::Value>(l).unwrap()["type"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(
        types,
        vec!["tree", "message", "checkpoint", "active", "message"]
    );
}

#[tokio::test]
async fn streaming_appends_after_flush() {
    let tmp = TempDir::new().unwrap();
    let mut tree = SessionTree::create("/tmp/project", tmp.path(), None)
        .await
        .unwrap();
    tree.append_message(empty_assistant("a1"), None)
        .await
        .unwrap();
    let path = tree.file_path().unwrap().to_path_buf();
    let lines_before = std::fs::read_to_string(&path).unwrap().lines().count();

    tree.append_message(Message::user("next"), None)
        .await
        .unwrap();
    let lines_after = std::fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines_after, lines_before + 1);
}

#[tokio::test]
async fn reopen_preserves_branches_active_branch_and_context() {
    let tmp = TempDir::new().unwrap();
    let mut tree = SessionTree::create("/tmp/project", tmp.path(), None)
        .await
        .unwrap();
    tree.append_message(Message::user("u1").with_id("u1"), None)
        .await
        .unwrap();
    tree.append_message(Message::assistant("a1").with_id("a1"), None)
        .await
        .unwrap();
    tree.create_branch("feature", None).unwrap();
    tree.switch_branch("feature").await.unwrap();
    tree.append_message(Message::user("f1").with_id("f1"), None)
        .await
        .unwrap();
    tree.append_summary("early turns", vec!["u1".into()], None)
        .await
        .unwrap();
    let path = tree.file_path().unwrap().to_path_buf();

    let reopened = SessionTree::open(&path).await.unwrap();
    assert_eq!(reopened.list_branches(), tree.list_branches());
    assert_eq!(reopened.active_branch(), tree.active_branch());
    assert_eq!(
        reopened.build_context(None, &ContextStrategy::Full),
        tree.build_context(None, &ContextStrategy::Full)
    );
    assert_eq!(
        reopened.build_context(Some("main"), &ContextStrategy::UseSummaries),
        tree.build_context(Some("main"), &ContextStrategy::UseSummaries)
    );
}

#[tokio::test]
async fn reopen_tolerates_damaged_lines() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let mut tree = SessionTree::create("/tmp/project", tmp.path(), None)
        .await
        .unwrap();
    tree.append_message(Message::user("u1").with_id("u1"), None)
        .await
        .unwrap();
    tree.append_message(Message::assistant("a1").with_id("a1"), None)
        .await
        .unwrap();
    let path = tree.file_path().unwrap().to_path_buf();

    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("\n{truncated json\n\n");
    std::fs::write(&path, content).unwrap();

    let reopened = SessionTree::open(&path).await.unwrap();
    assert_eq!(reopened.node_count(), 2);
    assert_eq!(
        reopened.build_context(None, &ContextStrategy::Full).len(),
        2
    );
}

#[tokio::test]
async fn sessions_are_listed_most_recent_first() {
    let tmp = TempDir::new().unwrap();
    let cwd = PathBuf::from("/tmp/project");

    let mut first = SessionTree::create(&cwd, tmp.path(), None).await.unwrap();
    first
        .append_message(Message::user("earliest question"), None)
        .await
        .unwrap();
    first
        .append_message(empty_assistant("a1"), None)
        .await
        .unwrap();

    let mut second = SessionTree::create(&cwd, tmp.path(), None).await.unwrap();
    second
        .append_message(empty_assistant("b1"), None)
        .await
        .unwrap();
    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(10);
    std::fs::File::options()
        .append(true)
        .open(second.file_path().unwrap())
        .unwrap()
        .set_modified(later)
        .unwrap();

    let sessions = SessionTree::list_sessions(&cwd, tmp.path()).await;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].id, *second.session_id());
    assert_eq!(sessions[1].message_count, 2);
    assert_eq!(
        sessions[1].first_user_text.as_deref(),
        Some("earliest question")
    );

    let recent = SessionTree::find_recent(&cwd, tmp.path()).await.unwrap();
    assert_eq!(recent.session_id(), second.session_id());
}

#[tokio::test]
async fn session_directory_uses_sanitized_cwd() {
    let tmp = TempDir::new().unwrap();
    let tree = SessionTree::create("/home/alice/proj", tmp.path(), None)
        .await
        .unwrap();
    let path = tree.file_path().unwrap();
    assert_eq!(
        path.parent().unwrap(),
        tmp.path().join("sessions").join("--home-alice-proj--")
    );
    assert_eq!(path.extension().and_then(|s| s.to_str()), Some("jsonl"));
}

#[tokio::test]
async fn resume_restores_model() {
    let tmp = TempDir::new().unwrap();
    let provider = ProviderChoice::new("openai", "gpt-4");
    let mut tree = SessionTree::create("/tmp/project", tmp.path(), Some(provider))
        .await
        .unwrap();
    tree.append_message(empty_assistant("a1"), None)
        .await
        .unwrap();
    tree.append_provider("google", "gemini-3-flash", serde_json::json!({}), None)
        .await
        .unwrap();
    let path = tree.file_path().unwrap().to_path_buf();
    drop(tree);

    let reopened = SessionTree::open(&path).await.unwrap();
    let restored = reopened.last_provider(None).unwrap();
    assert_eq!(restored.api, "google");
    assert_eq!(restored.model_id, "gemini-3-flash");
    assert_eq!(restored.options, serde_json::json!({}));
}

#[tokio::test]
async fn open_rejects_paths_without_header() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();

    let missing = tmp.path().join("never-written.jsonl");
    assert!(matches!(
        SessionTree::open(&missing).await.unwrap_err().kind(),
        "session_file_missing"
    ));

    let headerless: &Path = &tmp.path().join("headerless.jsonl");
    std::fs::write(headerless, "not a record at all\n").unwrap();
    assert_eq!(
        SessionTree::open(headerless).await.unwrap_err().kind(),
        "session_header_missing"
    );
}
