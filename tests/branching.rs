//! Branch semantics: isolation, pending anchors, merges and checkpoints.

use agent_sessions::{ContextStrategy, Message, NodeId, SessionTree};

mod common;

fn tree() -> SessionTree {
    SessionTree::in_memory(None, None)
}

async fn seed_main(tree: &mut SessionTree) {
    tree.append_message(Message::user("u1").with_id("u1"), None)
        .await
        .unwrap();
    tree.append_message(Message::assistant("a1").with_id("a1"), None)
        .await
        .unwrap();
}

fn texts(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.text()).collect()
}

#[tokio::test]
async fn branch_isolation() {
    common::init_tracing();
    let mut tree = tree();
    seed_main(&mut tree).await;

    tree.create_branch("feature", None).unwrap();
    tree.switch_branch("feature").await.unwrap();
    tree.append_message(Message::user("u2").with_id("u2"), None)
        .await
        .unwrap();

    let main = tree.build_context(Some("main"), &ContextStrategy::Full);
    assert_eq!(texts(&main), vec!["u1", "a1"]);

    let feature = tree.build_context(Some("feature"), &ContextStrategy::Full);
    assert_eq!(texts(&feature), vec!["u1", "a1", "u2"]);
}

#[tokio::test]
async fn switching_back_does_not_observe_branch_work() {
    let mut tree = tree();
    seed_main(&mut tree).await;

    tree.create_branch("feature", None).unwrap();
    tree.switch_branch("feature").await.unwrap();
    tree.append_message(Message::user("m").with_id("m"), None)
        .await
        .unwrap();

    tree.switch_branch("main").await.unwrap();
    let context = tree.build_context(None, &ContextStrategy::Full);
    assert!(!texts(&context).contains(&"m".to_string()));
    assert_eq!(context.len(), 2);
}

#[tokio::test]
async fn branch_from_an_earlier_node() {
    let mut tree = tree();
    seed_main(&mut tree).await;
    tree.append_message(Message::user("u2").with_id("u2"), None)
        .await
        .unwrap();

    tree.create_branch("from-start", Some(&NodeId::from_string("u1")))
        .unwrap();
    tree.append_message(
        Message::user("divergent").with_id("d1"),
        Some("from-start"),
    )
    .await
    .unwrap();

    let context = tree.build_context(Some("from-start"), &ContextStrategy::Full);
    assert_eq!(texts(&context), vec!["u1", "divergent"]);
}

#[tokio::test]
async fn empty_branch_projects_nothing() {
    let mut tree = tree();
    seed_main(&mut tree).await;
    tree.create_branch("untouched", None).unwrap();
    tree.switch_branch("untouched").await.unwrap();

    // No node carries the pending branch's label yet.
    assert!(tree.get_head_node(None).is_none());
    assert!(tree.build_context(None, &ContextStrategy::Full).is_empty());
}

#[tokio::test]
async fn merge_projects_as_narrative_message() {
    let mut tree = tree();
    seed_main(&mut tree).await;

    tree.create_branch("feature", None).unwrap();
    tree.append_message(Message::user("try it").with_id("f1"), Some("feature"))
        .await
        .unwrap();

    let merge = tree
        .merge("feature", "the experiment paid off", None)
        .await
        .unwrap();
    assert_eq!(merge.from_head_id.as_str(), "f1");

    let context = tree.build_context(Some("main"), &ContextStrategy::Full);
    assert_eq!(
        texts(&context),
        vec![
            "u1",
            "a1",
            "[Merged from feature]: the experiment paid off"
        ]
    );
}

#[tokio::test]
async fn merge_into_names_a_target_branch() {
    let mut tree = tree();
    seed_main(&mut tree).await;

    tree.create_branch("feature", None).unwrap();
    tree.append_message(Message::user("f1").with_id("f1"), Some("feature"))
        .await
        .unwrap();
    tree.create_branch("collector", None).unwrap();

    let merge = tree
        .merge("feature", "collected", Some("collector"))
        .await
        .unwrap();
    assert_eq!(merge.common.branch, "collector");
    // Collector was pending off main's head, so its lineage includes main.
    let context = tree.build_context(Some("collector"), &ContextStrategy::Full);
    assert_eq!(
        texts(&context),
        vec!["u1", "a1", "[Merged from feature]: collected"]
    );
}

#[tokio::test]
async fn checkpoints_do_not_appear_in_projection() {
    let mut tree = tree();
    seed_main(&mut tree).await;
    tree.append_checkpoint(
        "before-refactor",
        Some(std::collections::HashMap::from([(
            "reason".to_string(),
            serde_json::json!("about to rewrite the parser"),
        )])),
        None,
    )
    .await
    .unwrap();

    let context = tree.build_context(None, &ContextStrategy::Full);
    assert_eq!(texts(&context), vec!["u1", "a1"]);
}

#[tokio::test]
async fn branch_labels_never_change() {
    let mut tree = tree();
    seed_main(&mut tree).await;
    tree.create_branch("feature", None).unwrap();
    tree.switch_branch("feature").await.unwrap();
    tree.append_message(Message::user("f1").with_id("f1"), None)
        .await
        .unwrap();
    tree.switch_branch("main").await.unwrap();

    // Nodes keep the branch they were appended on regardless of switches.
    let node = tree.get_node(&NodeId::from_string("f1")).unwrap();
    assert_eq!(node.branch(), "feature");
    let node = tree.get_node(&NodeId::from_string("u1")).unwrap();
    assert_eq!(node.branch(), "main");
}
