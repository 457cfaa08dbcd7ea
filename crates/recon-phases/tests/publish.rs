use pretty_assertions::assert_eq;
use recon_phases::{CanonicalPublisher, ErrorKind, FileReader, Target};
use recon_test_utils::{FakeGitHost, MemoryPublisher};
use recon_upstream::{ConfigUpdateNotifier, DirectoryPublisher};
use std::sync::Arc;
use std::time::Duration;

const LIVE: &str = "config/live";

fn publisher(git: FakeGitHost, store: &Arc<MemoryPublisher>) -> CanonicalPublisher {
    CanonicalPublisher::new(Arc::new(git), store.clone(), LIVE)
}

#[tokio::test]
async fn publish_validates_kind_and_content() {
    let store = Arc::new(MemoryPublisher::new());
    let p = publisher(FakeGitHost::new(), &store);

    for (kind, content, message) in [
        ("", "{}", "kind is required"),
        ("ui", "  ", "content is required"),
        ("theme", "{}", "unknown kind: theme"),
    ] {
        let err = p.publish(kind, content).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
        assert_eq!(err.to_string(), message);
    }

    let err = p.publish("ui", "{broken").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Client);
    assert!(store.is_empty());
}

#[tokio::test]
async fn publish_maps_kind_to_runtime_key() {
    let store = Arc::new(MemoryPublisher::new());
    let p = publisher(FakeGitHost::new(), &store).with_runtime_prefix("rt/");

    let receipt = p.publish(" Policy ", r#"{"rules":{}}"#).await.unwrap();

    assert_eq!(receipt.key, "rt/policy.json");
    assert_eq!(store.object("rt/policy.json").as_deref(), Some(r#"{"rules":{}}"#));
    assert_eq!(p.runtime_key(Target::Ui), "rt/ui.json");
}

#[tokio::test]
async fn publish_canonical_copies_present_documents() {
    let git = FakeGitHost::new().with_file(LIVE, "config/ui.json", r#"{"flag":true}"#);
    let store = Arc::new(MemoryPublisher::new());
    let notifier = ConfigUpdateNotifier::new(None, "tok", Duration::from_secs(1)).unwrap();
    let p = publisher(git, &store).with_notifier(notifier);

    let resp = p.publish_canonical().await.unwrap();

    assert_eq!(resp.git_ref, LIVE);
    assert_eq!(resp.updated, vec!["ui".to_string()]);
    assert_eq!(resp.ui_key, "runtime/ui.json");
    assert_eq!(resp.policy_key, "runtime/policy.json");
    assert_eq!(resp.location, "memory");
    assert_eq!(store.len(), 1);
    assert_eq!(store.object("runtime/ui.json").as_deref(), Some(r#"{"flag":true}"#));
}

#[tokio::test]
async fn publish_canonical_rejects_invalid_live_json() {
    let git = FakeGitHost::new().with_file(LIVE, "config/policy.json", "not json");
    let store = Arc::new(MemoryPublisher::new());

    let err = publisher(git, &store).publish_canonical().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Client);
    assert!(store.is_empty());
}

#[tokio::test]
async fn publish_canonical_requires_live_branch() {
    let store = Arc::new(MemoryPublisher::new());
    let err = CanonicalPublisher::new(Arc::new(FakeGitHost::new()), store, " ")
        .publish_canonical()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn publish_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let git = FakeGitHost::new()
        .with_file(LIVE, "config/ui.json", "{}")
        .with_file(LIVE, "config/policy.json", r#"{"mode":"strict"}"#);
    let p = CanonicalPublisher::new(
        Arc::new(git),
        Arc::new(DirectoryPublisher::new(dir.path())),
        LIVE,
    );

    let resp = p.publish_canonical().await.unwrap();

    assert_eq!(resp.updated, vec!["ui".to_string(), "policy".to_string()]);
    let policy = std::fs::read_to_string(dir.path().join("runtime/policy.json")).unwrap();
    assert_eq!(policy, r#"{"mode":"strict"}"#);
}

#[tokio::test]
async fn get_file_reports_presence() {
    let git = Arc::new(FakeGitHost::new().with_file("main", "README.md", "hello"));
    let reader = FileReader::new(git);

    let found = reader.get_file("main", "README.md").await.unwrap();
    assert!(found.found);
    assert_eq!(found.content, "hello");

    let missing = reader.get_file("main", "nope.txt").await.unwrap();
    assert!(!missing.found);
    assert_eq!(missing.content, "");

    let err = reader.get_file(" ", "README.md").await.unwrap_err();
    assert_eq!(err.to_string(), "ref is required");
    let err = reader.get_file("main", "").await.unwrap_err();
    assert_eq!(err.to_string(), "path is required");
}
