mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use publish_core::{ConnectorFile, FileAction, JobStatus};
use publish_engine::{
    Connector, ConnectorError, ConnectorErrorKind, ConnectorRegistry, ConnectorType,
    HostingConnector, JobManager, StorageConnector, WebsiteMetaFileContent,
};
use serde_json::json;

use common::{init_logging, logged_in, session, MemoryConnector, WEBSITE_ID};

fn registry(connectors: &[Arc<MemoryConnector>]) -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    for connector in connectors {
        registry.register_storage(connector.clone());
        registry.register_hosting(connector.clone());
    }
    registry
}

#[tokio::test]
async fn exact_id_wins() {
    init_logging();
    let a = Arc::new(MemoryConnector::new("a"));
    let b = Arc::new(MemoryConnector::new("b"));
    let registry = registry(&[a, b]);

    let storage = registry.storage(&session("s"), Some("b")).await.unwrap();
    assert_eq!(storage.id(), "b");
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let registry = registry(&[Arc::new(MemoryConnector::new("a"))]);

    let err = registry
        .hosting(&session("s"), Some("nope"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind, ConnectorErrorKind::NotFound);
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn first_logged_in_connector_is_preferred() {
    let a = Arc::new(MemoryConnector::new("a").requiring_login());
    let b = Arc::new(MemoryConnector::new("b").requiring_login());
    let registry = registry(&[a, b]);
    let mut session = session("s");
    logged_in(&mut session, "b");

    let hosting = registry.hosting(&session, None).await.unwrap();
    assert_eq!(hosting.id(), "b");
}

#[tokio::test]
async fn falls_back_to_first_registered_connector() {
    let a = Arc::new(MemoryConnector::new("a").requiring_login());
    let b = Arc::new(MemoryConnector::new("b").requiring_login());
    let registry = registry(&[a, b]);

    let storage = registry.storage(&session("s"), None).await.unwrap();
    assert_eq!(storage.id(), "a");
}

#[tokio::test]
async fn empty_registry_has_no_connector() {
    let registry = ConnectorRegistry::new();
    let err = registry.storage(&session("s"), None).await.err().unwrap();
    assert_eq!(err.kind, ConnectorErrorKind::NotFound);
}

#[tokio::test]
async fn describe_lists_login_state() {
    let a = Arc::new(MemoryConnector::new("a").requiring_login());
    let mut registry = ConnectorRegistry::new();
    registry.register_storage(a);
    let mut session = session("s");

    let before = registry.describe(&session).await;
    assert_eq!(before.len(), 1);
    assert!(!before[0].is_logged_in);
    assert_eq!(before[0].connector_type, ConnectorType::Storage);

    logged_in(&mut session, "a");
    assert!(registry.describe(&session).await[0].is_logged_in);
}

#[tokio::test]
async fn token_lifecycle_uses_the_session() {
    let connector = MemoryConnector::new("a").requiring_login();
    let mut session = session("s");

    connector.set_token(&mut session, json!("secret")).await.unwrap();
    assert!(connector.is_logged_in(&session).await);
    assert_eq!(connector.get_oauth_url(&session).await.unwrap(), None);

    connector.logout(&mut session).await.unwrap();
    assert!(!connector.is_logged_in(&session).await);
}

#[tokio::test]
async fn duplicate_copies_meta_and_source() {
    let connector = MemoryConnector::new("a").with_sample_site();
    let session = session("s");

    let copy = connector
        .duplicate_website(&session, WEBSITE_ID)
        .await
        .unwrap();

    assert_ne!(copy, WEBSITE_ID);
    let meta = connector.get_website_meta(&session, &copy).await.unwrap();
    assert_eq!(meta.name, format!("{WEBSITE_ID} copy"));
    let original = connector.read_website(&session, WEBSITE_ID).await.unwrap();
    let duplicated = connector.read_website(&session, &copy).await.unwrap();
    assert_eq!(duplicated, original);
    assert_eq!(connector.list_websites(&session).await.unwrap().len(), 2);
}

#[tokio::test]
async fn write_assets_reports_progress_and_paths() {
    let connector = MemoryConnector::new("a");
    let calls = AtomicUsize::new(0);
    let progress = |written: usize, total: usize| {
        assert!(written <= total);
        calls.fetch_add(1, Ordering::SeqCst);
    };

    let paths = connector
        .write_assets(
            &session("s"),
            WEBSITE_ID,
            vec![
                ConnectorFile::new("/img/a.png", b"a".to_vec()),
                ConnectorFile::new("img/b.png", b"b".to_vec()),
            ],
            Some(&progress),
        )
        .await
        .unwrap();

    assert_eq!(paths, vec!["img/a.png", "img/b.png"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(connector.asset("img/a.png"), Some(b"a".to_vec()));
}

#[tokio::test]
async fn set_meta_replaces_name() {
    let connector = MemoryConnector::new("a").with_sample_site();
    let session = session("s");

    connector
        .set_website_meta(
            &session,
            WEBSITE_ID,
            WebsiteMetaFileContent {
                name: "Renamed".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let meta = connector.get_website_meta(&session, WEBSITE_ID).await.unwrap();
    assert_eq!(meta.name, "Renamed");
    assert_eq!(meta.website_id, WEBSITE_ID);
}

#[tokio::test]
async fn publish_writes_files_under_a_finished_job() {
    let connector = MemoryConnector::new("a");
    let jobs = JobManager::default();

    let job = connector
        .publish(
            &session("s"),
            WEBSITE_ID,
            vec![ConnectorFile::new("index.html", "<html></html>")],
            &jobs,
        )
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.url.as_deref(), Some("https://a.example.com/site-1"));
    assert_eq!(
        connector.batches(),
        vec![vec![FileAction::write_file("index.html", "<html></html>")]]
    );
}

#[tokio::test]
async fn publish_reports_backend_failure_on_the_job() {
    let connector = MemoryConnector::new("a").failing_writes();
    let jobs = JobManager::default();

    let job = connector
        .publish(&session("s"), WEBSITE_ID, Vec::new(), &jobs)
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.message, "disk full");
}

#[test]
fn explicit_status_overrides_kind() {
    let err = ConnectorError::backend("quota").with_status(507);
    assert_eq!(err.http_status(), 507);
    assert_eq!(ConnectorError::not_logged_in("login").http_status(), 401);
    assert_eq!(ConnectorError::backend("boom").http_status(), 500);
}
