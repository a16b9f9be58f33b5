//! Catalog client and loader tests
//!
//! Tests document fetching, decoding, and error classification against a
//! mocked HTTP server.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use mockito::Server;
use reelcast::api::CatalogClient;
use reelcast::catalog::{
    CatalogDelegate, LoadError, LoadErrorKind, LoadOutcome, MediaHierarchyLoader, MediaTree,
};
use tokio_test::{assert_err, assert_ok};

const CATALOG: &str = r#"{
    "version": 1,
    "title": "Sample Videos",
    "categories": [{
        "name": "Shorts",
        "mp4": "https://host/videos/mp4/",
        "images": "https://host/videos/",
        "videos": [
            {
                "title": "Clip A",
                "subtitle": "A short clip",
                "studio": "Blender Foundation",
                "duration": 596,
                "image-480x270": "images/a-480.jpg",
                "image-780x1200": "https://x/a.jpg",
                "sources": [{"type": "mp4", "mime": "video/mp4", "url": "a.mp4"}]
            },
            {
                "title": "Clip B",
                "duration": 60,
                "sources": [{"type": "mp4", "mime": "video/mp4", "url": "b.mp4"}]
            }
        ]
    }, {
        "name": "Features",
        "videos": [{
            "title": "Feature C",
            "sources": [{"type": "mp4", "url": "https://cdn/c.mp4"}]
        }]
    }]
}"#;

#[derive(Default)]
struct Recorder {
    loads: Mutex<Vec<String>>,
    failures: Mutex<Vec<LoadError>>,
}

impl CatalogDelegate for Recorder {
    fn did_load(&self, title: &str, _tree: &Arc<MediaTree>) {
        self.loads.lock().unwrap().push(title.to_string());
    }

    fn did_fail(&self, error: &LoadError) {
        self.failures.lock().unwrap().push(error.clone());
    }
}

// =============================================================================
// Client Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_catalog_parses_tree() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/catalog.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(CATALOG)
        .create_async()
        .await;

    let client = CatalogClient::new();
    let catalog = assert_ok!(
        client
            .fetch_catalog(&format!("{}/catalog.json", server.url()))
            .await
    );

    mock.assert_async().await;
    assert_eq!(catalog.title, "Sample Videos");

    let groups = catalog.tree.root().children();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].title(), "Shorts");
    assert_eq!(groups[1].title(), "Features");

    let clip = catalog.tree.find_leaf("Clip A").unwrap();
    let media = clip.media_info().unwrap();
    assert_eq!(media.content_url, "https://host/videos/mp4/a.mp4");
    assert_eq!(media.duration, Some(Duration::from_secs(596)));
    assert_eq!(media.metadata.poster_url.as_deref(), Some("https://x/a.jpg"));
    assert_eq!(media.metadata.studio.as_deref(), Some("Blender Foundation"));
    assert_eq!(clip.image_url(), Some("https://host/videos/images/a-480.jpg"));
    assert_eq!(clip.parent().unwrap().title(), "Shorts");
}

#[tokio::test]
async fn test_http_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/missing.json")
        .with_status(404)
        .create_async()
        .await;

    let client = CatalogClient::new();
    let err = assert_err!(
        client
            .fetch_catalog(&format!("{}/missing.json", server.url()))
            .await
    );

    assert_eq!(err, LoadError::HttpStatus(404));
    assert_eq!(err.kind(), LoadErrorKind::Network);
}

#[tokio::test]
async fn test_malformed_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/catalog.json")
        .with_status(200)
        .with_body("<html>not a catalog</html>")
        .create_async()
        .await;

    let client = CatalogClient::new();
    let err = client
        .fetch_catalog(&format!("{}/catalog.json", server.url()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), LoadErrorKind::MalformedDocument);
}

#[tokio::test]
async fn test_unsupported_version() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/catalog.json")
        .with_status(200)
        .with_body(r#"{"version": 3, "categories": []}"#)
        .create_async()
        .await;

    let client = CatalogClient::new();
    let err = client
        .fetch_catalog(&format!("{}/catalog.json", server.url()))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), LoadErrorKind::UnsupportedSchema);
}

#[tokio::test]
async fn test_unreachable_host() {
    // Nothing listens on the discard port
    let client = CatalogClient::with_timeout(Duration::from_secs(5));
    let err = assert_err!(client.fetch_catalog("http://127.0.0.1:9/catalog.json").await);

    assert_eq!(err.kind(), LoadErrorKind::Network);
}

#[tokio::test]
async fn test_invalid_url() {
    let client = CatalogClient::new();
    let err = client.fetch_catalog("not a url").await.unwrap_err();
    assert!(matches!(err, LoadError::InvalidUrl(_)));
}

// =============================================================================
// Loader Tests
// =============================================================================

#[tokio::test]
async fn test_loader_publishes_tree_and_notifies_delegate() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/catalog.json")
        .with_status(200)
        .with_body(CATALOG)
        .create_async()
        .await;

    let recorder = Arc::new(Recorder::default());
    let delegate: Arc<dyn CatalogDelegate> = recorder.clone();
    let mut loader = MediaHierarchyLoader::new();
    loader.set_delegate(Arc::downgrade(&delegate));

    assert!(!loader.is_loaded());
    loader.load_from_url(&format!("{}/catalog.json", server.url()));
    assert!(loader.is_loading());

    let outcome = loader.next_outcome().await.unwrap();
    assert!(outcome.is_loaded());
    assert!(loader.is_loaded());
    assert!(!loader.is_loading());
    assert_eq!(loader.title(), Some("Sample Videos"));
    assert_eq!(loader.root_item().unwrap().leaves().count(), 3);
    assert_eq!(*recorder.loads.lock().unwrap(), vec!["Sample Videos".to_string()]);
}

#[tokio::test]
async fn test_loader_failure_keeps_previous_tree() {
    let mut server = Server::new_async().await;
    let _good = server
        .mock("GET", "/catalog.json")
        .with_status(200)
        .with_body(CATALOG)
        .create_async()
        .await;
    let _bad = server
        .mock("GET", "/broken.json")
        .with_status(500)
        .create_async()
        .await;

    let recorder = Arc::new(Recorder::default());
    let delegate: Arc<dyn CatalogDelegate> = recorder.clone();
    let mut loader = MediaHierarchyLoader::new();
    loader.set_delegate(Arc::downgrade(&delegate));

    loader.load_from_url(&format!("{}/catalog.json", server.url()));
    assert!(loader.next_outcome().await.unwrap().is_loaded());

    loader.load_from_url(&format!("{}/broken.json", server.url()));
    match loader.next_outcome().await.unwrap() {
        LoadOutcome::Failed { error, .. } => assert_eq!(error, LoadError::HttpStatus(500)),
        other => panic!("expected failure, got {:?}", other),
    }

    assert!(!loader.is_loaded());
    assert_eq!(loader.title(), Some("Sample Videos"));
    assert!(loader.root_item().is_some());
    assert_eq!(recorder.failures.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_loader_only_reports_latest_request() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/catalog.json")
        .with_status(200)
        .with_body(CATALOG)
        .create_async()
        .await;

    let mut loader = MediaHierarchyLoader::new();
    loader.load_from_url(&format!("{}/catalog.json", server.url()));
    let latest = loader.load_from_url("not a url");

    let outcome = loader.next_outcome().await.unwrap();
    assert_eq!(outcome.request(), latest);
    assert!(!outcome.is_loaded());

    // The superseded successful load is never surfaced
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(loader.poll_outcome().is_none());
    assert!(loader.root_item().is_none());
}

#[tokio::test]
async fn test_dropped_delegate_is_skipped() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/catalog.json")
        .with_status(200)
        .with_body(CATALOG)
        .create_async()
        .await;

    let mut loader = MediaHierarchyLoader::new();
    {
        let recorder: Arc<dyn CatalogDelegate> = Arc::new(Recorder::default());
        let weak: Weak<dyn CatalogDelegate> = Arc::downgrade(&recorder);
        loader.set_delegate(weak);
    }

    loader.load_from_url(&format!("{}/catalog.json", server.url()));
    assert!(loader.next_outcome().await.unwrap().is_loaded());
}
