//! Asynchronous catalog loading
//!
//! [`MediaHierarchyLoader`] fetches and parses a hierarchy description on a
//! spawned task and hands the result back to its owner over a channel. The
//! owner applies it by awaiting [`MediaHierarchyLoader::next_outcome`] (or
//! polling), so the published tree and the delegate callbacks only ever change
//! on the owner's execution context.
//!
//! Every load gets a fresh [`RequestId`]. Starting a new load supersedes the
//! previous one: when the older result arrives its id no longer matches and it
//! is dropped without being observed.

use reqwest::Url;
use std::future::Future;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::item::MediaTree;
use super::parser::{parse_catalog, Catalog};
use crate::api::CatalogClient;

// =============================================================================
// Errors
// =============================================================================

/// Catalog load failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Catalog host unreachable: {0}")]
    Unreachable(String),

    #[error("Catalog request timed out")]
    Timeout,

    #[error("Catalog server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),

    #[error("Malformed catalog document: {0}")]
    Malformed(String),

    #[error("Catalog document is missing required field `{0}`")]
    MissingField(String),

    #[error("Unsupported catalog schema version {0}")]
    UnsupportedSchema(String),
}

/// Coarse classification reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    Network,
    MalformedDocument,
    UnsupportedSchema,
}

impl LoadError {
    pub fn kind(&self) -> LoadErrorKind {
        match self {
            LoadError::Unreachable(_)
            | LoadError::Timeout
            | LoadError::HttpStatus(_)
            | LoadError::InvalidUrl(_) => LoadErrorKind::Network,
            LoadError::Malformed(_) | LoadError::MissingField(_) => {
                LoadErrorKind::MalformedDocument
            }
            LoadError::UnsupportedSchema(_) => LoadErrorKind::UnsupportedSchema,
        }
    }
}

// =============================================================================
// Seams
// =============================================================================

/// Fetches the raw hierarchy description
pub trait CatalogFetch: Send + Sync + 'static {
    fn fetch(&self, url: Url) -> impl Future<Output = Result<String, LoadError>> + Send;
}

/// Observer notified when a load finishes
pub trait CatalogDelegate {
    fn did_load(&self, title: &str, tree: &Arc<MediaTree>);
    fn did_fail(&self, error: &LoadError);
}

/// Identifies one `load_from_url` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

/// Terminal result of the most recent load
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded {
        request: RequestId,
        title: String,
        tree: Arc<MediaTree>,
    },
    Failed {
        request: RequestId,
        error: LoadError,
    },
}

impl LoadOutcome {
    pub fn request(&self) -> RequestId {
        match self {
            LoadOutcome::Loaded { request, .. } | LoadOutcome::Failed { request, .. } => *request,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }
}

#[derive(Debug)]
struct LoadMessage {
    request: RequestId,
    result: Result<Catalog, LoadError>,
}

// =============================================================================
// Loader
// =============================================================================

/// Loads a media hierarchy and publishes it to observers
pub struct MediaHierarchyLoader<F: CatalogFetch = CatalogClient> {
    fetcher: Arc<F>,
    delegate: Option<Weak<dyn CatalogDelegate>>,
    loaded: bool,
    title: Option<String>,
    root: Option<Arc<MediaTree>>,
    next_request: u64,
    current: Option<RequestId>,
    tx: mpsc::UnboundedSender<LoadMessage>,
    rx: mpsc::UnboundedReceiver<LoadMessage>,
}

impl MediaHierarchyLoader<CatalogClient> {
    /// Loader backed by the default HTTP client
    pub fn new() -> Self {
        Self::with_fetcher(CatalogClient::new())
    }
}

impl Default for MediaHierarchyLoader<CatalogClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: CatalogFetch> MediaHierarchyLoader<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher: Arc::new(fetcher),
            delegate: None,
            loaded: false,
            title: None,
            root: None,
            next_request: 0,
            current: None,
            tx,
            rx,
        }
    }

    /// Register the observer. The loader never keeps it alive.
    pub fn set_delegate(&mut self, delegate: Weak<dyn CatalogDelegate>) {
        self.delegate = Some(delegate);
    }

    /// True once the most recent load succeeded
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// True while a load is in flight
    pub fn is_loading(&self) -> bool {
        self.current.is_some()
    }

    /// Title of the last published catalog
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Last published tree. Survives later failed loads.
    pub fn root_item(&self) -> Option<&Arc<MediaTree>> {
        self.root.as_ref()
    }

    /// Start loading from `url` and return immediately.
    ///
    /// Must be called from within a Tokio runtime. Any load still in flight is
    /// superseded. An unparseable URL fails through the same outcome path as a
    /// network error.
    pub fn load_from_url(&mut self, url: &str) -> RequestId {
        self.next_request += 1;
        let request = RequestId(self.next_request);
        if let Some(previous) = self.current.replace(request) {
            debug!(?previous, ?request, "Superseding in-flight catalog load");
        }
        info!(url, ?request, "Loading media list");

        let tx = self.tx.clone();
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(e) => {
                let error = LoadError::InvalidUrl(format!("{}: {}", url, e));
                let _ = tx.send(LoadMessage {
                    request,
                    result: Err(error),
                });
                return request;
            }
        };

        let fetcher = Arc::clone(&self.fetcher);
        tokio::spawn(async move {
            let result = match fetcher.fetch(url).await {
                Ok(body) => parse_catalog(&body),
                Err(e) => Err(e),
            };
            // The receiver lives as long as the loader
            let _ = tx.send(LoadMessage { request, result });
        });

        request
    }

    /// Supersede the in-flight load without starting another
    pub fn cancel_load(&mut self) {
        if let Some(request) = self.current.take() {
            info!(?request, "Cancelled catalog load");
        }
    }

    /// Wait for the outcome of the current load, applying it and notifying the
    /// delegate. Returns `None` when nothing is in flight.
    pub async fn next_outcome(&mut self) -> Option<LoadOutcome> {
        while self.current.is_some() {
            let message = self.rx.recv().await?;
            if let Some(outcome) = self.accept(message) {
                return Some(outcome);
            }
        }
        None
    }

    /// Non-blocking variant of [`next_outcome`](Self::next_outcome)
    pub fn poll_outcome(&mut self) -> Option<LoadOutcome> {
        while let Ok(message) = self.rx.try_recv() {
            if let Some(outcome) = self.accept(message) {
                return Some(outcome);
            }
        }
        None
    }

    fn accept(&mut self, message: LoadMessage) -> Option<LoadOutcome> {
        if self.current != Some(message.request) {
            debug!(request = ?message.request, "Dropping superseded catalog result");
            return None;
        }
        self.current = None;

        let delegate = self.delegate.as_ref().and_then(Weak::upgrade);
        match message.result {
            Ok(catalog) => {
                let tree = Arc::new(catalog.tree);
                info!(title = %catalog.title, items = tree.len(), "Media list loaded");
                self.loaded = true;
                self.title = Some(catalog.title.clone());
                self.root = Some(Arc::clone(&tree));
                if let Some(delegate) = delegate {
                    delegate.did_load(&catalog.title, &tree);
                }
                Some(LoadOutcome::Loaded {
                    request: message.request,
                    title: catalog.title,
                    tree,
                })
            }
            Err(error) => {
                warn!(%error, "Media list failed to load");
                self.loaded = false;
                if let Some(delegate) = delegate {
                    delegate.did_fail(&error);
                }
                Some(LoadOutcome::Failed {
                    request: message.request,
                    error,
                })
            }
        }
    }
}
