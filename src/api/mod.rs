//! API clients for external services
//!
//! - Catalog: fetches the media hierarchy description over HTTP

pub mod catalog;

pub use catalog::CatalogClient;
