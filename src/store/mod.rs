//! JSON-backed stores for relay routes and webhook endpoints.
//!
//! Both stores are read-mostly: the relay takes owned snapshots, and only
//! administrator commands write. Every accepted write is saved to disk
//! before it becomes visible to readers.

pub mod persist;
pub mod routes;
pub mod webhooks;

pub use routes::RouteStore;
pub use webhooks::{mask_webhook_url, WebhookRegistry};
