//! # Real-Time Fan-Out Module
//!
//! Two delivery paths feed the same subscriber registry:
//!
//! - **Direct**: the ingest handler broadcasts every accepted row right
//!   after the batch commits.
//! - **Listener**: a supervised LISTEN loop republishes the store's own
//!   notification payloads, surviving store restarts with a fixed backoff.
//!
//! Delivery is at-least-once across the two paths; subscribers are expected
//! to render idempotently.

pub mod listener;
pub mod registry;

pub use listener::NotificationListener;
pub use registry::SubscriberRegistry;
