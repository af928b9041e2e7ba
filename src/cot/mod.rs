//! # Cursor-on-Target Push
//!
//! Optional forwarding of accepted detections to a TAK server as CoT
//! events. The publisher subscribes to the same registry the WebSocket
//! handlers feed, so it sees both delivery paths; enabling it is purely a
//! configuration concern and nothing else in the pipeline knows it exists.

pub mod event;
pub mod publisher;

pub use event::CotEvent;
pub use publisher::{CotPublisher, TakTarget, MULTICAST_ADDR};
