//! Task-subscription client for the GAIA generation service.
//!
//! Submits generation jobs over HTTP, then follows each job's progress and
//! terminal result over one shared WebSocket connection. The pieces, leaves
//! first: [`connection`] and [`manager`] own the socket, [`messages`] and
//! [`router`] turn inbound frames into per-task deliveries,
//! [`subscription`] is one caller's wait on one task, and [`pipeline`] ties
//! the HTTP submission to the subscription.

pub mod api;
pub mod config;
pub mod connection;
pub mod events;
pub mod manager;
pub mod messages;
pub mod pipeline;
pub mod processor;
pub mod router;
pub mod subscription;

pub use config::ClientConfig;
pub use manager::ConnectionManager;
pub use pipeline::{GenerationError, TaskClient};
pub use router::{MessageRouter, ProgressSender};
pub use subscription::{CancelHandle, SubscriptionError, SubscriptionOptions, TaskSubscription};
