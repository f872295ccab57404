//! Demultiplexes inbound frames to per-task subscriptions.
//!
//! Each registered task owns one [`Route`]: an optional progress channel
//! and a oneshot outcome slot. Settling a route removes it from the table
//! in the same critical section that consumes the oneshot sender, so an
//! outcome is delivered at most once and every later frame for that task
//! id finds nothing to deliver to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use gaia_core::types::{TaskId, TaskType};
use tokio::sync::{mpsc, oneshot};

use crate::messages::{parse_message, InboundMessage};
use crate::subscription::SubscriptionError;

/// Receives progress percentages for one task, in wire order.
pub type ProgressSender = mpsc::UnboundedSender<f64>;

/// Terminal outcome of a task: the raw result payload or the failure.
pub type TaskOutcome = Result<serde_json::Value, SubscriptionError>;

/// Routing entry for one registered task.
struct Route {
    registration: u64,
    connection_id: u64,
    task_type: TaskType,
    progress: Option<ProgressSender>,
    outcome: oneshot::Sender<TaskOutcome>,
}

/// Handle returned by [`MessageRouter::register`].
pub(crate) struct Registration {
    /// Distinguishes this registration from any earlier or later one for
    /// the same task id.
    pub registration: u64,
    pub outcome: oneshot::Receiver<TaskOutcome>,
}

/// Routes inbound frames to the subscription registered for their task id.
#[derive(Default)]
pub struct MessageRouter {
    routes: Mutex<HashMap<TaskId, Route>>,
    next_registration: AtomicU64,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw text frame and route it.
    pub fn dispatch(&self, raw: &str) {
        let message = parse_message(raw);
        tracing::trace!(task_id = message.task_id(), "Routing inbound frame");
        self.route(message);
    }

    /// Deliver an already-classified message.
    pub fn route(&self, message: InboundMessage) {
        match message {
            InboundMessage::Progress {
                task_id,
                percent: Some(percent),
            } => self.deliver_progress(&task_id, percent),
            InboundMessage::Progress {
                task_id,
                percent: None,
            } => {
                tracing::trace!(task_id = %task_id, "Dropping non-numeric progress frame");
            }
            InboundMessage::Complete { task_id, payload } => {
                if self.settle(&task_id, None, Ok(payload)) {
                    tracing::info!(task_id = %task_id, "Task completed");
                } else {
                    tracing::debug!(task_id = %task_id, "Completion for untracked task dropped");
                }
            }
            InboundMessage::Error { task_id, message } => {
                tracing::warn!(task_id = %task_id, error = %message, "Task failed on server");
                if !self.settle(&task_id, None, Err(SubscriptionError::Remote(message))) {
                    tracing::debug!(task_id = %task_id, "Error for untracked task dropped");
                }
            }
            InboundMessage::Invalid {
                task_id: Some(task_id),
                reason,
            } => {
                tracing::warn!(task_id = %task_id, reason = %reason, "Malformed terminal frame");
                self.settle(&task_id, None, Err(SubscriptionError::InvalidFrame(reason)));
            }
            InboundMessage::Invalid {
                task_id: None,
                reason,
            } => {
                tracing::warn!(reason = %reason, "Dropping unroutable frame");
            }
        }
    }

    /// Number of tasks currently awaiting an outcome.
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    /// Whether a subscription is registered for `task_id`.
    pub fn is_registered(&self, task_id: &str) -> bool {
        self.lock().contains_key(task_id)
    }

    /// Register interest in `task_id` on connection `connection_id`.
    ///
    /// A task id can have only one live registration.
    pub(crate) fn register(
        &self,
        task_id: &str,
        task_type: TaskType,
        connection_id: u64,
        progress: Option<ProgressSender>,
    ) -> Result<Registration, SubscriptionError> {
        let mut routes = self.lock();
        if routes.contains_key(task_id) {
            return Err(SubscriptionError::AlreadySubscribed(task_id.to_owned()));
        }

        let registration = self.next_registration.fetch_add(1, Ordering::Relaxed);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        routes.insert(
            task_id.to_owned(),
            Route {
                registration,
                connection_id,
                task_type,
                progress,
                outcome: outcome_tx,
            },
        );

        tracing::debug!(task_id, %task_type, connection_id, registration, "Subscription registered");
        Ok(Registration {
            registration,
            outcome: outcome_rx,
        })
    }

    /// Remove a registration without delivering an outcome. Returns `false`
    /// if it was already gone (settled, failed, or replaced).
    pub(crate) fn deregister(&self, task_id: &str, registration: u64) -> bool {
        let mut routes = self.lock();
        match routes.get(task_id) {
            Some(route) if route.registration == registration => {
                routes.remove(task_id);
                tracing::debug!(task_id, registration, "Subscription deregistered");
                true
            }
            _ => false,
        }
    }

    /// Deliver a terminal outcome and detach the route.
    ///
    /// With `registration` set, only that registration is settled. Returns
    /// `false` when nothing was registered, so the outcome was dropped.
    pub(crate) fn settle(
        &self,
        task_id: &str,
        registration: Option<u64>,
        outcome: TaskOutcome,
    ) -> bool {
        let route = {
            let mut routes = self.lock();
            match routes.get(task_id) {
                Some(route) if registration.map_or(true, |r| r == route.registration) => {
                    routes.remove(task_id)
                }
                _ => None,
            }
        };

        match route {
            Some(route) => {
                // The receiver may already be gone if the caller stopped waiting.
                let _ = route.outcome.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Fail every subscription registered against `connection_id` with
    /// [`SubscriptionError::ConnectionLost`]. Returns how many were failed.
    pub(crate) fn fail_connection(&self, connection_id: u64) -> usize {
        let failed: Vec<(TaskId, Route)> = {
            let mut routes = self.lock();
            let ids: Vec<TaskId> = routes
                .iter()
                .filter(|(_, route)| route.connection_id == connection_id)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| routes.remove(&id).map(|route| (id, route)))
                .collect()
        };

        for (task_id, route) in &failed {
            tracing::warn!(
                task_id = %task_id,
                task_type = %route.task_type,
                connection_id,
                "Connection lost before task finished",
            );
        }
        let count = failed.len();
        for (_, route) in failed {
            let _ = route.outcome.send(Err(SubscriptionError::ConnectionLost));
        }
        count
    }

    // ---- private helpers ----

    fn deliver_progress(&self, task_id: &str, percent: f64) {
        let routes = self.lock();
        match routes.get(task_id).and_then(|route| route.progress.as_ref()) {
            Some(progress) => {
                tracing::debug!(task_id, percent, "Task progress");
                let _ = progress.send(percent);
            }
            None => {
                tracing::trace!(task_id, percent, "Progress for untracked task dropped");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
