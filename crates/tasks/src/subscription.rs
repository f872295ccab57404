//! One caller's wait on one task.
//!
//! [`TaskSubscription::subscribe`] registers with the router immediately, so
//! a reply racing the subscribe request cannot be missed. The subscribe
//! frame itself is sent from [`TaskSubscription::outcome`]: while the
//! connection is still opening the send is retried on a fixed poll
//! interval instead of being queued.

use std::sync::{Arc, Weak};
use std::time::Duration;

use gaia_core::types::{TaskId, TaskType};
use tokio::sync::oneshot;

use crate::config::DEFAULT_POLL_INTERVAL_MS;
use crate::connection::{Connection, ConnectionState};
use crate::messages::SubscribeFrame;
use crate::router::{MessageRouter, ProgressSender, TaskOutcome};

/// Tunables for a single subscription.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionOptions {
    /// Delay between subscribe attempts while the connection is opening.
    pub poll_interval: Duration,
    /// Give up waiting for a terminal frame after this long. `None` waits
    /// indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: None,
        }
    }
}

/// A registered interest in one task's progress and outcome.
///
/// Dropping the subscription or calling [`cancel`](Self::cancel) detaches
/// it from the router; frames for the task that arrive afterwards are
/// dropped.
pub struct TaskSubscription {
    task_id: TaskId,
    frame: String,
    registration: u64,
    connection: Weak<Connection>,
    router: Arc<MessageRouter>,
    outcome: Option<oneshot::Receiver<TaskOutcome>>,
    options: SubscriptionOptions,
}

impl TaskSubscription {
    /// Register for `task_id` on `connection` and prepare the subscribe frame.
    ///
    /// Nothing is sent until [`outcome`](Self::outcome) is awaited.
    pub fn subscribe(
        connection: &Arc<Connection>,
        router: &Arc<MessageRouter>,
        task_id: &str,
        task_type: TaskType,
        msg_type: &str,
        progress: Option<ProgressSender>,
        options: SubscriptionOptions,
    ) -> Result<Self, SubscriptionError> {
        let frame = serde_json::to_string(&SubscribeFrame {
            task_id,
            task_type,
            msg_type,
        })?;

        let registration = router.register(task_id, task_type, connection.id(), progress)?;

        Ok(Self {
            task_id: task_id.to_owned(),
            frame,
            registration: registration.registration,
            connection: Arc::downgrade(connection),
            router: Arc::clone(router),
            outcome: Some(registration.outcome),
            options,
        })
    }

    /// Detach from the router. A pending [`outcome`](Self::outcome) then
    /// resolves to [`SubscriptionError::Cancelled`]. Returns `false` if the
    /// outcome had already been settled.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// A handle that cancels this subscription from elsewhere, including
    /// while [`outcome`](Self::outcome) is being awaited.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            task_id: self.task_id.clone(),
            registration: self.registration,
            router: Arc::clone(&self.router),
        }
    }

    /// Send the subscribe request once the connection is open, then wait
    /// for the task's terminal outcome.
    pub async fn outcome(mut self) -> Result<serde_json::Value, SubscriptionError> {
        let Some(outcome_rx) = self.outcome.take() else {
            return Err(SubscriptionError::Cancelled);
        };

        match self.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run(outcome_rx)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        task_id = %self.task_id,
                        timeout = ?limit,
                        "Timed out waiting for task",
                    );
                    self.router.deregister(&self.task_id, self.registration);
                    Err(SubscriptionError::Timeout(limit))
                }
            },
            None => self.run(outcome_rx).await,
        }
    }

    // ---- private helpers ----

    async fn run(
        &self,
        mut outcome_rx: oneshot::Receiver<TaskOutcome>,
    ) -> Result<serde_json::Value, SubscriptionError> {
        tokio::select! {
            biased;
            outcome = &mut outcome_rx => return flatten(outcome),
            sent = self.send_when_open() => {
                if let Err(e) = sent {
                    self.router.settle(&self.task_id, Some(self.registration), Err(e));
                }
            }
        }
        flatten(outcome_rx.await)
    }

    /// Poll the connection until it is open, then queue the subscribe frame.
    async fn send_when_open(&self) -> Result<(), SubscriptionError> {
        loop {
            let connection = self
                .connection
                .upgrade()
                .ok_or(SubscriptionError::ConnectionLost)?;

            match connection.state() {
                ConnectionState::Open => {
                    connection
                        .send_text(self.frame.clone())
                        .map_err(|_| SubscriptionError::ConnectionLost)?;
                    tracing::debug!(
                        task_id = %self.task_id,
                        connection_id = connection.id(),
                        "Subscribe request sent",
                    );
                    return Ok(());
                }
                ConnectionState::Closed => return Err(SubscriptionError::ConnectionLost),
                ConnectionState::Idle | ConnectionState::Connecting => {}
            }

            drop(connection);
            tokio::time::sleep(self.options.poll_interval).await;
        }
    }
}

/// Cancels one subscription. Cheap to clone.
///
/// Bound to a single registration: once that subscription has settled, or
/// a later subscription has taken over the task id, cancelling is a no-op.
#[derive(Clone)]
pub struct CancelHandle {
    task_id: TaskId,
    registration: u64,
    router: Arc<MessageRouter>,
}

impl CancelHandle {
    /// Detach the subscription. Returns `false` if it had already settled
    /// or been cancelled.
    pub fn cancel(&self) -> bool {
        let removed = self.router.deregister(&self.task_id, self.registration);
        if removed {
            tracing::info!(task_id = %self.task_id, "Subscription cancelled");
        }
        removed
    }
}

impl Drop for TaskSubscription {
    fn drop(&mut self) {
        self.router.deregister(&self.task_id, self.registration);
    }
}

/// A dropped outcome sender means the route was removed without an
/// outcome, which only happens through deregistration.
fn flatten(
    received: Result<TaskOutcome, oneshot::error::RecvError>,
) -> Result<serde_json::Value, SubscriptionError> {
    received.unwrap_or(Err(SubscriptionError::Cancelled))
}

/// Errors that end a subscription.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// The connection closed before a terminal frame arrived.
    #[error("WebSocket connection closed before the task finished")]
    ConnectionLost,

    /// The server reported the task as failed.
    #[error("{0}")]
    Remote(String),

    /// A terminal frame for this task could not be interpreted.
    #[error("Invalid data received from websocket: {0}")]
    InvalidFrame(String),

    /// No terminal frame arrived within the configured timeout.
    #[error("Timed out after {0:?} waiting for the task to finish")]
    Timeout(Duration),

    /// The subscription was cancelled before it settled.
    #[error("Subscription cancelled")]
    Cancelled,

    /// Another subscription for the same task id is still active.
    #[error("Task {0} already has an active subscription")]
    AlreadySubscribed(TaskId),

    /// The subscribe frame could not be encoded.
    #[error("Failed to encode subscribe frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SubscriptionError {
    /// Stable category name for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionLost => "connection-lost",
            Self::Remote(_) => "remote-error",
            Self::InvalidFrame(_) => "invalid-frame",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::AlreadySubscribed(_) => "duplicate-subscription",
            Self::Encode(_) => "encode-error",
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    use super::*;

    fn options() -> SubscriptionOptions {
        SubscriptionOptions {
            poll_interval: Duration::from_millis(10),
            timeout: None,
        }
    }

    fn open_connection(id: u64) -> (Arc<Connection>, mpsc::UnboundedReceiver<Message>) {
        let (conn, rx) = Connection::new(id, "ws://localhost:1".into());
        conn.set_state(ConnectionState::Open);
        (Arc::new(conn), rx)
    }

    #[tokio::test]
    async fn sends_subscribe_frame_and_resolves_on_complete() {
        let router = Arc::new(MessageRouter::new());
        let (conn, mut outbound) = open_connection(1);

        let sub = TaskSubscription::subscribe(
            &conn,
            &router,
            "abc123",
            TaskType::Module,
            "subscribe",
            None,
            options(),
        )
        .unwrap();
        assert!(router.is_registered("abc123"));

        let waiter = tokio::spawn(sub.outcome());

        let frame = outbound.recv().await.unwrap();
        let Message::Text(text) = frame else {
            panic!("Expected text frame, got {frame:?}");
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["taskId"], "abc123");
        assert_eq!(json["taskType"], "module");
        assert_eq!(json["msgType"], "subscribe");

        router.dispatch(r#"{"type":"complete","taskId":"abc123","message":{"title":"x"}}"#);

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result["title"], "x");
        assert!(!router.is_registered("abc123"));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_connection_to_open_before_sending() {
        let router = Arc::new(MessageRouter::new());
        let (conn, mut outbound) = Connection::new(1, "ws://localhost:1".into());
        conn.set_state(ConnectionState::Connecting);
        let conn = Arc::new(conn);

        let sub = TaskSubscription::subscribe(
            &conn,
            &router,
            "t1",
            TaskType::ModuleOutline,
            "subscribe",
            None,
            options(),
        )
        .unwrap();
        let waiter = tokio::spawn(sub.outcome());

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(outbound.try_recv().is_err());

        conn.set_state(ConnectionState::Open);
        let frame = outbound.recv().await.unwrap();
        assert!(matches!(frame, Message::Text(_)));

        router.dispatch(r#"{"type":"error","taskId":"t1","message":"boom"}"#);
        assert_matches!(
            waiter.await.unwrap(),
            Err(SubscriptionError::Remote(msg)) if msg == "boom"
        );
    }

    #[tokio::test]
    async fn closed_connection_fails_with_connection_lost() {
        let router = Arc::new(MessageRouter::new());
        let (conn, _outbound) = Connection::new(1, "ws://localhost:1".into());
        conn.set_state(ConnectionState::Closed);
        let conn = Arc::new(conn);

        let sub = TaskSubscription::subscribe(
            &conn,
            &router,
            "t1",
            TaskType::Module,
            "subscribe",
            None,
            options(),
        )
        .unwrap();

        assert_matches!(sub.outcome().await, Err(SubscriptionError::ConnectionLost));
        assert_eq!(router.pending_count(), 0);
    }

    #[tokio::test]
    async fn dropped_connection_fails_with_connection_lost() {
        let router = Arc::new(MessageRouter::new());
        let (conn, _outbound) = Connection::new(1, "ws://localhost:1".into());
        let conn = Arc::new(conn);

        let sub = TaskSubscription::subscribe(
            &conn,
            &router,
            "t1",
            TaskType::Module,
            "subscribe",
            None,
            options(),
        )
        .unwrap();
        drop(conn);

        assert_matches!(sub.outcome().await, Err(SubscriptionError::ConnectionLost));
    }

    #[tokio::test]
    async fn cancel_detaches_and_resolves_cancelled() {
        let router = Arc::new(MessageRouter::new());
        let (conn, _outbound) = open_connection(1);
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        let sub = TaskSubscription::subscribe(
            &conn,
            &router,
            "t1",
            TaskType::Module,
            "subscribe",
            Some(progress_tx),
            options(),
        )
        .unwrap();

        assert!(sub.cancel());
        assert!(!sub.cancel());

        router.dispatch(r#"{"type":"progress","taskId":"t1","message":50}"#);
        router.dispatch(r#"{"type":"complete","taskId":"t1","message":{}}"#);

        assert_matches!(sub.outcome().await, Err(SubscriptionError::Cancelled));
        assert!(progress_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_handle_stops_a_pending_wait() {
        let router = Arc::new(MessageRouter::new());
        let (conn, mut outbound) = open_connection(1);

        let sub = TaskSubscription::subscribe(
            &conn,
            &router,
            "t1",
            TaskType::Module,
            "subscribe",
            None,
            options(),
        )
        .unwrap();
        let handle = sub.cancel_handle();
        let waiter = tokio::spawn(sub.outcome());

        // The subscribe frame going out means the wait is under way.
        assert!(outbound.recv().await.is_some());
        assert!(!waiter.is_finished());

        assert!(handle.clone().cancel());
        assert_matches!(waiter.await.unwrap(), Err(SubscriptionError::Cancelled));
        assert!(!router.is_registered("t1"));
        assert!(!handle.cancel());
    }

    #[tokio::test]
    async fn stale_cancel_handle_leaves_newer_subscription_alone() {
        let router = Arc::new(MessageRouter::new());
        let (conn, _outbound) = open_connection(1);

        let first = TaskSubscription::subscribe(
            &conn,
            &router,
            "t1",
            TaskType::Module,
            "subscribe",
            None,
            options(),
        )
        .unwrap();
        let stale = first.cancel_handle();
        drop(first);

        let _second = TaskSubscription::subscribe(
            &conn,
            &router,
            "t1",
            TaskType::Module,
            "subscribe",
            None,
            options(),
        )
        .unwrap();

        assert!(!stale.cancel());
        assert!(router.is_registered("t1"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_rejects_and_deregisters() {
        let router = Arc::new(MessageRouter::new());
        let (conn, _outbound) = open_connection(1);

        let sub = TaskSubscription::subscribe(
            &conn,
            &router,
            "slow",
            TaskType::Module,
            "subscribe",
            None,
            SubscriptionOptions {
                poll_interval: Duration::from_millis(10),
                timeout: Some(Duration::from_secs(5)),
            },
        )
        .unwrap();

        assert_matches!(
            sub.outcome().await,
            Err(SubscriptionError::Timeout(d)) if d == Duration::from_secs(5)
        );
        assert!(!router.is_registered("slow"));
    }

    #[tokio::test]
    async fn dropping_subscription_deregisters() {
        let router = Arc::new(MessageRouter::new());
        let (conn, _outbound) = open_connection(1);

        let sub = TaskSubscription::subscribe(
            &conn,
            &router,
            "t1",
            TaskType::Module,
            "subscribe",
            None,
            options(),
        )
        .unwrap();
        assert_eq!(router.pending_count(), 1);

        drop(sub);
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn error_kinds() {
        assert_eq!(SubscriptionError::ConnectionLost.kind(), "connection-lost");
        assert_eq!(SubscriptionError::Remote("x".into()).kind(), "remote-error");
        assert_eq!(
            SubscriptionError::Timeout(Duration::from_secs(1)).kind(),
            "timeout"
        );
    }
}
