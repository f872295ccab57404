//! Shared task-channel connection manager.
//!
//! [`ConnectionManager`] owns at most one WebSocket connection to the
//! task-update endpoint. [`ensure_connected`](ConnectionManager::ensure_connected)
//! reuses a live connection or starts a new one; a background driver task
//! runs the socket and, when it ends, clears the shared slot and fails
//! every subscription still waiting on that connection. There is no
//! automatic reconnect: the next caller that needs a connection opens a
//! fresh one.
//!
//! Lifecycle events are broadcast via a [`tokio::sync::broadcast`]
//! channel. Call [`ConnectionManager::events`] to receive them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::connection::{self, Connection, ConnectionState};
use crate::events::{ConnectionEvent, DisconnectReason};
use crate::processor::process_messages;
use crate::router::MessageRouter;

/// Broadcast channel capacity for lifecycle events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Owns the single shared connection to the task-update channel.
///
/// Created once per process via [`ConnectionManager::new`]. The returned
/// `Arc` can be cheaply cloned into anything that submits tasks.
pub struct ConnectionManager {
    ws_url: String,
    router: Arc<MessageRouter>,
    current: Mutex<Option<Arc<Connection>>>,
    next_connection_id: AtomicU64,
    event_tx: broadcast::Sender<ConnectionEvent>,
    /// Cancelled during shutdown; also stops any driver still running.
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Create a manager for `ws_url` with its own message router.
    pub fn new(ws_url: impl Into<String>) -> Arc<Self> {
        Self::with_router(ws_url, Arc::new(MessageRouter::new()))
    }

    /// Create a manager that dispatches into an existing router.
    pub fn with_router(ws_url: impl Into<String>, router: Arc<MessageRouter>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            ws_url: ws_url.into(),
            router,
            current: Mutex::new(None),
            next_connection_id: AtomicU64::new(1),
            event_tx,
            cancel: CancellationToken::new(),
        })
    }

    /// Router that receives every inbound frame of the managed connection.
    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Subscribe to connection lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_tx.subscribe()
    }

    /// The live connection, if any.
    pub fn current(&self) -> Option<Arc<Connection>> {
        self.slot().clone().filter(|conn| conn.is_live())
    }

    /// Return the live connection, opening one if there is none.
    ///
    /// A connection that is still connecting is reused; no duplicate is
    /// opened. After [`shutdown`](Self::shutdown) this returns an
    /// already-closed connection so callers fail fast.
    pub fn ensure_connected(self: &Arc<Self>) -> Arc<Connection> {
        let mut slot = self.slot();

        if let Some(existing) = slot.as_ref().filter(|conn| conn.is_live()) {
            return Arc::clone(existing);
        }

        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (conn, outbound_rx) = Connection::new(id, self.ws_url.clone());
        let conn = Arc::new(conn);

        if self.cancel.is_cancelled() {
            tracing::warn!(connection_id = id, "Connection requested after shutdown");
            conn.set_state(ConnectionState::Closed);
            return conn;
        }

        conn.set_state(ConnectionState::Connecting);
        *slot = Some(Arc::clone(&conn));
        drop(slot);

        tracing::info!(connection_id = id, url = %self.ws_url, "Opening task channel");
        tokio::spawn(Arc::clone(self).drive(Arc::clone(&conn), outbound_rx));

        conn
    }

    /// Close the current connection and refuse to open new ones.
    ///
    /// Subscriptions waiting on the connection fail with a connection-lost
    /// error once the driver exits.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down task channel manager");
        self.cancel.cancel();
    }

    // ---- private helpers ----

    /// Connect, pump frames until the connection ends, then clean up.
    async fn drive(
        self: Arc<Self>,
        conn: Arc<Connection>,
        mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    ) {
        let connection_id = conn.id();

        let opened = tokio::select! {
            _ = self.cancel.cancelled() => Err(DisconnectReason::Shutdown),
            result = connection::open(conn.url()) => result.map_err(|e| {
                tracing::warn!(connection_id, error = %e, "Task channel connect failed");
                DisconnectReason::ConnectFailed(e.to_string())
            }),
        };

        let reason = match opened {
            Ok(ws_stream) => {
                conn.set_state(ConnectionState::Open);
                tracing::info!(connection_id, "Task channel connected");
                let _ = self.event_tx.send(ConnectionEvent::Connected { connection_id });

                process_messages(
                    ws_stream,
                    &mut outbound_rx,
                    connection_id,
                    &self.router,
                    &self.cancel,
                )
                .await
            }
            Err(reason) => reason,
        };

        self.handle_close(&conn, reason);
    }

    /// Mark `conn` closed, release the shared slot if it still holds
    /// `conn`, and fail the subscriptions registered against it.
    fn handle_close(&self, conn: &Connection, reason: DisconnectReason) {
        conn.set_state(ConnectionState::Closed);

        {
            let mut slot = self.slot();
            if slot.as_ref().is_some_and(|current| current.id() == conn.id()) {
                *slot = None;
            }
        }

        let failed_subscriptions = self.router.fail_connection(conn.id());
        tracing::info!(
            connection_id = conn.id(),
            ?reason,
            failed_subscriptions,
            "Task channel disconnected",
        );
        let _ = self.event_tx.send(ConnectionEvent::Disconnected {
            connection_id: conn.id(),
            reason,
            failed_subscriptions,
        });
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
