//! WebSocket connection handle for the task-update channel.
//!
//! A [`Connection`] is the shared, cloneable face of one socket. The socket
//! itself lives in the [`ConnectionManager`](crate::manager::ConnectionManager)'s
//! driver task; everyone else sees only the lifecycle state and an
//! outbound queue that is accepted only while the socket is open.

use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Raw WebSocket stream to the task-update endpoint.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Lifecycle of a [`Connection`]. Moves forward only:
/// `Idle -> Connecting -> Open -> Closed` (or `Connecting -> Closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Shared handle to one logical connection.
pub struct Connection {
    id: u64,
    url: String,
    state: watch::Sender<ConnectionState>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Create an idle handle and the receiving end of its outbound queue.
    pub(crate) fn new(id: u64, url: String) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Idle);
        (
            Self {
                id,
                url,
                state,
                outbound,
            },
            outbound_rx,
        )
    }

    /// Process-unique identifier; a reconnect always gets a new one.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// `true` while the connection is connecting or open.
    pub fn is_live(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Open
        )
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(connection_id = self.id, ?previous, ?state, "Connection state changed");
        }
    }

    /// Queue a text frame for the driver to write.
    ///
    /// Fails unless the connection is open; the caller decides whether to
    /// retry.
    pub fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(ConnectionError::NotOpen(state));
        }
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| ConnectionError::Closed)
    }
}

/// Open a WebSocket to `url`.
pub async fn open(url: &str) -> Result<WsStream, ConnectionError> {
    let (ws_stream, _response) = connect_async(url).await.map_err(|e| {
        ConnectionError::Connect(format!("Failed to connect to task channel at {url}: {e}"))
    })?;
    Ok(ws_stream)
}

/// Errors that can occur when working with a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connect(String),

    /// A send was attempted before the socket opened or after it closed.
    #[error("Connection is not open (state: {0:?})")]
    NotOpen(ConnectionState),

    /// The driver has gone away.
    #[error("Connection closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connection_is_idle_and_rejects_sends() {
        let (conn, _rx) = Connection::new(1, "ws://localhost:1".into());
        assert_eq!(conn.state(), ConnectionState::Idle);
        assert!(!conn.is_live());
        assert!(matches!(
            conn.send_text("x".into()),
            Err(ConnectionError::NotOpen(ConnectionState::Idle))
        ));
    }

    #[test]
    fn open_connection_queues_frames() {
        let (conn, mut rx) = Connection::new(7, "ws://localhost:1".into());
        conn.set_state(ConnectionState::Open);
        conn.send_text("hello".into()).unwrap();

        match rx.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(text, "hello"),
            other => panic!("Expected text frame, got {other:?}"),
        }
    }

    #[test]
    fn send_after_driver_exit_reports_closed() {
        let (conn, rx) = Connection::new(3, "ws://localhost:1".into());
        conn.set_state(ConnectionState::Open);
        drop(rx);
        assert!(matches!(conn.send_text("x".into()), Err(ConnectionError::Closed)));
    }

    #[test]
    fn watchers_see_transitions() {
        let (conn, _rx) = Connection::new(2, "ws://localhost:1".into());
        let watcher = conn.watch_state();
        conn.set_state(ConnectionState::Connecting);
        assert_eq!(*watcher.borrow(), ConnectionState::Connecting);
        assert!(conn.is_live());
    }
}
