//! Connection lifecycle events emitted by the
//! [`ConnectionManager`](crate::manager::ConnectionManager).

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    /// The opening handshake failed.
    ConnectFailed(String),
    /// The server sent a Close frame or ended the stream.
    ServerClosed,
    /// A read or write on the socket failed.
    TransportError(String),
    /// The manager was shut down.
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The WebSocket handshake completed.
    Connected { connection_id: u64 },

    /// The connection closed. Every subscription still waiting on it was
    /// failed with a connection-lost error.
    Disconnected {
        connection_id: u64,
        reason: DisconnectReason,
        /// Number of subscriptions failed by this disconnect.
        failed_subscriptions: usize,
    },
}
