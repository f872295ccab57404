//! WebSocket pump for the task-update channel.
//!
//! Owns the socket for the lifetime of one connection: writes queued
//! outbound frames, hands every inbound text frame to the
//! [`MessageRouter`] in arrival order, and reports why the connection
//! ended.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::connection::WsStream;
use crate::events::DisconnectReason;
use crate::router::MessageRouter;

/// Drive a connection until the server closes it, a transport error
/// occurs, the outbound queue is dropped, or `cancel` fires.
pub async fn process_messages(
    ws_stream: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<Message>,
    connection_id: u64,
    router: &MessageRouter,
    cancel: &CancellationToken,
) -> DisconnectReason {
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(connection_id, "Closing task channel on shutdown");
                let _ = sink.send(Message::Close(None)).await;
                return DisconnectReason::Shutdown;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    tracing::debug!(connection_id, "Outbound queue dropped");
                    let _ = sink.send(Message::Close(None)).await;
                    return DisconnectReason::Shutdown;
                };
                if let Err(e) = sink.send(frame).await {
                    tracing::error!(connection_id, error = %e, "WebSocket send error");
                    return DisconnectReason::TransportError(e.to_string());
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!(connection_id, raw_message = %text, "Inbound frame");
                        router.dispatch(&text);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!(connection_id, "Ignoring binary frame on task channel");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(connection_id, ?frame, "Task channel closed by server");
                        return DisconnectReason::ServerClosed;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        tracing::error!(connection_id, error = %e, "WebSocket receive error");
                        return DisconnectReason::TransportError(e.to_string());
                    }
                    None => {
                        tracing::info!(connection_id, "Task channel stream exhausted");
                        return DisconnectReason::ServerClosed;
                    }
                }
            }
        }
    }
}
