// Connection Channel
//
// Reconnecting duplex WebSocket client for the generation service.
// Inbound frames and connectivity transitions are delivered to the
// consumer through one ordered notification stream. Outbound sends are
// rejected, not queued, while the link is down; there is no
// buffer-and-replay across reconnects.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::models::assistant::{ChannelConfig, ConnectionState, OutboundPayload, SessionEvent};

use super::error::{AssistantError, AssistantResult};
use super::session::OutboundSink;

/// Notification delivered to the channel consumer, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelNotification {
    /// Connectivity changed
    StateChanged(ConnectionState),
    /// A protocol event arrived
    Event(SessionEvent),
}

const STATE_DISCONNECTED: u8 = 0;
const STATE_CONNECTING: u8 = 1;
const STATE_CONNECTED: u8 = 2;

struct ChannelShared {
    state: AtomicU8,
    outbound: mpsc::UnboundedSender<OutboundPayload>,
    shutdown: watch::Sender<bool>,
}

impl ChannelShared {
    fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::SeqCst) {
            STATE_CONNECTING => ConnectionState::Connecting,
            STATE_CONNECTED => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let value = match state {
            ConnectionState::Disconnected => STATE_DISCONNECTED,
            ConnectionState::Connecting => STATE_CONNECTING,
            ConnectionState::Connected => STATE_CONNECTED,
        };
        self.state.store(value, Ordering::SeqCst);
    }
}

/// Handle to a running connection channel
///
/// Dropping the handle does not stop the background loop; call
/// [`ConnectionChannel::disconnect`] to tear the channel down for good.
pub struct ConnectionChannel {
    shared: Arc<ChannelShared>,
}

impl ConnectionChannel {
    /// Validate the endpoint, spawn the connection loop, and hand back the
    /// channel handle plus the ordered notification stream
    pub fn connect(
        config: ChannelConfig,
    ) -> AssistantResult<(Self, mpsc::UnboundedReceiver<ChannelNotification>)> {
        let url = Url::parse(&config.endpoint)
            .map_err(|err| AssistantError::InvalidEndpoint(err.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(AssistantError::InvalidEndpoint(format!(
                    "unsupported scheme: {}",
                    other
                )))
            }
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(ChannelShared {
            state: AtomicU8::new(STATE_DISCONNECTED),
            outbound: outbound_tx,
            shutdown: shutdown_tx,
        });

        tokio::spawn(run_loop(
            config,
            shared.clone(),
            outbound_rx,
            notify_tx,
            shutdown_rx,
        ));

        Ok((Self { shared }, notify_rx))
    }

    /// Snapshot of the connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Deliver a payload if the channel is connected right now
    ///
    /// Returns `false` without blocking when the link is down. Nothing is
    /// buffered for later delivery; the caller keeps the input for retry.
    pub fn send(&self, payload: &OutboundPayload) -> bool {
        if self.shared.state() != ConnectionState::Connected {
            return false;
        }
        self.shared.outbound.send(payload.clone()).is_ok()
    }

    /// Stop the channel for good; no reconnection is attempted
    pub fn disconnect(&self) {
        self.shared.set_state(ConnectionState::Disconnected);
        let _ = self.shared.shutdown.send(true);
    }
}

impl OutboundSink for ConnectionChannel {
    fn state(&self) -> ConnectionState {
        ConnectionChannel::state(self)
    }

    fn send(&self, payload: &OutboundPayload) -> bool {
        ConnectionChannel::send(self, payload)
    }
}

// ============================================================================
// Connection Loop
// ============================================================================

enum SocketExit {
    /// The caller asked for a final disconnect
    Shutdown,
    /// The connection dropped and should be re-established
    Dropped,
}

async fn run_loop(
    config: ChannelConfig,
    shared: Arc<ChannelShared>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundPayload>,
    notify_tx: mpsc::UnboundedSender<ChannelNotification>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let initial = Duration::from_millis(config.initial_backoff_ms.max(1));
    let cap = Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms));
    let mut backoff = initial;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        set_and_notify(&shared, &notify_tx, ConnectionState::Connecting);

        match connect_async(config.endpoint.as_str()).await {
            Ok((socket, _)) => {
                backoff = initial;
                set_and_notify(&shared, &notify_tx, ConnectionState::Connected);

                let exit =
                    drive_socket(socket, &mut outbound_rx, &notify_tx, &mut shutdown_rx).await;

                set_and_notify(&shared, &notify_tx, ConnectionState::Disconnected);
                // Frames still queued belong to the dead connection and are
                // never replayed on the next one
                while outbound_rx.try_recv().is_ok() {}

                if matches!(exit, SocketExit::Shutdown) {
                    break;
                }
            }
            Err(err) => {
                log::warn!("connection attempt failed: {}", err);
                set_and_notify(&shared, &notify_tx, ConnectionState::Disconnected);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
        backoff = next_backoff(backoff, cap);
    }

    shared.set_state(ConnectionState::Disconnected);
}

async fn drive_socket(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound_rx: &mut mpsc::UnboundedReceiver<OutboundPayload>,
    notify_tx: &mpsc::UnboundedSender<ChannelNotification>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SocketExit {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = sink.close().await;
                    return SocketExit::Shutdown;
                }
            }
            outbound = outbound_rx.recv() => {
                let Some(payload) = outbound else {
                    return SocketExit::Dropped;
                };
                let frame = match serde_json::to_string(&payload) {
                    Ok(frame) => frame,
                    Err(err) => {
                        log::error!("failed to encode outbound frame: {}", err);
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(frame)).await.is_err() {
                    log::warn!("outbound send failed, closing connection");
                    return SocketExit::Dropped;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<SessionEvent>(&text) {
                            Ok(event) => {
                                if notify_tx
                                    .send(ChannelNotification::Event(event))
                                    .is_err()
                                {
                                    // Consumer is gone, no point staying up
                                    return SocketExit::Shutdown;
                                }
                            }
                            Err(err) => {
                                log::warn!("dropping malformed frame: {}", err);
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if sink.send(WsMessage::Pong(data)).await.is_err() {
                            return SocketExit::Dropped;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        log::info!("service closed the connection");
                        return SocketExit::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        log::warn!("connection error: {}", err);
                        return SocketExit::Dropped;
                    }
                    None => return SocketExit::Dropped,
                }
            }
        }
    }
}

fn set_and_notify(
    shared: &ChannelShared,
    notify_tx: &mpsc::UnboundedSender<ChannelNotification>,
    state: ConnectionState,
) {
    shared.set_state(state);
    let _ = notify_tx.send(ChannelNotification::StateChanged(state));
}

/// Double the reconnect delay up to the cap
fn next_backoff(current: Duration, cap: Duration) -> Duration {
    let next = current + current;
    if next > cap {
        cap
    } else {
        next
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_next_backoff_is_monotone_and_capped() {
        let cap = Duration::from_secs(10);
        let mut backoff = Duration::from_secs(1);
        let mut previous = backoff;
        for _ in 0..8 {
            backoff = next_backoff(backoff, cap);
            assert!(backoff >= previous);
            assert!(backoff <= cap);
            previous = backoff;
        }
        assert_eq!(backoff, cap);
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let result = ConnectionChannel::connect(ChannelConfig::new("not a url"));
        assert!(matches!(result, Err(AssistantError::InvalidEndpoint(_))));

        let result = ConnectionChannel::connect(ChannelConfig::new("http://localhost:9"));
        assert!(matches!(result, Err(AssistantError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_send_while_disconnected_returns_false() {
        // Nobody listens on this port; the channel stays down
        let mut config = ChannelConfig::new("ws://127.0.0.1:9/chat");
        config.initial_backoff_ms = 10;
        config.max_backoff_ms = 20;

        let (channel, _notifications) = ConnectionChannel::connect(config).unwrap();
        assert!(!channel.send(&OutboundPayload::message("hello", None)));
        channel.disconnect();
    }

    #[tokio::test]
    async fn test_events_are_delivered_in_order_and_sends_reach_the_service() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

            socket
                .send(WsMessage::Text(
                    r#"{"type":"connected","clientId":"cl-1"}"#.to_string(),
                ))
                .await
                .unwrap();
            // A malformed frame is dropped without killing the connection
            socket
                .send(WsMessage::Text("{not json".to_string()))
                .await
                .unwrap();
            socket
                .send(WsMessage::Text(
                    r#"{"type":"token","text":"Hi"}"#.to_string(),
                ))
                .await
                .unwrap();

            // Read the client's submission
            let frame = loop {
                match socket.next().await {
                    Some(Ok(WsMessage::Text(text))) => break text,
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected frame: {:?}", other),
                }
            };
            frame
        });

        let config = ChannelConfig::new(format!("ws://{}/chat", addr));
        let (channel, mut notifications) = ConnectionChannel::connect(config).unwrap();

        // Connecting, then Connected
        assert_eq!(
            notifications.recv().await,
            Some(ChannelNotification::StateChanged(
                ConnectionState::Connecting
            ))
        );
        assert_eq!(
            notifications.recv().await,
            Some(ChannelNotification::StateChanged(ConnectionState::Connected))
        );
        assert_eq!(channel.state(), ConnectionState::Connected);

        // Events arrive in production order, with the malformed frame dropped
        assert_eq!(
            notifications.recv().await,
            Some(ChannelNotification::Event(SessionEvent::Connected {
                client_id: "cl-1".to_string()
            }))
        );
        assert_eq!(
            notifications.recv().await,
            Some(ChannelNotification::Event(SessionEvent::Token {
                text: "Hi".to_string()
            }))
        );

        assert!(channel.send(&OutboundPayload::message("hello", None)));

        let received = server.await.unwrap();
        let payload: OutboundPayload = serde_json::from_str(&received).unwrap();
        assert_eq!(payload, OutboundPayload::message("hello", None));

        channel.disconnect();
    }

    #[tokio::test]
    async fn test_unexpected_close_triggers_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            // First connection closes immediately; the channel should come back
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            socket.close(None).await.unwrap();

            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            socket
                .send(WsMessage::Text(
                    r#"{"type":"complete"}"#.to_string(),
                ))
                .await
                .unwrap();
            // Hold the connection open until the client disconnects
            while let Some(Ok(_)) = socket.next().await {}
        });

        let mut config = ChannelConfig::new(format!("ws://{}/chat", addr));
        config.initial_backoff_ms = 10;
        config.max_backoff_ms = 50;

        let (channel, mut notifications) = ConnectionChannel::connect(config).unwrap();

        // Wait for the event that can only arrive on the second connection
        let mut connections = 0;
        loop {
            match notifications.recv().await {
                Some(ChannelNotification::StateChanged(ConnectionState::Connected)) => {
                    connections += 1;
                }
                Some(ChannelNotification::Event(SessionEvent::Completed {})) => break,
                Some(_) => {}
                None => panic!("notification stream ended early"),
            }
        }
        assert_eq!(connections, 2);

        channel.disconnect();
        server.abort();
    }
}
