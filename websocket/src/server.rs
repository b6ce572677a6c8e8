//! WebSocket server implementation.
//!
//! Accepts WebSocket connections at `/ws`. A client sends
//! `{"action":"subscribe"}` (optionally with a `filter`) and from then on
//! receives verification events through a forwarder task reading the shared
//! broadcast channel.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use docverify_verification::VerificationEvent;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::subscriptions::{ClientMessage, ClientSubscription, ServerMessage, SubscriptionFilter};
use crate::WsError;

/// Shared state for the WebSocket server.
pub struct WsState {
    events_tx: broadcast::Sender<VerificationEvent>,
}

impl WsState {
    pub fn new(channel_capacity: usize) -> Self {
        let (events_tx, _) = broadcast::channel(channel_capacity.max(1));
        Self { events_tx }
    }

    /// Fan an event out to every subscribed client. Returns the number of
    /// forwarders that received it.
    pub fn publish(&self, event: VerificationEvent) -> usize {
        self.events_tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VerificationEvent> {
        self.events_tx.subscribe()
    }
}

/// The WebSocket server, configured with a port and shared state.
pub struct WebSocketServer {
    pub port: u16,
    pub state: Arc<WsState>,
}

impl WebSocketServer {
    /// Create a new server with a default channel capacity of 256.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            state: Arc::new(WsState::new(256)),
        }
    }

    /// Create a new server with the provided shared state.
    pub fn with_state(port: u16, state: Arc<WsState>) -> Self {
        Self { port, state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .with_state(self.state.clone())
    }

    /// Start listening for WebSocket connections. This runs until the server
    /// is shut down.
    pub async fn start(&self) -> Result<(), WsError> {
        let app = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| WsError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("WebSocket server listening on {}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type SharedSender<S> = Arc<Mutex<S>>;

/// Handle a single WebSocket connection.
///
/// The flow:
/// 1. Split the socket into sender and receiver halves.
/// 2. Listen for client messages (subscribe, unsubscribe, ping).
/// 3. While subscribed, a forwarder task relays matching events.
/// 4. Abort the forwarder when the client unsubscribes or disconnects.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(ws_sender));

    let mut subscription = ClientSubscription::new();
    let mut forwarder: Option<JoinHandle<()>> = None;

    debug!("New WebSocket client connected");

    while let Some(msg_result) = ws_receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let reply =
                    handle_text_message(&text, &state, &mut subscription, &mut forwarder, &ws_sender);
                send(&ws_sender, reply).await;
            }
            Message::Close(_) => {
                debug!("Client sent close frame");
                break;
            }
            Message::Ping(data) => {
                let mut sender = ws_sender.lock().await;
                let _ = sender.send(Message::Pong(data)).await;
            }
            _ => {}
        }
    }

    if let Some(handle) = forwarder.take() {
        handle.abort();
    }
    debug!("WebSocket client disconnected");
}

async fn send<S>(sender: &SharedSender<S>, msg: ServerMessage)
where
    S: Sink<Message> + Unpin,
{
    let mut sender = sender.lock().await;
    let _ = sender.send(Message::Text(msg.to_json())).await;
}

/// Process a text message from the client and return the reply frame.
fn handle_text_message<S>(
    text: &str,
    state: &WsState,
    subscription: &mut ClientSubscription,
    forwarder: &mut Option<JoinHandle<()>>,
    ws_sender: &SharedSender<S>,
) -> ServerMessage
where
    S: Sink<Message> + Unpin + Send + 'static,
{
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            }
        }
    };

    match client_msg {
        ClientMessage::Subscribe { filter } => {
            if let Some(handle) = forwarder.take() {
                handle.abort();
            }
            subscription.subscribe(filter);
            let filter = subscription.filter().cloned().unwrap_or_default();
            let rx = state.subscribe();
            *forwarder = Some(tokio::spawn(forward_events(rx, ws_sender.clone(), filter)));
            debug!("Client subscribed to verification events");
            ServerMessage::Ack {
                action: "subscribe".to_string(),
            }
        }
        ClientMessage::Unsubscribe => {
            if let Some(handle) = forwarder.take() {
                handle.abort();
            }
            if subscription.unsubscribe() {
                debug!("Client unsubscribed from verification events");
                ServerMessage::Ack {
                    action: "unsubscribe".to_string(),
                }
            } else {
                ServerMessage::Error {
                    message: "Not subscribed".to_string(),
                }
            }
        }
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

/// Forwarder task: reads events from the broadcast receiver and sends
/// matching ones to the client until either side goes away.
async fn forward_events<S>(
    mut rx: broadcast::Receiver<VerificationEvent>,
    ws_sender: SharedSender<S>,
    filter: SubscriptionFilter,
) where
    S: Sink<Message> + Unpin,
{
    loop {
        match rx.recv().await {
            Ok(event) => {
                if !filter.matches(&event) {
                    continue;
                }
                let frame = ServerMessage::Event { event }.to_json();
                let mut sender = ws_sender.lock().await;
                if sender.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Client lagged behind by {} verification events", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Verification event channel closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docverify_types::{StepName, VerificationId};
    use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

    type TestSink = SharedSender<UnboundedSender<Message>>;

    fn test_sink() -> (TestSink, UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded();
        (Arc::new(Mutex::new(tx)), rx)
    }

    fn id(b: u8) -> VerificationId {
        VerificationId::new([b; 16])
    }

    fn texts(frames: &[Message]) -> Vec<serde_json::Value> {
        frames
            .iter()
            .map(|m| match m {
                Message::Text(t) => serde_json::from_str(t).unwrap(),
                other => panic!("unexpected frame {other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn forwarder_relays_only_matching_events() {
        let state = WsState::new(16);
        let (sink, rx) = test_sink();
        let filter = SubscriptionFilter {
            verification_ids: Some([id(1)].into_iter().collect()),
        };
        let task = tokio::spawn(forward_events(state.subscribe(), sink.clone(), filter));

        state.publish(VerificationEvent::StepStarted {
            verification_id: id(2),
            step: StepName::OcrVerification,
        });
        state.publish(VerificationEvent::Cancelled { verification_id: id(1) });
        drop(state);
        task.await.unwrap();
        drop(sink);

        let frames = texts(&rx.collect::<Vec<_>>().await);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"]["event"], "cancelled");
    }

    #[tokio::test]
    async fn subscribe_then_unsubscribe() {
        let state = WsState::new(16);
        let (sink, _rx) = test_sink();
        let mut sub = ClientSubscription::new();
        let mut forwarder = None;

        let reply = handle_text_message(r#"{"action":"subscribe"}"#, &state, &mut sub, &mut forwarder, &sink);
        assert!(matches!(reply, ServerMessage::Ack { ref action } if action == "subscribe"));
        assert!(forwarder.is_some());

        let reply = handle_text_message(r#"{"action":"unsubscribe"}"#, &state, &mut sub, &mut forwarder, &sink);
        assert!(matches!(reply, ServerMessage::Ack { ref action } if action == "unsubscribe"));
        assert!(forwarder.is_none());

        let reply = handle_text_message(r#"{"action":"unsubscribe"}"#, &state, &mut sub, &mut forwarder, &sink);
        assert!(matches!(reply, ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn garbage_gets_an_error_frame() {
        let state = WsState::new(16);
        let (sink, _rx) = test_sink();
        let mut sub = ClientSubscription::new();
        let mut forwarder = None;
        let reply = handle_text_message("not json", &state, &mut sub, &mut forwarder, &sink);
        assert!(matches!(reply, ServerMessage::Error { .. }));
        assert!(!sub.is_subscribed());
    }

    #[test]
    fn publish_without_clients_is_harmless() {
        let state = WsState::new(4);
        assert_eq!(state.publish(VerificationEvent::Cancelled { verification_id: id(1) }), 0);
    }
}
