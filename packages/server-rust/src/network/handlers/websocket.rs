//! `GET /subscriptions`: the WebSocket subscription channel.
//!
//! Each socket gets a write loop draining its outbound channel and a read
//! loop feeding a [`Session`]. Every active `subscribe` owns one broker
//! [`Subscription`](crate::service::Subscription) inside a forwarding task;
//! aborting the task drops the subscription, which unsubscribes it.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use shakegate_core::messages::{codes, ClientError, ClientFrame, ServerFrame, OPERATION_FINISHED};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::AppState;
use crate::network::{ConnectionHandle, OutboundMessage, CLOSE_BAD_REQUEST, CLOSE_GOING_AWAY};
use crate::service::OperationBroker;

/// Subprotocol advertised to clients.
const SUBPROTOCOL: &str = "graphql-transport-ws";

/// Upgrades the connection, or answers 503 once shutdown has begun.
pub async fn ws_upgrade_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if !state.shutdown.health_state().accepts_work() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let conn = &state.config.connection;
    ws.protocols([SUBPROTOCOL])
        .write_buffer_size(conn.ws_write_buffer_size)
        .max_write_buffer_size(conn.ws_max_write_buffer_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (handle, rx) = state.registry.register(&state.config.connection);
    let conn_id = handle.id;
    let send_timeout = state.config.connection.send_timeout;
    debug!(connection = conn_id.0, "subscription socket opened");

    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(sink, rx));
    let mut session = Session::new(handle, Arc::clone(state.gateway.broker()), send_timeout);
    let mut shutdown_rx = state.shutdown.shutdown_receiver();

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if session.handle_text(text.as_str()).is_break() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    session.close(CLOSE_BAD_REQUEST, "binary frames are not supported");
                    break;
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong at the WebSocket level is answered by axum.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(connection = conn_id.0, error = %err, "socket read failed");
                    break;
                }
            },
            _ = shutdown_rx.changed() => {
                session.close(CLOSE_GOING_AWAY, "server shutting down");
                break;
            }
        }
    }

    let subscriptions = session.finish();
    state.registry.remove(conn_id);
    if tokio::time::timeout(send_timeout, &mut writer).await.is_err() {
        writer.abort();
    }
    debug!(
        connection = conn_id.0,
        subscriptions, "subscription socket closed"
    );
}

/// Serializes outbound frames onto the socket until the channel closes or
/// a close frame has been written.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<OutboundMessage>,
) {
    while let Some(msg) = rx.recv().await {
        match msg {
            OutboundMessage::Frame(frame) => {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            OutboundMessage::Close { code, reason } => {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })))
                    .await;
                return;
            }
        }
    }
}

/// Protocol state of one socket: its outbound handle and the forwarding
/// task behind each active subscription id.
struct Session {
    handle: Arc<ConnectionHandle>,
    broker: Arc<OperationBroker>,
    send_timeout: Duration,
    subscriptions: HashMap<String, JoinHandle<()>>,
}

impl Session {
    fn new(handle: Arc<ConnectionHandle>, broker: Arc<OperationBroker>, send_timeout: Duration) -> Self {
        Self {
            handle,
            broker,
            send_timeout,
            subscriptions: HashMap::new(),
        }
    }

    /// Handles one text frame. `Break` means the socket must close.
    fn handle_text(&mut self, text: &str) -> ControlFlow<()> {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(connection = self.handle.id.0, error = %err, "malformed frame");
                self.close(CLOSE_BAD_REQUEST, "invalid message");
                return ControlFlow::Break(());
            }
        };

        match frame {
            ClientFrame::ConnectionInit { .. } => self.send(ServerFrame::ConnectionAck),
            ClientFrame::Ping => self.send(ServerFrame::Pong),
            ClientFrame::Pong => {}
            ClientFrame::Subscribe { id, payload } => self.subscribe(id, &payload.subscription),
            ClientFrame::Complete { id } => {
                if let Some(task) = self.subscriptions.remove(&id) {
                    task.abort();
                    debug!(connection = self.handle.id.0, id = %id, "subscription completed by client");
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn subscribe(&mut self, id: String, field: &str) {
        if field != OPERATION_FINISHED {
            self.send_error(id, format!("unknown subscription field `{field}`"));
            return;
        }
        self.subscriptions.retain(|_, task| !task.is_finished());
        if self.subscriptions.contains_key(&id) {
            self.send_error(id.clone(), format!("subscriber for {id} already exists"));
            return;
        }

        // Registered before the task starts, so events published after this
        // frame was read are never missed.
        let mut subscription = self.broker.subscribe();
        let handle = Arc::clone(&self.handle);
        let send_timeout = self.send_timeout;
        let sub_id = id.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let frame = ServerFrame::operation_finished(&sub_id, &event);
                if let Err(err) = handle
                    .send_timeout(OutboundMessage::Frame(frame), send_timeout)
                    .await
                {
                    debug!(connection = handle.id.0, id = %sub_id, error = %err, "dropping subscription");
                    return;
                }
            }
            // Broker torn down.
            let _ = handle.try_send(OutboundMessage::Frame(ServerFrame::Complete { id: sub_id }));
        });
        self.subscriptions.insert(id, task);
    }

    fn send(&self, frame: ServerFrame) {
        if !self.handle.try_send(OutboundMessage::Frame(frame)) {
            debug!(connection = self.handle.id.0, "outbound channel full or closed");
        }
    }

    fn send_error(&self, id: String, message: String) {
        self.send(ServerFrame::Error {
            id,
            payload: vec![ClientError::new(codes::BAD_USER_INPUT, message)],
        });
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.handle.try_send(OutboundMessage::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// Aborts every forwarding task, releasing the broker subscriptions.
    /// Returns how many were still active.
    fn finish(self) -> usize {
        let mut active = 0;
        for task in self.subscriptions.into_values() {
            if !task.is_finished() {
                active += 1;
            }
            task.abort();
        }
        active
    }
}
