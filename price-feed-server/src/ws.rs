use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use price_feed::{
    hub::{ClientId, PendingClient},
    message::{ChartUpdate, ServerMessage},
};
use tracing::{debug, info, warn};

/// `GET /ws`: upgrade to a WebSocket and stream hub messages to the client.
///
/// The client is registered as connecting before the handshake, so a failed upgrade drops it
/// straight to closed without ever joining the fan-out set.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let client = state.hub().connect();
    debug!(client = client.id(), "real-time client connecting");

    ws.on_failed_upgrade(|error| warn!(%error, "WebSocket handshake failed"))
        .on_upgrade(move |socket| handle_client(socket, client, state))
}

fn encode(client: ClientId, message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(error) => {
            warn!(client, %error, kind = message.kind(), "failed to encode real-time message");
            None
        }
    }
}

/// Handle an individual WebSocket client connection.
async fn handle_client(socket: WebSocket, client: PendingClient, state: AppState) {
    let mut subscription = client.open();
    let client = subscription.id();
    info!(client, "real-time client open");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Seed the client with the current chart so it never waits a full chart cadence
    let snapshot = ServerMessage::ChartDataUpdate(ChartUpdate::from(
        state.scheduler().chart_snapshot(),
    ));
    if let Some(message) = encode(client, &snapshot)
        && ws_sender.send(message).await.is_err()
    {
        info!(client, "real-time client closed before initial snapshot");
        return;
    }

    // Forward hub messages to this client
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            let Some(frame) = encode(client, &message) else {
                continue;
            };
            if ws_sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    // Client frames carry nothing we act on; only watch for close
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => {
                    debug!(client, text = %text.as_str(), "ignoring client message");
                }
                Err(error) => {
                    debug!(client, %error, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(client, "real-time client closed");
}
