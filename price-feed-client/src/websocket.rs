use crate::{config::ReconnectPolicy, error::FeedError, view::ViewHandle};
use futures::StreamExt;
use price_feed::message::ServerMessage;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Real-time push loop: keeps one WebSocket open to `url` and applies every decoded message
/// to `view`.
///
/// A closed or failed connection flips the view to disconnected and retains every value.
/// Whether it is re-opened is up to `policy`; with [`ReconnectPolicy::Never`] the loop returns.
pub async fn run_push_loop(url: Url, policy: ReconnectPolicy, view: ViewHandle) {
    info!(%url, "starting real-time price client");

    let mut attempt = 0u32;
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!(%url, "connected to real-time price feed");
                // Any completed handshake restarts the backoff
                attempt = 0;
                view.set_connected(true);

                match stream_messages(stream, &view).await {
                    Ok(()) => info!(%url, "real-time connection closed by server"),
                    Err(error) => warn!(%url, %error, "real-time connection lost"),
                }
            }
            Err(error) => warn!(%url, %error, "real-time connection failed"),
        }
        view.set_connected(false);

        let Some(delay) = policy.delay(attempt) else {
            info!("real-time connection will not be re-opened");
            break;
        };
        attempt = attempt.saturating_add(1);

        debug!(?delay, attempt, "waiting before reconnecting");
        tokio::time::sleep(delay).await;
    }
}

/// Consume one open connection until it closes.
async fn stream_messages(
    mut stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    view: &ViewHandle,
) -> Result<(), FeedError> {
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => {
                let message = ServerMessage::decode(text.as_str());
                view.apply_message(&message);
            }
            Message::Close(frame) => {
                debug!(?frame, "received close frame");
                break;
            }
            // tungstenite answers pings itself
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        extract::ws::{Message as AxumMessage, WebSocketUpgrade},
        response::Response,
        routing::get,
    };
    use price_feed::PriceSample;
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    const PRICE: &str = r#"{"type":"price_update","data":{"baseValuation":100.0,"nativeValuation":125.0,"capturedAt":"2024-01-01T00:00:00Z"}}"#;
    const CHART: &str = r#"{"type":"chart_data_update","data":{"recentHistory":[{"baseValuation":100.0,"nativeValuation":125.0,"capturedAt":"2024-01-01T00:00:00Z"}],"premiumRatio":1.3}}"#;
    const EMPTY_CHART: &str = r#"{"type":"chart_data_update","data":{"recentHistory":[],"premiumRatio":0}}"#;
    const GARBAGE: &str = r#"{"type":"trade","data":{}}"#;

    async fn scripted(ws: WebSocketUpgrade) -> Response {
        ws.on_upgrade(|mut socket| async move {
            for text in [PRICE, GARBAGE, "not json", CHART, EMPTY_CHART] {
                if socket.send(AxumMessage::Text(text.into())).await.is_err() {
                    return;
                }
            }
            let _ = socket.send(AxumMessage::Close(None)).await;
        })
    }

    async fn serve() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/ws", get(scripted));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        Url::parse(&format!("ws://{addr}/ws")).unwrap()
    }

    #[tokio::test]
    async fn test_push_loop_applies_messages_and_retains_on_close() {
        let url = serve().await;
        let view = ViewHandle::new();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_push_loop(url, ReconnectPolicy::Never, view.clone()),
        )
        .await
        .unwrap();

        let expected = PriceSample::new(100.0, 125.0, "2024-01-01T00:00:00Z".parse().unwrap());
        let snapshot = view.snapshot();
        assert!(!snapshot.is_connected());
        assert_eq!(snapshot.current_price(), Some(expected));
        assert_eq!(snapshot.realtime_history(), &[expected]);
        assert_eq!(snapshot.premium_ratio(), 1.3);
    }

    #[tokio::test]
    async fn test_push_loop_unreachable_server() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let view = ViewHandle::new();
        let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            run_push_loop(url, ReconnectPolicy::Never, view.clone()),
        )
        .await
        .unwrap();

        let snapshot = view.snapshot();
        assert!(!snapshot.is_connected());
        assert_eq!(snapshot.current_price(), None);
    }

    #[tokio::test]
    async fn test_push_loop_backoff_restarts_after_handshake() {
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        // Every session is accepted and then dropped without a close frame
        let drop_after_handshake = move |ws: WebSocketUpgrade| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let response: Response = ws.on_upgrade(|socket| async move { drop(socket) });
                response
            }
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/ws", get(drop_after_handshake));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();

        let policy = ReconnectPolicy::Backoff {
            initial: Duration::from_millis(20),
            max: Duration::from_secs(10),
        };
        let push = tokio::spawn(run_push_loop(url, policy, ViewHandle::new()));

        // A growing backoff would need over 2.5s to reach the eighth session
        tokio::time::timeout(Duration::from_secs(1), async {
            while connections.load(Ordering::SeqCst) < 8 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        push.abort();
    }
}
