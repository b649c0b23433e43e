mod common;

use common::{StaticSource, spawn_server};
use futures::{SinkExt, StreamExt};
use price_feed::{
    PriceSample,
    message::{ChartUpdate, ServerMessage},
};
use price_feed_client::{FeedConfig, MountedFeed, PriceFeed};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::Message,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn next_message(client: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            return ServerMessage::decode(text.as_str());
        }
    }
}

/// Connect and consume the snapshot sent on open, after which the client is in the fan-out set.
async fn open_client(url: &str) -> (Client, ChartUpdate) {
    let (mut client, _) = connect_async(url).await.unwrap();
    match next_message(&mut client).await {
        ServerMessage::ChartDataUpdate(snapshot) => (client, snapshot),
        other => panic!("expected initial chart snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_price_update_reaches_every_open_client() {
    let server = spawn_server(Arc::new(StaticSource::new(100.0, 125.0)), None).await;

    let (mut first, snapshot) = open_client(&server.ws()).await;
    let (mut second, _) = open_client(&server.ws()).await;
    assert_eq!(snapshot.current_price, None);
    assert_eq!(snapshot.recent_history, Some(Vec::new()));
    assert_eq!(snapshot.premium_ratio, Some(1.25));
    assert_eq!(server.state.hub().connected_clients(), 2);

    let sample = server.state.scheduler().refresh().await.unwrap();
    assert_eq!(sample.base_valuation, 100.0);
    assert_eq!(sample.native_valuation, 125.0);
    assert_eq!(server.state.store().current(), Some(sample));

    for client in [&mut first, &mut second] {
        assert_eq!(
            next_message(client).await,
            ServerMessage::PriceUpdate(sample)
        );
    }
}

#[tokio::test]
async fn test_chart_update_and_ignored_client_text() {
    let server = spawn_server(Arc::new(StaticSource::new(100.0, 125.0)), None).await;
    let sample = server.state.scheduler().refresh().await.unwrap();

    let (mut client, snapshot) = open_client(&server.ws()).await;
    assert_eq!(snapshot.current_price, Some(sample));
    assert_eq!(snapshot.recent_history, Some(vec![sample]));

    // Client text frames carry nothing the server acts on
    client
        .send(Message::Text("{\"type\":\"subscribe\"}".into()))
        .await
        .unwrap();

    server.state.scheduler().publish_chart();
    match next_message(&mut client).await {
        ServerMessage::ChartDataUpdate(update) => {
            assert_eq!(update.current_price, Some(sample));
            assert_eq!(update.premium_ratio, Some(1.25));
        }
        other => panic!("expected chart update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_closed_client_leaves_fan_out_set() {
    let server = spawn_server(Arc::new(StaticSource::new(100.0, 125.0)), None).await;

    let (mut leaving, _) = open_client(&server.ws()).await;
    let (mut staying, _) = open_client(&server.ws()).await;
    leaving.close(None).await.unwrap();
    drop(leaving);

    tokio::time::timeout(TIMEOUT, async {
        while server.state.hub().connected_clients() != 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let sample = server.state.scheduler().refresh().await.unwrap();
    assert_eq!(
        next_message(&mut staying).await,
        ServerMessage::PriceUpdate(sample)
    );
}

async fn wait_connected(feed: &MountedFeed) {
    let mut changed = feed.changed();
    tokio::time::timeout(TIMEOUT, async {
        while !feed.snapshot().is_connected() {
            changed.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_mounted_feeds_follow_server() {
    let server = spawn_server(Arc::new(StaticSource::new(100.0, 125.0)), None).await;
    let feeds = [
        PriceFeed::mount(FeedConfig::new(server.http(""))).unwrap(),
        PriceFeed::mount(FeedConfig::new(server.http(""))).unwrap(),
    ];

    for feed in &feeds {
        wait_connected(feed).await;
    }
    // Client side reports open once the handshake completes, the hub a moment later
    tokio::time::timeout(TIMEOUT, async {
        while server.state.hub().connected_clients() != feeds.len() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let sample: PriceSample = server.state.scheduler().refresh().await.unwrap();
    assert_eq!(server.state.store().current(), Some(sample));

    for feed in &feeds {
        let mut changed = feed.changed();
        tokio::time::timeout(TIMEOUT, async {
            while feed.snapshot().current_price() != Some(sample) {
                changed.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert_eq!(feed.snapshot().premium_ratio(), 1.25);
    }

    for feed in feeds {
        feed.unmount().await;
    }
}
