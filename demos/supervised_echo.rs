//! Supervised echo example
//!
//! Starts a local echo server that drops the first two connections, then
//! watches a reconnecting socket recover, exchange a message and close.
//! Run with: cargo run --example supervised_echo

use futures::{SinkExt, StreamExt};
use socket_resilience_reconnect::{
    BackoffSchedule, EventKind, ReconnectConfig, ReconnectingSocket, SocketEvent,
};
use socket_resilience_tungstenite::TungsteniteFactory;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as Frame;

async fn flaky_echo_server(drop_first: usize) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let mut accepted = 0;
        while let Ok((stream, _)) = listener.accept().await {
            accepted += 1;
            let drop_now = accepted <= drop_first;
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                if drop_now {
                    return;
                }
                while let Some(Ok(frame)) = ws.next().await {
                    if matches!(frame, Frame::Text(_) | Frame::Binary(_))
                        && ws.send(frame).await.is_err()
                    {
                        break;
                    }
                }
            });
        }
    });

    Ok(addr)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Supervised Echo Example ===\n");

    let addr = flaky_echo_server(2).await?;
    println!("Echo server listening on {} (drops the first 2 connections)\n", addr);

    let config = ReconnectConfig::builder()
        .name("echo")
        .connect_timeout(Duration::from_secs(2))
        .schedule(BackoffSchedule::exponential(
            Duration::from_millis(100),
            Duration::from_secs(1),
            5,
        ))
        .on_state_change(|from, to| println!("   state: {} -> {}", from, to))
        .build();

    let (tx, mut rx) = mpsc::unbounded_channel::<SocketEvent>();
    let forward = move |event: &SocketEvent| {
        let _ = tx.send(event.clone());
    };

    let socket = ReconnectingSocket::builder(
        format!("ws://{}/echo", addr),
        Arc::new(TungsteniteFactory::new()),
    )
    .config(config)
    .on(EventKind::Open, forward.clone())
    .on(EventKind::Close, forward.clone())
    .on(EventKind::Message, forward.clone())
    .on(EventKind::Closed, forward)
    .connect()?;

    while let Some(event) = rx.recv().await {
        match event {
            SocketEvent::Open(open) => {
                println!("1. Connected on transport {}", open.transport_id);
                socket.send("hello, resilient world")?;
            }
            SocketEvent::Close(close) => {
                println!(
                    "   transport {} closed with {} (clean: {})",
                    close.transport_id, close.code, close.was_clean
                );
            }
            SocketEvent::Message(message) => {
                println!("2. Echo received: {:?}", message.data.as_text());
                socket.close()?;
            }
            SocketEvent::Closed(closed) => {
                println!("3. Supervision ended: {:?}", closed.reason);
                break;
            }
            _ => {}
        }
    }

    println!("\nFinal state: {}", socket.state());
    Ok(())
}
