//! Dispatch a request described as JSON and print its events.
//!
//! Run with: cargo run -p tether-net --example dispatch -- https://httpbin.org/get
//!
//! Set `RUST_LOG=tether_net=debug` to see the request lifecycle.

use std::time::Duration;

use serde_json::json;
use tether_net::http::{Dispatcher, NetworkEvent};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> tether_net::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/get".to_string());

    let dispatcher = Dispatcher::builder().build()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher.events().connect(move |event: &NetworkEvent| {
        let _ = tx.send(event.clone());
    });

    dispatcher.dispatch_json(json!({
        "method": "GET",
        "url": url,
        "requestId": 1,
        "headers": [["accept", "application/json"]],
        "responseType": "text",
        "incrementalUpdates": true,
        "timeout": 10_000
    }));

    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(15), rx.recv()).await {
        match &event {
            NetworkEvent::ResponseReceived { status, headers, .. } => {
                println!("status {status}");
                for (name, value) in headers {
                    println!("  {name}: {value}");
                }
            }
            NetworkEvent::IncrementalDataReceived { data, .. } => print!("{data}"),
            other => println!("{other:?}"),
        }
        if event.is_terminal() {
            break;
        }
    }

    dispatcher.shutdown();
    Ok(())
}
