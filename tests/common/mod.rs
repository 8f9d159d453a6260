//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use autopilot::config::AppConfig;
use autopilot::http::HttpServer;
use autopilot::lifecycle::{self, Shutdown};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(5);

/// A server running on an ephemeral port with its own settings file.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
    dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Start with a config tweaked by `configure`.
    pub async fn start_with(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.settings.path = dir.path().join("settings.json");
        config.pipeline.platform = "linux".to_string();
        config.runner.iteration_interval_ms = 5;
        configure(&mut config);

        let shutdown = Shutdown::new();
        let runtime = lifecycle::assemble(&config, shutdown.clone()).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(HttpServer::new(runtime).run(listener));

        Self {
            addr,
            shutdown,
            handle,
            dir,
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.path().join("settings.json")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Open a websocket client on `topic`.
    pub async fn connect(&self, topic: &str) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws/{}", self.addr, topic))
            .await
            .unwrap();
        client
    }

    /// Wait until `count` clients are registered.
    pub async fn wait_for_clients(&self, count: u64) {
        let deadline = tokio::time::Instant::now() + TIMEOUT;
        loop {
            let status: Value = reqwest::get(self.url("/status"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if status["clients"] == count {
                return;
            }
            assert!(tokio::time::Instant::now() < deadline, "clients never reached {count}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Trigger shutdown and wait for the server to finish.
    pub async fn stop(self) -> TempDir {
        self.shutdown.trigger();
        tokio::time::timeout(TIMEOUT, self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        self.dir
    }
}

pub async fn send(client: &mut Client, record: Value) {
    client.send(Message::Text(record.to_string().into())).await.unwrap();
}

pub async fn send_raw(client: &mut Client, text: &str) {
    client.send(Message::Text(text.to_string().into())).await.unwrap();
}

/// Next JSON text frame.
pub async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Skip messages until one satisfies `matches`.
pub async fn next_matching(client: &mut Client, matches: impl Fn(&Value) -> bool) -> Value {
    loop {
        let message = next_json(client).await;
        if matches(&message) {
            return message;
        }
    }
}

/// Next reply (a record with `status`), skipping broadcast events.
pub async fn next_reply(client: &mut Client) -> Value {
    next_matching(client, |m| m.get("status").is_some()).await
}

/// Send `record` and wait for its reply.
pub async fn request(client: &mut Client, record: Value) -> Value {
    send(client, record).await;
    next_reply(client).await
}
