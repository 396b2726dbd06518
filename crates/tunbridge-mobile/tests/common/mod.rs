//! In-memory engine for the controller and bridge tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tunbridge_engine::{Destination, Engine, EngineConfig, EngineError, EngineFactory, EngineStream};

pub const NO_CONTENT: &str = "HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n";
pub const SERVER_ERROR: &str =
    "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

pub const VERSION: &str = "1.8.1-stub";

pub const CONFIG: &str = r#"{
    "inbounds": [{ "protocol": "socks", "listen": "127.0.0.1", "port": 10808 }],
    "outbounds": [{ "protocol": "freedom", "tag": "direct" }],
    "apps": [
        { "kind": "log" },
        { "kind": "dispatcher" },
        { "kind": "inbound" },
        { "kind": "outbound" },
        { "kind": "router" },
        { "kind": "stats" }
    ]
}"#;

#[derive(Default)]
pub struct Counters {
    pub builds: AtomicUsize,
    pub starts: AtomicUsize,
    pub closes: AtomicUsize,
    pub configs: Mutex<Vec<EngineConfig>>,
}

impl Counters {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct StubEngine {
    response: &'static str,
    fail_start: bool,
    fail_close: bool,
    start_delay: Duration,
    counters: Arc<Counters>,
}

#[async_trait]
impl Engine for StubEngine {
    async fn start(&self) -> Result<(), EngineError> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if self.fail_start {
            return Err(EngineError::Start(
                "listen tcp 127.0.0.1:10808: address already in use".into(),
            ));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(EngineError::Close("stub close failure".into()));
        }
        Ok(())
    }

    async fn dial(&self, _destination: &Destination) -> io::Result<Box<dyn EngineStream>> {
        let (client, mut server) = tokio::io::duplex(16 * 1024);
        let response = self.response;
        tokio::spawn(async move {
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while let Ok(n) = server.read(&mut buf).await {
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
                if head.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let _ = server.write_all(response.as_bytes()).await;
            let _ = server.shutdown().await;
        });
        Ok(Box::new(client))
    }
}

pub struct StubFactory {
    pub response: &'static str,
    pub fail_build: bool,
    pub fail_start: bool,
    pub fail_close: bool,
    pub start_delay: Duration,
    pub counters: Arc<Counters>,
}

impl StubFactory {
    pub fn new() -> Self {
        Self {
            response: NO_CONTENT,
            fail_build: false,
            fail_start: false,
            fail_close: false,
            start_delay: Duration::ZERO,
            counters: Arc::new(Counters::default()),
        }
    }
}

#[async_trait]
impl EngineFactory for StubFactory {
    fn version(&self) -> String {
        VERSION.to_string()
    }

    async fn build(&self, config: EngineConfig) -> Result<Box<dyn Engine>, EngineError> {
        self.counters.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_build {
            return Err(EngineError::Construction("unknown outbound protocol".into()));
        }
        self.counters.configs.lock().unwrap().push(config);

        Ok(Box::new(StubEngine {
            response: self.response,
            fail_start: self.fail_start,
            fail_close: self.fail_close,
            start_delay: self.start_delay,
            counters: self.counters.clone(),
        }))
    }
}

/// Keeps every message handed to a log sink
#[derive(Default)]
pub struct CollectedLogs {
    messages: Mutex<Vec<String>>,
}

impl CollectedLogs {
    pub fn record(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}
