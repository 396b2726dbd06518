//! Scripted engine used by the probe integration tests.
//!
//! Dials are answered in memory through `tokio::io::duplex`, so no test
//! touches the network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tunbridge_engine::{Destination, Engine, EngineConfig, EngineError, EngineFactory, EngineStream};

pub const NO_CONTENT: &str = "HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n";
pub const OK: &str = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";
pub const SERVER_ERROR: &str =
    "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// How a dial is answered
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// Read the request head, write this raw response, close
    Respond(&'static str),
    /// Dial never completes
    Hang,
    /// Dial fails
    Refuse,
    /// Dial succeeds but the peer hangs up immediately
    Hangup,
    /// Dial succeeds, the peer reads everything and never answers
    Silent,
}

/// Everything the tests assert on
#[derive(Default)]
pub struct Recorder {
    pub destinations: Mutex<Vec<Destination>>,
    pub requests: Mutex<Vec<String>>,
    pub configs: Mutex<Vec<EngineConfig>>,
    pub builds: AtomicUsize,
    pub starts: AtomicUsize,
    pub closes: AtomicUsize,
}

impl Recorder {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn dials(&self) -> usize {
        self.destinations.lock().unwrap().len()
    }

    pub fn last_destination(&self) -> Option<Destination> {
        self.destinations.lock().unwrap().last().cloned()
    }

    /// Last request head, lowercased
    pub fn last_request(&self) -> Option<String> {
        self.requests.lock().unwrap().last().map(|r| r.to_lowercase())
    }
}

pub struct ScriptedEngine {
    pub reply: Reply,
    pub fail_start: bool,
    pub fail_close: bool,
    pub recorder: Arc<Recorder>,
}

impl ScriptedEngine {
    pub fn new(reply: Reply, recorder: Arc<Recorder>) -> Self {
        Self {
            reply,
            fail_start: false,
            fail_close: false,
            recorder,
        }
    }
}

async fn read_head(stream: &mut DuplexStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                head.extend_from_slice(&buf[..n]);
                if head.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn start(&self) -> Result<(), EngineError> {
        self.recorder.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(EngineError::Start("scripted start failure".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(EngineError::Close("scripted close failure".into()));
        }
        Ok(())
    }

    async fn dial(&self, destination: &Destination) -> io::Result<Box<dyn EngineStream>> {
        self.recorder.destinations.lock().unwrap().push(destination.clone());

        match self.reply {
            Reply::Hang => std::future::pending::<io::Result<Box<dyn EngineStream>>>().await,
            Reply::Refuse => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "scripted refusal",
            )),
            Reply::Hangup => {
                let (client, server) = tokio::io::duplex(1024);
                drop(server);
                Ok(Box::new(client))
            }
            Reply::Silent => {
                let (client, mut server) = tokio::io::duplex(16 * 1024);
                tokio::spawn(async move {
                    let _ = tokio::io::copy(&mut server, &mut tokio::io::sink()).await;
                });
                Ok(Box::new(client))
            }
            Reply::Respond(raw) => {
                let (client, mut server) = tokio::io::duplex(16 * 1024);
                let recorder = self.recorder.clone();
                tokio::spawn(async move {
                    let head = read_head(&mut server).await;
                    recorder.requests.lock().unwrap().push(head);
                    let _ = server.write_all(raw.as_bytes()).await;
                    let _ = server.shutdown().await;
                });
                Ok(Box::new(client))
            }
        }
    }
}

/// Factory producing [`ScriptedEngine`]s
pub struct ScriptedFactory {
    pub reply: Reply,
    pub fail_build: bool,
    pub fail_start: bool,
    pub fail_close: bool,
    pub recorder: Arc<Recorder>,
}

impl ScriptedFactory {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            fail_build: false,
            fail_start: false,
            fail_close: false,
            recorder: Arc::new(Recorder::default()),
        }
    }
}

#[async_trait]
impl EngineFactory for ScriptedFactory {
    fn version(&self) -> String {
        "1.8.1-scripted".to_string()
    }

    async fn build(&self, config: EngineConfig) -> Result<Box<dyn Engine>, EngineError> {
        self.recorder.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_build {
            return Err(EngineError::Construction("scripted build failure".into()));
        }
        self.recorder.configs.lock().unwrap().push(config);

        Ok(Box::new(ScriptedEngine {
            reply: self.reply,
            fail_start: self.fail_start,
            fail_close: self.fail_close,
            recorder: self.recorder.clone(),
        }))
    }
}
