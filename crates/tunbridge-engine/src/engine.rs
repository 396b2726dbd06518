//! Engine Collaborator Interface
//!
//! The proxy engine itself lives outside this workspace. It is reached
//! through two traits:
//!
//! - [`EngineFactory`]: reports the engine version and builds instances
//! - [`Engine`]: one built instance (start / close / dial)
//!
//! Instances are never used directly by callers; they are wrapped in an
//! [`EngineHandle`](crate::EngineHandle) which enforces the lifecycle.

use crate::config::EngineConfig;
use crate::error::EngineError;
use async_trait::async_trait;
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Transport requested from the engine's dialer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Tcp,
    Udp,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Tcp => write!(f, "tcp"),
            Network::Udp => write!(f, "udp"),
        }
    }
}

/// Dial target, resolved by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub network: Network,
    pub host: String,
    pub port: u16,
}

impl Destination {
    /// TCP destination
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            network: Network::Tcp,
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}:[{}]:{}", self.network, self.host, self.port)
        } else {
            write!(f, "{}:{}:{}", self.network, self.host, self.port)
        }
    }
}

/// Byte stream returned by an engine dial
pub trait EngineStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> EngineStream for T {}

/// One engine instance
///
/// Implementations must tolerate `close` being called on an instance that
/// never started. The [`EngineHandle`](crate::EngineHandle) wrapper makes
/// sure `close` runs at most once.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Bring the instance to its running state
    async fn start(&self) -> Result<(), EngineError>;

    /// Release every resource held by the instance
    async fn close(&self) -> Result<(), EngineError>;

    /// Open an outbound connection routed through the engine
    async fn dial(&self, destination: &Destination) -> io::Result<Box<dyn EngineStream>>;
}

/// Builds engine instances from validated configurations
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Engine version string (process-wide, not tied to an instance)
    fn version(&self) -> String;

    /// Build a new, not yet started, instance
    async fn build(&self, config: EngineConfig) -> Result<Box<dyn Engine>, EngineError>;
}
