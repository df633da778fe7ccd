//! This crate implements the lifecycle of disposable regtest nodes.
//!
//! A [`NodeController`] drives one node through start, readiness and teardown. How the node is
//! actually run is abstracted behind the [`NodeRuntime`] and [`RuntimeHandle`] traits, with a local
//! process ([`runtimes::LocalProcessRuntime`]) and a container ([`runtimes::ContainerRuntime`])
//! implementation.

use std::{
    fmt::Display,
    net::{TcpStream, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

mod controller;
mod error;
mod network;
mod process;
pub mod runtimes;
mod stray;

pub use controller::*;
pub use error::*;
pub use network::*;
pub use stray::*;

pub use dogetest_common::polling::Cancellation;

/// An abstract way of running a node.
///
/// The controller only ever talks to the node through this trait and the [`RuntimeHandle`] it
/// returns, so the readiness state machine is shared by every variant.
pub trait NodeRuntime: Send {
    /// How the controller detects that the node's network endpoint is up.
    fn network_readiness(&self) -> NetworkReadiness;

    /// Starts the node described by the request.
    ///
    /// Returns as soon as the node was started; waiting for readiness is the controller's job.
    fn launch(&mut self, request: &LaunchRequest) -> anyhow::Result<Box<dyn RuntimeHandle>>;
}

/// A handle to a launched node.
pub trait RuntimeHandle: Send {
    fn is_running(&mut self) -> bool;

    /// The host and port the node's RPC interface is reachable on from the test process.
    ///
    /// This may fail for a while after launch, for example until a container's port mapping has
    /// been assigned.
    fn resolved_endpoint(&mut self) -> anyhow::Result<Endpoint>;

    /// Whether the output captured from the node so far contains `marker`.
    fn logs_contain(&mut self, marker: &str) -> anyhow::Result<bool>;

    /// Kills the node and releases everything the runtime created for it.
    fn terminate(&mut self) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkReadiness {
    /// The endpoint accepts TCP connections.
    TcpConnect,
    /// The node printed a line containing this marker.
    LogMarker(String),
}

/// Everything a runtime needs to know to launch a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchRequest {
    pub host: String,
    pub port: u16,
    pub network: Option<String>,
    /// A scratch directory owned by the session; anything written here is removed on stop.
    pub session_directory: PathBuf,
    pub data_directory: PathBuf,
    pub logs_directory: PathBuf,
    pub rpc_user: String,
    pub rpc_password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Attempts a single TCP connection to the endpoint.
    pub fn is_reachable(&self, connect_timeout: Duration) -> bool {
        let Ok(addresses) = (self.host.as_str(), self.port).to_socket_addrs() else {
            return false;
        };
        addresses
            .into_iter()
            .any(|address| TcpStream::connect_timeout(&address, connect_timeout).is_ok())
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
