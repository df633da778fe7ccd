//! The configuration consumed by the dogetest node lifecycle controller and RPC transport.
//!
//! This is an opaque value as far as the core is concerned: it can be built in code, parsed from
//! command line arguments, or deserialized by the caller from whatever source they like.

use std::{ops::RangeInclusive, path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Parser, Clone, Serialize, Deserialize)]
#[command(name = "dogetest")]
pub struct NodeConfiguration {
    /// The host the node's RPC interface is reached on.
    #[arg(long = "host", default_value = "127.0.0.1")]
    pub host: String,

    /// A pre-assigned RPC port.
    ///
    /// If not set, the first bindable port in the port range is used.
    #[arg(long = "port")]
    pub port: Option<u16>,

    /// The first port of the range probed when no port was pre-assigned.
    #[arg(long = "port-range-start", default_value = "22555")]
    pub port_range_start: u16,

    /// The last port (inclusive) of the range probed when no port was pre-assigned.
    #[arg(long = "port-range-end", default_value = "22655")]
    pub port_range_end: u16,

    /// An existing container network to attach the node to.
    ///
    /// A fresh bridge network is created (and removed on stop) if not specified.
    #[arg(long = "network")]
    pub network: Option<String>,

    /// How the node is run.
    #[arg(long = "runtime", default_value = "process")]
    pub runtime: RuntimeKind,

    /// The path to the `dogecoind` executable.
    ///
    /// By default it uses the `dogecoind` binary found in `$PATH`.
    #[arg(long = "dogecoind", default_value = "dogecoind")]
    pub binary: PathBuf,

    /// The path to the `docker` executable used by the container runtime.
    #[arg(long = "docker", default_value = "docker")]
    pub docker: PathBuf,

    /// A place to keep the node state, generated files and logs.
    ///
    /// A temporary directory is created for every session if not specified. Node state in here is
    /// always treated as disposable and is cleared on start.
    #[arg(long = "state-dir")]
    pub state_directory: Option<PathBuf>,

    /// The RPC user name. Starting a node with an empty user or password is rejected.
    #[arg(long = "rpc-user", default_value = "test")]
    pub rpc_user: String,

    /// The RPC password.
    #[arg(long = "rpc-password", default_value = "test")]
    pub rpc_password: String,

    /// The maximum time in milliseconds to wait for the node's network endpoint.
    #[arg(long = "network-timeout", default_value = "10000")]
    pub network_timeout_ms: u64,

    /// The maximum time in milliseconds to wait for the RPC interface to answer.
    #[arg(long = "rpc-timeout", default_value = "60000")]
    pub rpc_timeout_ms: u64,

    /// The delay in milliseconds between readiness attempts.
    #[arg(long = "poll-interval", default_value = "250")]
    pub poll_interval_ms: u64,

    /// The timeout in milliseconds of a single TCP connect attempt.
    #[arg(long = "connect-timeout", default_value = "500")]
    pub connect_timeout_ms: u64,

    /// The timeout in milliseconds of a single RPC request.
    #[arg(long = "request-timeout", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Replay the node's captured stdout and stderr through the log when it stops.
    #[arg(long = "log-output")]
    pub log_output: bool,
}

impl NodeConfiguration {
    pub fn port_range(&self) -> RangeInclusive<u16> {
        self.port_range_start..=self.port_range_end
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for NodeConfiguration {
    fn default() -> Self {
        NodeConfiguration::parse_from(["dogetest"])
    }
}

/// The way the node instance is provisioned.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// A `dogecoind` child process.
    #[default]
    Process,
    /// A container built and run through the docker CLI.
    Container,
}
