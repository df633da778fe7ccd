//! Disposable regtest nodes with funded addresses for integration tests.
//!
//! [`DogeTest`] starts a node, waits until its RPC interface answers and tears it down again. The
//! fixture operations create and fund labelled addresses ([`setup_addresses`]), mine blocks
//! ([`confirm_blocks`]) and query balances ([`get_wallet`]).

mod error;
mod fixture;
mod harness;
mod wallet;

#[cfg(test)]
mod fake_chain;

pub use error::Error;
pub use fixture::*;
pub use harness::DogeTest;
pub use wallet::*;

pub use dogetest_config::{NodeConfiguration, RuntimeKind};
pub use dogetest_node::{
    Cancellation, Endpoint, NodeController, NodeError, NodeRuntime, NodeState, RuntimeHandle,
    kill_stray_instances,
};
pub use dogetest_rpc::{self as rpc, RpcConfiguration, RpcTransport};

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs a stderr subscriber filtered through `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set, so every test may call it.
pub fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
