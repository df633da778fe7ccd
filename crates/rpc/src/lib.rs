//! This crate implements the JSON-RPC transport used to drive a regtest node.
//!
//! Every call is a single HTTP round trip correlated by a strictly increasing request id. The
//! transport hands back the raw result payload, and the typed wrappers in [`RpcTransport`] decode
//! it into the records defined in [`types`].

mod envelope;
mod error;
mod methods;
mod transport;
pub mod types;

pub use envelope::{Outcome, RemoteError};
pub use error::{Error, ProtocolViolation, TransportFailure};
pub use transport::{RpcConfiguration, RpcTransport};
