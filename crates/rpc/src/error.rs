use thiserror::Error;

use crate::RemoteError;

/// Everything that can go wrong with a single RPC call.
///
/// Each variant carries the method name and the request id so that a failure can be diagnosed
/// without re-running the test.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to build the http client for the json-rpc transport: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a usable HTTP response.
    #[error("json-rpc transport failure calling `{method}` (id {id}): {source}")]
    Transport {
        method: String,
        id: u64,
        #[source]
        source: TransportFailure,
    },

    /// The node answered but not in a way that fits the JSON-RPC session.
    #[error("json-rpc protocol violation calling `{method}` (id {id}): {reason}")]
    Protocol {
        method: String,
        id: u64,
        reason: ProtocolViolation,
    },

    /// The node reported a structured error.
    #[error("json-rpc call `{method}` (id {id}) failed on the node: {error}")]
    Rpc {
        method: String,
        id: u64,
        error: RemoteError,
    },

    /// The result did not have the shape the caller expected.
    #[error("failed to decode the result of `{method}` (id {id}): {source} | {raw}")]
    Decode {
        method: String,
        id: u64,
        #[source]
        source: serde_json::Error,
        raw: String,
    },
}

impl Error {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Client(_) | Self::Transport { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// The error reported by the node, if this is one.
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            Self::Rpc { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportFailure {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read the response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("error status {status} | {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("wrong id returned: {received:?} vs {expected}")]
    MismatchedId { expected: u64, received: Option<u64> },

    #[error("no result or error was returned")]
    EmptyResponse,

    #[error("response is not a json-rpc envelope: {reason} | {body}")]
    MalformedEnvelope { reason: String, body: String },
}
