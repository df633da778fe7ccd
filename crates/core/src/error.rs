use dogetest_node::{NodeError, NodeState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A label lookup missed. Recoverable: callers may branch on it.
    #[error("no address labelled {label:?} in the address book")]
    NotFound { label: String },

    #[error("invalid address setup: {reason}")]
    InvalidSetup { reason: String },

    /// The node answered a call with a result the fixture cannot use.
    #[error("{method} returned an unusable result: {reason}")]
    UnexpectedResult { method: &'static str, reason: String },

    #[error("the node is not running, it is {state}")]
    NotRunning { state: NodeState },

    #[error(transparent)]
    Rpc(#[from] dogetest_rpc::Error),

    #[error(transparent)]
    Node(#[from] NodeError),
}
