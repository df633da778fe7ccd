use std::time::Duration;

use dogetest_common::polling::PollError;
use thiserror::Error;

use crate::NodeState;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("cannot {operation} a node that is {state}")]
    InvalidState {
        operation: &'static str,
        state: NodeState,
    },

    #[error("invalid node configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("no port available on {host} in {start}..={end}")]
    NoPortAvailable { host: String, start: u16, end: u16 },

    #[error("failed to prepare the session directory: {0:#}")]
    Session(#[source] anyhow::Error),

    #[error("failed to launch the node: {0:#}")]
    Launch(#[source] anyhow::Error),

    #[error("node was still {phase} after {waited:?}")]
    StartupTimeout { phase: NodeState, waited: Duration },

    #[error("node stopped running while {phase}")]
    Exited { phase: NodeState },

    #[error("node startup was cancelled while {phase}")]
    Cancelled { phase: NodeState },

    #[error("readiness check failed while {phase}: {source:#}")]
    Readiness {
        phase: NodeState,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to tear the node down: {0:#}")]
    Teardown(#[source] anyhow::Error),
}

/// Returned from inside readiness polls when the runtime reports the node is gone.
#[derive(Debug, Error)]
#[error("the node runtime is no longer running")]
pub(crate) struct RuntimeExited;

impl NodeError {
    pub(crate) fn from_poll(error: PollError, phase: NodeState) -> Self {
        match error {
            PollError::TimedOut { elapsed, .. } => Self::StartupTimeout {
                phase,
                waited: elapsed,
            },
            PollError::Cancelled { .. } => Self::Cancelled { phase },
            PollError::Aborted(source) if source.is::<RuntimeExited>() => Self::Exited { phase },
            PollError::Aborted(source) => Self::Readiness { phase, source },
        }
    }
}
