use std::{net::TcpListener, ops::RangeInclusive};

use tracing::debug;

use crate::NodeError;

/// Finds a port on `host` that can currently be bound, trying the range from low to high.
///
/// The probe listener is closed again before returning, so another process could still take the
/// port before the node binds it.
pub fn probe_port(host: &str, range: RangeInclusive<u16>) -> Result<u16, NodeError> {
    let (start, end) = (*range.start(), *range.end());
    for port in range {
        match TcpListener::bind((host, port)) {
            Ok(listener) => {
                drop(listener);
                debug!(port, "Found a bindable port");
                return Ok(port);
            }
            Err(error) => debug!(port, %error, "Port is not bindable"),
        }
    }
    Err(NodeError::NoPortAvailable {
        host: host.to_owned(),
        start,
        end,
    })
}
