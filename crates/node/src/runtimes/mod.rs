//! The ways a node can be run.

mod container;
mod local;

pub use container::*;
pub use local::*;

use dogetest_config::{NodeConfiguration, RuntimeKind};

use crate::NodeRuntime;

/// The runtime variant selected by the configuration.
pub fn runtime_for(configuration: &NodeConfiguration) -> Box<dyn NodeRuntime> {
    match configuration.runtime {
        RuntimeKind::Process => Box::new(LocalProcessRuntime::new(
            configuration.binary.clone(),
            configuration.log_output,
        )),
        RuntimeKind::Container => Box::new(ContainerRuntime::new(
            configuration.docker.clone(),
            configuration.log_output,
        )),
    }
}
