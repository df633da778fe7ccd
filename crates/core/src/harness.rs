use dogetest_config::NodeConfiguration;
use dogetest_node::{Endpoint, NodeController, NodeRuntime, NodeState};
use dogetest_rpc::RpcTransport;
use tracing::instrument;

use crate::{
    AddressBook, AddressSetup, Error, Wallet,
    fixture::{confirm_blocks, setup_addresses},
    wallet::get_wallet,
};

/// A disposable regtest node plus the fixture operations that run against it.
///
/// ```no_run
/// use dogetest::{AddressSetup, DogeTest, NodeConfiguration};
///
/// let mut node = DogeTest::new(NodeConfiguration::default());
/// node.start()?;
/// let book = node.setup_addresses(&[AddressSetup::new("alice", 10.0)])?;
/// let alice = book.address("alice")?;
/// assert_eq!(node.get_wallet(alice.address())?.balance(), 10.0);
/// node.stop()?;
/// # Ok::<(), dogetest::Error>(())
/// ```
pub struct DogeTest {
    controller: NodeController,
}

impl DogeTest {
    pub fn new(configuration: NodeConfiguration) -> Self {
        Self {
            controller: NodeController::new(configuration),
        }
    }

    pub fn with_runtime(configuration: NodeConfiguration, runtime: impl NodeRuntime + 'static) -> Self {
        Self {
            controller: NodeController::with_runtime(configuration, runtime),
        }
    }

    pub fn start(&mut self) -> Result<(), Error> {
        Ok(self.controller.start()?)
    }

    pub fn stop(&mut self) -> Result<(), Error> {
        Ok(self.controller.stop()?)
    }

    pub fn state(&self) -> NodeState {
        self.controller.state()
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.controller.endpoint()
    }

    pub fn controller(&self) -> &NodeController {
        &self.controller
    }

    /// The transport bound to the running node.
    pub fn rpc(&self) -> Result<&RpcTransport, Error> {
        self.controller.rpc().ok_or(Error::NotRunning {
            state: self.controller.state(),
        })
    }

    #[instrument(level = "info", skip_all, fields(node_id = self.controller.id()))]
    pub fn setup_addresses(&self, setups: &[AddressSetup]) -> Result<AddressBook, Error> {
        setup_addresses(self.rpc()?, setups)
    }

    pub fn get_wallet(&self, address: &str) -> Result<Wallet, Error> {
        get_wallet(self.rpc()?, address)
    }

    pub fn confirm_blocks(&self, count: u32) -> Result<Vec<String>, Error> {
        confirm_blocks(self.rpc()?, count)
    }
}
