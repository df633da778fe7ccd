use std::collections::HashSet;

use dogetest_rpc::RpcTransport;
use tracing::{debug, info, instrument};

use crate::Error;

/// The number of blocks a coinbase output needs before it can be spent on regtest.
pub const COINBASE_MATURITY: u32 = 100;

/// One address to create and fund.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressSetup {
    pub label: String,
    /// The amount sent to the new address, in coins.
    pub initial_balance: f64,
}

impl AddressSetup {
    pub fn new(label: impl Into<String>, initial_balance: f64) -> Self {
        Self {
            label: label.into(),
            initial_balance,
        }
    }
}

/// A funded address together with its exported private key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    label: String,
    address: String,
    private_key: String,
}

impl Address {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

/// The addresses created by [`setup_addresses`], in the order they were requested, and the hashes
/// of the blocks that confirmed their funding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressBook {
    addresses: Vec<Address>,
    blocks: Vec<String>,
}

impl AddressBook {
    /// Looks an address up by its label.
    pub fn address(&self, label: &str) -> Result<&Address, Error> {
        self.addresses
            .iter()
            .find(|address| address.label == label)
            .ok_or_else(|| Error::NotFound {
                label: label.to_owned(),
            })
    }

    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.addresses.iter()
    }
}

impl<'a> IntoIterator for &'a AddressBook {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.iter()
    }
}

/// Creates and funds one address per setup.
///
/// Mines [`COINBASE_MATURITY`] blocks so the node's wallet has spendable coins, then for each
/// setup in order creates an address, exports its key and sends the initial balance to it, and
/// finally mines one block confirming all the sends. The first failing call aborts the setup and
/// no book is returned.
#[instrument(level = "info", skip_all, fields(addresses = setups.len()), err)]
pub fn setup_addresses(rpc: &RpcTransport, setups: &[AddressSetup]) -> Result<AddressBook, Error> {
    validate(setups)?;

    rpc.generate(COINBASE_MATURITY)?;
    debug!(blocks = COINBASE_MATURITY, "Mined the coinbase maturity blocks");

    let mut addresses = Vec::with_capacity(setups.len());
    for setup in setups {
        let address = rpc.get_new_address()?;
        if address.is_empty() {
            return Err(Error::UnexpectedResult {
                method: "getnewaddress",
                reason: "the address is empty".to_string(),
            });
        }
        let private_key = rpc.dump_priv_key(&address)?;
        if private_key.is_empty() {
            return Err(Error::UnexpectedResult {
                method: "dumpprivkey",
                reason: format!("the private key of {address} is empty"),
            });
        }
        let txid = rpc.send_to_address(&address, setup.initial_balance)?;
        debug!(
            label = %setup.label,
            %address,
            amount = setup.initial_balance,
            %txid,
            "Funded address"
        );
        addresses.push(Address {
            label: setup.label.clone(),
            address,
            private_key,
        });
    }

    let blocks = confirm_blocks(rpc, 1)?;
    info!(addresses = addresses.len(), "Address book is ready");
    Ok(AddressBook { addresses, blocks })
}

/// Mines `count` blocks and returns their hashes.
#[instrument(level = "debug", skip(rpc), err)]
pub fn confirm_blocks(rpc: &RpcTransport, count: u32) -> Result<Vec<String>, Error> {
    Ok(rpc.generate(count)?)
}

fn validate(setups: &[AddressSetup]) -> Result<(), Error> {
    let mut labels = HashSet::with_capacity(setups.len());
    for setup in setups {
        if setup.label.is_empty() {
            return Err(Error::InvalidSetup {
                reason: "address labels must not be empty".to_string(),
            });
        }
        if !labels.insert(setup.label.as_str()) {
            return Err(Error::InvalidSetup {
                reason: format!("the label {:?} is used more than once", setup.label),
            });
        }
    }
    Ok(())
}
