use dogetest_rpc::{RpcTransport, types::Utxo};
use tracing::instrument;

use crate::Error;

/// The unspent outputs of one address at the time it was queried.
///
/// Views are never cached; query again to observe new transactions.
#[derive(Clone, Debug, PartialEq)]
pub struct Wallet {
    address: String,
    unspents: Vec<Utxo>,
}

impl Wallet {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Every unspent output reported by the node, spendable or not.
    pub fn unspents(&self) -> &[Utxo] {
        &self.unspents
    }

    /// The sum of all unspent amounts, in coins.
    pub fn balance(&self) -> f64 {
        self.unspents.iter().map(|unspent| unspent.amount).sum()
    }
}

/// Queries the unspent outputs of `address`.
#[instrument(level = "debug", skip(rpc), err)]
pub fn get_wallet(rpc: &RpcTransport, address: &str) -> Result<Wallet, Error> {
    let unspents = rpc.list_unspent(address)?;
    Ok(Wallet {
        address: address.to_owned(),
        unspents,
    })
}
