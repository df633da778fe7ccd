//! Thin typed wrappers over [`RpcTransport::call`]. None of these retry; retrying is the caller's
//! decision.

use serde_json::{Value, json};

use crate::{
    Error, RpcTransport,
    types::{Block, BlockHeader, BlockchainInfo, Info, Utxo},
};

/// The widest confirmation window `listunspent` accepts, so every output is listed.
const LIST_UNSPENT_MAX_CONFIRMATIONS: u64 = 999_999_999;

/// `getblock` verbosity that decodes every transaction in the block.
const BLOCK_VERBOSITY_DECODED: u64 = 2;

impl RpcTransport {
    pub fn get_info(&self) -> Result<Info, Error> {
        self.call_typed("getinfo", vec![])
    }

    /// Mines `blocks` blocks to the wallet's default address and returns their hashes.
    pub fn generate(&self, blocks: u32) -> Result<Vec<String>, Error> {
        self.call_typed("generate", vec![json!(blocks)])
    }

    /// Mines `blocks` blocks paying the coinbase to `address` and returns their hashes.
    pub fn generate_to_address(&self, blocks: u32, address: &str) -> Result<Vec<String>, Error> {
        self.call_typed("generatetoaddress", vec![json!(blocks), json!(address)])
    }

    pub fn get_new_address(&self) -> Result<String, Error> {
        self.call_typed("getnewaddress", vec![])
    }

    pub fn dump_priv_key(&self, address: &str) -> Result<String, Error> {
        self.call_typed("dumpprivkey", vec![json!(address)])
    }

    /// Sends `amount` coins from the wallet to `address` and returns the transaction id.
    pub fn send_to_address(&self, address: &str, amount: f64) -> Result<String, Error> {
        self.call_typed("sendtoaddress", vec![json!(address), json!(amount)])
    }

    /// Lists every unspent output of `address`, confirmed or not.
    pub fn list_unspent(&self, address: &str) -> Result<Vec<Utxo>, Error> {
        self.call_typed(
            "listunspent",
            vec![
                json!(0),
                json!(LIST_UNSPENT_MAX_CONFIRMATIONS),
                json!([address]),
            ],
        )
    }

    pub fn get_block(&self, hash: &str) -> Result<Block, Error> {
        self.call_typed("getblock", vec![json!(hash), json!(BLOCK_VERBOSITY_DECODED)])
    }

    pub fn get_block_hash(&self, height: u64) -> Result<String, Error> {
        self.call_typed("getblockhash", vec![json!(height)])
    }

    pub fn get_block_header(&self, hash: &str) -> Result<BlockHeader, Error> {
        self.call_typed("getblockheader", vec![json!(hash), Value::Bool(true)])
    }

    pub fn get_block_count(&self) -> Result<u64, Error> {
        self.call_typed("getblockcount", vec![])
    }

    pub fn get_best_block_hash(&self) -> Result<String, Error> {
        self.call_typed("getbestblockhash", vec![])
    }

    pub fn get_blockchain_info(&self) -> Result<BlockchainInfo, Error> {
        self.call_typed("getblockchaininfo", vec![])
    }
}
