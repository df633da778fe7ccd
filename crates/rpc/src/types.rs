//! The records returned by the node's RPC interface.
//!
//! Amounts and difficulties are plain numbers as the node sends them; no currency formatting is
//! applied.

use serde::{Deserialize, Serialize};

/// The result of `getinfo`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    pub version: i64,
    #[serde(rename = "protocolversion")]
    pub protocol_version: i64,
    #[serde(rename = "walletversion")]
    pub wallet_version: Option<i64>,
    pub balance: Option<f64>,
    pub blocks: u64,
    #[serde(rename = "timeoffset")]
    pub time_offset: i64,
    pub connections: u64,
    pub proxy: String,
    pub difficulty: f64,
    pub testnet: bool,
    #[serde(rename = "keypoololdest")]
    pub keypool_oldest: Option<i64>,
    #[serde(rename = "keypoolsize")]
    pub keypool_size: Option<i64>,
    #[serde(rename = "paytxfee")]
    pub pay_tx_fee: Option<f64>,
    #[serde(rename = "relayfee")]
    pub relay_fee: f64,
    pub errors: String,
}

/// The result of `getblockchaininfo`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockchainInfo {
    /// The current network name (main, test, regtest).
    pub chain: String,
    /// The height of the most-work fully-validated chain. The genesis block has height 0.
    pub blocks: u64,
    /// The current number of headers that were validated.
    pub headers: u64,
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: String,
    pub difficulty: f64,
    #[serde(rename = "mediantime", default)]
    pub median_time: u64,
    #[serde(rename = "verificationprogress")]
    pub verification_progress: f64,
    #[serde(rename = "initialblockdownload", default)]
    pub initial_block_download: Option<bool>,
    /// Total amount of work in the active chain, in hexadecimal.
    #[serde(rename = "chainwork")]
    pub chain_work: String,
    #[serde(default)]
    pub size_on_disk: Option<u64>,
    #[serde(default)]
    pub pruned: bool,
    /// Only present if pruning is enabled.
    #[serde(rename = "pruneheight", default)]
    pub prune_height: Option<u64>,
    #[serde(default)]
    pub automatic_pruning: Option<bool>,
    #[serde(default)]
    pub prune_target_size: Option<u64>,
}

/// The result of `getblock` with full transaction decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String,
    /// The number of confirmations, or -1 if the block is not on the main chain.
    pub confirmations: i64,
    pub size: u64,
    #[serde(rename = "strippedsize", default)]
    pub stripped_size: Option<u64>,
    #[serde(default)]
    pub weight: Option<u64>,
    pub height: u64,
    pub version: i64,
    #[serde(rename = "versionHex", default)]
    pub version_hex: Option<String>,
    #[serde(rename = "merkleroot")]
    pub merkle_root: String,
    pub tx: Vec<RawTransaction>,
    pub time: u64,
    #[serde(rename = "mediantime", default)]
    pub median_time: Option<u64>,
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
    #[serde(rename = "chainwork")]
    pub chain_work: String,
    #[serde(rename = "previousblockhash", default)]
    pub previous_block_hash: Option<String>,
    #[serde(rename = "nextblockhash", default)]
    pub next_block_hash: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    /// Differs from the txid for witness transactions.
    #[serde(default)]
    pub hash: Option<String>,
    pub size: u64,
    #[serde(default)]
    pub vsize: Option<u64>,
    pub version: i64,
    pub locktime: u64,
    pub vin: Vec<TransactionInput>,
    pub vout: Vec<TransactionOutput>,
}

/// A transaction input. Coinbase inputs carry `coinbase` instead of an outpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(rename = "scriptSig", default)]
    pub script_sig: Option<ScriptSig>,
    #[serde(rename = "txinwitness", default)]
    pub witness: Vec<String>,
    pub sequence: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptSig {
    pub asm: String,
    pub hex: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: f64,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptPubKey {
    pub asm: String,
    pub hex: String,
    #[serde(rename = "reqSigs", default)]
    pub required_signatures: Option<u32>,
    /// The node's script type name. This is the node's vocabulary, not a local enum.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// The result of `getblockheader` in verbose mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    /// The number of confirmations, or -1 if the block is not on the main chain.
    pub confirmations: i64,
    pub height: u64,
    pub version: i64,
    #[serde(rename = "versionHex", default)]
    pub version_hex: Option<String>,
    #[serde(rename = "merkleroot")]
    pub merkle_root: String,
    pub time: u64,
    #[serde(rename = "mediantime", default)]
    pub median_time: Option<u64>,
    pub nonce: u64,
    pub bits: String,
    pub difficulty: f64,
    #[serde(rename = "chainwork")]
    pub chain_work: String,
    #[serde(rename = "previousblockhash", default)]
    pub previous_block_hash: Option<String>,
    #[serde(rename = "nextblockhash", default)]
    pub next_block_hash: Option<String>,
}

impl BlockHeader {
    pub fn is_on_chain(&self) -> bool {
        self.confirmations != -1
    }
}

/// One entry of `listunspent`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    #[serde(default)]
    pub address: Option<String>,
    pub amount: f64,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: String,
    #[serde(rename = "redeemScript", default, skip_serializing_if = "Option::is_none")]
    pub redeem_script: Option<String>,
    #[serde(default)]
    pub spendable: bool,
    #[serde(default)]
    pub solvable: bool,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub safe: bool,
    pub confirmations: i64,
}
