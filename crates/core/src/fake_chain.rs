//! An in-process stand-in for a regtest node's wallet RPC interface.

use std::sync::{Arc, Mutex};

use dogetest_rpc::{RpcConfiguration, RpcTransport};
use mockito::{Server, ServerGuard};
use serde_json::{Value, json};

#[derive(Debug, Default)]
pub struct ChainState {
    pub height: u64,
    pub addresses: u32,
    pub transactions: u32,
    pub unspents: Vec<(String, Value)>,
    /// Every method called, in order.
    pub calls: Vec<String>,
    /// Fails the n-th call (1-based) of the named method.
    pub fail_on: Option<(String, usize)>,
    /// Methods answered with an empty string.
    pub empty: Vec<String>,
}

pub struct FakeChain {
    server: ServerGuard,
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn new() -> Self {
        let mut server = Server::new();
        let state = Arc::new(Mutex::new(ChainState::default()));
        let handler_state = state.clone();
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |request| {
                let body: Value = serde_json::from_slice(request.body().unwrap()).unwrap();
                let mut state = handler_state.lock().unwrap();
                let response = state.handle(&body);
                serde_json::to_vec(&response).unwrap()
            })
            .create();
        Self { server, state }
    }

    pub fn failing_on(self, method: &str, occurrence: usize) -> Self {
        self.state.lock().unwrap().fail_on = Some((method.to_string(), occurrence));
        self
    }

    pub fn returning_empty(self, method: &str) -> Self {
        self.state.lock().unwrap().empty.push(method.to_string());
        self
    }

    pub fn transport(&self) -> RpcTransport {
        let address = self.server.socket_address();
        RpcTransport::new(
            RpcConfiguration::for_endpoint(&address.ip().to_string(), address.port())
                .with_credentials("test", "test"),
        )
        .unwrap()
    }

    pub fn socket_address(&self) -> std::net::SocketAddr {
        self.server.socket_address()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn height(&self) -> u64 {
        self.state.lock().unwrap().height
    }
}

impl ChainState {
    fn handle(&mut self, body: &Value) -> Value {
        let id = body["id"].clone();
        let method = body["method"].as_str().unwrap_or_default().to_string();
        let params = body["params"].as_array().cloned().unwrap_or_default();
        self.calls.push(method.clone());

        if let Some((failing, occurrence)) = self.fail_on.as_ref() {
            let seen = self.calls.iter().filter(|call| *call == failing).count();
            if *failing == method && seen == *occurrence {
                return json!({
                    "id": id,
                    "result": null,
                    "error": {"code": -4, "message": format!("{method} failed")}
                });
            }
        }

        if self.empty.contains(&method) {
            return json!({"id": id, "result": "", "error": null});
        }

        let result = match method.as_str() {
            "getinfo" => json!({"version": 1140900, "blocks": self.height}),
            "generate" => {
                let count = params[0].as_u64().unwrap();
                let hashes = (0..count)
                    .map(|_| {
                        self.height += 1;
                        format!("{:064x}", self.height)
                    })
                    .collect::<Vec<_>>();
                for (_, unspent) in self.unspents.iter_mut() {
                    let confirmations = unspent["confirmations"].as_i64().unwrap();
                    unspent["confirmations"] = json!(confirmations + count as i64);
                }
                json!(hashes)
            }
            "getnewaddress" => {
                self.addresses += 1;
                json!(format!("nFakeAddress{}", self.addresses))
            }
            "dumpprivkey" => json!(format!("cPriv{}", params[0].as_str().unwrap())),
            "sendtoaddress" => {
                self.transactions += 1;
                let address = params[0].as_str().unwrap().to_string();
                let txid = format!("{:064x}", 0xf000 + self.transactions);
                self.unspents.push((
                    address.clone(),
                    json!({
                        "txid": txid,
                        "vout": 0,
                        "address": address,
                        "amount": params[1].as_f64().unwrap(),
                        "scriptPubKey": "76a914",
                        "spendable": true,
                        "solvable": true,
                        "safe": true,
                        "confirmations": 0
                    }),
                ));
                json!(txid)
            }
            "listunspent" => {
                let wanted = params[2][0].as_str().unwrap();
                let unspents = self
                    .unspents
                    .iter()
                    .filter(|(address, _)| address == wanted)
                    .map(|(_, unspent)| unspent.clone())
                    .collect::<Vec<_>>();
                json!(unspents)
            }
            _ => {
                return json!({
                    "id": id,
                    "result": null,
                    "error": {"code": -32601, "message": "Method not found"}
                });
            }
        };
        json!({"id": id, "result": result, "error": null})
    }
}
