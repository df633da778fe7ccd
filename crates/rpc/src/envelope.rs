use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The request envelope as it goes over the wire.
#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub method: &'a str,
    pub params: &'a [Value],
    pub id: u64,
}

/// The response envelope as it comes back over the wire.
///
/// Nodes send `null` for whichever of `result` and `error` does not apply, which serde maps to
/// [`None`].
#[derive(Debug, Deserialize)]
pub(crate) struct Response {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Response {
    /// Collapses the envelope into a tagged outcome. An error always wins over a result so that the
    /// two are never observed together. Returns [`None`] for an envelope that carries neither.
    pub fn into_outcome(self) -> Option<Outcome> {
        match (self.error, self.result) {
            (Some(error), _) => Some(Outcome::Failure(RemoteError::from_value(error))),
            (None, Some(result)) => Some(Outcome::Success(result)),
            (None, None) => None,
        }
    }
}

/// What the node answered for one call.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The raw result, not yet decoded into a domain type.
    Success(Value),
    /// A structured error reported by the node.
    Failure(RemoteError),
}

/// An error reported by the remote node, kept as close to verbatim as possible.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteError {
    code: Option<i64>,
    message: String,
    raw: Value,
}

impl RemoteError {
    pub fn from_value(raw: Value) -> Self {
        let code = raw.get("code").and_then(Value::as_i64);
        let message = match raw.get("message").and_then(Value::as_str) {
            Some(message) => message.to_owned(),
            None => raw.to_string(),
        };
        Self { code, message, raw }
    }

    pub fn code(&self) -> Option<i64> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error value exactly as the node sent it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
