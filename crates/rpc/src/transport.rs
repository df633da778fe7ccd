use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    Error, Outcome, ProtocolViolation, RemoteError, TransportFailure,
    envelope::{Request, Response},
};

/// Where and how to reach the node's RPC interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcConfiguration {
    pub url: String,
    pub user: Option<String>,
    pub password: String,
    pub request_timeout: Option<Duration>,
}

impl RpcConfiguration {
    pub fn for_endpoint(host: &str, port: u16) -> Self {
        Self {
            url: format!("http://{host}:{port}"),
            user: None,
            password: String::new(),
            request_timeout: None,
        }
    }

    /// Sets the basic authentication credentials. An empty user disables authentication.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        let user = user.into();
        self.user = (!user.is_empty()).then_some(user);
        self.password = password.into();
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }
}

/// A JSON-RPC client bound to a single node.
///
/// The transport can be shared between threads (for example behind an [`Arc`]); the request id
/// counter is the only mutable state and it is atomic, so concurrent calls never share an id.
///
/// [`Arc`]: std::sync::Arc
#[derive(Debug)]
pub struct RpcTransport {
    client: Client,
    configuration: RpcConfiguration,
    last_id: AtomicU64,
}

impl RpcTransport {
    pub fn new(configuration: RpcConfiguration) -> Result<Self, Error> {
        let mut builder = Client::builder();
        if let Some(request_timeout) = configuration.request_timeout {
            builder = builder.timeout(request_timeout);
        }
        let client = builder.build().map_err(Error::Client)?;

        Ok(Self {
            client,
            configuration,
            last_id: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &str {
        &self.configuration.url
    }

    fn next_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Performs one call and returns the raw result payload.
    ///
    /// The response body is always read to the end so the pooled connection can be reused, no
    /// matter which way the call fails.
    pub fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, Error> {
        self.round_trip(method, params, None).map(|(_, result)| result)
    }

    /// Like [`RpcTransport::call`], but the whole round trip is bounded by `timeout` instead of
    /// the configured request timeout.
    pub fn call_within(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value, Error> {
        self.round_trip(method, params, Some(timeout)).map(|(_, result)| result)
    }

    /// Performs one call and decodes the result into `T`.
    pub fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, Error> {
        let (id, result) = self.round_trip(method, params, None)?;
        T::deserialize(&result).map_err(|source| Error::Decode {
            method: method.to_owned(),
            id,
            source,
            raw: result.to_string(),
        })
    }

    #[instrument(level = "debug", skip(self, params), err(level = "debug"))]
    fn round_trip(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<(u64, Value), Error> {
        let id = self.next_id();
        debug!(id, "Sending json-rpc request");

        let request = Request {
            method,
            params: &params,
            id,
        };
        let mut builder = self.client.post(&self.configuration.url).json(&request);
        if let Some(user) = self.configuration.user.as_ref() {
            builder = builder.basic_auth(user, Some(&self.configuration.password));
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let transport_error = |source| Error::Transport {
            method: method.to_owned(),
            id,
            source,
        };
        let response = builder
            .send()
            .map_err(|error| transport_error(TransportFailure::Request(error)))?;
        let status = response.status();
        let body = response
            .bytes()
            .map_err(|error| transport_error(TransportFailure::Body(error)))?;
        debug!(%status, length = body.len(), "Received json-rpc response");

        let envelope = serde_json::from_slice::<Response>(&body);

        if !status.is_success() {
            // Bitcoin-family nodes send their structured errors with an error status. Surface
            // those as node errors instead of losing the code and message.
            if let Ok(Response {
                id: Some(response_id),
                error: Some(error),
                ..
            }) = envelope
            {
                if response_id == id {
                    return Err(Error::Rpc {
                        method: method.to_owned(),
                        id,
                        error: RemoteError::from_value(error),
                    });
                }
            }
            return Err(transport_error(TransportFailure::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }));
        }

        let protocol_error = |reason| Error::Protocol {
            method: method.to_owned(),
            id,
            reason,
        };
        let envelope = envelope.map_err(|error| {
            protocol_error(ProtocolViolation::MalformedEnvelope {
                reason: error.to_string(),
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        })?;
        if envelope.id != Some(id) {
            return Err(protocol_error(ProtocolViolation::MismatchedId {
                expected: id,
                received: envelope.id,
            }));
        }

        match envelope.into_outcome() {
            Some(Outcome::Success(result)) => Ok((id, result)),
            Some(Outcome::Failure(error)) => Err(Error::Rpc {
                method: method.to_owned(),
                id,
                error,
            }),
            None => Err(protocol_error(ProtocolViolation::EmptyResponse)),
        }
    }
}
