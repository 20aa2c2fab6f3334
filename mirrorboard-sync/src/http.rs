//! `HttpDirectory`: a [`RemoteDirectory`] that treats each identity as a URL.
//!
//! Expected response body:
//!
//! ```json
//! { "instances": [ { "instanceId": "api", "text": "🟡 api" } ] }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use mirrorboard_core::{FetchError, Identity, InstanceRecord, RemoteDirectory};

#[derive(Debug, Deserialize)]
struct InstancesPayload {
    instances: Vec<InstanceRecord>,
}

#[derive(Clone)]
pub struct HttpDirectory {
    agent: ureq::Agent,
}

impl HttpDirectory {
    /// Build a directory whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("mirrorboard/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

#[async_trait]
impl RemoteDirectory for HttpDirectory {
    async fn fetch_instances(&self, identity: &Identity) -> Result<Vec<InstanceRecord>, FetchError> {
        let agent = self.agent.clone();
        let url = identity.0.clone();
        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url))
            .await
            .map_err(|err| FetchError::Transport(format!("fetch task join error: {err}")))?
    }
}

fn fetch_blocking(agent: &ureq::Agent, url: &str) -> Result<Vec<InstanceRecord>, FetchError> {
    match agent.get(url).set("Accept", "application/json").call() {
        Ok(response) => {
            let body = response
                .into_string()
                .map_err(|err| FetchError::Malformed(err.to_string()))?;
            decode_instances(&body)
        }
        Err(ureq::Error::Status(code, response)) => Err(FetchError::Status {
            code,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(transport)) => Err(FetchError::Transport(transport.to_string())),
    }
}

/// Decode a `{"instances": [...]}` body.
pub fn decode_instances(body: &str) -> Result<Vec<InstanceRecord>, FetchError> {
    serde_json::from_str::<InstancesPayload>(body)
        .map(|payload| payload.instances)
        .map_err(|err| FetchError::Malformed(err.to_string()))
}
