//! HTTP agent runtime.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{AgentReply, AgentRequest, AgentRuntime};
use crate::config::HttpRuntimeConfig;
use crate::errors::RuntimeError;

/// Runs stage agents hosted behind an HTTP service.
///
/// Each call is `POST {base_url}/stages/{stage_id}/run` with the
/// [`AgentRequest`] as JSON body. The service answers `{"output": ...}`
/// where `output` is either an object or text containing one.
#[derive(Debug, Clone)]
pub struct HttpAgentRuntime {
    client: reqwest::Client,
    config: HttpRuntimeConfig,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    output: Value,
}

impl HttpAgentRuntime {
    /// Creates a runtime from its configuration.
    pub fn new(config: HttpRuntimeConfig) -> Result<Self, RuntimeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RuntimeError::Other(format!("could not build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, stage_id: &str) -> String {
        format!(
            "{}/stages/{}/run",
            self.config.base_url.trim_end_matches('/'),
            stage_id
        )
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn call(&self, request: AgentRequest) -> Result<AgentReply, RuntimeError> {
        let url = self.endpoint(&request.stage_id);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "Agent service returned an error");
            return Err(RuntimeError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;
        parse_body(&body)
    }
}

fn parse_body(body: &str) -> Result<AgentReply, RuntimeError> {
    let body: RunResponse = serde_json::from_str(body)
        .map_err(|e| RuntimeError::Malformed(format!("invalid response body: {e}")))?;

    Ok(match body.output {
        Value::String(text) => AgentReply::Text(text),
        other => AgentReply::Json(other),
    })
}
