//! External collaborators: HTTP fetch, LLM completion and scenario fetch.
//!
//! The engine talks to the outside world through these traits so node
//! execution stays testable; the default implementations ride on `reqwest`.

use std::{collections::HashMap, pin::Pin, time::Duration};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tokio_stream::Stream;

use crate::{FlowError, Result, common::Slots, model::ScenarioDefinition};

/// Separator between the slot JSON and the conversational text in an LLM
/// response.
const LLM_SLOT_SEPARATOR: &str = "|||";

/// HTTP collaborator used by api nodes.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Perform one request and return the parsed JSON response body.
    /// Non-2xx statuses, timeouts and connection errors are all
    /// `FlowError::ExternalCall`.
    async fn fetch(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value>;
}

/// Production HTTP collaborator on a shared `reqwest` client.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let method: reqwest::Method = method.parse().map_err(|_| FlowError::ExternalCall(format!("invalid http method '{}'", method)))?;

        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let name: HeaderName = key.parse().map_err(|_| FlowError::ExternalCall(format!("invalid header name '{}'", key)))?;
            let value: HeaderValue = value.parse().map_err(|_| FlowError::ExternalCall(format!("invalid header value for '{}'", key)))?;
            header_map.insert(name, value);
        }

        let mut request = self.client.request(method, url).headers(header_map).query(query).timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| FlowError::ExternalCall(format!("request to {} failed: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FlowError::ExternalCall(format!("HTTP {} from {}", status.as_u16(), url)));
        }

        let text = response.text().await.map_err(|e| FlowError::ExternalCall(format!("failed to read response from {}: {}", url, e)))?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| FlowError::ExternalCall(format!("non-JSON response from {}: {}", url, e)))
    }
}

/// Parsed final result of an LLM call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmReply {
    pub response_text: String,
    pub extracted_slots: Slots,
}

/// Incremental text chunks of a streamed completion.
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An LLM call either resolves at once or delivers text incrementally; the
/// executor consumes both.
pub enum LlmResponse {
    Complete(LlmReply),
    Stream(LlmStream),
}

/// LLM collaborator used by llm nodes.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
    ) -> Result<LlmResponse>;
}

/// Parse the `{"slots":{...}}|||response text` convention the LLM is
/// prompted to produce. Text without the separator (or with a malformed slot
/// part) is taken wholesale as the response.
pub fn parse_llm_output(raw: &str) -> LlmReply {
    if let Some((head, tail)) = raw.split_once(LLM_SLOT_SEPARATOR)
        && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(head.trim())
        && let Some(Value::Object(slots)) = map.get("slots")
    {
        return LlmReply {
            response_text: tail.trim().to_string(),
            extracted_slots: Slots::from(slots.clone()),
        };
    }

    LlmReply {
        response_text: raw.trim().to_string(),
        extracted_slots: Slots::new(),
    }
}

/// LLM collaborator over a JSON chat endpoint (`POST {question}` → `{text}`).
pub struct HttpLlmClient {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
}

impl HttpLlmClient {
    pub fn new(
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(
        &self,
        prompt: &str,
    ) -> Result<LlmResponse> {
        let body = serde_json::json!({ "question": prompt, "streaming": false });
        let response = self
            .client
            .post(&self.api_url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FlowError::ExternalCall(format!("llm request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlowError::ExternalCall(format!("llm endpoint returned HTTP {}", status.as_u16())));
        }

        let text = response.text().await.map_err(|e| FlowError::ExternalCall(format!("failed to read llm response: {}", e)))?;
        // Endpoints answer either with a JSON envelope or with plain text.
        let raw = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map
                .get("text")
                .or_else(|| map.get("response"))
                .or_else(|| map.get("answer"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(text),
            Ok(Value::String(s)) => s,
            _ => text,
        };

        Ok(LlmResponse::Complete(parse_llm_output(&raw)))
    }
}

/// Placeholder collaborator used when no LLM endpoint is configured; llm
/// nodes then fail through their `onError` edge.
pub struct UnconfiguredLlm;

#[async_trait]
impl LlmClient for UnconfiguredLlm {
    async fn complete(
        &self,
        _prompt: &str,
    ) -> Result<LlmResponse> {
        Err(FlowError::ExternalCall("no llm endpoint configured".to_string()))
    }
}

/// Read-only scenario definition fetch.
#[async_trait]
pub trait ScenarioProvider: Send + Sync {
    async fn scenario(
        &self,
        id: &str,
    ) -> Result<ScenarioDefinition>;
}

/// Scenario fetch against a builder service (`GET {base}/scenarios/{id}`).
pub struct HttpScenarioProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpScenarioProvider {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ScenarioProvider for HttpScenarioProvider {
    async fn scenario(
        &self,
        id: &str,
    ) -> Result<ScenarioDefinition> {
        let url = format!("{}/scenarios/{}", self.base_url.trim_end_matches('/'), id);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FlowError::ExternalCall(format!("scenario fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlowError::ExternalCall(format!("scenario fetch returned HTTP {} for '{}'", status.as_u16(), id)));
        }

        let text = response.text().await.map_err(|e| FlowError::ExternalCall(format!("failed to read scenario '{}': {}", id, e)))?;
        ScenarioDefinition::from_json(&text)
    }
}

/// Scenario provider over a fixed set of definitions, for tests and
/// embedded catalogs.
#[derive(Default)]
pub struct StaticScenarios {
    definitions: HashMap<String, ScenarioDefinition>,
}

impl StaticScenarios {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        definition: ScenarioDefinition,
    ) -> Self {
        self.definitions.insert(definition.id.clone(), definition);
        self
    }
}

#[async_trait]
impl ScenarioProvider for StaticScenarios {
    async fn scenario(
        &self,
        id: &str,
    ) -> Result<ScenarioDefinition> {
        self.definitions.get(id).cloned().ok_or(FlowError::Definition(format!("scenario '{}' not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_llm_output_with_slots() {
        let reply = parse_llm_output(r#"{"slots":{"destination":"Jeju Island","date":"November 5th"}}|||Sure, Jeju it is!"#);
        assert_eq!(reply.response_text, "Sure, Jeju it is!");
        assert_eq!(reply.extracted_slots.get("destination"), Some(&json!("Jeju Island")));
        assert_eq!(reply.extracted_slots.get("date"), Some(&json!("November 5th")));
    }

    #[test]
    fn test_parse_llm_output_empty_slots() {
        let reply = parse_llm_output(r#"{"slots":{}}|||Hello there."#);
        assert_eq!(reply.response_text, "Hello there.");
        assert!(reply.extracted_slots.is_empty());
    }

    #[test]
    fn test_parse_llm_output_without_separator() {
        let reply = parse_llm_output("Just a plain answer.");
        assert_eq!(reply.response_text, "Just a plain answer.");
        assert!(reply.extracted_slots.is_empty());
    }

    #[test]
    fn test_parse_llm_output_malformed_head() {
        let reply = parse_llm_output("not json|||tail");
        assert_eq!(reply.response_text, "not json|||tail");
        assert!(reply.extracted_slots.is_empty());
    }

    #[tokio::test]
    async fn test_static_scenarios() {
        let provider = StaticScenarios::new().with(ScenarioDefinition {
            id: "faq".to_string(),
            nodes: vec![crate::model::NodeModel {
                id: "start".to_string(),
                node_type: "message".to_string(),
                data: json!({"content": "hi"}),
            }],
            ..Default::default()
        });

        assert_eq!(provider.scenario("faq").await.unwrap().id, "faq");
        assert!(matches!(provider.scenario("missing").await, Err(FlowError::Definition(_))));
    }
}
