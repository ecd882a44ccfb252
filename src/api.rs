use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    session_id: Option<&'a str>,
    use_rerank: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    answer: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// Index statistics shown in the header strip.
#[derive(Debug, Clone, Deserialize)]
pub struct Stats {
    pub documents: u64,
    pub embedding_model: String,
    pub embedding_dimensions: u32,
}

/// HTTP client for the RAG API. Transport failures are retried with a fixed
/// delay; an HTTP error status is never retried.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            retry_delay,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn stats(&self) -> Result<Stats> {
        let url = format!("{}/stats", self.base_url);

        let response = self.send_with_retry(self.client.get(&url)).await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "stats request failed with status: {}",
                response.status()
            ));
        }

        Ok(response.json().await?)
    }

    /// Returns true when the server reports itself healthy. A reachable but
    /// unhealthy server is Ok(false); an unreachable one is an Err.
    pub async fn health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        let response = self.send_with_retry(self.client.get(&url)).await?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let health: HealthResponse = response.json().await?;
        Ok(health.status == "healthy")
    }

    /// Ask a question. `session_id` is None when conversation memory is off,
    /// and the server sees an explicit null.
    pub async fn query(
        &self,
        question: &str,
        session_id: Option<&str>,
        use_rerank: bool,
    ) -> Result<String> {
        let url = format!("{}/query", self.base_url);

        let request = QueryRequest {
            query: question,
            session_id,
            use_rerank,
        };

        let response = self
            .send_with_retry(self.client.post(&url).json(&request))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("request failed")
            ));
        }

        let query_response: QueryResponse = response.json().await?;
        Ok(query_response.answer)
    }

    /// Drop the server-side conversation history for a session.
    pub async fn clear_history(&self, session_id: &str) -> Result<()> {
        let url = format!("{}/history/{}", self.base_url, session_id);

        let response = self.send_with_retry(self.client.delete(&url)).await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "history delete failed with status: {}",
                response.status()
            ));
        }

        Ok(())
    }

    /// Send a request with a bounded retry budget. Only a failed send (no
    /// response received) is retried; any received response is returned as-is
    /// and status handling is the caller's job. With `max_retries` = 3 this
    /// makes at most 4 attempts, sleeping `retry_delay` between them.
    async fn send_with_retry(&self, request: RequestBuilder) -> Result<Response> {
        let mut attempts_left = self.max_retries;
        loop {
            let attempt = request
                .try_clone()
                .ok_or_else(|| anyhow!("request body is not cloneable"))?;

            match attempt.send().await {
                Ok(response) => return Ok(response),
                Err(err) if attempts_left > 0 => {
                    tracing::warn!(
                        "request failed ({}), retrying ({}/{})",
                        err,
                        self.max_retries - attempts_left + 1,
                        self.max_retries
                    );
                    attempts_left -= 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_serializes_null_session() {
        let request = QueryRequest {
            query: "What is MongoDB?",
            session_id: None,
            use_rerank: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["query"], "What is MongoDB?");
        assert!(json["session_id"].is_null());
        assert_eq!(json["use_rerank"], true);
    }

    #[test]
    fn query_request_serializes_session_id() {
        let request = QueryRequest {
            query: "follow-up",
            session_id: Some("tui-user-abc"),
            use_rerank: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["session_id"], "tui-user-abc");
        assert_eq!(json["use_rerank"], false);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/", 0, Duration::from_millis(1));
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
