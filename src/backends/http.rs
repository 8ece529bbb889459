//! JSON-over-HTTP clients for the structured engine and passage index
//!
//! Wire format:
//! - `POST {base}/query` `{"question": ...}` returns a `StructuredOutcome`
//!   (`{"status": "rows", "columns": [...], "rows": [...]}` or
//!   `{"status": "no_answer", "reason": ...}`)
//! - `POST {base}/search` `{"query": ..., "k": n}` returns
//!   `{"results": [{"text": ..., "source": ..., "score": ...}]}`

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backends::{PassageIndex, StructuredEngine, StructuredOutcome};
use crate::errors::{PipelineError, Result};
use crate::types::Passage;

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(PipelineError::Http)
}

async fn post_json<Req, Resp>(
    client: &Client,
    url: &str,
    provider: &str,
    body: &Req,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: for<'de> Deserialize<'de>,
{
    let response = client.post(url).json(body).send().await.map_err(|e| {
        if e.is_timeout() || e.is_connect() {
            PipelineError::Connection(format!("{}: {}", provider, e))
        } else {
            PipelineError::Http(e)
        }
    })?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(PipelineError::RateLimited {
            provider: provider.to_string(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    if !status.is_success() {
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = format!("HTTP {}: {}", status.as_u16(), text);
        return Err(match provider {
            "structured" => PipelineError::StructuredEngine(message),
            _ => PipelineError::PassageIndex(message),
        });
    }

    response.json::<Resp>().await.map_err(|e| {
        PipelineError::Parse(format!("{} returned an unreadable body: {}", provider, e))
    })
}

/// Structured engine reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpStructuredEngine {
    client: Client,
    base_url: String,
}

impl HttpStructuredEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
}

#[async_trait]
impl StructuredEngine for HttpStructuredEngine {
    async fn run(&self, question: &str) -> Result<StructuredOutcome> {
        let url = format!("{}/query", self.base_url);
        post_json(&self.client, &url, "structured", &QueryRequest { question }).await
    }
}

/// Passage index reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpPassageIndex {
    client: Client,
    base_url: String,
}

impl HttpPassageIndex {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    text: String,
    source: String,
    score: f32,
}

#[async_trait]
impl PassageIndex for HttpPassageIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let url = format!("{}/search", self.base_url);
        let response: SearchResponse =
            post_json(&self.client, &url, "index", &SearchRequest { query, k }).await?;

        Ok(response
            .results
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(position, hit)| {
                let mut passage = Passage::new(hit.text, hit.source, hit.score);
                passage.position = position;
                passage
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_outcome_wire_format() {
        let rows: StructuredOutcome = serde_json::from_str(
            r#"{"status":"rows","columns":["player","points"],"rows":[{"player":"A","points":10}]}"#,
        )
        .unwrap();
        match rows {
            StructuredOutcome::Rows(set) => {
                assert_eq!(set.len(), 1);
                assert_eq!(set.columns, vec!["player", "points"]);
            }
            other => panic!("unexpected {:?}", other),
        }

        let none: StructuredOutcome =
            serde_json::from_str(r#"{"status":"no_answer","reason":"no table for that"}"#).unwrap();
        assert_eq!(
            none,
            StructuredOutcome::NoAnswer {
                reason: "no table for that".to_string()
            }
        );
    }

    #[test]
    fn test_search_response_parsing() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"results":[{"text":"great passer","source":"thread-9","score":0.81}]}"#,
        )
        .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].source, "thread-9");
    }

    #[test]
    fn test_clients_normalize_base_url() {
        let engine = HttpStructuredEngine::new("http://stats:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(engine.base_url, "http://stats:8080");
        let index = HttpPassageIndex::new("http://index:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(index.base_url, "http://index:9000");
    }
}
