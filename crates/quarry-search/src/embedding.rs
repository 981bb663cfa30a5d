//! HTTP client for the embedding provider.
//!
//! Speaks the Ollama-style API: `POST {base_url}/api/embeddings` with a JSON
//! body of `{model, prompt}` where `prompt` is a single string or an array,
//! answered by `{"embedding": [..]}` or `{"embeddings": [[..], ..]}`.

use std::time::Duration;

use quarry_core::SemanticConfig;
use serde::Deserialize;
use serde_json::json;

/// Why an embedding call yielded no vectors.
///
/// [`Transport`](EmbedError::Transport) covers the retryable cases — the
/// provider was unreachable, timed out, or answered with a failure status.
/// [`Protocol`](EmbedError::Protocol) covers permanent data errors — the
/// provider answered but the payload was unusable. Callers treat both as
/// "semantic unavailable", but a decode bug never masquerades as network
/// weather.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Connection, timeout, or non-success HTTP status.
    #[error("embedding transport failure: {0}")]
    Transport(String),
    /// Malformed response body or a vector count mismatch.
    #[error("embedding protocol error: {0}")]
    Protocol(String),
}

/// Client for one embedding provider endpoint and model.
///
/// # Examples
///
/// ```
/// use quarry_core::SemanticConfig;
/// use quarry_search::embedding::EmbeddingClient;
///
/// let client = EmbeddingClient::new(&SemanticConfig::default()).unwrap();
/// assert_eq!(client.model(), "nomic-embed-text");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Option<Vec<Vec<f32>>>,
    embedding: Option<Vec<f32>>,
}

impl EmbeddingClient {
    /// Build a client from the semantic configuration.
    ///
    /// The configured timeout bounds every request; a slow provider blocks
    /// the calling query for at most that long and is then treated as a
    /// transport failure. No retries.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &SemanticConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.timeout))
            .build()
            .map_err(|e| EmbedError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed a batch of texts. Returns vectors in input order.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Transport`] on network/timeout/status failure,
    /// [`EmbedError::Protocol`] when the body cannot be decoded or the
    /// vector count does not match the input count.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use quarry_core::SemanticConfig;
    /// use quarry_search::embedding::EmbeddingClient;
    ///
    /// # async fn example() {
    /// let client = EmbeddingClient::new(&SemanticConfig::default()).unwrap();
    /// let vectors = client.embed(&["fn main() {}".to_string()]).await.unwrap();
    /// assert_eq!(vectors.len(), 1);
    /// # }
    /// ```
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request_body(&self.model, texts))
            .send()
            .await
            .map_err(|e| EmbedError::Transport(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(EmbedError::Transport(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Protocol(format!("failed to decode response: {e}")))?;

        vectors_from_response(body, texts.len())
    }

    /// Embed a single query text.
    ///
    /// # Errors
    ///
    /// Same as [`EmbeddingClient::embed`].
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Protocol("empty embedding response".into()))
    }
}

fn request_body(model: &str, texts: &[String]) -> serde_json::Value {
    let prompt = if texts.len() == 1 {
        json!(texts[0])
    } else {
        json!(texts)
    };
    json!({ "model": model, "prompt": prompt })
}

fn vectors_from_response(
    body: EmbedResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let vectors = match (body.embeddings, body.embedding) {
        (Some(vectors), _) => vectors,
        (None, Some(vector)) => vec![vector],
        (None, None) => {
            return Err(EmbedError::Protocol(
                "response carries neither 'embeddings' nor 'embedding'".into(),
            ))
        }
    };
    if vectors.len() != expected {
        return Err(EmbedError::Protocol(format!(
            "requested {expected} vectors, provider returned {}",
            vectors.len()
        )));
    }
    Ok(vectors)
}
