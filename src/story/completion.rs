use crate::config::CompletionConfig;
use crate::error::{StoryError, StoryResult};
use std::io::{BufRead, BufReader};
use tracing::debug;

/// One role-tagged message in a chat completion request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Seam for the remote text-completion service.
///
/// Implementations return the full completion text; streaming is an
/// internal concern of the HTTP client, which accumulates tokens as they
/// arrive. Failures here are absorbed by the prompt generator's fallback
/// policy, never surfaced to the pipeline.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> StoryResult<String>;
}

/// OpenAI-compatible chat-completion client over a streamed response.
///
/// Sends `stream: true` and concatenates the `delta.content` of every SSE
/// `data:` chunk until `[DONE]` or EOF. Reads `COMPLETION_API_KEY` for an
/// optional bearer token.
pub struct HttpCompletionClient {
    config: CompletionConfig,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> Self {
        let api_key = std::env::var("COMPLETION_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
        Self { config, api_key }
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, messages: &[ChatMessage]) -> StoryResult<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "top_k": self.config.top_k,
            "repetition_penalty": self.config.repetition_penalty,
            "stop": [self.config.stop],
            "stream": true,
        });

        let mut request = ureq::post(&url).header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", &format!("Bearer {key}"));
        }

        let response = request
            .send(body.to_string().as_bytes())
            .map_err(|e| StoryError::Completion(format!("Completion request failed: {e}")))?;

        let reader = BufReader::new(response.into_body().into_reader());
        let text = collect_stream(reader)?;

        if text.trim().is_empty() {
            return Err(StoryError::Completion("Empty response from model".into()));
        }
        debug!("Completion stream yielded {} chars", text.len());
        Ok(text)
    }
}

/// Accumulate the text content of an SSE chat-completion stream.
///
/// Lines look like `data: {json}`; the stream ends with `data: [DONE]` or
/// EOF. Unparseable chunks are skipped rather than failing the whole stream.
fn collect_stream<R: BufRead>(reader: R) -> StoryResult<String> {
    let mut text = String::new();
    for line in reader.lines() {
        let line =
            line.map_err(|e| StoryError::Completion(format!("Stream read failed: {e}")))?;
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            break;
        }
        if let Some(token) = extract_delta(data) {
            text.push_str(&token);
        }
    }
    Ok(text)
}

/// Pull `choices[0].delta.content` out of one stream chunk.
fn extract_delta(data: &str) -> Option<String> {
    let chunk: serde_json::Value = serde_json::from_str(data).ok()?;
    chunk
        .get("choices")?
        .as_array()?
        .first()?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_collect_stream_concatenates_tokens() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"A fox \"}}]}\n\
                   data: {\"choices\":[{\"delta\":{\"content\":\"runs.\"}}]}\n\
                   data: [DONE]\n";
        let text = collect_stream(Cursor::new(sse)).unwrap();
        assert_eq!(text, "A fox runs.");
    }

    #[test]
    fn test_collect_stream_skips_non_data_lines() {
        let sse = ": keepalive\n\
                   \n\
                   data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\
                   data: [DONE]\n";
        let text = collect_stream(Cursor::new(sse)).unwrap();
        assert_eq!(text, "hi");
    }

    #[test]
    fn test_collect_stream_skips_malformed_chunks() {
        let sse = "data: not json\n\
                   data: {\"choices\":[]}\n\
                   data: {\"choices\":[{\"delta\":{}}]}\n\
                   data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n";
        let text = collect_stream(Cursor::new(sse)).unwrap();
        assert_eq!(text, "ok");
    }

    #[test]
    fn test_collect_stream_ends_at_eof_without_done() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n";
        let text = collect_stream(Cursor::new(sse)).unwrap();
        assert_eq!(text, "partial");
    }

    #[test]
    fn test_extract_delta_missing_content() {
        assert!(extract_delta("{\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}").is_none());
        assert!(extract_delta("{}").is_none());
    }
}
