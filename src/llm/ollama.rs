use crate::llm::client::{CompletionConstraints, LLMClient};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
};

const DEFAULT_OLLAMA_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let (host, port) = split_base_url(&base_url);
        let client = Ollama::new(host, port);

        Ok(Self { client, model })
    }
}

/// Split `http://host:port` into the scheme-qualified host and port that
/// `Ollama::new` expects.
fn split_base_url(base_url: &str) -> (String, u16) {
    let url_parts: Vec<&str> = base_url.split("://").collect();
    if url_parts.len() != 2 {
        return ("http://localhost".to_string(), DEFAULT_OLLAMA_PORT);
    }

    let scheme = url_parts[0];
    let host_port: Vec<&str> = url_parts[1].trim_end_matches('/').split(':').collect();
    let port = host_port
        .get(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);

    (format!("{}://{}", scheme, host_port[0]), port)
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn complete(&self, prompt: &str, constraints: &CompletionConstraints) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &constraints.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt.to_string()));

        let request = ChatMessageRequest::new(self.model.clone(), messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::CompletionUnavailable(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_base_url() {
        assert_eq!(
            split_base_url("http://localhost:11434"),
            ("http://localhost".to_string(), 11434)
        );
        assert_eq!(
            split_base_url("https://gpu-box:8080/"),
            ("https://gpu-box".to_string(), 8080)
        );
        assert_eq!(
            split_base_url("http://ollama"),
            ("http://ollama".to_string(), DEFAULT_OLLAMA_PORT)
        );
        assert_eq!(
            split_base_url("garbage"),
            ("http://localhost".to_string(), DEFAULT_OLLAMA_PORT)
        );
    }
}
