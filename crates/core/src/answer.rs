use crate::endpoint::join_segments;
use crate::error::GenerationError;
use crate::models::ScoredPoint;
use crate::traits::CompletionModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama-3.3-70b-versatile";

const INSTRUCTION: &str =
    "You are a helpful AI assistant. Use the following context to answer the question. ";

pub fn build_prompt<S: AsRef<str>>(query: &str, context: &[S]) -> String {
    let context = context
        .iter()
        .map(|text| text.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    format!("{INSTRUCTION}\nContext: {context}\nQuestion: {query}")
}

pub async fn answer_from_hits(
    model: &dyn CompletionModel,
    query: &str,
    hits: &[ScoredPoint],
) -> Result<String, GenerationError> {
    let context = hits.iter().map(|hit| hit.content.as_str()).collect::<Vec<_>>();
    let prompt = build_prompt(query, &context);
    debug!(hits = hits.len(), prompt_chars = prompt.len(), "requesting completion");

    model.complete(&prompt).await.inspect_err(|err| {
        error!(error = %err, "completion failed");
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct ChatCompletionClient {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(client: Client, base_url: Url, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionModel for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = join_segments(&self.base_url, &["chat", "completions"])?;
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            stream: false,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Backend {
                status: status.as_u16(),
                details: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionModel for RecordingModel {
        async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            Ok("  the answer, verbatim ".to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl CompletionModel for FailingModel {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::EmptyResponse)
        }
    }

    fn hit(content: &str) -> ScoredPoint {
        ScoredPoint {
            id: Uuid::new_v4(),
            score: 0.5,
            content: content.to_string(),
        }
    }

    #[test]
    fn prompt_embeds_context_then_query() {
        let prompt = build_prompt("What colour is the sky?", &["The sky is blue.", "Birds fly."]);
        assert_eq!(
            prompt,
            "You are a helpful AI assistant. Use the following context to answer the question. \n\
             Context: The sky is blue.\nBirds fly.\nQuestion: What colour is the sky?"
        );
    }

    #[test]
    fn empty_context_is_still_a_prompt() {
        let context: [&str; 0] = [];
        let prompt = build_prompt("Anything?", &context);
        assert!(prompt.ends_with("Context: \nQuestion: Anything?"));
    }

    #[tokio::test]
    async fn completion_is_returned_verbatim_in_hit_order() -> Result<(), GenerationError> {
        let model = RecordingModel::default();
        let answer = answer_from_hits(&model, "q", &[hit("second best"), hit("best")]).await?;

        assert_eq!(answer, "  the answer, verbatim ");
        let prompts = model.prompts.lock().map(|p| p.clone()).unwrap_or_default();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Context: second best\nbest\n"));
        Ok(())
    }

    #[tokio::test]
    async fn completion_failure_is_a_generation_error() {
        let result = answer_from_hits(&FailingModel, "q", &[]).await;
        assert!(matches!(result, Err(GenerationError::EmptyResponse)));
    }
}
