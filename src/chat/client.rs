use serde::Deserialize;

use crate::chat::api::{ApiTarget, ChatError, chat_post, ensure_success};
use crate::chat::request::ChatRequest;

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

/// Token accounting echoed by the API.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

/// Finalized non-streaming completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub model: Option<String>,
    pub usage: Option<Usage>,
}

/// Performs exactly one non-streaming completion call.
///
/// Success yields the completion text, an empty string when the field is
/// absent. A non-success status surfaces as [`ChatError::Api`] carrying the
/// server body.
pub async fn complete(
    client: &reqwest::Client,
    target: &ApiTarget,
    request: &ChatRequest,
    timeout_secs: Option<u64>,
) -> Result<Completion, ChatError> {
    let response = chat_post(client, target, request, timeout_secs)
        .send()
        .await
        .map_err(ChatError::Request)?;
    let response = ensure_success(response).await?;

    let body: ChatCompletionResponse = response.json().await.map_err(ChatError::Request)?;
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    let usage = body.usage.map(|usage| Usage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
    });

    Ok(Completion {
        content,
        model: body.model,
        usage,
    })
}
