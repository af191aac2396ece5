//! Stateless relay endpoint: one multipart user turn in, one finalized
//! completion out. The handler performs exactly one non-streaming model
//! call per request and keeps no conversation state.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Serialize;
use tracing::{error, info};

use crate::chat::api::{ApiTarget, ChatError};
use crate::chat::client::complete;
use crate::chat::composer::{ImageAttachment, compose_user_content};
use crate::chat::message::{Message, Role};
use crate::chat::request::{ChatRequest, GenerationParams};

/// Shared per-process relay state.
pub struct RelayState {
    pub target: ApiTarget,
    pub client: reqwest::Client,
}

pub fn app(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/github-models", post(handle_relay))
        .with_state(state)
}

/// Response wire format of the original endpoint: PascalCase field names.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RelayResponse {
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub message: String,
}

#[derive(Debug)]
pub enum RelayError {
    Validation(String),
    Upstream(ChatError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            RelayError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            RelayError::Upstream(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

async fn handle_relay(
    State(state): State<Arc<RelayState>>,
    mut multipart: Multipart,
) -> Result<Json<RelayResponse>, RelayError> {
    let mut model = None;
    let mut system_message = None;
    let mut user_message: Option<String> = None;
    let mut image: Option<ImageAttachment> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| RelayError::Validation(format!("Invalid multipart body: {err}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "Model" => model = Some(read_text(field).await?),
            "SystemMessage" => system_message = Some(read_text(field).await?),
            "UserMessage" => user_message = Some(read_text(field).await?),
            "Image" => {
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    RelayError::Validation(format!("Unreadable Image field: {err}"))
                })?;
                image = Some(ImageAttachment::with_declared_mime(bytes.to_vec(), mime));
            }
            // Unknown fields are ignored, as the original binder did.
            _ => {}
        }
    }

    let model = model
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| RelayError::Validation("Model is required.".to_string()))?;
    let system_message = system_message
        .ok_or_else(|| RelayError::Validation("SystemMessage is required.".to_string()))?;
    let user_message = user_message.filter(|value| !value.is_empty());

    if user_message.is_none() && image.is_none() {
        return Err(RelayError::Validation(
            "Provide UserMessage or Image.".to_string(),
        ));
    }

    let content = compose_user_content(user_message.as_deref(), image.as_ref());
    let user = Message::new(Role::User, content);
    let params = GenerationParams::new(model.clone());
    let request = ChatRequest::single_turn(&system_message, user, &params, false);

    let completion = complete(&state.client, &state.target, &request, None)
        .await
        .map_err(|err| {
            error!("upstream completion failed: {err}");
            RelayError::Upstream(err)
        })?;

    info!(model = %model, "relay completion ok");
    Ok(Json(RelayResponse {
        model: completion.model.unwrap_or(model),
        prompt_tokens: completion
            .usage
            .and_then(|usage| usage.prompt_tokens)
            .unwrap_or(0),
        completion_tokens: completion
            .usage
            .and_then(|usage| usage.completion_tokens)
            .unwrap_or(0),
        message: completion.content,
    }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, RelayError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|err| RelayError::Validation(format!("Unreadable {name} field: {err}")))
}
