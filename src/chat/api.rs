use std::env;
use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;

pub const ENDPOINT_ENV: &str = "KAIWA_ENDPOINT";
pub const API_KEY_ENV: &str = "KAIWA_API_KEY";

/// Connection coordinates for the chat-completions API.
#[derive(Debug, Clone)]
pub struct ApiTarget {
    pub endpoint: String,
    api_key: String,
}

impl ApiTarget {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Reads endpoint and key from the environment. Both are required; there
    /// is no default.
    pub fn from_env() -> Result<Self, ChatError> {
        Ok(Self {
            endpoint: require_env(ENDPOINT_ENV)?,
            api_key: require_env(API_KEY_ENV)?,
        })
    }

    /// Full chat-completions URL. The endpoint may name the service root or
    /// already include the path.
    pub fn completions_url(&self) -> String {
        if self.endpoint.ends_with("/chat/completions") {
            self.endpoint.clone()
        } else {
            format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
        }
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }
}

fn require_env(key: &'static str) -> Result<String, ChatError> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ChatError::MissingConfig { key })
}

#[derive(Debug)]
pub enum ChatError {
    MissingConfig { key: &'static str },
    Request(reqwest::Error),
    Api { status: StatusCode, body: String },
    Stream(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConfig { key } => {
                write!(f, "{key} is not set in the environment")
            }
            Self::Request(source) => write!(f, "chat request failed: {source}"),
            Self::Api { status, body } => write!(f, "chat API error {status}: {body}"),
            Self::Stream(message) => write!(f, "chat stream failed: {message}"),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(source) => Some(source),
            _ => None,
        }
    }
}

/// Builds the authenticated POST for a chat-completion call. Callers add
/// path-specific headers and send it themselves; there is no retry.
pub(crate) fn chat_post<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    target: &ApiTarget,
    payload: &T,
    timeout_secs: Option<u64>,
) -> reqwest::RequestBuilder {
    let mut request = client
        .post(target.completions_url())
        .bearer_auth(target.api_key())
        .json(payload);
    if let Some(timeout_secs) = timeout_secs {
        request = request.timeout(Duration::from_secs(timeout_secs));
    }
    request
}

/// Maps a non-success status to [`ChatError::Api`], consuming the body as
/// the error text.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ChatError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Api { status, body })
}

#[cfg(test)]
mod tests {
    use super::ApiTarget;

    #[test]
    fn completions_url_appends_path_to_service_root() {
        let target = ApiTarget::new("https://models.example.com", "k");
        assert_eq!(
            target.completions_url(),
            "https://models.example.com/chat/completions"
        );

        let trailing = ApiTarget::new("https://models.example.com/", "k");
        assert_eq!(
            trailing.completions_url(),
            "https://models.example.com/chat/completions"
        );
    }

    #[test]
    fn completions_url_keeps_a_full_path_untouched() {
        let target = ApiTarget::new("https://models.example.com/v1/chat/completions", "k");
        assert_eq!(
            target.completions_url(),
            "https://models.example.com/v1/chat/completions"
        );
    }
}
