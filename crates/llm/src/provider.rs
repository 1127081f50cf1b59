use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

pub const DEFAULT_CHAT_ENDPOINT: &str = "http://127.0.0.1:8000/chat";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub backend: String,
    pub endpoint: String,
    pub api_key: String,
    pub model: Option<String>,
    pub request_timeout: Option<Duration>,
}

impl ServiceConfig {
    pub fn new(
        backend: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: Option<String>,
    ) -> Self {
        Self {
            backend: backend.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            model: model
                .map(|model| model.trim().to_string())
                .filter(|model| !model.is_empty()),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Config for the plain `{prompt}` HTTP contract at `endpoint`.
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self::new("http", endpoint, "", None)
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Outbound payload of one call: `{ "prompt": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub prompt: String,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Success payload. `data` stays optional so callers can apply their own fallback text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub data: Option<String>,
}

impl ChatReply {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Error payload returned alongside a non-success status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ServiceError {
    #[snafu(display("missing API key for backend '{backend}'"))]
    MissingApiKey {
        stage: &'static str,
        backend: String,
    },
    #[snafu(display("backend '{backend}' is not supported"))]
    UnsupportedBackend {
        stage: &'static str,
        backend: String,
    },
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("{source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to decode service payload (status {status}): {source}"))]
    DecodePayload {
        stage: &'static str,
        status: u16,
        source: serde_json::Error,
    },
    #[snafu(display(
        "service rejected the request with status {status}: {}",
        message.as_deref().unwrap_or("no error message")
    ))]
    Rejected {
        stage: &'static str,
        status: u16,
        message: Option<String>,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
}

impl ServiceError {
    /// Returns true when the remote service answered with a non-success status.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// The `error` field of a rejection payload, if the service sent one.
    pub fn rejection_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, .. } => message.as_deref().filter(|m| !m.trim().is_empty()),
            _ => None,
        }
    }
}

/// One remote text-generation backend.
///
/// Implementations perform exactly one call per `send` and must stop their IO when the
/// returned future is dropped; the executor relies on that to abort in-flight calls.
pub trait ChatService: Send + Sync {
    fn id(&self) -> &str;
    fn send<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, ServiceResult<ChatReply>>;
}
