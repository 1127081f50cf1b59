//! Remote text-generation backends consumed by the chat lifecycle.

use std::sync::Arc;

mod http_adapter;
mod provider;
mod rig_adapter;

pub use http_adapter::{HTTP_BACKEND_ID, HttpChatService};
pub use provider::{
    BoxFuture, ChatErrorBody, ChatReply, ChatRequest, ChatService, DEFAULT_CHAT_ENDPOINT,
    DEFAULT_REQUEST_TIMEOUT, ServiceConfig, ServiceError, ServiceResult,
};
pub use rig_adapter::{DEFAULT_OPENAI_MODEL, RIG_OPENAI_BACKEND_ID, RigChatService};

pub fn create_service(mut config: ServiceConfig) -> ServiceResult<Arc<dyn ChatService>> {
    if config.backend.trim().is_empty() {
        config.backend = HTTP_BACKEND_ID.to_string();
    }

    match config.backend.as_str() {
        "http" => Ok(Arc::new(HttpChatService::new(&config)?)),
        "openai" | "rig-openai" => {
            config.backend = RIG_OPENAI_BACKEND_ID.to_string();
            Ok(Arc::new(RigChatService::new(config)?))
        }
        _ => Err(ServiceError::UnsupportedBackend {
            stage: "create-service",
            backend: config.backend,
        }),
    }
}
