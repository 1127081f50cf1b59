use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};

use super::provider::{
    BoxFuture, ChatReply, ChatRequest, ChatService, CompletionsFailedSnafu, HttpClientSnafu,
    MissingApiKeySnafu, ServiceConfig, ServiceError, ServiceResult,
};

pub const RIG_OPENAI_BACKEND_ID: &str = "openai";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible backend driven through Rig.
///
/// The completion is streamed upstream but handed back as a single reply, so callers
/// see the same request/response contract as [`crate::HttpChatService`].
pub struct RigChatService {
    config: ServiceConfig,
    model_id: String,
}

impl RigChatService {
    pub fn new(config: ServiceConfig) -> ServiceResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                backend: config.backend.clone(),
            }
        );

        let model_id = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

        Ok(Self { config, model_id })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn build_client(config: &ServiceConfig) -> ServiceResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    async fn complete(&self, request: &ChatRequest) -> ServiceResult<ChatReply> {
        let client = Self::build_client(&self.config)?;
        let model = client.completion_model(self.model_id.clone());

        let mut stream = model
            .completion_request(RigMessage::user(request.prompt.clone()))
            .stream()
            .await
            .context(CompletionsFailedSnafu {
                stage: "open-stream",
            })?;

        let mut text = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamedAssistantContent::Text(chunk)) => text.push_str(&chunk.text),
                // Reasoning and tool traffic never reach the transcript.
                Ok(_) => {}
                Err(source) => {
                    tracing::warn!(
                        model_id = %self.model_id,
                        error = %source,
                        "provider stream emitted an error chunk"
                    );
                    return Err(ServiceError::CompletionsFailed {
                        stage: "stream-chunk",
                        source,
                    });
                }
            }
        }

        if text.is_empty() {
            return Ok(ChatReply::empty());
        }
        Ok(ChatReply::new(text))
    }
}

impl ChatService for RigChatService {
    fn id(&self) -> &str {
        RIG_OPENAI_BACKEND_ID
    }

    fn send<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, ServiceResult<ChatReply>> {
        Box::pin(self.complete(request))
    }
}
