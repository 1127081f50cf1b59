use snafu::ResultExt;

use super::provider::{
    BoxFuture, BuildClientSnafu, ChatErrorBody, ChatReply, ChatRequest, ChatService,
    DEFAULT_CHAT_ENDPOINT, DecodePayloadSnafu, RejectedSnafu, ServiceConfig, ServiceResult,
    TransportSnafu,
};

pub const HTTP_BACKEND_ID: &str = "http";

/// Client for the plain `{prompt}` -> `{data}` / `{error}` chat contract.
pub struct HttpChatService {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpChatService {
    pub fn new(config: &ServiceConfig) -> ServiceResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context(BuildClientSnafu {
            stage: "build-http-client",
        })?;

        let endpoint = if config.endpoint.is_empty() {
            DEFAULT_CHAT_ENDPOINT.to_string()
        } else {
            config.endpoint.clone()
        };

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_prompt(&self, request: &ChatRequest) -> ServiceResult<ChatReply> {
        let response = self
            .client
            .post(self.endpoint.as_str())
            .json(request)
            .send()
            .await
            .context(TransportSnafu {
                stage: "send-chat-request",
            })?;

        let status = response.status();
        let body = response.bytes().await.context(TransportSnafu {
            stage: "read-chat-response",
        })?;

        if status.is_success() {
            return serde_json::from_slice::<ChatReply>(&body).context(DecodePayloadSnafu {
                stage: "decode-chat-reply",
                status: status.as_u16(),
            });
        }

        // Gateways tend to answer failures with HTML; treat an unreadable body as "no message".
        let error_body = serde_json::from_slice::<ChatErrorBody>(&body).unwrap_or_else(|error| {
            tracing::debug!(
                status = status.as_u16(),
                error = %error,
                "error response body is not a JSON error payload"
            );
            ChatErrorBody::default()
        });

        RejectedSnafu {
            stage: "chat-http-status",
            status: status.as_u16(),
            message: error_body.error,
        }
        .fail()
    }
}

impl ChatService for HttpChatService {
    fn id(&self) -> &str {
        HTTP_BACKEND_ID
    }

    fn send<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, ServiceResult<ChatReply>> {
        Box::pin(self.post_prompt(request))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::ServiceError;

    async fn service_for(server: &MockServer) -> HttpChatService {
        let config = ServiceConfig::http(format!("{}/chat", server.uri()));
        HttpChatService::new(&config).expect("client should build")
    }

    #[tokio::test]
    async fn posts_prompt_and_decodes_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(serde_json::json!({ "prompt": "hello" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": "hi there" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server).await;
        let reply = service
            .send(&ChatRequest::new("hello"))
            .await
            .expect("call should succeed");

        assert_eq!(reply, ChatReply::new("hi there"));
    }

    #[tokio::test]
    async fn success_without_data_field_is_an_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let service = service_for(&server).await;
        let reply = service
            .send(&ChatRequest::new("x"))
            .await
            .expect("call should succeed");

        assert_eq!(reply.data, None);
    }

    #[tokio::test]
    async fn non_success_status_carries_error_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({ "error": "model overloaded" })),
            )
            .mount(&server)
            .await;

        let service = service_for(&server).await;
        let error = service
            .send(&ChatRequest::new("x"))
            .await
            .expect_err("call should be rejected");

        assert!(error.is_rejection());
        assert_eq!(error.rejection_message(), Some("model overloaded"));
    }

    #[tokio::test]
    async fn non_json_error_body_is_rejection_without_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let service = service_for(&server).await;
        let error = service
            .send(&ChatRequest::new("x"))
            .await
            .expect_err("call should be rejected");

        match error {
            ServiceError::Rejected {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let service = service_for(&server).await;
        let error = service
            .send(&ChatRequest::new("x"))
            .await
            .expect_err("decode should fail");

        assert!(matches!(
            error,
            ServiceError::DecodePayload { status: 200, .. }
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let config = ServiceConfig::http("http://127.0.0.1:9/chat");
        let service = HttpChatService::new(&config).expect("client should build");

        let error = service
            .send(&ChatRequest::new("x"))
            .await
            .expect_err("connection should fail");

        assert!(matches!(error, ServiceError::Transport { .. }));
    }

    #[test]
    fn blank_endpoint_uses_the_default() {
        let service =
            HttpChatService::new(&ServiceConfig::http("  ")).expect("client should build");

        assert_eq!(service.endpoint(), DEFAULT_CHAT_ENDPOINT);
    }
}
