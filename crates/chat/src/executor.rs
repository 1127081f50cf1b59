use std::sync::Arc;
use std::time::Duration;

use chatline_llm::{ChatRequest, ChatService, ServiceError};
use rand::Rng;

use crate::cancel::CancellationToken;

/// Text shown when the service succeeds without any `data`.
pub const NO_RESPONSE_TEXT: &str = "No response available.";
/// Message used when a rejection carries no `error` field.
pub const UNKNOWN_ERROR_TEXT: &str = "Unknown error";

pub const DEFAULT_MIN_LATENCY: Duration = Duration::from_millis(1_000);
pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_millis(3_000);

/// Artificial wait applied before every outbound call, sampled uniformly from `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyWindow {
    pub min: Duration,
    pub max: Duration,
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LATENCY, DEFAULT_MAX_LATENCY)
    }
}

impl LatencyWindow {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::rng().random_range(self.min..self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network failure, timeout, or an unreadable payload.
    Transport,
    /// The service answered with a non-success status.
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CallFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            message: message.into(),
        }
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Service,
            message: message.into(),
        }
    }

    /// Text rendered in place of the assistant reply.
    pub fn reply_text(&self) -> String {
        format!("Error: {}. Please try again.", self.message)
    }
}

impl From<ServiceError> for CallFailure {
    fn from(error: ServiceError) -> Self {
        if error.is_rejection() {
            return Self::service(error.rejection_message().unwrap_or(UNKNOWN_ERROR_TEXT));
        }
        Self::transport(error.to_string())
    }
}

/// Result of one executor invocation. Exactly one is produced per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success(String),
    Failure(CallFailure),
    Cancelled,
}

impl CallOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Performs single calls against a [`ChatService`], honoring a cancellation token.
///
/// Errors never escape as faults: every service or transport failure becomes a
/// [`CallOutcome::Failure`]. Retrying is left to the caller.
pub struct RequestExecutor {
    service: Arc<dyn ChatService>,
    latency: LatencyWindow,
}

impl RequestExecutor {
    pub fn new(service: Arc<dyn ChatService>, latency: LatencyWindow) -> Self {
        Self { service, latency }
    }

    pub fn service_id(&self) -> &str {
        self.service.id()
    }

    pub async fn execute(&self, prompt: &str, token: &CancellationToken) -> CallOutcome {
        let delay = self.latency.sample();

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(
                    delay_ms = delay.as_millis() as u64,
                    "call cancelled before it was issued"
                );
                return CallOutcome::Cancelled;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let request = ChatRequest::new(prompt);
        // Dropping the service future on cancellation aborts the underlying request.
        let reply = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(
                    service_id = %self.service.id(),
                    "call cancelled while waiting for the service"
                );
                return CallOutcome::Cancelled;
            }
            reply = self.service.send(&request) => reply,
        };

        match reply {
            Ok(reply) => {
                let text = reply
                    .data
                    .filter(|data| !data.is_empty())
                    .unwrap_or_else(|| NO_RESPONSE_TEXT.to_string());
                CallOutcome::Success(text)
            }
            Err(error) => {
                tracing::warn!(
                    service_id = %self.service.id(),
                    error = %error,
                    "chat call failed"
                );
                CallOutcome::Failure(CallFailure::from(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chatline_llm::{BoxFuture, ChatReply, ServiceResult};
    use tokio::sync::Notify;

    use super::*;

    enum Script {
        Reply(ChatReply),
        Reject(Option<&'static str>),
        Hang,
    }

    struct ScriptedService {
        script: Script,
        calls: AtomicUsize,
        gate: Notify,
    }

    impl ScriptedService {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatService for ScriptedService {
        fn id(&self) -> &str {
            "scripted"
        }

        fn send<'a>(
            &'a self,
            _request: &'a ChatRequest,
        ) -> BoxFuture<'a, ServiceResult<ChatReply>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                match &self.script {
                    Script::Reply(reply) => Ok(reply.clone()),
                    Script::Reject(message) => Err(ServiceError::Rejected {
                        stage: "scripted",
                        status: 500,
                        message: message.map(str::to_string),
                    }),
                    Script::Hang => {
                        self.gate.notified().await;
                        Ok(ChatReply::new("too late"))
                    }
                }
            })
        }
    }

    fn executor(service: Arc<ScriptedService>) -> RequestExecutor {
        RequestExecutor::new(service, LatencyWindow::default())
    }

    #[test]
    fn latency_samples_stay_in_window() {
        let window = LatencyWindow::default();
        for _ in 0..200 {
            let delay = window.sample();
            assert!(delay >= DEFAULT_MIN_LATENCY && delay < DEFAULT_MAX_LATENCY);
        }
        assert_eq!(LatencyWindow::none().sample(), Duration::ZERO);
    }

    #[test]
    fn failure_text_uses_error_template() {
        assert_eq!(
            CallFailure::service(UNKNOWN_ERROR_TEXT).reply_text(),
            "Error: Unknown error. Please try again."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn success_carries_reply_data() {
        let service = ScriptedService::new(Script::Reply(ChatReply::new("hi there")));
        let outcome = executor(service.clone())
            .execute("hello", &CancellationToken::new())
            .await;

        assert_eq!(outcome, CallOutcome::Success("hi there".to_string()));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_uses_fallback_text() {
        let service = ScriptedService::new(Script::Reply(ChatReply::new("")));
        let outcome = executor(service)
            .execute("hello", &CancellationToken::new())
            .await;

        assert_eq!(outcome, CallOutcome::Success(NO_RESPONSE_TEXT.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn whitespace_reply_is_kept_verbatim() {
        let service = ScriptedService::new(Script::Reply(ChatReply::new("  \n")));
        let outcome = executor(service)
            .execute("hello", &CancellationToken::new())
            .await;

        assert_eq!(outcome, CallOutcome::Success("  \n".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_without_message_is_unknown_error() {
        let service = ScriptedService::new(Script::Reject(None));
        let outcome = executor(service)
            .execute("x", &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            CallOutcome::Failure(CallFailure::service(UNKNOWN_ERROR_TEXT))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_message_is_forwarded() {
        let service = ScriptedService::new(Script::Reject(Some("quota exceeded")));
        let outcome = executor(service)
            .execute("x", &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            CallOutcome::Failure(CallFailure::service("quota exceeded"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn waits_at_least_the_minimum_latency() {
        let service = ScriptedService::new(Script::Reply(ChatReply::new("ok")));
        let started = tokio::time::Instant::now();

        executor(service)
            .execute("x", &CancellationToken::new())
            .await;

        assert!(started.elapsed() >= DEFAULT_MIN_LATENCY);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_delay_never_calls_service() {
        let service = ScriptedService::new(Script::Reply(ChatReply::new("unused")));
        let token = CancellationToken::new();
        let executor = executor(service.clone());

        let task = tokio::spawn({
            let token = token.clone();
            async move { executor.execute("x", &token).await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.signal();

        let outcome = task.await.expect("executor task should not panic");
        assert_eq!(outcome, CallOutcome::Cancelled);
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_network_wait_aborts_call() {
        let service = ScriptedService::new(Script::Hang);
        let token = CancellationToken::new();
        let executor = executor(service.clone());

        let task = tokio::spawn({
            let token = token.clone();
            async move { executor.execute("x", &token).await }
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(service.calls(), 1);
        token.signal();

        let outcome = task.await.expect("executor task should not panic");
        assert_eq!(outcome, CallOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn already_signaled_token_short_circuits() {
        let service = ScriptedService::new(Script::Reply(ChatReply::new("unused")));
        let token = CancellationToken::new();
        token.signal();

        let outcome = executor(service.clone()).execute("x", &token).await;

        assert!(outcome.is_cancelled());
        assert_eq!(service.calls(), 0);
    }
}
