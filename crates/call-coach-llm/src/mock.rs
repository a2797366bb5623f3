//! Scripted mock backend
//!
//! Test double for the generation service: queued replies, configurable
//! per-reply latency, failure injection, and a live-concurrency gauge so
//! tests can assert scheduling invariants.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{GenerateRequest, GenerateResponse, LanguageModel, LlmError};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Respond with this text after the default delay
    Text(String),
    /// Respond with this text after a specific delay
    Delayed(String, Duration),
    /// Fail with a service error
    Fail(String),
}

/// Scripted language model for tests
pub struct MockLanguageModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    default_delay: Duration,
    fallback: Mutex<Option<String>>,
    requests: Mutex<Vec<GenerateRequest>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLanguageModel {
    /// Create a mock with no scripted replies; calls fall through to the
    /// fallback text (or a service error if none is set).
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_delay: Duration::from_millis(0),
            fallback: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Set the delay applied to `Text` and fallback replies
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Set a fallback reply used when the script runs out
    pub fn with_fallback(self, text: impl Into<String>) -> Self {
        *self.fallback.lock() = Some(text.into());
        self
    }

    /// Queue a scripted reply
    pub fn push(&self, reply: ScriptedReply) {
        self.replies.lock().push_back(reply);
    }

    /// Queue a plain text reply
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(ScriptedReply::Text(text.into()));
    }

    /// Queue a service failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(ScriptedReply::Fail(message.into()));
    }

    /// Total calls made
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent calls observed
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlightGuard<'a>(&'a MockLanguageModel);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        self.requests.lock().push(request);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(self);

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(ScriptedReply::Text(text)) => {
                tokio::time::sleep(self.default_delay).await;
                Ok(GenerateResponse::new(text))
            }
            Some(ScriptedReply::Delayed(text, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(GenerateResponse::new(text))
            }
            Some(ScriptedReply::Fail(message)) => {
                tokio::time::sleep(self.default_delay).await;
                Err(LlmError::Service(message))
            }
            None => {
                tokio::time::sleep(self.default_delay).await;
                match self.fallback.lock().clone() {
                    Some(text) => Ok(GenerateResponse::new(text)),
                    None => Err(LlmError::Service("mock script exhausted".to_string())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let mock = MockLanguageModel::new();
        mock.push_text("first");
        mock.push_failure("boom");

        let first = mock.generate(GenerateRequest::default()).await.unwrap();
        assert_eq!(first.text, "first");

        let second = mock.generate(GenerateRequest::default()).await;
        assert!(matches!(second, Err(LlmError::Service(_))));

        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fallback_when_script_exhausted() {
        let mock = MockLanguageModel::new().with_fallback("NO_SUGGESTION");
        let response = mock.generate(GenerateRequest::default()).await.unwrap();
        assert_eq!(response.text, "NO_SUGGESTION");
    }

    #[tokio::test]
    async fn test_concurrency_gauge() {
        use std::sync::Arc;

        let mock = Arc::new(
            MockLanguageModel::new().with_default_delay(Duration::from_millis(20)),
        );
        mock.push_text("a");
        mock.push_text("b");

        let m1 = mock.clone();
        let m2 = mock.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { m1.generate(GenerateRequest::default()).await }),
            tokio::spawn(async move { m2.generate(GenerateRequest::default()).await }),
        );
        r1.unwrap().unwrap();
        r2.unwrap().unwrap();

        assert_eq!(mock.max_concurrent_calls(), 2);
    }
}
