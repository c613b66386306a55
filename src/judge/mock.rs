use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::{ModelBackend, ModelRequest};
use super::error::BackendError;

type Responder = Box<dyn Fn(&ModelRequest) -> Result<String, BackendError> + Send + Sync>;

/// Scriptable model backend for tests.
///
/// Queued replies are served first; once the queue is empty every call goes to the
/// responder function.
pub struct MockModelBackend {
    model: String,
    queued: Mutex<VecDeque<Result<String, BackendError>>>,
    responder: Responder,
    requests: Mutex<Vec<ModelRequest>>,
    calls: AtomicU32,
}

impl MockModelBackend {
    /// Always replies with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::from_fn(move |_| Ok(reply.clone()))
    }

    /// Replies computed from each request.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&ModelRequest) -> Result<String, BackendError> + Send + Sync + 'static,
    {
        Self {
            model: "mock-model".to_string(),
            queued: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Serves `replies` in order, then fails as unavailable.
    pub fn scripted(replies: Vec<Result<String, BackendError>>) -> Self {
        let backend = Self::from_fn(|_| {
            Err(BackendError::Unavailable {
                model: "mock-model".to_string(),
                reason: "script exhausted".to_string(),
            })
        });
        backend.queued.lock().extend(replies);
        backend
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ModelBackend for MockModelBackend {
    async fn complete(&self, request: &ModelRequest) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let queued = self.queued.lock().pop_front();
        match queued {
            Some(reply) => reply,
            None => (self.responder)(request),
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
