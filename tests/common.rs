#![allow(dead_code)]
//! Shared setup for the integration tests: an in-memory store and a
//! scripted completion service.

use async_trait::async_trait;
use fitcoach_lib::api::{CompletionRequest, CompletionService};
use fitcoach_lib::chat::GenerationSettings;
use fitcoach_lib::error::ServiceError;
use fitcoach_lib::state::AppState;
use fitcoach_lib::storage::StorageManager;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const FALLBACK_REPLY: &str = "Keep it up! 💪";

/// Initialize quiet logging for tests; RUST_LOG turns it up.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Replays queued replies in order and records every request it receives.
/// Once the queue is empty it answers with [`FALLBACK_REPLY`].
#[derive(Default)]
pub struct StubCompletion {
    replies: Mutex<VecDeque<Result<String, ServiceError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StubCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn fail(&self, err: ServiceError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for StubCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FALLBACK_REPLY.to_string()))
    }
}

pub async fn create_test_storage() -> StorageManager {
    init_test_logging();
    StorageManager::in_memory().await.expect("in-memory database")
}

/// Application state over a fresh in-memory database and `stub`.
pub async fn create_test_state(stub: &Arc<StubCompletion>) -> AppState {
    let storage = create_test_storage().await;
    let completion: Arc<dyn CompletionService> = stub.clone();
    AppState::new(storage, completion, GenerationSettings::default())
}
