//! Scripted in-memory backend for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::lock;
use crate::notify::{NoticeLevel, Notifier};
use crate::transport::{ApiRequest, Method, RemoteSync, TransportError};

type Handler = Box<dyn Fn(&ApiRequest) -> Result<Value, TransportError> + Send + Sync>;
type Delay = Box<dyn Fn(&ApiRequest) -> Option<Duration> + Send + Sync>;

/// [`RemoteSync`] that answers from a closure and records every call.
///
/// An optional delay closure holds chosen answers back (on the tokio clock)
/// to reproduce out-of-order completions.
pub(crate) struct MockRemote {
    handler: Handler,
    delay: Option<Delay>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockRemote {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> Result<Value, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(
        mut self,
        delay: impl Fn(&ApiRequest) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

#[async_trait]
impl RemoteSync for MockRemote {
    async fn call(&self, request: ApiRequest) -> Result<Value, TransportError> {
        lock(&self.calls).push(request.clone());
        if let Some(delay) = self.delay.as_ref().and_then(|d| d(&request)) {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&request)
    }
}

/// [`Notifier`] that keeps every notice.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        lock(&self.notices).clone()
    }

    pub fn last(&self) -> Option<(NoticeLevel, String)> {
        lock(&self.notices).last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        lock(&self.notices).push((level, message.to_string()));
    }
}
