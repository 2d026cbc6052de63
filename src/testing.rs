//! In-memory [`Transport`] for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value as JsonValue;

use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};

pub(crate) type Reply = Result<ApiResponse, TransportError>;

type Responder = Box<dyn Fn(&ApiRequest) -> Reply + Send + Sync>;

/// Records every request and answers through a responder closure.
#[derive(Clone)]
pub(crate) struct MockApi {
    inner: Arc<MockInner>,
}

struct MockInner {
    responder: Responder,
    requests: Mutex<Vec<ApiRequest>>,
    delays: HashMap<String, Duration>,
}

impl MockApi {
    pub(crate) fn new(responder: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self::build(Box::new(responder), HashMap::new())
    }

    /// Answers requests with `replies` in order; panics when they run out.
    pub(crate) fn scripted(replies: Vec<Reply>) -> Self {
        let queue = Mutex::new(VecDeque::from(replies));
        Self::new(move |request| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request: {} {}", request.method, request.path))
        })
    }

    /// Delays every response for `path`.
    pub(crate) fn with_delay(self, path: &str, delay: Duration) -> Self {
        let inner = Arc::into_inner(self.inner).expect("configure delays before cloning");
        let mut delays = inner.delays;
        delays.insert(path.to_owned(), delay);
        Self::build(inner.responder, delays)
    }

    fn build(responder: Responder, delays: HashMap<String, Duration>) -> Self {
        Self {
            inner: Arc::new(MockInner {
                responder,
                requests: Mutex::new(Vec::new()),
                delays,
            }),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

impl Transport for MockApi {
    async fn send(&self, request: ApiRequest) -> Reply {
        tokio::task::yield_now().await;
        if let Some(delay) = self.inner.delays.get(&request.path) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.requests.lock().unwrap().push(request.clone());
        (self.inner.responder)(&request)
    }
}

pub(crate) fn reply(status: u16, body: JsonValue) -> Reply {
    Ok(ApiResponse::new(
        StatusCode::from_u16(status).unwrap(),
        body.to_string(),
    ))
}

pub(crate) fn empty(status: u16) -> Reply {
    Ok(ApiResponse::new(StatusCode::from_u16(status).unwrap(), ""))
}

pub(crate) fn unreachable() -> Reply {
    Err(TransportError("connection refused".into()))
}
