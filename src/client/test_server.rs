//! A stand-in for the document analysis service, used by unit tests.
//!
//! This is a small `axum` app on a random local port. Every request goes to
//! one fallback handler, which records it and asks a test-supplied closure
//! what to send back.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tokio::net::TcpListener;

/// A request received by [`FakeService`].
#[derive(Clone, Debug)]
pub struct FakeRequest {
    pub method: String,
    /// The path and query string.
    pub target: String,
    /// Header names are lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// The URL of the fake service, with a trailing slash.
    pub base_url: String,
}

impl FakeRequest {
    /// Look up a header by its lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A canned response.
pub struct FakeResponse {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: String,
}

impl FakeResponse {
    /// A JSON response.
    pub fn json(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            headers: vec![(
                header::CONTENT_TYPE.as_str().to_owned(),
                "application/json".to_owned(),
            )],
            body: body.to_owned(),
        }
    }

    /// A `202 Accepted` pointing at an operation.
    pub fn accepted(operation_location: &str) -> Self {
        Self {
            status: StatusCode::ACCEPTED,
            headers: vec![(
                "Operation-Location".to_owned(),
                operation_location.to_owned(),
            )],
            body: String::new(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }
}

impl IntoResponse for FakeResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).expect("bad header name");
            let value = HeaderValue::from_str(&value).expect("bad header value");
            response.headers_mut().insert(name, value);
        }
        response
    }
}

type Handler = Arc<dyn Fn(&FakeRequest) -> FakeResponse + Send + Sync>;

#[derive(Clone)]
struct FakeState {
    handler: Handler,
    requests: Arc<Mutex<Vec<FakeRequest>>>,
    base_url: String,
}

/// A fake service listening on a random local port.
pub struct FakeService {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<FakeRequest>>>,
}

impl FakeService {
    /// Start a fake service which answers requests using `handler`.
    pub async fn start<H>(handler: H) -> Self
    where
        H: Fn(&FakeRequest) -> FakeResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            handler: Arc::new(handler),
            requests: requests.clone(),
            base_url: format!("http://{addr}/"),
        };
        let app = Router::new().fallback(record_and_answer).with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    /// A handler which accepts any document, reports "running" once, and
    /// then succeeds with `content`. Neither the submission nor the poll
    /// asks us to wait.
    pub fn succeeding(
        content: &str,
    ) -> impl Fn(&FakeRequest) -> FakeResponse + Send + Sync + 'static {
        Self::succeeding_after(content, None, Some("0"))
    }

    /// Like [`FakeService::succeeding`], but with explicit `Retry-After`
    /// values on the `202` and on the "running" poll. `None` omits the header.
    pub fn succeeding_after(
        content: &str,
        submit_retry_after: Option<&str>,
        poll_retry_after: Option<&str>,
    ) -> impl Fn(&FakeRequest) -> FakeResponse + Send + Sync + 'static {
        let content = content.to_owned();
        let submit_retry_after = submit_retry_after.map(str::to_owned);
        let poll_retry_after = poll_retry_after.map(str::to_owned);
        let polls = AtomicUsize::new(0);
        move |request| {
            if request.method == "POST" {
                let response = FakeResponse::accepted(&format!(
                    "{}documentintelligence/documentModels/prebuilt-layout/analyzeResults/op-1?api-version=2024-11-30",
                    request.base_url
                ));
                match &submit_retry_after {
                    Some(seconds) => response.with_header("Retry-After", seconds),
                    None => response,
                }
            } else if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                let response = FakeResponse::json(StatusCode::OK, r#"{"status":"running"}"#);
                match &poll_retry_after {
                    Some(seconds) => response.with_header("Retry-After", seconds),
                    None => response,
                }
            } else {
                let body = serde_json::json!({
                    "status": "succeeded",
                    "analyzeResult": {
                        "apiVersion": "2024-11-30",
                        "modelId": "prebuilt-layout",
                        "content": content,
                        "pages": [{ "pageNumber": 1 }],
                    },
                });
                FakeResponse::json(StatusCode::OK, &body.to_string())
            }
        }
    }

    /// The endpoint to configure our client with.
    pub fn endpoint(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// All the requests we've received so far.
    pub fn requests(&self) -> Vec<FakeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record_and_answer(
    State(state): State<FakeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = FakeRequest {
        method: method.to_string(),
        target: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| uri.path().to_owned()),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    value.to_str().unwrap_or_default().to_owned(),
                )
            })
            .collect(),
        body: body.to_vec(),
        base_url: state.base_url.clone(),
    };
    let response = (state.handler)(&request);
    state.requests.lock().unwrap().push(request);
    response.into_response()
}
