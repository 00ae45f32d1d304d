use std::{future::Future, time::Duration};

use axum::http::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    endpoints::{EndpointResolver, join_url},
    logging::category_backend,
};

/// Per-attempt time limits. `connect` and `read` go to the HTTP client; the
/// whole attempt, including waiting for a pooled connection and writing the
/// body, is capped by their sum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeoutBudget {
    pub connect: Duration,
    pub write: Duration,
    pub read: Duration,
    pub pool: Duration,
}

impl TimeoutBudget {
    pub const POST: TimeoutBudget = TimeoutBudget {
        connect: Duration::from_secs(8),
        write: Duration::from_secs(10),
        read: Duration::from_secs(120),
        pool: Duration::from_secs(8),
    };

    pub const GET: TimeoutBudget = TimeoutBudget {
        connect: Duration::from_secs(5),
        write: Duration::from_secs(10),
        read: Duration::from_secs(20),
        pool: Duration::from_secs(5),
    };

    pub fn total(&self) -> Duration {
        self.connect + self.write + self.read + self.pool
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallMethod {
    Get,
    Post,
}

impl CallMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallMethod::Get => "GET",
            CallMethod::Post => "POST",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AttemptRequest<'a> {
    pub method: CallMethod,
    pub url: &'a str,
    pub json_body: Option<&'a [u8]>,
}

/// What happened when one candidate origin was contacted.
#[derive(Clone, Debug, PartialEq)]
pub enum AttemptOutcome {
    Response {
        status: u16,
        content_type: Option<String>,
        body: String,
    },
    /// Refused, DNS failure or otherwise unreachable.
    ConnectFailed(String),
    TimedOut,
    /// Malformed response, protocol error, body read failure.
    Network(String),
}

/// A response from a reachable candidate with status below 500.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl BackendResponse {
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|value| value.to_ascii_lowercase().contains("application/json"))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BackendBody {
    Json(Value),
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum DispatchError {
    /// No candidate origin accepted a connection.
    Unreachable {
        path: String,
        tried: Vec<String>,
        last_error: Option<String>,
    },
    Timeout {
        url: String,
        detail: Option<String>,
    },
    BadGateway {
        status: u16,
        url: String,
    },
    /// GET answered with a non-success status below 500.
    Rejected {
        status: u16,
        url: String,
    },
    Decode {
        url: String,
        detail: String,
    },
}

impl DispatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::Unreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::BadGateway { .. }
            | DispatchError::Rejected { .. }
            | DispatchError::Decode { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Unreachable {
                path,
                tried,
                last_error,
            } => write!(
                f,
                "unable to reach backend API ({path}); tried: {}. last error: {}",
                tried.join(", "),
                last_error.as_deref().unwrap_or("none")
            ),
            DispatchError::Timeout { url, detail: None } => {
                write!(f, "timeout talking to {url}")
            }
            DispatchError::Timeout {
                url,
                detail: Some(detail),
            } => write!(f, "network timeout towards {url}: {detail}"),
            DispatchError::BadGateway { status, url } => {
                write!(f, "backend error {status} from {url}")
            }
            DispatchError::Rejected { status, url } => {
                write!(f, "backend rejected request with {status} at {url}")
            }
            DispatchError::Decode { url, detail } => {
                write!(f, "invalid JSON from {url}: {detail}")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

/// Progress of one call across its candidate origins.
#[derive(Clone, Debug, PartialEq)]
pub enum CallState {
    TryingCandidate(usize),
    Succeeded(BackendResponse),
    FailedTerminal(DispatchError),
    ExhaustedCandidates,
}

impl CallState {
    /// Only a failed connection moves on to the next candidate; every other
    /// outcome ends the call.
    pub fn advance(self, outcome: AttemptOutcome, url: &str, candidate_count: usize) -> CallState {
        let CallState::TryingCandidate(index) = self else {
            return self;
        };

        match outcome {
            AttemptOutcome::ConnectFailed(_) if index + 1 < candidate_count => {
                CallState::TryingCandidate(index + 1)
            }
            AttemptOutcome::ConnectFailed(_) => CallState::ExhaustedCandidates,
            AttemptOutcome::TimedOut => CallState::FailedTerminal(DispatchError::Timeout {
                url: url.to_string(),
                detail: None,
            }),
            AttemptOutcome::Network(detail) => CallState::FailedTerminal(DispatchError::Timeout {
                url: url.to_string(),
                detail: Some(detail),
            }),
            AttemptOutcome::Response { status, .. } if status >= 500 => {
                CallState::FailedTerminal(DispatchError::BadGateway {
                    status,
                    url: url.to_string(),
                })
            }
            AttemptOutcome::Response {
                status,
                content_type,
                body,
            } => CallState::Succeeded(BackendResponse {
                url: url.to_string(),
                status,
                content_type,
                body,
            }),
        }
    }
}

pub trait Transport: Send + Sync {
    fn attempt(
        &self,
        request: AttemptRequest<'_>,
    ) -> impl Future<Output = AttemptOutcome> + Send;
}

/// `reqwest` transport with one client per budget, since connect and read
/// limits are fixed at client construction.
#[derive(Clone)]
pub struct HttpTransport {
    post_client: reqwest::Client,
    post_budget: TimeoutBudget,
    get_client: reqwest::Client,
    get_budget: TimeoutBudget,
}

impl HttpTransport {
    pub fn new() -> reqwest::Result<Self> {
        Self::with_budgets(TimeoutBudget::POST, TimeoutBudget::GET)
    }

    pub fn with_budgets(
        post_budget: TimeoutBudget,
        get_budget: TimeoutBudget,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            post_client: build_client(&post_budget)?,
            post_budget,
            get_client: build_client(&get_budget)?,
            get_budget,
        })
    }
}

/// Redirects are never followed: a 3xx is the candidate's answer, and a
/// command must not be resent to an origin outside the candidate list.
fn build_client(budget: &TimeoutBudget) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(budget.connect)
        .read_timeout(budget.read)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

impl Transport for HttpTransport {
    async fn attempt(&self, request: AttemptRequest<'_>) -> AttemptOutcome {
        let builder = match request.method {
            CallMethod::Get => self
                .get_client
                .get(request.url)
                .timeout(self.get_budget.total()),
            CallMethod::Post => self
                .post_client
                .post(request.url)
                .timeout(self.post_budget.total())
                .header(CONTENT_TYPE, "application/json")
                .body(request.json_body.unwrap_or(b"{}").to_vec()),
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return classify_transport_error(&err),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        match response.text().await {
            Ok(body) => AttemptOutcome::Response {
                status,
                content_type,
                body,
            },
            Err(err) => classify_transport_error(&err),
        }
    }
}

fn classify_transport_error(err: &reqwest::Error) -> AttemptOutcome {
    // a connect timeout is reported as both; it is a timeout, not a refusal
    if err.is_timeout() {
        AttemptOutcome::TimedOut
    } else if err.is_connect() {
        AttemptOutcome::ConnectFailed(error_chain(err))
    } else {
        AttemptOutcome::Network(error_chain(err))
    }
}

/// `err` followed by each of its sources, so the root cause ("connection
/// refused", "dns error") survives into the status text.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// Issues backend calls, walking the resolver's candidates strictly in order.
pub struct Dispatcher<T = HttpTransport> {
    resolver: EndpointResolver,
    transport: T,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(resolver: EndpointResolver, transport: T) -> Self {
        Self {
            resolver,
            transport,
        }
    }

    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// POST `payload` as JSON. JSON responses are parsed, anything else is
    /// returned as text.
    pub async fn post_json<P: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &P,
        request_origin: Option<&str>,
    ) -> Result<BackendBody, DispatchError> {
        let body = serde_json::to_vec(payload).map_err(|err| DispatchError::Decode {
            url: path.to_string(),
            detail: format!("payload could not be encoded: {err}"),
        })?;
        let response = self
            .call(CallMethod::Post, path, Some(&body), request_origin)
            .await?;

        if !response.is_json() {
            return Ok(BackendBody::Text(response.body));
        }
        serde_json::from_str(&response.body)
            .map(BackendBody::Json)
            .map_err(|err| DispatchError::Decode {
                url: response.url,
                detail: err.to_string(),
            })
    }

    /// POST an empty JSON object.
    pub async fn post_empty(
        &self,
        path: &str,
        request_origin: Option<&str>,
    ) -> Result<BackendBody, DispatchError> {
        self.post_json(path, &serde_json::Map::new(), request_origin)
            .await
    }

    pub async fn get_json(
        &self,
        path: &str,
        request_origin: Option<&str>,
    ) -> Result<Value, DispatchError> {
        let response = self
            .call(CallMethod::Get, path, None, request_origin)
            .await?;
        if !(200..300).contains(&response.status) {
            return Err(DispatchError::Rejected {
                status: response.status,
                url: response.url,
            });
        }
        serde_json::from_str(&response.body).map_err(|err| DispatchError::Decode {
            url: response.url,
            detail: err.to_string(),
        })
    }

    async fn call(
        &self,
        method: CallMethod,
        path: &str,
        json_body: Option<&[u8]>,
        request_origin: Option<&str>,
    ) -> Result<BackendResponse, DispatchError> {
        let candidates = self.resolver.candidates(path, request_origin);
        let mut state = CallState::TryingCandidate(0);
        let mut last_error = None;

        while let CallState::TryingCandidate(index) = state {
            let url = join_url(&candidates[index], path);
            debug!(
                "{} {} {} (candidate {}/{})",
                category_backend(),
                method.as_str(),
                url,
                index + 1,
                candidates.len()
            );
            let outcome = self
                .transport
                .attempt(AttemptRequest {
                    method,
                    url: &url,
                    json_body,
                })
                .await;
            if let AttemptOutcome::ConnectFailed(err) = &outcome {
                warn!("{} cannot connect to {url}: {err}", category_backend());
                last_error = Some(err.clone());
            }
            state = state.advance(outcome, &url, candidates.len());
        }

        match state {
            CallState::Succeeded(response) => {
                info!(
                    "{} {} {} -> {}",
                    category_backend(),
                    method.as_str(),
                    response.url,
                    response.status
                );
                Ok(response)
            }
            CallState::FailedTerminal(err) => {
                warn!("{} {} {path} failed: {err}", category_backend(), method.as_str());
                Err(err)
            }
            CallState::ExhaustedCandidates | CallState::TryingCandidate(_) => {
                let err = DispatchError::Unreachable {
                    path: path.to_string(),
                    tried: candidates,
                    last_error,
                };
                warn!("{} {err}", category_backend());
                Err(err)
            }
        }
    }
}
