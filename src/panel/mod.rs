pub mod dialect;
pub mod inbound;
pub mod record;

use std::time::Duration;

use reqwest::{Method, StatusCode, header::COOKIE};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::session::Session;

pub use dialect::Candidate;
pub use inbound::Inbound;
pub use record::ClientRecord;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

/// HTTP client used for every panel call.
///
/// Redirects are not followed: login answers `302` on some panel builds and the session
/// cookie is only on that response.
pub fn build_http_client(verify_tls: bool) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("xpanel/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::none())
        .danger_accept_invalid_certs(!verify_tls)
        .build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetInbound,
    AddClient,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetInbound => "get_inbound",
            Self::AddClient => "add_client",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    Transport(String),
    Status(u16),
    InvalidJson(String),
    UnexpectedShape(String),
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(reason) => write!(f, "transport error: {reason}"),
            Self::Status(status) => write!(f, "status {status}"),
            Self::InvalidJson(reason) => write!(f, "invalid json: {reason}"),
            Self::UnexpectedShape(reason) => write!(f, "unexpected response: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub dialect: &'static str,
    pub method: Method,
    pub path: String,
    pub failure: AttemptFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    Exhausted {
        operation: Operation,
        attempts: Vec<Attempt>,
    },
}

impl NegotiationError {
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Self::Exhausted { attempts, .. } => attempts,
        }
    }
}

impl std::fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted {
                operation,
                attempts,
            } => {
                let summary = match operation {
                    Operation::GetInbound => "cannot fetch inbound on any known endpoint",
                    Operation::AddClient => "add client failed on all known endpoints",
                };
                write!(f, "{summary}")?;
                for a in attempts {
                    write!(f, "\n  {} {}: {}", a.method, a.path, a.failure)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for NegotiationError {}

/// Panel API client that hides which API generation is deployed.
#[derive(Debug, Clone)]
pub struct PanelClient {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl PanelClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn get_inbound(
        &self,
        session: &Session,
        inbound_id: u64,
    ) -> Result<Inbound, NegotiationError> {
        let candidates = dialect::inbound_candidates(inbound_id);
        let raw = self
            .negotiate(Operation::GetInbound, session, &candidates, |body| {
                dialect::extract_inbound(body, inbound_id)
            })
            .await?;
        Ok(Inbound::from_value(&raw))
    }

    /// Creates the client entry and returns the panel's parsed response body.
    pub async fn add_client(
        &self,
        session: &Session,
        record: &ClientRecord,
    ) -> Result<Value, NegotiationError> {
        let candidates = dialect::add_client_candidates(record);
        self.negotiate(Operation::AddClient, session, &candidates, |body| {
            if dialect::add_client_accepted(&body) {
                Ok(body)
            } else {
                Err(format!(
                    "success={}",
                    body.get("success").map(Value::to_string).unwrap_or_default()
                ))
            }
        })
        .await
    }

    async fn negotiate<T, F>(
        &self,
        operation: Operation,
        session: &Session,
        candidates: &[Candidate],
        accept: F,
    ) -> Result<T, NegotiationError>
    where
        F: Fn(Value) -> Result<T, String>,
    {
        let mut attempts = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let failure = match self.send(session, candidate).await {
                Ok(body) => match accept(body) {
                    Ok(out) => {
                        info!(
                            operation = operation.as_str(),
                            dialect = candidate.dialect,
                            method = %candidate.method,
                            path = %candidate.path,
                            "panel request accepted"
                        );
                        return Ok(out);
                    }
                    Err(reason) => AttemptFailure::UnexpectedShape(reason),
                },
                Err(failure) => failure,
            };
            debug!(
                operation = operation.as_str(),
                dialect = candidate.dialect,
                method = %candidate.method,
                path = %candidate.path,
                %failure,
                "panel candidate failed"
            );
            attempts.push(Attempt {
                dialect: candidate.dialect,
                method: candidate.method.clone(),
                path: candidate.path.clone(),
                failure,
            });
        }

        warn!(
            operation = operation.as_str(),
            base_url = %session.base_url(),
            attempts = attempts.len(),
            "panel negotiation exhausted"
        );
        Err(NegotiationError::Exhausted {
            operation,
            attempts,
        })
    }

    async fn send(&self, session: &Session, candidate: &Candidate) -> Result<Value, AttemptFailure> {
        let mut req = self
            .client
            .request(candidate.method.clone(), session.url(&candidate.path))
            .timeout(self.request_timeout);
        if let Some(cookie) = session.cookies().header_value() {
            req = req.header(COOKIE, cookie);
        }
        if let Some(body) = &candidate.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;
        if resp.status() != StatusCode::OK {
            return Err(AttemptFailure::Status(resp.status().as_u16()));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AttemptFailure::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| AttemptFailure::InvalidJson(e.to_string()))
    }
}
