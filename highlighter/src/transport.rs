use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::TransportError;

/// Raw outcome of an HTTP exchange. Any status, success or not, is a
/// response; only a failed exchange is a `TransportError`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One JSON POST. Implementations own timeouts and connection handling.
pub trait Transport: Send + Sync {
    fn post(&self, url: &str, token: Option<&str>, body: &str)
    -> Result<TransportResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn post(
        &self,
        url: &str,
        token: Option<&str>,
        body: &str,
    ) -> Result<TransportResponse, TransportError> {
        (**self).post(url, token, body)
    }
}

/// Blocking HTTP transport backed by a ureq agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        UreqTransport {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Transport for UreqTransport {
    fn post(
        &self,
        url: &str,
        token: Option<&str>,
        body: &str,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self
            .agent
            .post(url)
            .set("Accept", "application/json")
            .set("Content-Type", "application/json");
        if let Some(token) = token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        match request.send_string(body) {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .map_err(|e| TransportError::new(format!("cannot read response body: {e}")))?;
                Ok(TransportResponse { status, body })
            }
            // ureq reports 4xx/5xx as errors; to us they are still responses.
            Err(ureq::Error::Status(status, response)) => Ok(TransportResponse {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(err)) => Err(TransportError::new(err.to_string())),
        }
    }
}

/// What a `ReplayTransport` answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond { status: u16, body: String },
    Fail(String),
}

/// A request captured by `ReplayTransport`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub url: String,
    pub token: Option<String>,
    pub body: String,
}

impl SentRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Offline transport: answers every request with the same scripted reply
/// and records what was sent. Used by fixture runs and tests.
pub struct ReplayTransport {
    reply: Reply,
    sent: Mutex<Vec<SentRequest>>,
}

impl ReplayTransport {
    pub fn new(reply: Reply) -> Self {
        ReplayTransport {
            reply,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// 200 with `body` serialized as JSON.
    pub fn json(body: serde_json::Value) -> Self {
        Self::respond(200, body.to_string())
    }

    pub fn respond(status: u16, body: impl Into<String>) -> Self {
        Self::new(Reply::Respond {
            status,
            body: body.into(),
        })
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(Reply::Fail(message.into()))
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Transport for ReplayTransport {
    fn post(
        &self,
        url: &str,
        token: Option<&str>,
        body: &str,
    ) -> Result<TransportResponse, TransportError> {
        self.sent.lock().push(SentRequest {
            url: url.to_string(),
            token: token.map(str::to_string),
            body: body.to_string(),
        });
        match &self.reply {
            Reply::Respond { status, body } => Ok(TransportResponse {
                status: *status,
                body: body.clone(),
            }),
            Reply::Fail(message) => Err(TransportError::new(message.clone())),
        }
    }
}
