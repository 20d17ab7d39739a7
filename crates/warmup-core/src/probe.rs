use std::time::Duration;

use crate::error::Result;

/// Result of a single health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The service answered with a non-error status.
    Ready { status: u16 },
    /// The service answered, but with a 4xx/5xx status.
    ErrorStatus { status: u16 },
    /// No HTTP response: refused, reset, timed out.
    Unreachable { reason: String },
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready { .. })
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Ready { status } => write!(f, "ready (HTTP {status})"),
            ProbeOutcome::ErrorStatus { status } => write!(f, "HTTP {status}"),
            ProbeOutcome::Unreachable { reason } => write!(f, "unreachable: {reason}"),
        }
    }
}

/// A lightweight readiness check against the service.
pub trait Probe {
    fn target(&self) -> &str;
    fn probe(&mut self) -> ProbeOutcome;
}

/// `GET <url>` over a blocking HTTP client.
pub struct HttpProbe {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl Probe for HttpProbe {
    fn target(&self) -> &str {
        &self.url
    }

    fn probe(&mut self) -> ProbeOutcome {
        match self.client.get(&self.url).send() {
            Ok(resp) => {
                let status = resp.status();
                if status.is_client_error() || status.is_server_error() {
                    ProbeOutcome::ErrorStatus {
                        status: status.as_u16(),
                    }
                } else {
                    ProbeOutcome::Ready {
                        status: status.as_u16(),
                    }
                }
            }
            Err(e) => ProbeOutcome::Unreachable {
                reason: e.to_string(),
            },
        }
    }
}
