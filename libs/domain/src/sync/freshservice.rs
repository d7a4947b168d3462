//! Freshservice helpdesk client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::error::ServiceError;

/// Helpdesk call failure
#[derive(Debug, Clone, Error)]
pub enum HelpdeskError {
    #[error("Helpdesk unreachable: {0}")]
    Unreachable(String),

    #[error("Helpdesk rejected the call with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected helpdesk response: {0}")]
    Malformed(String),
}

impl HelpdeskError {
    /// Transport failures, throttling and server errors are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            HelpdeskError::Unreachable(_) => true,
            HelpdeskError::Rejected { status, .. } => *status == 429 || *status >= 500,
            HelpdeskError::Malformed(_) => false,
        }
    }
}

impl From<HelpdeskError> for ServiceError {
    fn from(err: HelpdeskError) -> Self {
        ServiceError::ExternalService(err.to_string())
    }
}

/// Ticket fields read from the helpdesk; everything else is ignored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalTicket {
    pub id: u64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description_text: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub department: Option<String>,
}

/// Read access to an external helpdesk
#[async_trait]
pub trait HelpdeskClient: Send + Sync {
    async fn get_ticket(&self, ticket_id: u64) -> Result<ExternalTicket, HelpdeskError>;

    /// First page of tickets as returned by the helpdesk
    async fn list_tickets(&self) -> Result<Vec<ExternalTicket>, HelpdeskError>;
}

/// Freshservice configuration
#[derive(Debug, Clone)]
pub struct FreshserviceConfig {
    /// Account domain, e.g. `acme.freshservice.com`
    pub domain: String,
    pub api_key: String,
}

impl FreshserviceConfig {
    /// Create a new FreshserviceConfig from environment variables
    ///
    /// Returns `None` when either `FRESHSERVICE_DOMAIN` or `FRESHSERVICE_API_KEY`
    /// is missing, which disables sync.
    pub fn from_env() -> Option<Self> {
        let domain = std::env::var("FRESHSERVICE_DOMAIN").ok()?;
        let api_key = std::env::var("FRESHSERVICE_API_KEY").ok()?;
        if domain.trim().is_empty() || api_key.trim().is_empty() {
            return None;
        }
        Some(Self { domain, api_key })
    }

    pub fn base_url(&self) -> String {
        format!("https://{}/api/v2", self.domain.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct TicketEnvelope {
    ticket: ExternalTicket,
}

#[derive(Deserialize)]
struct TicketsEnvelope {
    tickets: Vec<ExternalTicket>,
}

/// Freshservice REST v2 client using API key basic auth
#[derive(Clone)]
pub struct FreshserviceClient {
    client: reqwest::Client,
    config: FreshserviceConfig,
}

impl FreshserviceClient {
    pub fn new(config: FreshserviceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, HelpdeskError> {
        let url = format!("{}{}", self.config.base_url(), path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.api_key, Some("X"))
            .send()
            .await
            .map_err(|e| {
                error!("Freshservice request to {} failed: {}", path, e);
                HelpdeskError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Freshservice returned {} for {}: {}", status, path, body);
            return Err(HelpdeskError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| HelpdeskError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl HelpdeskClient for FreshserviceClient {
    async fn get_ticket(&self, ticket_id: u64) -> Result<ExternalTicket, HelpdeskError> {
        let envelope: TicketEnvelope = self.get(&format!("/tickets/{}", ticket_id)).await?;
        Ok(envelope.ticket)
    }

    async fn list_tickets(&self) -> Result<Vec<ExternalTicket>, HelpdeskError> {
        let envelope: TicketsEnvelope = self.get("/tickets").await?;
        Ok(envelope.tickets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn ticket_parses_with_missing_fields() {
        let json = r#"{"ticket": {"id": 42, "subject": "Leak", "priority": 2, "status": 4,
            "custom_fields": {"floor": 3}, "description_text": null}}"#;
        let envelope: TicketEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.ticket.id, 42);
        assert_eq!(envelope.ticket.subject.as_deref(), Some("Leak"));
        assert_eq!(envelope.ticket.priority, Some(2));
        assert_eq!(envelope.ticket.description_text, None);
        assert_eq!(envelope.ticket.category, None);
    }

    #[test]
    fn retryable_failures() {
        assert!(HelpdeskError::Unreachable("timeout".into()).is_retryable());
        assert!(HelpdeskError::Rejected { status: 503, body: String::new() }.is_retryable());
        assert!(HelpdeskError::Rejected { status: 429, body: String::new() }.is_retryable());
        assert!(!HelpdeskError::Rejected { status: 404, body: String::new() }.is_retryable());
        assert!(!HelpdeskError::Malformed("eof".into()).is_retryable());
    }

    #[test]
    #[serial]
    fn config_needs_domain_and_key() {
        unsafe {
            std::env::remove_var("FRESHSERVICE_DOMAIN");
            std::env::remove_var("FRESHSERVICE_API_KEY");
        }
        assert!(FreshserviceConfig::from_env().is_none());

        unsafe {
            std::env::set_var("FRESHSERVICE_DOMAIN", "acme.freshservice.com");
            std::env::set_var("FRESHSERVICE_API_KEY", "key");
        }
        let config = FreshserviceConfig::from_env().unwrap();
        assert_eq!(config.base_url(), "https://acme.freshservice.com/api/v2");

        unsafe {
            std::env::remove_var("FRESHSERVICE_DOMAIN");
            std::env::remove_var("FRESHSERVICE_API_KEY");
        }
    }
}
