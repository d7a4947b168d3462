//! Notification collaborator
//!
//! Messages are handed off on a spawned task; a failed delivery is logged and
//! never reaches the request lifecycle.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::models::{MaintenanceRequest, RequestStatus};

/// Delivers a message to a recipient
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()>;
}

/// Notifier that records messages in the service log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<()> {
        info!(
            recipient,
            subject,
            body_len = html_body.len(),
            "Notification dispatched"
        );
        Ok(())
    }
}

/// Send in the background, logging failures
pub fn dispatch(notifier: Arc<dyn Notifier>, recipient: String, subject: String, body: String) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&recipient, &subject, &body).await {
            error!("Failed to notify {}: {}", recipient, e);
        }
    });
}

pub fn assignment_message(request: &MaintenanceRequest) -> (String, String) {
    let subject = format!("New maintenance request - {}", request.title);
    let body = format!(
        "<h2>New maintenance request</h2>\
         <p><strong>Title:</strong> {}</p>\
         <p><strong>Description:</strong> {}</p>\
         <p><strong>Type:</strong> {}</p>\
         <p><strong>Priority:</strong> {}</p>\
         <p><strong>Location:</strong> {}</p>\
         <p><strong>Request:</strong> {}</p>",
        request.title,
        request.description,
        request.request_type,
        request.priority,
        request.location.as_deref().unwrap_or("Not specified"),
        request.id
    );
    (subject, body)
}

pub fn status_message(
    request: &MaintenanceRequest,
    previous: RequestStatus,
) -> (String, String) {
    let subject = format!("Maintenance request status updated - {}", request.title);
    let body = format!(
        "<h2>Maintenance request status updated</h2>\
         <p><strong>Request:</strong> {}</p>\
         <p><strong>Previous status:</strong> {}</p>\
         <p><strong>New status:</strong> {}</p>\
         <p><strong>Updated at:</strong> {}</p>",
        request.title,
        previous,
        request.status,
        request.updated_at.to_rfc3339()
    );
    (subject, body)
}
