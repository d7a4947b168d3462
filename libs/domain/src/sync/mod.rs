//! External helpdesk synchronization
//!
//! Pulls tickets from the helpdesk and upserts them as maintenance requests
//! keyed by external id. Failures come back as a `SyncResult::Failed` with a
//! retry hint; retry policy belongs to the caller.

use chrono::Utc;
use common::error::DatabaseError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::lifecycle::completion_stamp;
use crate::models::{
    MaintenanceRequest, NewRequest, RequestChanges, RequestPriority, RequestSource, RequestStatus,
    RequestType,
};
use crate::repositories::MaintenanceRepository;
use crate::validation::MAX_TITLE_LENGTH;

pub mod freshservice;
pub mod mapping;

pub use freshservice::{
    ExternalTicket, FreshserviceClient, FreshserviceConfig, HelpdeskClient, HelpdeskError,
};

/// Default bound on a single sync call
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Sync settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Account that owns requests created from external tickets
    pub owner_email: String,
    pub timeout: Duration,
}

impl SyncConfig {
    /// Create a new SyncConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SYNC_OWNER_EMAIL`: owner of imported requests (default: admin@company.com)
    /// - `SYNC_TIMEOUT_SECONDS`: bound on one sync call (default: 30)
    pub fn from_env() -> Self {
        let owner_email = std::env::var("SYNC_OWNER_EMAIL")
            .unwrap_or_else(|_| "admin@company.com".to_string());
        let timeout = std::env::var("SYNC_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SYNC_TIMEOUT);

        Self {
            owner_email,
            timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    Updated,
}

/// Outcome of syncing one ticket
#[derive(Debug, Clone, PartialEq)]
pub enum SyncResult {
    Synced {
        action: SyncAction,
        request: MaintenanceRequest,
    },
    Failed {
        error: String,
        retryable: bool,
    },
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncResult::Synced { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub ticket_id: u64,
    pub error: String,
    pub retryable: bool,
}

/// Outcome of a bulk sync
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<SyncFailure>,
}

struct Failure {
    error: String,
    retryable: bool,
}

impl From<HelpdeskError> for Failure {
    fn from(err: HelpdeskError) -> Self {
        Failure {
            retryable: err.is_retryable(),
            error: err.to_string(),
        }
    }
}

impl From<DatabaseError> for Failure {
    fn from(err: DatabaseError) -> Self {
        error!("Failed to store synced ticket: {}", err);
        Failure {
            error: "Failed to store synced ticket".to_string(),
            retryable: true,
        }
    }
}

/// Internal fields derived from an external ticket
#[derive(Debug, Clone, PartialEq)]
struct MappedTicket {
    external_id: String,
    title: String,
    description: String,
    request_type: RequestType,
    category: String,
    priority: RequestPriority,
    status: RequestStatus,
    location: String,
}

impl From<&ExternalTicket> for MappedTicket {
    fn from(ticket: &ExternalTicket) -> Self {
        let subject = ticket
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Helpdesk ticket #{}", ticket.id));
        // Requests always carry a description; a bare ticket reuses its subject
        let description =
            non_blank(ticket.description_text.as_deref()).unwrap_or_else(|| subject.clone());

        MappedTicket {
            external_id: ticket.id.to_string(),
            title: subject.chars().take(MAX_TITLE_LENGTH).collect(),
            description,
            request_type: mapping::map_category(ticket.category.as_deref()),
            category: non_blank(ticket.sub_category.as_deref())
                .unwrap_or_else(|| "general".to_string()),
            priority: mapping::map_priority(ticket.priority),
            status: mapping::map_status(ticket.status),
            location: non_blank(ticket.department.as_deref())
                .unwrap_or_else(|| "Not specified".to_string()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Upserts helpdesk tickets into the request store
#[derive(Clone)]
pub struct TicketSyncer {
    client: Arc<dyn HelpdeskClient>,
    requests: Arc<dyn MaintenanceRepository>,
    owner_id: Uuid,
}

impl TicketSyncer {
    pub fn new(
        client: Arc<dyn HelpdeskClient>,
        requests: Arc<dyn MaintenanceRepository>,
        owner_id: Uuid,
    ) -> Self {
        Self {
            client,
            requests,
            owner_id,
        }
    }

    /// Sync one ticket; repeated calls with unchanged data keep a single record
    pub async fn sync_ticket(&self, ticket_id: u64) -> SyncResult {
        match self.fetch_and_upsert(ticket_id).await {
            Ok((action, request)) => {
                info!(
                    "Ticket {} synced as request {} ({:?})",
                    ticket_id, request.id, action
                );
                SyncResult::Synced { action, request }
            }
            Err(Failure { error, retryable }) => {
                warn!("Ticket {} sync failed: {}", ticket_id, error);
                SyncResult::Failed { error, retryable }
            }
        }
    }

    /// `sync_ticket` bounded by `timeout`; running out of time is retryable
    pub async fn sync_ticket_within(&self, ticket_id: u64, timeout: Duration) -> SyncResult {
        match tokio::time::timeout(timeout, self.sync_ticket(ticket_id)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Ticket {} sync timed out after {:?}", ticket_id, timeout);
                SyncResult::Failed {
                    error: format!("Sync timed out after {:?}", timeout),
                    retryable: true,
                }
            }
        }
    }

    /// Sync every ticket the helpdesk lists
    pub async fn sync_tickets(&self) -> Result<SyncReport, HelpdeskError> {
        let tickets = self.client.list_tickets().await?;
        let mut report = SyncReport::default();

        for ticket in &tickets {
            match self.upsert(ticket).await {
                Ok((SyncAction::Created, _)) => report.created += 1,
                Ok((SyncAction::Updated, _)) => report.updated += 1,
                Err(Failure { error, retryable }) => report.failures.push(SyncFailure {
                    ticket_id: ticket.id,
                    error,
                    retryable,
                }),
            }
        }

        info!(
            "Bulk sync done: {} created, {} updated, {} failed",
            report.created,
            report.updated,
            report.failures.len()
        );
        Ok(report)
    }

    async fn fetch_and_upsert(
        &self,
        ticket_id: u64,
    ) -> Result<(SyncAction, MaintenanceRequest), Failure> {
        let ticket = self.client.get_ticket(ticket_id).await?;
        self.upsert(&ticket).await
    }

    async fn upsert(
        &self,
        ticket: &ExternalTicket,
    ) -> Result<(SyncAction, MaintenanceRequest), Failure> {
        let mapped = MappedTicket::from(ticket);

        if let Some(existing) = self.requests.find_by_external_id(&mapped.external_id).await? {
            return self.overwrite(&existing, &mapped).await;
        }

        let draft = NewRequest {
            title: mapped.title.clone(),
            description: mapped.description.clone(),
            request_type: mapped.request_type,
            category: mapped.category.clone(),
            priority: mapped.priority,
            status: mapped.status,
            location: Some(mapped.location.clone()),
            created_by: self.owner_id,
            images: Vec::new(),
            external_id: Some(mapped.external_id.clone()),
            source: RequestSource::External,
        };

        match self
            .requests
            .insert(&MaintenanceRequest::new(draft, Utc::now()))
            .await
        {
            Ok(request) => Ok((SyncAction::Created, request)),
            // A concurrent sync inserted the same ticket first
            Err(e) if e.is_unique_violation() => {
                let existing = self
                    .requests
                    .find_by_external_id(&mapped.external_id)
                    .await?
                    .ok_or(e)?;
                self.overwrite(&existing, &mapped).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn overwrite(
        &self,
        existing: &MaintenanceRequest,
        mapped: &MappedTicket,
    ) -> Result<(SyncAction, MaintenanceRequest), Failure> {
        let changes = RequestChanges {
            title: Some(mapped.title.clone()),
            description: Some(mapped.description.clone()),
            request_type: Some(mapped.request_type),
            category: Some(mapped.category.clone()),
            priority: Some(mapped.priority),
            status: Some(mapped.status),
            location: Some(mapped.location.clone()),
            completed_at: completion_stamp(existing, mapped.status, Utc::now()),
            ..Default::default()
        };

        let updated = self
            .requests
            .update_fields(existing.id, &changes)
            .await?
            .ok_or_else(|| Failure {
                error: format!("Request {} vanished during sync", existing.id),
                retryable: true,
            })?;
        Ok((SyncAction::Updated, updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryMaintenanceRepository;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeHelpdesk {
        tickets: Mutex<HashMap<u64, ExternalTicket>>,
        failure: Option<HelpdeskError>,
        delay: Option<Duration>,
    }

    impl FakeHelpdesk {
        fn with(tickets: Vec<ExternalTicket>) -> Self {
            Self {
                tickets: Mutex::new(tickets.into_iter().map(|t| (t.id, t)).collect()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl HelpdeskClient for FakeHelpdesk {
        async fn get_ticket(&self, ticket_id: u64) -> Result<ExternalTicket, HelpdeskError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            self.tickets
                .lock()
                .unwrap()
                .get(&ticket_id)
                .cloned()
                .ok_or(HelpdeskError::Rejected {
                    status: 404,
                    body: "not found".to_string(),
                })
        }

        async fn list_tickets(&self) -> Result<Vec<ExternalTicket>, HelpdeskError> {
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            let mut tickets: Vec<_> = self.tickets.lock().unwrap().values().cloned().collect();
            tickets.sort_by_key(|t| t.id);
            Ok(tickets)
        }
    }

    fn ticket(id: u64) -> ExternalTicket {
        ExternalTicket {
            id,
            subject: Some("Water leak in pantry".to_string()),
            description_text: Some("Pipe under the sink".to_string()),
            category: Some("Plumbing".to_string()),
            sub_category: Some("leak".to_string()),
            priority: Some(1),
            status: Some(2),
            department: Some("Finance".to_string()),
        }
    }

    fn syncer(client: FakeHelpdesk, store: &InMemoryMaintenanceRepository) -> TicketSyncer {
        TicketSyncer::new(Arc::new(client), Arc::new(store.clone()), Uuid::new_v4())
    }

    fn synced(result: SyncResult) -> (SyncAction, MaintenanceRequest) {
        match result {
            SyncResult::Synced { action, request } => (action, request),
            SyncResult::Failed { error, .. } => panic!("sync failed: {}", error),
        }
    }

    #[tokio::test]
    async fn first_sync_creates_external_request() {
        let store = InMemoryMaintenanceRepository::new();
        let syncer = syncer(FakeHelpdesk::with(vec![ticket(7)]), &store);

        let (action, request) = synced(syncer.sync_ticket(7).await);
        assert_eq!(action, SyncAction::Created);
        assert_eq!(request.external_id.as_deref(), Some("7"));
        assert_eq!(request.source, RequestSource::External);
        assert_eq!(request.title, "Water leak in pantry");
        assert_eq!(request.request_type, RequestType::Plumbing);
        assert_eq!(request.category, "leak");
        assert_eq!(request.priority, RequestPriority::Critical);
        assert_eq!(request.status, RequestStatus::InProgress);
        assert_eq!(request.location.as_deref(), Some("Finance"));
        assert!(request.completed_at.is_none());
    }

    #[tokio::test]
    async fn repeated_sync_keeps_one_record() {
        let store = InMemoryMaintenanceRepository::new();
        let syncer = syncer(FakeHelpdesk::with(vec![ticket(7)]), &store);

        let (_, first) = synced(syncer.sync_ticket(7).await);
        let (action, second) = synced(syncer.sync_ticket(7).await);

        assert_eq!(action, SyncAction::Updated);
        assert_eq!(store.len().await, 1);
        assert_eq!(second.id, first.id);
        assert_eq!(
            MaintenanceRequest {
                updated_at: first.updated_at,
                ..second
            },
            first
        );
    }

    #[tokio::test]
    async fn unmapped_values_fall_back() {
        let store = InMemoryMaintenanceRepository::new();
        let bare = ExternalTicket {
            id: 9,
            category: Some("Furniture".to_string()),
            priority: Some(17),
            ..Default::default()
        };
        let syncer = syncer(FakeHelpdesk::with(vec![bare]), &store);

        let (_, request) = synced(syncer.sync_ticket(9).await);
        assert_eq!(request.request_type, RequestType::General);
        assert_eq!(request.priority, RequestPriority::Medium);
        assert_eq!(request.status, RequestStatus::New);
        assert_eq!(request.category, "general");
        assert_eq!(request.location.as_deref(), Some("Not specified"));
        assert_eq!(request.title, "Helpdesk ticket #9");
        assert_eq!(request.description, "Helpdesk ticket #9");
    }

    #[tokio::test]
    async fn missing_description_falls_back_to_subject() {
        let store = InMemoryMaintenanceRepository::new();
        let ticket = ExternalTicket {
            id: 11,
            subject: Some("Lift stuck on floor 2".to_string()),
            description_text: Some("   ".to_string()),
            ..Default::default()
        };
        let syncer = syncer(FakeHelpdesk::with(vec![ticket]), &store);

        let (_, request) = synced(syncer.sync_ticket(11).await);
        assert_eq!(request.description, "Lift stuck on floor 2");
        assert!(!request.description.trim().is_empty());
    }

    #[tokio::test]
    async fn resolved_ticket_stamps_completion_once() {
        let store = InMemoryMaintenanceRepository::new();
        synced(syncer_over(vec![ticket(3)], &store).sync_ticket(3).await);

        let request = store.find_by_external_id("3").await.unwrap().unwrap();
        assert!(request.completed_at.is_none());

        // Resolve it on the helpdesk side
        let resolved = ExternalTicket {
            status: Some(4),
            ..ticket(3)
        };
        let syncer = syncer_over(vec![resolved], &store);
        let (_, done) = synced(syncer.sync_ticket(3).await);
        let stamp = done.completed_at.unwrap();

        let (_, again) = synced(syncer.sync_ticket(3).await);
        assert_eq!(again.completed_at, Some(stamp));
    }

    fn syncer_over(tickets: Vec<ExternalTicket>, store: &InMemoryMaintenanceRepository) -> TicketSyncer {
        syncer(FakeHelpdesk::with(tickets), store)
    }

    #[tokio::test]
    async fn helpdesk_failure_is_a_structured_result() {
        let store = InMemoryMaintenanceRepository::new();
        let client = FakeHelpdesk {
            failure: Some(HelpdeskError::Unreachable("connection refused".to_string())),
            ..Default::default()
        };
        let syncer = syncer(client, &store);

        match syncer.sync_ticket(1).await {
            SyncResult::Failed { error, retryable } => {
                assert!(error.contains("connection refused"));
                assert!(retryable);
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let missing = syncer_over(vec![], &store).sync_ticket(404).await;
        assert!(matches!(
            missing,
            SyncResult::Failed {
                retryable: false,
                ..
            }
        ));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn slow_helpdesk_times_out_as_retryable() {
        let store = InMemoryMaintenanceRepository::new();
        let client = FakeHelpdesk {
            delay: Some(Duration::from_millis(500)),
            ..FakeHelpdesk::with(vec![ticket(5)])
        };
        let syncer = syncer(client, &store);

        let result = syncer
            .sync_ticket_within(5, Duration::from_millis(20))
            .await;
        assert!(matches!(
            result,
            SyncResult::Failed {
                retryable: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn bulk_sync_reports_counts() {
        let store = InMemoryMaintenanceRepository::new();
        let syncer = syncer_over(vec![ticket(1), ticket(2)], &store);
        synced(syncer.sync_ticket(1).await);

        let report = syncer.sync_tickets().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert!(report.failures.is_empty());
        assert_eq!(store.len().await, 2);
    }
}
