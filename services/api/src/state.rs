//! Application state shared across handlers

use domain::{identity::IdentityService, maintenance::MaintenanceService, sync::TicketSyncer};
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
    pub maintenance: MaintenanceService,
    /// Absent when the helpdesk is not configured
    pub syncer: Option<TicketSyncer>,
    pub sync_timeout: Duration,
}
