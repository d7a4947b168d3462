use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod error;
mod middleware;
mod models;
mod routes;
mod state;

use common::{
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    settings::ServerSettings,
};
use domain::{
    identity::IdentityService,
    jwt::{JwtConfig, JwtService},
    maintenance::MaintenanceService,
    notify::LogNotifier,
    repositories::{PgMaintenanceRepository, PgUserRepository, UserRepository},
    sync::{FreshserviceClient, FreshserviceConfig, SyncConfig, TicketSyncer},
};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting API service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    // Initialize repositories
    let users = Arc::new(PgUserRepository::new(pool.clone()));
    let requests = Arc::new(PgMaintenanceRepository::new(pool));

    let jwt_service = JwtService::new(JwtConfig::from_env()?);
    let identity = IdentityService::new(users.clone(), requests.clone(), jwt_service);
    let maintenance =
        MaintenanceService::new(requests.clone(), users.clone(), Arc::new(LogNotifier));

    // External helpdesk sync is optional
    let sync_config = SyncConfig::from_env();
    let syncer = match FreshserviceConfig::from_env() {
        Some(freshservice) => match users.find_by_email(&sync_config.owner_email).await? {
            Some(owner) => {
                info!("Freshservice sync enabled for {}", freshservice.domain);
                Some(TicketSyncer::new(
                    Arc::new(FreshserviceClient::new(freshservice)),
                    requests,
                    owner.id,
                ))
            }
            None => {
                warn!(
                    "Sync owner {} does not exist, Freshservice sync disabled",
                    sync_config.owner_email
                );
                None
            }
        },
        None => {
            info!("Freshservice not configured, sync endpoints disabled");
            None
        }
    };

    let app_state = AppState {
        identity,
        maintenance,
        syncer,
        sync_timeout: sync_config.timeout,
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let settings = ServerSettings::load("API", 3001)?;
    let listener = tokio::net::TcpListener::bind(settings.address()).await?;
    info!("API service listening on {}", settings.address());

    axum::serve(listener, app).await?;

    Ok(())
}
