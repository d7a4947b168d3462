use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod middleware;
mod rate_limiter;
mod routes;

use common::{
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    settings::ServerSettings,
};
use domain::{
    identity::{DEFAULT_ACCOUNTS, IdentityService, SeedConfig},
    jwt::{JwtConfig, JwtService},
    repositories::{PgMaintenanceRepository, PgUserRepository},
};

use crate::rate_limiter::{RateLimiter, RateLimiterConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
    pub rate_limiter: RateLimiter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting authentication service");

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

    // Initialize JWT service
    let jwt_service = JwtService::new(JwtConfig::from_env()?);

    let identity = IdentityService::new(
        Arc::new(PgUserRepository::new(pool.clone())),
        Arc::new(PgMaintenanceRepository::new(pool)),
        jwt_service,
    );

    let seed = SeedConfig::from_env();
    if seed.enabled {
        let created = identity
            .seed_default_accounts(&DEFAULT_ACCOUNTS, &seed.password)
            .await?;
        if created > 0 {
            warn!(
                "Created {} default accounts; change their passwords before going live",
                created
            );
        }
    }

    let app_state = AppState {
        identity,
        rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let settings = ServerSettings::load("AUTH", 3000)?;
    let listener = tokio::net::TcpListener::bind(settings.address()).await?;
    info!("Authentication service listening on {}", settings.address());

    // Peer addresses feed the login rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
