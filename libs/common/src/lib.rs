//! Common library for the maintenance desk
//!
//! This crate provides infrastructure shared by the services of the
//! maintenance desk: PostgreSQL connectivity and migrations, database error
//! types, and HTTP server settings.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, health_check, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     let is_healthy = health_check(&pool).await?;
//!     println!("Database health check: {}", is_healthy);
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod settings;
