//! Domain library for the maintenance desk
//!
//! Holds the maintenance request model and everything that decides what may
//! happen to it: identity and tokens, the authorization policy, the request
//! lifecycle, the maintenance service, and synchronization with the external
//! helpdesk. Persistence goes through the repository traits so the services
//! run the same against PostgreSQL and the in-memory stores.

pub mod error;
pub mod identity;
pub mod jwt;
pub mod lifecycle;
pub mod maintenance;
pub mod models;
pub mod notify;
pub mod policy;
pub mod repositories;
pub mod sync;
pub mod validation;

pub use error::{ServiceError, ServiceResult};
