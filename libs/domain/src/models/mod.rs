//! Domain models

pub mod maintenance;
pub mod user;

// Re-export for convenience
pub use maintenance::{
    Comment, MaintenanceRequest, NewRequest, Page, RequestChanges, RequestFilter, RequestPatch,
    RequestPriority, RequestSource, RequestStats, RequestStatus, RequestType, RequiredPart,
    StatusTypeCount, TypeCount,
};
pub use user::{Language, NewUser, ProfileUpdate, PublicUser, Role, User, UserChanges};
