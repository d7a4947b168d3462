//! Freshservice vocabulary mapping
//!
//! Lookup tables from helpdesk codes to internal vocabularies. Anything not
//! listed falls back to `medium`, `new` and `general` respectively.

use crate::models::{RequestPriority, RequestStatus, RequestType};

// Freshservice numbers priorities 1 (low) to 4 (urgent). The table inverts
// them and is kept as deployed until the product side confirms the intent.
pub const PRIORITY_MAP: &[(i64, RequestPriority)] = &[
    (1, RequestPriority::Critical),
    (2, RequestPriority::High),
    (3, RequestPriority::Medium),
    (4, RequestPriority::Low),
];

// 2 open, 3 pending, 4 resolved, 5 closed
pub const STATUS_MAP: &[(i64, RequestStatus)] = &[
    (2, RequestStatus::InProgress),
    (3, RequestStatus::InProgress),
    (4, RequestStatus::Completed),
    (5, RequestStatus::Cancelled),
];

pub const CATEGORY_MAP: &[(&str, RequestType)] = &[
    ("Electrical", RequestType::Electrical),
    ("Plumbing", RequestType::Plumbing),
    ("HVAC", RequestType::Ac),
    ("Civil", RequestType::Civil),
    ("Fire Safety", RequestType::FireFighting),
    ("Generator", RequestType::Generator),
    ("UPS", RequestType::Ups),
];

pub fn map_priority(code: Option<i64>) -> RequestPriority {
    lookup(PRIORITY_MAP, code).unwrap_or(RequestPriority::Medium)
}

pub fn map_status(code: Option<i64>) -> RequestStatus {
    lookup(STATUS_MAP, code).unwrap_or(RequestStatus::New)
}

pub fn map_category(category: Option<&str>) -> RequestType {
    lookup(CATEGORY_MAP, category).unwrap_or(RequestType::General)
}

fn lookup<K: PartialEq + Copy, V: Copy>(table: &[(K, V)], key: Option<K>) -> Option<V> {
    let key = key?;
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}
