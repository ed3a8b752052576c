//! Document bodies shaped like the ones devices write.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

/// Ids unique per test run so parallel tests never collide.
pub fn unique_id(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

pub fn device_register_request(name: Option<&str>) -> Value {
    match name {
        Some(n) => json!({ "name": n }),
        None => json!({}),
    }
}

pub fn board(id: &str, owner_id: &str, name: &str) -> Value {
    let now = Utc::now();
    json!({
        "id": id,
        "name": name,
        "createdAt": now,
        "updatedAt": now,
        "ownerId": owner_id,
        "sharing": "private",
    })
}

pub fn report(id: &str, reporter_id: &str, target_id: &str, created_at: DateTime<Utc>) -> Value {
    json!({
        "id": id,
        "reporterId": reporter_id,
        "targetType": "user",
        "targetId": target_id,
        "reason": "spam",
        "status": "pending",
        "createdAt": created_at,
    })
}

pub fn friendship(id: &str, users: [&str; 2], status: &str) -> Value {
    json!({
        "id": id,
        "users": users,
        "requestedBy": users[0],
        "status": status,
        "createdAt": Utc::now(),
    })
}
