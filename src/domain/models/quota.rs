use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Admission counter for one tenant within one fixed window. The count is
/// only ever moved by an atomic check-and-increment; `count <= limit` holds
/// at admission time and is never enforced retroactively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantQuota {
    pub tenant_id: Uuid,
    pub window_start: DateTime<Utc>,
    pub count: u32,
    pub limit: u32,
}
