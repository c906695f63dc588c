use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct SweepResponse {
    pub processed_count: u64,
}

/// `period_end` is exclusive. Both bounds omitted: the previous calendar week
/// (UTC), plus any older week still holding unbilled orders.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct GenerateInvoicesRequest {
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}
