//! Loyalty point DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Request body for `POST /rewards/award`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AwardPointsRequest {
    /// Receiving customer.
    pub user_id: Uuid,
    /// Points to grant (positive) or claw back (negative). Never zero.
    pub amount: i64,
    /// Human-readable reason, shown in the customer's history.
    pub reason: String,
    /// Optional context. A `booking_id` key makes the award replay-safe
    /// for that booking.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Response body for `POST /rewards/award`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AwardPointsResponse {
    /// Always `true` on 2xx.
    pub success: bool,
    /// Whether a ledger entry was written (`false` on deduplicated replays).
    pub applied: bool,
    /// Balance after the call.
    pub balance: i64,
}

/// Response body for `GET /rewards/{user_id}/balance`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// The queried customer.
    pub user_id: Uuid,
    /// Current point balance.
    pub balance: i64,
}
