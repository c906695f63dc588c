use crate::entities::{
    CancelledBy, OrderEventType, OrderStatus, PaymentMethod, order_entity, order_event_entity,
};
use crate::services::{ClaimCode, PickupOutcome, VerificationMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AcceptOrderRequest {
    pub restaurant_id: i32,
    pub pickup_window_start: DateTime<Utc>,
    pub pickup_window_end: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RestaurantActionRequest {
    pub restaurant_id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerActionRequest {
    pub customer_id: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompleteOrderRequest {
    pub restaurant_id: i32,
    /// 取件码或临时领取码
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelByCustomerRequest {
    pub customer_id: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelByRestaurantRequest {
    pub restaurant_id: i32,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i32,
    pub restaurant_id: i32,
    pub customer_id: i32,
    pub status: OrderStatus,
    /// cents
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub pickup_window_start: Option<DateTime<Utc>>,
    pub pickup_window_end: Option<DateTime<Utc>>,
    pub pickup_code_attempts: i32,
    pub accepted_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancel_reason: Option<String>,
    pub commission_rate_bp: Option<i32>,
    pub commission_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<order_entity::Model> for OrderResponse {
    fn from(m: order_entity::Model) -> Self {
        Self {
            id: m.id,
            restaurant_id: m.restaurant_id,
            customer_id: m.customer_id,
            status: m.status,
            total_amount: m.total_amount,
            payment_method: m.payment_method,
            pickup_window_start: m.pickup_window_start,
            pickup_window_end: m.pickup_window_end,
            pickup_code_attempts: m.pickup_code_attempts,
            accepted_at: m.accepted_at,
            ready_at: m.ready_at,
            completed_at: m.completed_at,
            cancelled_at: m.cancelled_at,
            expired_at: m.expired_at,
            cancelled_by: m.cancelled_by,
            cancel_reason: m.cancel_reason,
            commission_rate_bp: m.commission_rate_bp,
            commission_amount: m.commission_amount,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PickupResult {
    Completed,
    WrongCode,
    ClaimCodeExpired,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteOrderResponse {
    pub result: PickupResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_with: Option<VerificationMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderResponse>,
}

impl From<PickupOutcome> for CompleteOrderResponse {
    fn from(outcome: PickupOutcome) -> Self {
        match outcome {
            PickupOutcome::Completed { order, via } => Self {
                result: PickupResult::Completed,
                verified_with: Some(via),
                attempts_remaining: None,
                order: Some(order.into()),
            },
            PickupOutcome::WrongCode { attempts_remaining } => Self {
                result: PickupResult::WrongCode,
                verified_with: None,
                attempts_remaining: Some(attempts_remaining),
                order: None,
            },
            PickupOutcome::ClaimCodeExpired => Self {
                result: PickupResult::ClaimCodeExpired,
                verified_with: None,
                attempts_remaining: None,
                order: None,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClaimCodeResponse {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl From<ClaimCode> for ClaimCodeResponse {
    fn from(c: ClaimCode) -> Self {
        Self {
            code: c.code,
            expires_at: c.expires_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResendCodeResponse {
    pub delivered: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderEventResponse {
    pub id: i32,
    pub event_type: OrderEventType,
    #[schema(value_type = Object)]
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<order_event_entity::Model> for OrderEventResponse {
    fn from(m: order_event_entity::Model) -> Self {
        Self {
            id: m.id,
            event_type: m.event_type,
            meta: m.meta,
            created_at: m.created_at,
        }
    }
}
