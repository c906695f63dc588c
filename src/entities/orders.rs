use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 订单状态机
///
/// ```text
/// pending ──► accepted ──► ready_for_pickup ──► completed
///    │            │               │
///    │            ├───────────────┴──► expired
///    ├────────────┴──► cancelled_by_customer
///    └────────────┴───────────────┴──► cancelled_by_restaurant
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "ready_for_pickup")]
    ReadyForPickup,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled_by_customer")]
    CancelledByCustomer,
    #[sea_orm(string_value = "cancelled_by_restaurant")]
    CancelledByRestaurant,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::CancelledByCustomer
                | OrderStatus::CancelledByRestaurant
                | OrderStatus::Expired
        )
    }

    /// Edges of the lifecycle graph. Terminal states have none.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Pending => matches!(next, Accepted | CancelledByCustomer | CancelledByRestaurant),
            Accepted => matches!(
                next,
                ReadyForPickup | CancelledByCustomer | CancelledByRestaurant | Expired
            ),
            ReadyForPickup => matches!(next, Completed | CancelledByRestaurant | Expired),
            Completed | CancelledByCustomer | CancelledByRestaurant | Expired => false,
        }
    }

    /// Orders a restaurant is still expected to hand over.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Accepted | OrderStatus::ReadyForPickup)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Accepted => write!(f, "accepted"),
            OrderStatus::ReadyForPickup => write!(f, "ready_for_pickup"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::CancelledByCustomer => write!(f, "cancelled_by_customer"),
            OrderStatus::CancelledByRestaurant => write!(f, "cancelled_by_restaurant"),
            OrderStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash_on_pickup")]
    CashOnPickup,
    #[sea_orm(string_value = "online")]
    Online,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::CashOnPickup => write!(f, "cash_on_pickup"),
            PaymentMethod::Online => write!(f, "online"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    #[sea_orm(string_value = "customer")]
    Customer,
    #[sea_orm(string_value = "restaurant")]
    Restaurant,
    #[sea_orm(string_value = "system")]
    System,
}

impl std::fmt::Display for CancelledBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelledBy::Customer => write!(f, "customer"),
            CancelledBy::Restaurant => write!(f, "restaurant"),
            CancelledBy::System => write!(f, "system"),
        }
    }
}

/// 订单实体
/// - total_amount / commission_amount: 金额(分)
/// - commission_rate_bp: 完成时快照的佣金费率 (basis points)
/// - restocked_at: 取消/过期后回补库存的时间，非空表示已回补（防止重复回补）
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub restaurant_id: i32,
    pub customer_id: i32,
    pub customer_phone: Option<String>,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub pickup_window_start: Option<DateTime<Utc>>,
    pub pickup_window_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub pickup_code_encrypted: Option<String>,
    pub pickup_code_attempts: i32,
    pub pickup_code_last_sent_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub invoiced_at: Option<DateTime<Utc>>,
    pub restocked_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancel_reason: Option<String>,
    pub commission_rate_bp: Option<i32>,
    pub commission_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn terminal_states_have_no_exits() {
        for from in OrderStatus::iter().filter(|s| s.is_terminal()) {
            for to in OrderStatus::iter() {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn nothing_leads_back_to_pending() {
        for from in OrderStatus::iter() {
            assert!(!from.can_transition_to(OrderStatus::Pending));
        }
    }

    #[test]
    fn customer_cannot_cancel_once_ready() {
        assert!(OrderStatus::Accepted.can_transition_to(OrderStatus::CancelledByCustomer));
        assert!(!OrderStatus::ReadyForPickup.can_transition_to(OrderStatus::CancelledByCustomer));
        assert!(OrderStatus::ReadyForPickup.can_transition_to(OrderStatus::CancelledByRestaurant));
    }

    #[test]
    fn pending_orders_cannot_expire_or_skip_ahead() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Expired));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::ReadyForPickup));
        assert!(!OrderStatus::Accepted.can_transition_to(OrderStatus::Completed));
    }
}
