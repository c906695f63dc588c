use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum OrderEventType {
    #[sea_orm(string_value = "status_changed")]
    StatusChanged,
    #[sea_orm(string_value = "code_generated")]
    CodeGenerated,
    #[sea_orm(string_value = "code_attempt")]
    CodeAttempt,
    #[sea_orm(string_value = "code_verified")]
    CodeVerified,
    #[sea_orm(string_value = "sms_sent")]
    SmsSent,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "claim_code_generated")]
    ClaimCodeGenerated,
    #[sea_orm(string_value = "claim_code_used")]
    ClaimCodeUsed,
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderEventType::StatusChanged => write!(f, "status_changed"),
            OrderEventType::CodeGenerated => write!(f, "code_generated"),
            OrderEventType::CodeAttempt => write!(f, "code_attempt"),
            OrderEventType::CodeVerified => write!(f, "code_verified"),
            OrderEventType::SmsSent => write!(f, "sms_sent"),
            OrderEventType::Expired => write!(f, "expired"),
            OrderEventType::Cancelled => write!(f, "cancelled"),
            OrderEventType::ClaimCodeGenerated => write!(f, "claim_code_generated"),
            OrderEventType::ClaimCodeUsed => write!(f, "claim_code_used"),
        }
    }
}

/// 订单事件（审计日志，只追加）
/// 唯一的更新：取件码 claim_code_generated -> claim_code_used
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "order_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub event_type: OrderEventType,
    pub meta: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
