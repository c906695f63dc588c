use crate::entities::{OrderEventType, order_event_entity as events};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde_json::Value;

/// Append-only audit trail of order transitions.
///
/// Writes go through the caller's connection so they share its transaction.
/// `record` is the best-effort variant used alongside state transitions: it runs
/// inside a savepoint and a failure is logged, never propagated.
pub struct OrderEventLog;

impl OrderEventLog {
    pub async fn append<C: ConnectionTrait>(
        conn: &C,
        order_id: i32,
        event_type: OrderEventType,
        meta: Value,
        at: DateTime<Utc>,
    ) -> Result<events::Model, DbErr> {
        events::ActiveModel {
            order_id: Set(order_id),
            event_type: Set(event_type),
            meta: Set(meta),
            created_at: Set(at),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    pub async fn record<C>(
        conn: &C,
        order_id: i32,
        event_type: OrderEventType,
        meta: Value,
        at: DateTime<Utc>,
    ) -> Option<events::Model>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let savepoint = match conn.begin().await {
            Ok(sp) => sp,
            Err(e) => {
                log::warn!("Order {order_id}: cannot open savepoint for {event_type} event: {e}");
                return None;
            }
        };

        match Self::append(&savepoint, order_id, event_type, meta, at).await {
            Ok(event) => match savepoint.commit().await {
                Ok(()) => Some(event),
                Err(e) => {
                    log::warn!("Order {order_id}: failed to commit {event_type} event: {e}");
                    None
                }
            },
            Err(e) => {
                if let Err(rb) = savepoint.rollback().await {
                    log::warn!("Order {order_id}: savepoint rollback failed: {rb}");
                }
                log::warn!("Order {order_id}: failed to write {event_type} event: {e}");
                None
            }
        }
    }

    /// Oldest first.
    pub async fn list_for_order<C: ConnectionTrait>(
        conn: &C,
        order_id: i32,
    ) -> Result<Vec<events::Model>, DbErr> {
        events::Entity::find()
            .filter(events::Column::OrderId.eq(order_id))
            .order_by_asc(events::Column::CreatedAt)
            .order_by_asc(events::Column::Id)
            .all(conn)
            .await
    }

    /// Most recent unused claim code of this order whose digest matches.
    pub async fn find_claim_code<C: ConnectionTrait>(
        conn: &C,
        order_id: i32,
        code_hash: &str,
    ) -> Result<Option<events::Model>, DbErr> {
        let issued = events::Entity::find()
            .filter(events::Column::OrderId.eq(order_id))
            .filter(events::Column::EventType.eq(OrderEventType::ClaimCodeGenerated))
            .order_by_desc(events::Column::CreatedAt)
            .order_by_desc(events::Column::Id)
            .all(conn)
            .await?;

        Ok(issued
            .into_iter()
            .find(|e| e.meta.get("code_hash").and_then(Value::as_str) == Some(code_hash)))
    }

    /// 单次使用：claim_code_generated -> claim_code_used，返回是否由本次调用完成翻转
    pub async fn mark_claim_code_used<C: ConnectionTrait>(
        conn: &C,
        event_id: i32,
    ) -> Result<bool, DbErr> {
        let res = events::Entity::update_many()
            .set(events::ActiveModel {
                event_type: Set(OrderEventType::ClaimCodeUsed),
                ..Default::default()
            })
            .filter(events::Column::Id.eq(event_id))
            .filter(events::Column::EventType.eq(OrderEventType::ClaimCodeGenerated))
            .exec(conn)
            .await?;
        Ok(res.rows_affected == 1)
    }
}
