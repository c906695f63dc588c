use crate::config::SchedulerConfig;
use crate::entities::{OrderStatus, order_entity as orders};
use crate::error::{AppError, AppResult};
use crate::services::order_service::OrderService;
use crate::utils::Clock;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

const ACTIVE_STATUSES: [OrderStatus; 2] = [OrderStatus::Accepted, OrderStatus::ReadyForPickup];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExpiryStats {
    /// Active orders past their pickup window plus grace period
    pub overdue: u64,
    /// Pending orders older than the acceptance timeout
    pub stale_pending: u64,
    pub active: u64,
    pub expired_today: u64,
}

/// 过期与超时订单的批处理
///
/// Both sweeps can be re-run at any time: candidates are re-selected on every
/// run and each order goes through the locked state transition, so an order
/// handled by a concurrent run is simply skipped.
#[derive(Clone)]
pub struct ExpiryService {
    pool: DatabaseConnection,
    orders: OrderService,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
}

impl ExpiryService {
    pub fn new(
        pool: DatabaseConnection,
        orders: OrderService,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            orders,
            config,
            clock,
        }
    }

    fn overdue_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(self.config.grace_minutes)
    }

    fn pending_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(self.config.pending_timeout_minutes)
    }

    fn overdue_condition(&self, now: DateTime<Utc>) -> Condition {
        Condition::all()
            .add(orders::Column::Status.is_in(ACTIVE_STATUSES))
            .add(orders::Column::PickupWindowEnd.lt(self.overdue_cutoff(now)))
    }

    fn stale_pending_condition(&self, now: DateTime<Utc>) -> Condition {
        Condition::all()
            .add(orders::Column::Status.eq(OrderStatus::Pending))
            .add(orders::Column::CreatedAt.lt(self.pending_cutoff(now)))
    }

    /// Expire active orders whose pickup window ended more than the grace period ago.
    pub async fn expire_overdue(&self) -> AppResult<u64> {
        let now = self.clock.now();
        let candidates = orders::Entity::find()
            .filter(self.overdue_condition(now))
            .order_by_asc(orders::Column::PickupWindowEnd)
            .all(&self.pool)
            .await?;

        let mut expired = 0u64;
        for order in candidates {
            match self.orders.expire(order.id).await {
                Ok(true) => {
                    expired += 1;
                    self.release_stock(order.id).await;
                }
                Ok(false) => log::debug!("Order {} already handled, skipping expiry", order.id),
                Err(e) => log::error!("Failed to expire order {}: {e}", order.id),
            }
        }

        if expired > 0 {
            log::info!("Expired overdue orders: {expired}");
        }
        Ok(expired)
    }

    /// Cancel pending orders the restaurant never accepted.
    pub async fn auto_cancel_pending(&self) -> AppResult<u64> {
        let now = self.clock.now();
        let candidates = orders::Entity::find()
            .filter(self.stale_pending_condition(now))
            .order_by_asc(orders::Column::CreatedAt)
            .all(&self.pool)
            .await?;

        let reason = format!(
            "Automatically cancelled by system: not accepted within {} minutes",
            self.config.pending_timeout_minutes
        );

        let mut cancelled = 0u64;
        for order in candidates {
            match self
                .orders
                .cancel_by_restaurant(order.id, order.restaurant_id, &reason)
                .await
            {
                Ok(_) => {
                    cancelled += 1;
                    self.release_stock(order.id).await;
                }
                Err(AppError::InvalidState { .. }) => {
                    log::debug!("Order {} already handled, skipping auto-cancel", order.id)
                }
                Err(e) => log::error!("Failed to auto-cancel order {}: {e}", order.id),
            }
        }

        if cancelled > 0 {
            log::info!("Auto-cancelled stale pending orders: {cancelled}");
        }
        Ok(cancelled)
    }

    pub async fn get_expiry_stats(&self) -> AppResult<ExpiryStats> {
        let now = self.clock.now();
        let start_of_day = now.date_naive().and_time(NaiveTime::MIN).and_utc();

        let overdue = orders::Entity::find()
            .filter(self.overdue_condition(now))
            .count(&self.pool)
            .await?;
        let stale_pending = orders::Entity::find()
            .filter(self.stale_pending_condition(now))
            .count(&self.pool)
            .await?;
        let active = orders::Entity::find()
            .filter(orders::Column::Status.is_in(ACTIVE_STATUSES))
            .count(&self.pool)
            .await?;
        let expired_today = orders::Entity::find()
            .filter(orders::Column::Status.eq(OrderStatus::Expired))
            .filter(orders::Column::ExpiredAt.gte(start_of_day))
            .count(&self.pool)
            .await?;

        Ok(ExpiryStats {
            overdue,
            stale_pending,
            active,
            expired_today,
        })
    }

    async fn release_stock(&self, order_id: i32) {
        if !self.config.restock_on_release {
            return;
        }
        match self.orders.restock(order_id).await {
            Ok(true) => {}
            Ok(false) => log::debug!("Order {order_id} was already restocked"),
            Err(e) => log::error!("Failed to restock order {order_id}: {e}"),
        }
    }
}
