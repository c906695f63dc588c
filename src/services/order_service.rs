use crate::config::PickupConfig;
use crate::entities::{
    CancelledBy, OrderEventType, OrderStatus, meal_entity as meals, order_entity as orders,
    order_event_entity as events, order_item_entity as order_items,
    restaurant_entity as restaurants,
};
use crate::error::{AppError, AppResult};
use crate::services::commission::{CommissionEngine, commission_cents};
use crate::services::notification_service::{DispatchTrigger, NotificationDispatcher};
use crate::services::order_event_log::OrderEventLog;
use crate::utils::{Clock, PickupCodeGenerator};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use utoipa::ToSchema;

pub const EXPIRED_REASON: &str = "Pickup window expired";

const MIN_PICKUP_WINDOW_MINUTES: i64 = 30;
const MAX_PICKUP_WINDOW_HOURS: i64 = 24;

/// Who is driving a transition. Used for ownership checks and event metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer(i32),
    Restaurant(i32),
    System,
}

impl Actor {
    fn authorize(&self, order: &orders::Model) -> AppResult<()> {
        match *self {
            Actor::Customer(id) if id != order.customer_id => Err(AppError::Forbidden),
            Actor::Restaurant(id) if id != order.restaurant_id => Err(AppError::Forbidden),
            _ => Ok(()),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Actor::Customer(_) => "customer",
            Actor::Restaurant(_) => "restaurant",
            Actor::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    PickupCode,
    ClaimCode,
}

/// Result of a code check at the counter. Only broken preconditions are errors.
#[derive(Debug, Clone)]
pub enum PickupOutcome {
    Completed {
        order: orders::Model,
        via: VerificationMethod,
    },
    WrongCode {
        attempts_remaining: i32,
    },
    ClaimCodeExpired,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClaimCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// 取餐窗口校验：返回实际存储的窗口结束时间
///
/// `cap` is the earliest `available_until` across the order's meals. When it
/// cuts the requested window short the 30 minute minimum no longer applies.
pub fn resolve_pickup_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cap: Option<DateTime<Utc>>,
) -> AppResult<DateTime<Utc>> {
    if end <= start {
        return Err(AppError::ValidationError(
            "Pickup window end must be after its start".into(),
        ));
    }

    let (effective_end, capped) = match cap {
        Some(cap) if cap <= end => (cap, true),
        _ => (end, false),
    };
    if effective_end <= start {
        return Err(AppError::ValidationError(
            "Meals are no longer available within the requested pickup window".into(),
        ));
    }

    let length = effective_end - start;
    if length > Duration::hours(MAX_PICKUP_WINDOW_HOURS) {
        return Err(AppError::ValidationError(format!(
            "Pickup window cannot exceed {MAX_PICKUP_WINDOW_HOURS} hours"
        )));
    }
    if !capped && length < Duration::minutes(MIN_PICKUP_WINDOW_MINUTES) {
        return Err(AppError::ValidationError(format!(
            "Pickup window must be at least {MIN_PICKUP_WINDOW_MINUTES} minutes"
        )));
    }

    Ok(effective_end)
}

#[derive(Clone)]
pub struct OrderService {
    pool: DatabaseConnection,
    codes: Arc<PickupCodeGenerator>,
    config: PickupConfig,
    commission: CommissionEngine,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(
        pool: DatabaseConnection,
        codes: PickupCodeGenerator,
        config: PickupConfig,
        commission: CommissionEngine,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            codes: Arc::new(codes),
            config,
            commission,
            notifier,
            clock,
        }
    }

    pub async fn get_order(&self, order_id: i32) -> AppResult<orders::Model> {
        orders::Entity::find_by_id(order_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))
    }

    pub async fn list_events(&self, order_id: i32) -> AppResult<Vec<events::Model>> {
        self.get_order(order_id).await?;
        Ok(OrderEventLog::list_for_order(&self.pool, order_id).await?)
    }

    /// Restaurant accepts a pending order and fixes the pickup window.
    pub async fn accept(
        &self,
        order_id: i32,
        restaurant_id: i32,
        pickup_start: DateTime<Utc>,
        pickup_end: DateTime<Utc>,
    ) -> AppResult<orders::Model> {
        let now = self.clock.now();
        let actor = Actor::Restaurant(restaurant_id);
        let txn = self.pool.begin().await?;

        let order = Self::transition(&txn, order_id, actor, OrderStatus::Accepted, "accept").await?;
        let cap = Self::earliest_available_until(&txn, order_id).await?;
        let window_end = resolve_pickup_window(pickup_start, pickup_end, cap)?;

        let code = self.codes.generate();
        let encrypted = self.codes.encrypt(&code)?;

        let from = order.status;
        let mut active: orders::ActiveModel = order.into();
        active.status = Set(OrderStatus::Accepted);
        active.pickup_window_start = Set(Some(pickup_start));
        active.pickup_window_end = Set(Some(window_end));
        active.pickup_code_encrypted = Set(Some(encrypted));
        active.pickup_code_attempts = Set(0);
        active.accepted_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        Self::record_status_change(&txn, &updated, from, actor, now).await;
        OrderEventLog::record(
            &txn,
            order_id,
            OrderEventType::CodeGenerated,
            json!({
                "code_masked": PickupCodeGenerator::mask(&code),
                "code_length": code.len(),
            }),
            now,
        )
        .await;

        txn.commit().await?;
        log::info!("Order {order_id} accepted by restaurant {restaurant_id}");

        self.notifier
            .dispatch_pickup_code(&updated, &code, DispatchTrigger::Accepted)
            .await;
        Ok(updated)
    }

    /// 出餐完成，等待顾客取餐；重新推送取件码
    pub async fn mark_ready(&self, order_id: i32, restaurant_id: i32) -> AppResult<orders::Model> {
        let now = self.clock.now();
        let actor = Actor::Restaurant(restaurant_id);
        let txn = self.pool.begin().await?;

        let order = Self::transition(
            &txn,
            order_id,
            actor,
            OrderStatus::ReadyForPickup,
            "mark ready",
        )
        .await?;

        let mut active: orders::ActiveModel = order.into();
        active.status = Set(OrderStatus::ReadyForPickup);
        active.ready_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        log::info!("Order {order_id} ready for pickup");

        // The sms_sent event below (trigger = ready_for_pickup) is the audit record of this step.
        match self.stored_code(&updated) {
            Some(code) => {
                self.notifier
                    .dispatch_pickup_code(&updated, &code, DispatchTrigger::ReadyForPickup)
                    .await;
            }
            None => {
                self.notifier
                    .record_undeliverable(
                        &updated,
                        DispatchTrigger::ReadyForPickup,
                        "stored pickup code unreadable",
                    )
                    .await;
            }
        }
        Ok(updated)
    }

    /// Verify a code presented at the counter and complete the order on a match.
    ///
    /// Claim codes are tried first and never touch the attempt counter. An
    /// expired claim code is still accepted when the same digits are the live
    /// pickup code. For the pickup code issued at acceptance the counter is
    /// incremented before the comparison and that increment survives a wrong
    /// guess. The code must match exactly; surrounding whitespace is a miss.
    pub async fn complete_with_code(
        &self,
        order_id: i32,
        code: &str,
        restaurant_id: i32,
    ) -> AppResult<PickupOutcome> {
        let now = self.clock.now();
        let actor = Actor::Restaurant(restaurant_id);
        let txn = self.pool.begin().await?;

        let order =
            Self::transition(&txn, order_id, actor, OrderStatus::Completed, "complete").await?;

        let digest = PickupCodeGenerator::hash(code);
        if let Some(claim) = OrderEventLog::find_claim_code(&txn, order_id, &digest).await? {
            let expires_at = claim
                .meta
                .get("expires_at")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc));

            match expires_at {
                Some(expires_at) if now <= expires_at => {
                    if OrderEventLog::mark_claim_code_used(&txn, claim.id).await? {
                        let completed = self
                            .finish_completion(&txn, order, actor, VerificationMethod::ClaimCode, now)
                            .await?;
                        txn.commit().await?;
                        log::info!("Order {order_id} completed with claim code");
                        return Ok(PickupOutcome::Completed {
                            order: completed,
                            via: VerificationMethod::ClaimCode,
                        });
                    }
                }
                _ => {
                    // the same digits may still be the live pickup code
                    let pickup_match = order.pickup_code_attempts < self.config.max_attempts
                        && order
                            .pickup_code_encrypted
                            .as_deref()
                            .is_some_and(|ciphertext| self.codes.verify(ciphertext, code));
                    if !pickup_match {
                        log::info!("Order {order_id}: expired claim code presented");
                        return Ok(PickupOutcome::ClaimCodeExpired);
                    }
                }
            }
        }

        let max_attempts = self.config.max_attempts;
        if order.pickup_code_attempts >= max_attempts {
            return Err(AppError::AttemptsExceeded { order_id });
        }

        let attempt = order.pickup_code_attempts + 1;
        orders::Entity::update_many()
            .col_expr(
                orders::Column::PickupCodeAttempts,
                Expr::col(orders::Column::PickupCodeAttempts).add(1),
            )
            .col_expr(orders::Column::UpdatedAt, Expr::value(now))
            .filter(orders::Column::Id.eq(order_id))
            .exec(&txn)
            .await?;
        OrderEventLog::record(
            &txn,
            order_id,
            OrderEventType::CodeAttempt,
            json!({ "attempt": attempt, "max_attempts": max_attempts }),
            now,
        )
        .await;

        let matched = order
            .pickup_code_encrypted
            .as_deref()
            .is_some_and(|ciphertext| self.codes.verify(ciphertext, code));
        if !matched {
            txn.commit().await?;
            let attempts_remaining = (max_attempts - attempt).max(0);
            log::warn!("Order {order_id}: wrong pickup code, {attempts_remaining} attempts left");
            return Ok(PickupOutcome::WrongCode { attempts_remaining });
        }

        let completed = self
            .finish_completion(&txn, order, actor, VerificationMethod::PickupCode, now)
            .await?;
        txn.commit().await?;
        log::info!("Order {order_id} completed with pickup code");

        Ok(PickupOutcome::Completed {
            order: completed,
            via: VerificationMethod::PickupCode,
        })
    }

    pub async fn cancel_by_customer(
        &self,
        order_id: i32,
        customer_id: i32,
        reason: Option<String>,
    ) -> AppResult<orders::Model> {
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self.cancel(
            order_id,
            Actor::Customer(customer_id),
            OrderStatus::CancelledByCustomer,
            CancelledBy::Customer,
            reason,
        )
        .await
    }

    /// Also used by the pending-order sweep with a system-attributed reason.
    pub async fn cancel_by_restaurant(
        &self,
        order_id: i32,
        restaurant_id: i32,
        reason: &str,
    ) -> AppResult<orders::Model> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::ValidationError(
                "A cancellation reason is required".into(),
            ));
        }
        self.cancel(
            order_id,
            Actor::Restaurant(restaurant_id),
            OrderStatus::CancelledByRestaurant,
            CancelledBy::Restaurant,
            Some(reason.to_string()),
        )
        .await
    }

    /// Returns `Ok(false)` when the order is no longer expirable.
    pub async fn expire(&self, order_id: i32) -> AppResult<bool> {
        let now = self.clock.now();
        let txn = self.pool.begin().await?;

        let order = Self::load_locked(&txn, order_id).await?;
        if !order.status.can_transition_to(OrderStatus::Expired) {
            return Ok(false);
        }

        let previous = order.status;
        let mut active: orders::ActiveModel = order.into();
        active.status = Set(OrderStatus::Expired);
        active.expired_at = Set(Some(now));
        active.cancelled_by = Set(Some(CancelledBy::System));
        active.cancel_reason = Set(Some(EXPIRED_REASON.to_string()));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        OrderEventLog::record(
            &txn,
            order_id,
            OrderEventType::Expired,
            json!({ "previous_status": previous, "reason": EXPIRED_REASON }),
            now,
        )
        .await;

        txn.commit().await?;
        log::info!("Order {order_id} expired (was {previous})");
        Ok(true)
    }

    /// Short-lived single-use code the customer can show instead of the pickup code.
    pub async fn issue_claim_code(&self, order_id: i32, customer_id: i32) -> AppResult<ClaimCode> {
        let now = self.clock.now();
        let txn = self.pool.begin().await?;

        let order = Self::load_locked(&txn, order_id).await?;
        Actor::Customer(customer_id).authorize(&order)?;
        Self::ensure_code_outstanding(&order, "issue a claim code")?;

        let code = self.codes.generate();
        let expires_at = now + Duration::seconds(self.config.claim_code_ttl_seconds);
        OrderEventLog::append(
            &txn,
            order_id,
            OrderEventType::ClaimCodeGenerated,
            json!({
                "code_hash": PickupCodeGenerator::hash(&code),
                "expires_at": expires_at.to_rfc3339(),
            }),
            now,
        )
        .await?;

        txn.commit().await?;
        log::info!("Order {order_id}: claim code issued, valid until {expires_at}");
        Ok(ClaimCode { code, expires_at })
    }

    /// 重新发送取件码，受冷却时间限制
    pub async fn resend_pickup_code(&self, order_id: i32, customer_id: i32) -> AppResult<bool> {
        let now = self.clock.now();
        let order = self.get_order(order_id).await?;
        Actor::Customer(customer_id).authorize(&order)?;
        Self::ensure_code_outstanding(&order, "resend the pickup code")?;

        if let Some(last_sent) = order.pickup_code_last_sent_at {
            let next_allowed = last_sent + Duration::seconds(self.config.resend_cooldown_seconds);
            if next_allowed > now {
                return Err(AppError::ResendTooSoon {
                    retry_after_secs: (next_allowed - now).num_seconds().max(1),
                });
            }
        }

        let code = self.stored_code(&order).ok_or_else(|| {
            AppError::InternalError(format!("Order {order_id}: stored pickup code unreadable"))
        })?;
        Ok(self
            .notifier
            .dispatch_pickup_code(&order, &code, DispatchTrigger::Resend)
            .await)
    }

    /// Put the ordered quantities back on the meals. At most once per order.
    pub async fn restock(&self, order_id: i32) -> AppResult<bool> {
        let now = self.clock.now();
        let txn = self.pool.begin().await?;

        let claimed = orders::Entity::update_many()
            .col_expr(orders::Column::RestockedAt, Expr::value(Some(now)))
            .filter(orders::Column::Id.eq(order_id))
            .filter(orders::Column::RestockedAt.is_null())
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            return Ok(false);
        }

        let items = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        for item in &items {
            meals::Entity::update_many()
                .col_expr(
                    meals::Column::QuantityAvailable,
                    Expr::col(meals::Column::QuantityAvailable).add(item.quantity),
                )
                .filter(meals::Column::Id.eq(item.meal_id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        log::debug!("Order {order_id}: restocked {} items", items.len());
        Ok(true)
    }

    async fn cancel(
        &self,
        order_id: i32,
        actor: Actor,
        target: OrderStatus,
        cancelled_by: CancelledBy,
        reason: Option<String>,
    ) -> AppResult<orders::Model> {
        let now = self.clock.now();
        let txn = self.pool.begin().await?;

        let order = Self::transition(&txn, order_id, actor, target, "cancel").await?;

        let previous = order.status;
        let mut active: orders::ActiveModel = order.into();
        active.status = Set(target);
        active.cancelled_by = Set(Some(cancelled_by));
        active.cancel_reason = Set(reason.clone());
        active.cancelled_at = Set(Some(now));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        OrderEventLog::record(
            &txn,
            order_id,
            OrderEventType::Cancelled,
            json!({
                "previous_status": previous,
                "cancelled_by": cancelled_by,
                "reason": reason,
            }),
            now,
        )
        .await;

        txn.commit().await?;
        log::info!("Order {order_id} cancelled by {cancelled_by} (was {previous})");
        Ok(updated)
    }

    async fn finish_completion(
        &self,
        txn: &DatabaseTransaction,
        order: orders::Model,
        actor: Actor,
        via: VerificationMethod,
        now: DateTime<Utc>,
    ) -> AppResult<orders::Model> {
        let restaurant = restaurants::Entity::find_by_id(order.restaurant_id)
            .one(txn)
            .await?;
        let rate_bp = self.commission.rate_bp_for(restaurant.as_ref())?;
        let amount = commission_cents(order.total_amount, rate_bp)?;

        let from = order.status;
        let mut active: orders::ActiveModel = order.into();
        active.status = Set(OrderStatus::Completed);
        active.completed_at = Set(Some(now));
        active.commission_rate_bp = Set(Some(rate_bp));
        active.commission_amount = Set(Some(amount));
        active.updated_at = Set(now);
        let completed = active.update(txn).await?;

        OrderEventLog::record(
            txn,
            completed.id,
            OrderEventType::CodeVerified,
            json!({ "method": via }),
            now,
        )
        .await;
        Self::record_status_change(txn, &completed, from, actor, now).await;
        Ok(completed)
    }

    async fn record_status_change(
        txn: &DatabaseTransaction,
        order: &orders::Model,
        from: OrderStatus,
        actor: Actor,
        now: DateTime<Utc>,
    ) {
        OrderEventLog::record(
            txn,
            order.id,
            OrderEventType::StatusChanged,
            json!({ "from": from, "to": order.status, "actor": actor.as_str() }),
            now,
        )
        .await;
    }

    /// Lock the row, check ownership and that `target` is reachable from the locked status.
    async fn transition(
        txn: &DatabaseTransaction,
        order_id: i32,
        actor: Actor,
        target: OrderStatus,
        action: &'static str,
    ) -> AppResult<orders::Model> {
        let order = Self::load_locked(txn, order_id).await?;
        actor.authorize(&order)?;
        if !order.status.can_transition_to(target) {
            return Err(AppError::InvalidState {
                order_id,
                status: order.status,
                action,
            });
        }
        Ok(order)
    }

    async fn load_locked(txn: &DatabaseTransaction, order_id: i32) -> AppResult<orders::Model> {
        orders::Entity::find_by_id(order_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))
    }

    fn ensure_code_outstanding(order: &orders::Model, action: &'static str) -> AppResult<()> {
        if order.status.is_active() {
            Ok(())
        } else {
            Err(AppError::InvalidState {
                order_id: order.id,
                status: order.status,
                action,
            })
        }
    }

    fn stored_code(&self, order: &orders::Model) -> Option<String> {
        order
            .pickup_code_encrypted
            .as_deref()
            .and_then(|ciphertext| self.codes.decrypt(ciphertext))
    }

    async fn earliest_available_until(
        txn: &DatabaseTransaction,
        order_id: i32,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let meal_ids: Vec<i32> = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order_id))
            .all(txn)
            .await?
            .into_iter()
            .map(|item| item.meal_id)
            .collect();
        if meal_ids.is_empty() {
            return Ok(None);
        }

        Ok(meals::Entity::find()
            .filter(meals::Column::Id.is_in(meal_ids))
            .all(txn)
            .await?
            .into_iter()
            .filter_map(|meal| meal.available_until)
            .min())
    }
}
