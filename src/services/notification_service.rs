use crate::entities::{OrderEventType, order_entity as orders};
use crate::error::{AppError, AppResult};
use crate::services::OrderEventLog;
use crate::utils::{Clock, PickupCodeGenerator};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::json;
use std::sync::Arc;

/// A way of getting a pickup code into the customer's hands.
#[async_trait]
pub trait PickupCodeChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, order: &orders::Model, code: &str) -> AppResult<()>;
}

/// 未配置短信通道时使用：只记录脱敏后的取件码
pub struct LogOnlyChannel;

#[async_trait]
impl PickupCodeChannel for LogOnlyChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, order: &orders::Model, code: &str) -> AppResult<()> {
        log::info!(
            "Pickup code for order {} (customer {}): {}",
            order.id,
            order.customer_id,
            PickupCodeGenerator::mask(code)
        );
        Ok(())
    }
}

/// Why a code is being (re)sent; recorded on the `sms_sent` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchTrigger {
    Accepted,
    ReadyForPickup,
    Resend,
}

impl DispatchTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            DispatchTrigger::Accepted => "accepted",
            DispatchTrigger::ReadyForPickup => "ready_for_pickup",
            DispatchTrigger::Resend => "resend",
        }
    }
}

/// Fire-and-forget delivery of pickup codes.
///
/// Delivery failures never reach the caller of the state transition: they are
/// logged and recorded as an `sms_sent` event with `delivered = false`.
#[derive(Clone)]
pub struct NotificationDispatcher {
    pool: DatabaseConnection,
    channel: Arc<dyn PickupCodeChannel>,
    clock: Arc<dyn Clock>,
}

impl NotificationDispatcher {
    pub fn new(
        pool: DatabaseConnection,
        channel: Arc<dyn PickupCodeChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            channel,
            clock,
        }
    }

    pub async fn dispatch_pickup_code(
        &self,
        order: &orders::Model,
        code: &str,
        trigger: DispatchTrigger,
    ) -> bool {
        let now = self.clock.now();
        let result = self.channel.deliver(order, code).await;

        let error = match &result {
            Ok(()) => None,
            Err(e) => {
                log::error!(
                    "Failed to deliver pickup code for order {} via {}: {e}",
                    order.id,
                    self.channel.name()
                );
                Some(e.to_string())
            }
        };
        let delivered = error.is_none();

        if delivered {
            if let Err(e) = self.touch_last_sent(order.id, now).await {
                log::warn!("Order {}: failed to update pickup_code_last_sent_at: {e}", order.id);
            }
        }

        OrderEventLog::record(
            &self.pool,
            order.id,
            OrderEventType::SmsSent,
            json!({
                "channel": self.channel.name(),
                "trigger": trigger.as_str(),
                "delivered": delivered,
                "error": error,
                "code_masked": PickupCodeGenerator::mask(code),
            }),
            now,
        )
        .await;

        delivered
    }

    /// Record a dispatch that could not be attempted because no code was readable.
    pub async fn record_undeliverable(
        &self,
        order: &orders::Model,
        trigger: DispatchTrigger,
        reason: &str,
    ) {
        log::error!("Pickup code for order {} not sent: {reason}", order.id);
        OrderEventLog::record(
            &self.pool,
            order.id,
            OrderEventType::SmsSent,
            json!({
                "channel": self.channel.name(),
                "trigger": trigger.as_str(),
                "delivered": false,
                "error": reason,
            }),
            self.clock.now(),
        )
        .await;
    }

    async fn touch_last_sent(
        &self,
        order_id: i32,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError> {
        orders::Entity::update_many()
            .set(orders::ActiveModel {
                pickup_code_last_sent_at: Set(Some(at)),
                ..Default::default()
            })
            .filter(orders::Column::Id.eq(order_id))
            .exec(&self.pool)
            .await?;
        Ok(())
    }
}
