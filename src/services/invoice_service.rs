use crate::entities::{
    InvoiceStatus, OrderStatus, PaymentMethod, invoice_entity as invoices,
    invoice_item_entity as invoice_items, order_entity as orders,
    restaurant_entity as restaurants,
};
use crate::error::{AppError, AppResult};
use crate::services::commission::{CommissionEngine, commission_cents};
use crate::utils::Clock;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GeneratedInvoice {
    #[schema(value_type = Object)]
    pub invoice: invoices::Model,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<invoice_items::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceFailure {
    pub restaurant_id: i32,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct InvoiceBatchSummary {
    pub restaurants_processed: u32,
    pub invoices_created: u32,
    pub orders_invoiced: u64,
    pub errors: Vec<InvoiceFailure>,
}

/// Most frequent rate; ties go to the higher rate.
pub fn mode_rate_bp(rates: &[i32]) -> Option<i32> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for rate in rates {
        *counts.entry(*rate).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(rate, count)| (*count, *rate))
        .map(|(rate, _)| rate)
}

/// 某时刻所在自然周（UTC）的周一 00:00:00
pub fn week_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let day = at.date_naive();
    let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
    monday.and_time(NaiveTime::MIN).and_utc()
}

/// 上一个完整自然周（UTC），半开区间 [上周一 00:00, 本周一 00:00)
pub fn previous_week_period(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = week_start(now);
    (end - Duration::days(7), end)
}

/// Completed cash-on-pickup orders no invoice has claimed yet.
fn unbilled() -> Condition {
    Condition::all()
        .add(orders::Column::Status.eq(OrderStatus::Completed))
        .add(orders::Column::PaymentMethod.eq(PaymentMethod::CashOnPickup))
        .add(orders::Column::InvoicedAt.is_null())
}

impl InvoiceBatchSummary {
    fn merge(&mut self, other: InvoiceBatchSummary) {
        self.restaurants_processed += other.restaurants_processed;
        self.invoices_created += other.invoices_created;
        self.orders_invoiced += other.orders_invoiced;
        self.errors.extend(other.errors);
    }
}

#[derive(Clone)]
pub struct InvoiceService {
    pool: DatabaseConnection,
    commission: CommissionEngine,
    clock: Arc<dyn Clock>,
}

impl InvoiceService {
    pub fn new(pool: DatabaseConnection, commission: CommissionEngine, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            commission,
            clock,
        }
    }

    /// Bill every completed cash-on-pickup order with `completed_at` in
    /// `[period_start, period_end)` that no invoice has claimed yet. `Ok(None)`
    /// when there is nothing to bill or a concurrent run claimed the orders first.
    pub async fn generate_invoice_for_restaurant(
        &self,
        restaurant: &restaurants::Model,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> AppResult<Option<GeneratedInvoice>> {
        if period_end <= period_start {
            return Err(AppError::ValidationError(
                "Invoice period end must be after its start".into(),
            ));
        }

        let now = self.clock.now();
        let txn = self.pool.begin().await?;

        let billable = orders::Entity::find()
            .filter(unbilled())
            .filter(orders::Column::RestaurantId.eq(restaurant.id))
            .filter(orders::Column::CompletedAt.gte(period_start))
            .filter(orders::Column::CompletedAt.lt(period_end))
            .order_by_asc(orders::Column::CompletedAt)
            .order_by_asc(orders::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await?;
        if billable.is_empty() {
            return Ok(None);
        }

        let order_ids: Vec<i32> = billable.iter().map(|o| o.id).collect();
        let claimed = orders::Entity::update_many()
            .col_expr(orders::Column::InvoicedAt, Expr::value(Some(now)))
            .filter(orders::Column::Id.is_in(order_ids.clone()))
            .filter(orders::Column::InvoicedAt.is_null())
            .exec(&txn)
            .await?;
        if claimed.rows_affected < order_ids.len() as u64 {
            log::warn!(
                "Restaurant {}: {} of {} orders already invoiced by a concurrent run",
                restaurant.id,
                order_ids.len() as u64 - claimed.rows_affected,
                order_ids.len()
            );
            txn.rollback().await?;
            return Ok(None);
        }

        // 优先使用完成时快照的费率与佣金
        let fallback_rate_bp = self.commission.rate_bp_for(Some(restaurant))?;
        let mut lines = Vec::with_capacity(billable.len());
        for order in &billable {
            let (rate_bp, amount) = match (order.commission_rate_bp, order.commission_amount) {
                (Some(rate_bp), Some(amount)) => (rate_bp, amount),
                (Some(rate_bp), None) => (rate_bp, commission_cents(order.total_amount, rate_bp)?),
                _ => (
                    fallback_rate_bp,
                    commission_cents(order.total_amount, fallback_rate_bp)?,
                ),
            };
            lines.push((order, rate_bp, amount));
        }

        let subtotal_sales: i64 = lines.iter().map(|(o, _, _)| o.total_amount).sum();
        let commission_total: i64 = lines.iter().map(|(_, _, amount)| *amount).sum();
        let rates: Vec<i32> = lines.iter().map(|(_, rate, _)| *rate).collect();
        let invoice_rate_bp = mode_rate_bp(&rates).unwrap_or(fallback_rate_bp);

        let invoice = invoices::ActiveModel {
            restaurant_id: Set(restaurant.id),
            period_start: Set(period_start),
            period_end: Set(period_end),
            status: Set(InvoiceStatus::Draft),
            subtotal_sales: Set(subtotal_sales),
            commission_rate_bp: Set(invoice_rate_bp),
            commission_total: Set(commission_total),
            orders_count: Set(lines.len() as i32),
            sent_at: Set(None),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (order, rate_bp, amount) in lines {
            let item = invoice_items::ActiveModel {
                invoice_id: Set(invoice.id),
                order_id: Set(order.id),
                order_total: Set(order.total_amount),
                commission_rate_bp: Set(rate_bp),
                commission_amount: Set(amount),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;
        log::info!(
            "Invoice {} created for restaurant {}: {} orders, sales {} cents, commission {} cents",
            invoice.id,
            restaurant.id,
            invoice.orders_count,
            subtotal_sales,
            commission_total
        );

        Ok(Some(GeneratedInvoice { invoice, items }))
    }

    pub async fn generate_weekly_invoices(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> AppResult<InvoiceBatchSummary> {
        let restaurants = restaurants::Entity::find()
            .filter(restaurants::Column::IsActive.eq(true))
            .order_by_asc(restaurants::Column::Id)
            .all(&self.pool)
            .await?;

        let mut summary = InvoiceBatchSummary::default();
        for restaurant in &restaurants {
            summary.restaurants_processed += 1;
            match self
                .generate_invoice_for_restaurant(restaurant, period_start, period_end)
                .await
            {
                Ok(Some(generated)) => {
                    summary.invoices_created += 1;
                    summary.orders_invoiced += generated.items.len() as u64;
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("Failed to invoice restaurant {}: {e}", restaurant.id);
                    summary.errors.push(InvoiceFailure {
                        restaurant_id: restaurant.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        log::info!(
            "Invoice run {period_start} ~ {period_end}: {} restaurants, {} invoices, {} orders, {} errors",
            summary.restaurants_processed,
            summary.invoices_created,
            summary.orders_invoiced,
            summary.errors.len()
        );
        Ok(summary)
    }

    /// Invoice the previous calendar week. Older weeks that still hold unbilled
    /// orders (the runner was down) are invoiced first, one week at a time.
    pub async fn generate_previous_week_invoices(&self) -> AppResult<InvoiceBatchSummary> {
        let (last_start, last_end) = previous_week_period(self.clock.now());
        let mut week = match self.oldest_unbilled_before(last_start).await? {
            Some(completed_at) => week_start(completed_at),
            None => last_start,
        };

        let mut summary = InvoiceBatchSummary::default();
        while week < last_end {
            let next = week + Duration::days(7);
            summary.merge(self.generate_weekly_invoices(week, next).await?);
            week = next;
        }
        Ok(summary)
    }

    async fn oldest_unbilled_before(
        &self,
        before: DateTime<Utc>,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let active: Vec<i32> = restaurants::Entity::find()
            .filter(restaurants::Column::IsActive.eq(true))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        if active.is_empty() {
            return Ok(None);
        }

        let oldest = orders::Entity::find()
            .filter(unbilled())
            .filter(orders::Column::RestaurantId.is_in(active))
            .filter(orders::Column::CompletedAt.lt(before))
            .order_by_asc(orders::Column::CompletedAt)
            .one(&self.pool)
            .await?;
        if let Some(order) = &oldest {
            log::warn!(
                "Unbilled order {} completed before {before}, catching up from its week",
                order.id
            );
        }
        Ok(oldest.and_then(|o| o.completed_at))
    }

    pub async fn get_invoice(&self, invoice_id: i32) -> AppResult<GeneratedInvoice> {
        let invoice = invoices::Entity::find_by_id(invoice_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {invoice_id} not found")))?;
        let items = invoice_items::Entity::find()
            .filter(invoice_items::Column::InvoiceId.eq(invoice_id))
            .order_by_asc(invoice_items::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(GeneratedInvoice { invoice, items })
    }

    pub async fn mark_invoice_sent(&self, invoice_id: i32) -> AppResult<invoices::Model> {
        self.transition_invoice(invoice_id, InvoiceStatus::Sent, "mark sent")
            .await
    }

    pub async fn mark_invoice_paid(&self, invoice_id: i32) -> AppResult<invoices::Model> {
        self.transition_invoice(invoice_id, InvoiceStatus::Paid, "mark paid")
            .await
    }

    pub async fn mark_invoice_overdue(&self, invoice_id: i32) -> AppResult<invoices::Model> {
        self.transition_invoice(invoice_id, InvoiceStatus::Overdue, "mark overdue")
            .await
    }

    async fn transition_invoice(
        &self,
        invoice_id: i32,
        target: InvoiceStatus,
        action: &'static str,
    ) -> AppResult<invoices::Model> {
        let now = self.clock.now();
        let txn = self.pool.begin().await?;

        let invoice = invoices::Entity::find_by_id(invoice_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {invoice_id} not found")))?;
        if !invoice.status.can_transition_to(target) {
            return Err(AppError::InvalidInvoiceState {
                invoice_id,
                status: invoice.status,
                action,
            });
        }

        let mut active: invoices::ActiveModel = invoice.into();
        active.status = Set(target);
        match target {
            InvoiceStatus::Sent => active.sent_at = Set(Some(now)),
            InvoiceStatus::Paid => active.paid_at = Set(Some(now)),
            _ => {}
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        log::info!("Invoice {invoice_id} is now {target}");
        Ok(updated)
    }
}
