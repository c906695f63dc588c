//! Background scheduled tasks for the application.
//!
//! Expiry of overdue orders, auto-cancellation of stale pending orders and
//! the weekly invoice run. Call `spawn_all` once during startup.

use crate::config::SchedulerConfig;
use crate::services::{ExpiryService, InvoiceService};
use std::time::Duration;

/// Spawn all background tasks.
///
/// Every job is safe to re-run: expiry and cancellation re-select their
/// candidates each tick and invoicing only picks orders not yet invoiced.
pub fn spawn_all(
    expiry_service: ExpiryService,
    invoice_service: InvoiceService,
    config: &SchedulerConfig,
) {
    let expiry_interval = Duration::from_secs(config.expiry_interval_seconds.max(1));
    let invoice_interval = Duration::from_secs(config.invoice_interval_seconds.max(1));

    // 过期订单与超时待接单订单
    {
        let svc = expiry_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.expire_overdue().await {
                    Ok(n) if n > 0 => log::info!("Overdue orders expired: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to expire overdue orders: {e:?}"),
                }
                match svc.auto_cancel_pending().await {
                    Ok(n) if n > 0 => log::info!("Stale pending orders cancelled: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to auto-cancel pending orders: {e:?}"),
                }
                tokio::time::sleep(expiry_interval).await;
            }
        });
    }

    // 上周账单（重复执行不会重复开票）
    {
        let svc = invoice_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.generate_previous_week_invoices().await {
                    Ok(summary) if !summary.errors.is_empty() => log::warn!(
                        "Invoice run finished with {} failed restaurants",
                        summary.errors.len()
                    ),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to generate weekly invoices: {e:?}"),
                }
                tokio::time::sleep(invoice_interval).await;
            }
        });
    }
}
