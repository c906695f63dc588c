use crate::error::AppError;
use crate::models::*;
use crate::services::{ExpiryService, ExpiryStats, InvoiceBatchSummary, InvoiceService};
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/admin/expiry/run",
    tag = "admin",
    responses(
        (status = 200, description = "过期订单处理完成", body = SweepResponse),
        (status = 500, description = "处理失败", body = ErrorResponse)
    )
)]
pub async fn run_expiry(expiry_service: web::Data<ExpiryService>) -> Result<HttpResponse> {
    match expiry_service.expire_overdue().await {
        Ok(count) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": SweepResponse { processed_count: count },
            "message": "Overdue orders expired"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/expiry/auto-cancel",
    tag = "admin",
    responses(
        (status = 200, description = "超时待接单订单已取消", body = SweepResponse),
        (status = 500, description = "处理失败", body = ErrorResponse)
    )
)]
pub async fn run_auto_cancel(expiry_service: web::Data<ExpiryService>) -> Result<HttpResponse> {
    match expiry_service.auto_cancel_pending().await {
        Ok(count) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": SweepResponse { processed_count: count },
            "message": "Stale pending orders cancelled"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/expiry/stats",
    tag = "admin",
    responses((status = 200, description = "过期统计", body = ExpiryStats))
)]
pub async fn expiry_stats(expiry_service: web::Data<ExpiryService>) -> Result<HttpResponse> {
    match expiry_service.get_expiry_stats().await {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": stats
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/invoices/generate",
    tag = "admin",
    request_body(content = GenerateInvoicesRequest, description = "结算周期，缺省为上一自然周"),
    responses(
        (status = 200, description = "账单生成汇总", body = InvoiceBatchSummary),
        (status = 400, description = "结算周期不合法", body = ErrorResponse)
    )
)]
pub async fn generate_invoices(
    invoice_service: web::Data<InvoiceService>,
    req: Option<web::Json<GenerateInvoicesRequest>>,
) -> Result<HttpResponse> {
    let req = req.map(|r| r.into_inner()).unwrap_or_default();
    let result = match (req.period_start, req.period_end) {
        (Some(start), Some(end)) => invoice_service.generate_weekly_invoices(start, end).await,
        (None, None) => invoice_service.generate_previous_week_invoices().await,
        _ => Err(AppError::ValidationError(
            "period_start and period_end must be given together".into(),
        )),
    };

    match result {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": summary
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/invoices/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "账单ID")),
    responses(
        (status = 200, description = "账单及明细"),
        (status = 404, description = "账单不存在", body = ErrorResponse)
    )
)]
pub async fn get_invoice(
    invoice_service: web::Data<InvoiceService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match invoice_service.get_invoice(path.into_inner()).await {
        Ok(invoice) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": invoice
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/invoices/{id}/{status}",
    tag = "admin",
    params(
        ("id" = i32, Path, description = "账单ID"),
        ("status" = String, Path, description = "sent | paid | overdue")
    ),
    responses(
        (status = 200, description = "账单状态已更新"),
        (status = 404, description = "账单不存在", body = ErrorResponse),
        (status = 409, description = "账单状态不允许", body = ErrorResponse)
    )
)]
pub async fn update_invoice_status(
    invoice_service: web::Data<InvoiceService>,
    path: web::Path<(i32, String)>,
) -> Result<HttpResponse> {
    let (invoice_id, status) = path.into_inner();
    let result = match status.as_str() {
        "sent" => invoice_service.mark_invoice_sent(invoice_id).await,
        "paid" => invoice_service.mark_invoice_paid(invoice_id).await,
        "overdue" => invoice_service.mark_invoice_overdue(invoice_id).await,
        other => Err(AppError::NotFound(format!("Unknown invoice status: {other}"))),
    };

    match result {
        Ok(invoice) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": invoice
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/expiry/run", web::post().to(run_expiry))
            .route("/expiry/auto-cancel", web::post().to(run_auto_cancel))
            .route("/expiry/stats", web::get().to(expiry_stats))
            .route("/invoices/generate", web::post().to(generate_invoices))
            .route("/invoices/{id}", web::get().to(get_invoice))
            .route("/invoices/{id}/{status}", web::post().to(update_invoice_status)),
    );
}
