use actix_web::{HttpResponse, web};
use utoipa::OpenApi;

use crate::entities::{CancelledBy, InvoiceStatus, OrderEventType, OrderStatus, PaymentMethod};
use crate::handlers;
use crate::models::*;
use crate::services::{ExpiryStats, InvoiceBatchSummary, InvoiceFailure, VerificationMethod};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::order::get_order,
        handlers::order::list_order_events,
        handlers::order::accept_order,
        handlers::order::mark_ready,
        handlers::order::complete_order,
        handlers::order::issue_claim_code,
        handlers::order::resend_code,
        handlers::order::cancel_by_customer,
        handlers::order::cancel_by_restaurant,
        handlers::admin::run_expiry,
        handlers::admin::run_auto_cancel,
        handlers::admin::expiry_stats,
        handlers::admin::generate_invoices,
        handlers::admin::get_invoice,
        handlers::admin::update_invoice_status,
    ),
    components(
        schemas(
            OrderStatus,
            PaymentMethod,
            CancelledBy,
            OrderEventType,
            InvoiceStatus,
            VerificationMethod,
            AcceptOrderRequest,
            RestaurantActionRequest,
            CustomerActionRequest,
            CompleteOrderRequest,
            CancelByCustomerRequest,
            CancelByRestaurantRequest,
            OrderResponse,
            PickupResult,
            CompleteOrderResponse,
            ClaimCodeResponse,
            ResendCodeResponse,
            OrderEventResponse,
            SweepResponse,
            GenerateInvoicesRequest,
            ExpiryStats,
            InvoiceBatchSummary,
            InvoiceFailure,
            ApiError,
            ErrorResponse,
        )
    ),
    tags(
        (name = "order", description = "Order lifecycle and pickup verification API"),
        (name = "admin", description = "Expiry sweeps and restaurant invoicing API"),
    ),
    info(
        title = "Rescue Meals Backend API",
        version = "1.0.0",
        description = "Order lifecycle, pickup-code verification and commission invoicing"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/api-docs/openapi.json", web::get().to(openapi_json));
}
