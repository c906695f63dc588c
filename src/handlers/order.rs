use crate::models::*;
use crate::services::OrderService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "order",
    params(("id" = i32, Path, description = "订单ID")),
    responses(
        (status = 200, description = "订单详情", body = OrderResponse),
        (status = 404, description = "订单不存在", body = ErrorResponse)
    )
)]
pub async fn get_order(
    order_service: web::Data<OrderService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match order_service.get_order(path.into_inner()).await {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": OrderResponse::from(order)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders/{id}/events",
    tag = "order",
    params(("id" = i32, Path, description = "订单ID")),
    responses(
        (status = 200, description = "订单事件（按时间升序）", body = [OrderEventResponse]),
        (status = 404, description = "订单不存在", body = ErrorResponse)
    )
)]
pub async fn list_order_events(
    order_service: web::Data<OrderService>,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    match order_service.list_events(path.into_inner()).await {
        Ok(events) => {
            let data: Vec<OrderEventResponse> = events.into_iter().map(Into::into).collect();
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": data
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/accept",
    tag = "order",
    params(("id" = i32, Path, description = "订单ID")),
    request_body = AcceptOrderRequest,
    responses(
        (status = 200, description = "已接单", body = OrderResponse),
        (status = 400, description = "取餐窗口不合法", body = ErrorResponse),
        (status = 403, description = "不是该餐厅的订单", body = ErrorResponse),
        (status = 409, description = "订单状态不允许接单", body = ErrorResponse)
    )
)]
pub async fn accept_order(
    order_service: web::Data<OrderService>,
    path: web::Path<i32>,
    req: web::Json<AcceptOrderRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    match order_service
        .accept(
            path.into_inner(),
            req.restaurant_id,
            req.pickup_window_start,
            req.pickup_window_end,
        )
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": OrderResponse::from(order)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/ready",
    tag = "order",
    params(("id" = i32, Path, description = "订单ID")),
    request_body = RestaurantActionRequest,
    responses(
        (status = 200, description = "可取餐", body = OrderResponse),
        (status = 409, description = "订单状态不允许", body = ErrorResponse)
    )
)]
pub async fn mark_ready(
    order_service: web::Data<OrderService>,
    path: web::Path<i32>,
    req: web::Json<RestaurantActionRequest>,
) -> Result<HttpResponse> {
    match order_service
        .mark_ready(path.into_inner(), req.restaurant_id)
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": OrderResponse::from(order)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/complete",
    tag = "order",
    params(("id" = i32, Path, description = "订单ID")),
    request_body = CompleteOrderRequest,
    responses(
        (status = 200, description = "核销结果（取件码错误时 result = wrong_code）", body = CompleteOrderResponse),
        (status = 409, description = "订单未处于可取餐状态", body = ErrorResponse),
        (status = 429, description = "尝试次数已用尽", body = ErrorResponse)
    )
)]
pub async fn complete_order(
    order_service: web::Data<OrderService>,
    path: web::Path<i32>,
    req: web::Json<CompleteOrderRequest>,
) -> Result<HttpResponse> {
    match order_service
        .complete_with_code(path.into_inner(), &req.code, req.restaurant_id)
        .await
    {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": CompleteOrderResponse::from(outcome)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/claim-code",
    tag = "order",
    params(("id" = i32, Path, description = "订单ID")),
    request_body = CustomerActionRequest,
    responses(
        (status = 200, description = "临时领取码", body = ClaimCodeResponse),
        (status = 409, description = "订单状态不允许", body = ErrorResponse)
    )
)]
pub async fn issue_claim_code(
    order_service: web::Data<OrderService>,
    path: web::Path<i32>,
    req: web::Json<CustomerActionRequest>,
) -> Result<HttpResponse> {
    match order_service
        .issue_claim_code(path.into_inner(), req.customer_id)
        .await
    {
        Ok(claim) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": ClaimCodeResponse::from(claim)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/resend-code",
    tag = "order",
    params(("id" = i32, Path, description = "订单ID")),
    request_body = CustomerActionRequest,
    responses(
        (status = 200, description = "已重新发送", body = ResendCodeResponse),
        (status = 429, description = "发送过于频繁", body = ErrorResponse)
    )
)]
pub async fn resend_code(
    order_service: web::Data<OrderService>,
    path: web::Path<i32>,
    req: web::Json<CustomerActionRequest>,
) -> Result<HttpResponse> {
    match order_service
        .resend_pickup_code(path.into_inner(), req.customer_id)
        .await
    {
        Ok(delivered) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": ResendCodeResponse { delivered }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/cancel/customer",
    tag = "order",
    params(("id" = i32, Path, description = "订单ID")),
    request_body = CancelByCustomerRequest,
    responses(
        (status = 200, description = "已取消", body = OrderResponse),
        (status = 409, description = "订单状态不允许取消", body = ErrorResponse)
    )
)]
pub async fn cancel_by_customer(
    order_service: web::Data<OrderService>,
    path: web::Path<i32>,
    req: web::Json<CancelByCustomerRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    match order_service
        .cancel_by_customer(path.into_inner(), req.customer_id, req.reason)
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": OrderResponse::from(order)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/cancel/restaurant",
    tag = "order",
    params(("id" = i32, Path, description = "订单ID")),
    request_body = CancelByRestaurantRequest,
    responses(
        (status = 200, description = "已取消", body = OrderResponse),
        (status = 400, description = "缺少取消原因", body = ErrorResponse),
        (status = 409, description = "订单状态不允许取消", body = ErrorResponse)
    )
)]
pub async fn cancel_by_restaurant(
    order_service: web::Data<OrderService>,
    path: web::Path<i32>,
    req: web::Json<CancelByRestaurantRequest>,
) -> Result<HttpResponse> {
    match order_service
        .cancel_by_restaurant(path.into_inner(), req.restaurant_id, &req.reason)
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": OrderResponse::from(order)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn order_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/events", web::get().to(list_order_events))
            .route("/{id}/accept", web::post().to(accept_order))
            .route("/{id}/ready", web::post().to(mark_ready))
            .route("/{id}/complete", web::post().to(complete_order))
            .route("/{id}/claim-code", web::post().to(issue_claim_code))
            .route("/{id}/resend-code", web::post().to(resend_code))
            .route("/{id}/cancel/customer", web::post().to(cancel_by_customer))
            .route("/{id}/cancel/restaurant", web::post().to(cancel_by_restaurant)),
    );
}
