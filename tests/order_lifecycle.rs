mod common;

use chrono::Duration;
use common::*;
use rescue_meals_backend::entities::{
    CancelledBy, OrderEventType, OrderStatus, order_entity as orders,
    order_item_entity as order_items,
};
use rescue_meals_backend::error::AppError;
use rescue_meals_backend::services::{PickupOutcome, VerificationMethod};
use rescue_meals_backend::utils::PickupCodeGenerator;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};

#[tokio::test]
async fn order_goes_from_pending_to_completed_with_the_delivered_code() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 2, t0() - Duration::minutes(5)).await;

    let accepted = h
        .orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();
    assert_eq!(accepted.status, OrderStatus::Accepted);
    assert_eq!(accepted.accepted_at, Some(t0()));
    assert_eq!(accepted.pickup_window_end, Some(t0() + Duration::minutes(45)));
    assert!(accepted.pickup_code_encrypted.is_some());

    h.clock.advance(Duration::minutes(10));
    let ready = h.orders.mark_ready(order.id, restaurant.id).await.unwrap();
    assert_eq!(ready.status, OrderStatus::ReadyForPickup);

    // accept and ready both deliver the same code
    let codes = h.channel.codes_for(order.id);
    assert_eq!(codes.len(), 2);
    assert_eq!(codes[0], codes[1]);
    assert_eq!(codes[0].len(), 6);
    assert_ne!(accepted.pickup_code_encrypted.as_deref(), Some(codes[0].as_str()));

    h.clock.advance(Duration::minutes(5));
    let outcome = h
        .orders
        .complete_with_code(order.id, &codes[0], restaurant.id)
        .await
        .unwrap();
    let PickupOutcome::Completed { order: completed, via } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(via, VerificationMethod::PickupCode);
    assert_eq!(completed.status, OrderStatus::Completed);
    assert_eq!(completed.completed_at, Some(t0() + Duration::minutes(15)));
    assert_eq!(completed.commission_rate_bp, Some(700));
    assert_eq!(completed.commission_amount, Some(70));

    assert_eq!(h.events_of(order.id, OrderEventType::CodeVerified).await.len(), 1);
    assert_eq!(h.events_of(order.id, OrderEventType::StatusChanged).await.len(), 2);
    assert_eq!(h.events_of(order.id, OrderEventType::CodeGenerated).await.len(), 1);
    assert_eq!(h.events_of(order.id, OrderEventType::SmsSent).await.len(), 2);
}

#[tokio::test]
async fn code_generated_event_only_carries_the_masked_code() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    h.orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();
    let code = h.channel.last_code(order.id);

    let generated = h.events_of(order.id, OrderEventType::CodeGenerated).await;
    let masked = generated[0].meta["code_masked"].as_str().unwrap();
    assert_eq!(masked.chars().count(), 6);
    assert!(masked.contains('•'));
    assert_ne!(masked, code);
    assert!(!generated[0].meta.to_string().contains(&code));
}

#[tokio::test]
async fn accepting_a_non_pending_order_changes_nothing() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    h.orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();
    let before = h.order(order.id).await;

    h.clock.advance(Duration::minutes(1));
    let err = h
        .orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::hours(2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidState {
            status: OrderStatus::Accepted,
            ..
        }
    ));
    assert_eq!(h.order(order.id).await, before);
    assert_eq!(h.events_of(order.id, OrderEventType::StatusChanged).await.len(), 1);
}

#[tokio::test]
async fn only_the_owning_restaurant_can_accept() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let other = seed_restaurant(&h.db, "Noodle Bar", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    let err = h
        .orders
        .accept(order.id, other.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert_eq!(h.order(order.id).await.status, OrderStatus::Pending);

    assert!(matches!(
        h.orders.accept(9999, restaurant.id, t0(), t0()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn pickup_window_is_validated() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    for (start, end) in [
        (t0(), t0()),
        (t0(), t0() - Duration::minutes(30)),
        (t0(), t0() + Duration::minutes(20)),
        (t0(), t0() + Duration::hours(25)),
    ] {
        let err = h
            .orders
            .accept(order.id, restaurant.id, start, end)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)), "{start} .. {end}");
    }

    let after = h.order(order.id).await;
    assert_eq!(after.status, OrderStatus::Pending);
    assert!(after.pickup_code_encrypted.is_none());
    assert!(h.channel.codes_for(order.id).is_empty());
}

#[tokio::test]
async fn short_window_is_allowed_when_meal_availability_caps_it() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let lasting = seed_meal(&h.db, restaurant.id, 500, 8, Some(t0() + Duration::hours(3))).await;
    let closing = seed_meal(&h.db, restaurant.id, 400, 3, Some(t0() + Duration::minutes(10))).await;
    let order = h.place_order(&lasting, 77, 1, t0()).await;
    order_items::ActiveModel {
        order_id: Set(order.id),
        meal_id: Set(closing.id),
        quantity: Set(1),
        price: Set(closing.price),
        original_price: Set(closing.original_price),
        ..Default::default()
    }
    .insert(&h.db)
    .await
    .unwrap();

    let accepted = h
        .orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(accepted.pickup_window_start, Some(t0()));
    assert_eq!(accepted.pickup_window_end, Some(t0() + Duration::minutes(10)));
}

#[tokio::test]
async fn window_is_rejected_when_meals_are_gone_before_it_starts() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, Some(t0() + Duration::minutes(10))).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    let err = h
        .orders
        .accept(
            order.id,
            restaurant.id,
            t0() + Duration::minutes(15),
            t0() + Duration::minutes(60),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn concurrent_mark_ready_has_exactly_one_winner() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    h.orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        h.orders.mark_ready(order.id, restaurant.id),
        h.orders.mark_ready(order.id, restaurant.id)
    );
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(AppError::InvalidState {
            status: OrderStatus::ReadyForPickup,
            ..
        })
    )));
    assert_eq!(h.order(order.id).await.status, OrderStatus::ReadyForPickup);
}

#[tokio::test]
async fn mark_ready_requires_an_accepted_order() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    let err = h.orders.mark_ready(order.id, restaurant.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidState {
            status: OrderStatus::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn wrong_codes_count_attempts_until_exhausted() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    let code = h.ready_order(&order).await;
    let bad = wrong_code(&code);
    let max = h.pickup.max_attempts;

    for attempt in 1..=max {
        let outcome = h
            .orders
            .complete_with_code(order.id, &bad, restaurant.id)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            PickupOutcome::WrongCode { attempts_remaining } if attempts_remaining == max - attempt
        ));
        assert_eq!(h.order(order.id).await.pickup_code_attempts, attempt);
    }

    // even the right code is refused once the budget is spent
    let err = h
        .orders
        .complete_with_code(order.id, &code, restaurant.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AttemptsExceeded { order_id } if order_id == order.id));

    let after = h.order(order.id).await;
    assert_eq!(after.status, OrderStatus::ReadyForPickup);
    assert_eq!(after.pickup_code_attempts, max);
    assert_eq!(
        h.events_of(order.id, OrderEventType::CodeAttempt).await.len(),
        max as usize
    );
}

#[tokio::test]
async fn completing_requires_ready_for_pickup() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    h.orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();
    let code = h.channel.last_code(order.id);

    let err = h
        .orders
        .complete_with_code(order.id, &code, restaurant.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidState {
            status: OrderStatus::Accepted,
            ..
        }
    ));
    assert_eq!(h.order(order.id).await.pickup_code_attempts, 0);
}

#[tokio::test]
async fn claim_code_completes_once_without_touching_attempts() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    h.ready_order(&order).await;

    let claim = h.orders.issue_claim_code(order.id, 77).await.unwrap();
    assert_eq!(claim.expires_at, t0() + Duration::seconds(300));
    let issued = h.events_of(order.id, OrderEventType::ClaimCodeGenerated).await;
    assert_eq!(issued.len(), 1);
    assert!(!issued[0].meta.to_string().contains(&claim.code));

    h.clock.advance(Duration::minutes(4));
    let outcome = h
        .orders
        .complete_with_code(order.id, &claim.code, restaurant.id)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PickupOutcome::Completed {
            via: VerificationMethod::ClaimCode,
            ..
        }
    ));

    let after = h.order(order.id).await;
    assert_eq!(after.status, OrderStatus::Completed);
    assert_eq!(after.pickup_code_attempts, 0);
    assert!(h.events_of(order.id, OrderEventType::ClaimCodeGenerated).await.is_empty());
    assert_eq!(h.events_of(order.id, OrderEventType::ClaimCodeUsed).await.len(), 1);
    assert!(h.events_of(order.id, OrderEventType::CodeAttempt).await.is_empty());

    let err = h
        .orders
        .complete_with_code(order.id, &claim.code, restaurant.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState { .. }));
}

#[tokio::test]
async fn expired_claim_code_is_reported_not_counted() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    let pickup_code = h.ready_order(&order).await;

    let claim = h.orders.issue_claim_code(order.id, 77).await.unwrap();
    h.clock.advance(Duration::seconds(301));

    let outcome = h
        .orders
        .complete_with_code(order.id, &claim.code, restaurant.id)
        .await
        .unwrap();
    assert!(matches!(outcome, PickupOutcome::ClaimCodeExpired));

    let after = h.order(order.id).await;
    assert_eq!(after.status, OrderStatus::ReadyForPickup);
    assert_eq!(after.pickup_code_attempts, 0);

    // the regular pickup code still works
    let outcome = h
        .orders
        .complete_with_code(order.id, &pickup_code, restaurant.id)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PickupOutcome::Completed {
            via: VerificationMethod::PickupCode,
            ..
        }
    ));
}

#[tokio::test]
async fn expired_claim_code_that_is_also_the_pickup_code_completes() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    h.ready_order(&order).await;

    let claim = h.orders.issue_claim_code(order.id, 77).await.unwrap();
    // the pickup code happens to carry the same digits
    let codes = PickupCodeGenerator::from_config(&h.pickup).unwrap();
    let mut active: orders::ActiveModel = h.order(order.id).await.into();
    active.pickup_code_encrypted = Set(Some(codes.encrypt(&claim.code).unwrap()));
    active.update(&h.db).await.unwrap();

    h.clock.advance(Duration::seconds(301));
    let outcome = h
        .orders
        .complete_with_code(order.id, &claim.code, restaurant.id)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PickupOutcome::Completed {
            via: VerificationMethod::PickupCode,
            ..
        }
    ));
    let after = h.order(order.id).await;
    assert_eq!(after.status, OrderStatus::Completed);
    assert_eq!(after.pickup_code_attempts, 1);
    assert!(h.events_of(order.id, OrderEventType::ClaimCodeUsed).await.is_empty());
}

#[tokio::test]
async fn claim_codes_belong_to_the_customer_of_an_active_order() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    assert!(matches!(
        h.orders.issue_claim_code(order.id, 77).await,
        Err(AppError::InvalidState { .. })
    ));
    h.ready_order(&order).await;
    assert!(matches!(
        h.orders.issue_claim_code(order.id, 78).await,
        Err(AppError::Forbidden)
    ));
}

#[tokio::test]
async fn customer_cancels_pending_order_with_reason() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    let cancelled = h
        .orders
        .cancel_by_customer(order.id, 77, Some("Plans changed".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::CancelledByCustomer);
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Customer));
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("Plans changed"));
    assert_eq!(cancelled.cancelled_at, Some(t0()));

    let events = h.events_of(order.id, OrderEventType::Cancelled).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].meta["previous_status"], "pending");
    assert_eq!(events[0].meta["cancelled_by"], "customer");
}

#[tokio::test]
async fn customer_cannot_cancel_once_ready() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    h.ready_order(&order).await;

    let err = h
        .orders
        .cancel_by_customer(order.id, 77, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidState {
            status: OrderStatus::ReadyForPickup,
            ..
        }
    ));
    assert!(matches!(
        h.orders.cancel_by_customer(order.id, 78, None).await,
        Err(AppError::Forbidden)
    ));
}

#[tokio::test]
async fn restaurant_cancels_ready_order_with_a_reason() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    h.ready_order(&order).await;

    assert!(matches!(
        h.orders.cancel_by_restaurant(order.id, restaurant.id, "  ").await,
        Err(AppError::ValidationError(_))
    ));

    let cancelled = h
        .orders
        .cancel_by_restaurant(order.id, restaurant.id, "Kitchen closed early")
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::CancelledByRestaurant);
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Restaurant));

    let events = h.events_of(order.id, OrderEventType::Cancelled).await;
    assert_eq!(events[0].meta["previous_status"], "ready_for_pickup");

    // terminal
    assert!(matches!(
        h.orders.cancel_by_restaurant(order.id, restaurant.id, "again").await,
        Err(AppError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn expire_is_a_no_op_outside_expirable_states() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    assert!(!h.orders.expire(order.id).await.unwrap());
    let pending = h.order(order.id).await;
    assert_eq!(pending.status, OrderStatus::Pending);
    assert!(pending.expired_at.is_none());

    h.orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();
    h.clock.advance(Duration::hours(1));
    assert!(h.orders.expire(order.id).await.unwrap());

    let expired = h.order(order.id).await;
    assert_eq!(expired.status, OrderStatus::Expired);
    assert_eq!(expired.cancelled_by, Some(CancelledBy::System));
    assert_eq!(expired.cancel_reason.as_deref(), Some("Pickup window expired"));
    assert_eq!(expired.expired_at, Some(t0() + Duration::hours(1)));

    assert!(!h.orders.expire(order.id).await.unwrap());
    let events = h.events_of(order.id, OrderEventType::Expired).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].meta["previous_status"], "accepted");
}

#[tokio::test]
async fn failed_delivery_does_not_fail_the_transition() {
    let h = Harness::with_failing_channel().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;

    let accepted = h
        .orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();
    assert_eq!(accepted.status, OrderStatus::Accepted);

    let after = h.order(order.id).await;
    assert_eq!(after.status, OrderStatus::Accepted);
    assert!(after.pickup_code_last_sent_at.is_none());

    let sms = h.events_of(order.id, OrderEventType::SmsSent).await;
    assert_eq!(sms.len(), 1);
    assert_eq!(sms[0].meta["delivered"], false);
    assert_eq!(sms[0].meta["channel"], "failing");
    assert_eq!(sms[0].meta["trigger"], "accepted");
}

#[tokio::test]
async fn resend_respects_the_cooldown() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    h.orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();
    assert_eq!(h.order(order.id).await.pickup_code_last_sent_at, Some(t0()));

    h.clock.advance(Duration::seconds(20));
    let err = h.orders.resend_pickup_code(order.id, 77).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::ResendTooSoon { retry_after_secs: 40 }
    ));

    h.clock.advance(Duration::seconds(41));
    assert!(h.orders.resend_pickup_code(order.id, 77).await.unwrap());
    let codes = h.channel.codes_for(order.id);
    assert_eq!(codes.len(), 2);
    assert_eq!(codes[0], codes[1]);

    assert!(matches!(
        h.orders.resend_pickup_code(order.id, 78).await,
        Err(AppError::Forbidden)
    ));
}

#[tokio::test]
async fn events_are_listed_oldest_first() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    h.ready_order(&order).await;

    let events = h.orders.list_events(order.id).await.unwrap();
    let kinds: Vec<OrderEventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            OrderEventType::StatusChanged,
            OrderEventType::CodeGenerated,
            OrderEventType::SmsSent,
            OrderEventType::SmsSent,
        ]
    );
    assert_eq!(events[3].meta["trigger"], "ready_for_pickup");
    assert!(matches!(
        h.orders.list_events(4242).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn padded_code_is_a_wrong_guess() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    let code = h.ready_order(&order).await;

    let outcome = h
        .orders
        .complete_with_code(order.id, &format!(" {code} "), restaurant.id)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PickupOutcome::WrongCode {
            attempts_remaining: 4
        }
    ));
    assert_eq!(h.order(order.id).await.status, OrderStatus::ReadyForPickup);

    let outcome = h
        .orders
        .complete_with_code(order.id, &code, restaurant.id)
        .await
        .unwrap();
    assert!(matches!(outcome, PickupOutcome::Completed { .. }));
}

#[tokio::test]
async fn unreadable_code_at_ready_leaves_an_undelivered_record() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let order = h.place_order(&meal, 77, 1, t0()).await;
    h.orders
        .accept(order.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();

    let mut active: orders::ActiveModel = h.order(order.id).await.into();
    active.pickup_code_encrypted = Set(Some("not-a-ciphertext".into()));
    active.update(&h.db).await.unwrap();

    let ready = h.orders.mark_ready(order.id, restaurant.id).await.unwrap();
    assert_eq!(ready.status, OrderStatus::ReadyForPickup);
    assert_eq!(h.channel.codes_for(order.id).len(), 1);

    let sent = h.events_of(order.id, OrderEventType::SmsSent).await;
    assert_eq!(sent.len(), 2);
    let at_ready = sent
        .iter()
        .find(|e| e.meta["trigger"] == "ready_for_pickup")
        .expect("ready_for_pickup dispatch recorded");
    assert_eq!(at_ready.meta["delivered"], false);
    assert!(at_ready.meta["error"].as_str().is_some());
}

#[tokio::test]
async fn transitions_commit_when_the_event_log_is_unwritable() {
    let h = Harness::new().await;
    let restaurant = seed_restaurant(&h.db, "Corner Bistro", None, true).await;
    let meal = seed_meal(&h.db, restaurant.id, 500, 8, None).await;
    let kept = h.place_order(&meal, 77, 1, t0()).await;
    let dropped = h.place_order(&meal, 78, 1, t0()).await;

    h.db.execute_unprepared("DROP TABLE order_events").await.unwrap();

    h.orders
        .accept(kept.id, restaurant.id, t0(), t0() + Duration::minutes(45))
        .await
        .unwrap();
    assert_eq!(h.order(kept.id).await.status, OrderStatus::Accepted);

    h.orders
        .cancel_by_restaurant(dropped.id, restaurant.id, "Sold out")
        .await
        .unwrap();
    assert_eq!(
        h.order(dropped.id).await.status,
        OrderStatus::CancelledByRestaurant
    );
}
