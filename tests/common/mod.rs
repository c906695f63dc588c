#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use rescue_meals_backend::config::{CommissionConfig, PickupConfig, SchedulerConfig};
use rescue_meals_backend::entities::{
    OrderEventType, OrderStatus, PaymentMethod, meal_entity as meals, order_entity as orders,
    order_event_entity as events, order_item_entity as order_items,
    restaurant_entity as restaurants,
};
use rescue_meals_backend::error::{AppError, AppResult};
use rescue_meals_backend::services::{
    CommissionEngine, ExpiryService, InvoiceService, NotificationDispatcher, OrderService,
    PickupCodeChannel,
};
use rescue_meals_backend::utils::{ManualClock, PickupCodeGenerator};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";
pub const CUSTOMER_PHONE: &str = "+15550001111";

/// Monday 2025-09-01 12:00:00 UTC
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap()
}

pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// Keeps every code handed to it so tests can play the customer.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    pub sent: Arc<Mutex<Vec<(i32, String)>>>,
}

impl RecordingChannel {
    pub fn codes_for(&self, order_id: i32) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == order_id)
            .map(|(_, code)| code.clone())
            .collect()
    }

    pub fn last_code(&self, order_id: i32) -> String {
        self.codes_for(order_id)
            .pop()
            .expect("no pickup code was delivered for this order")
    }
}

#[async_trait]
impl PickupCodeChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, order: &orders::Model, code: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push((order.id, code.to_string()));
        Ok(())
    }
}

pub struct FailingChannel;

#[async_trait]
impl PickupCodeChannel for FailingChannel {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn deliver(&self, _order: &orders::Model, _code: &str) -> AppResult<()> {
        Err(AppError::ExternalApiError("SMS gateway unavailable".into()))
    }
}

pub struct Harness {
    pub db: DatabaseConnection,
    pub clock: ManualClock,
    pub channel: RecordingChannel,
    pub pickup: PickupConfig,
    pub orders: OrderService,
    pub expiry: ExpiryService,
    pub invoices: InvoiceService,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(None, SchedulerConfig::default()).await
    }

    pub async fn with_scheduler(scheduler: SchedulerConfig) -> Self {
        Self::build(None, scheduler).await
    }

    pub async fn with_failing_channel() -> Self {
        Self::build(Some(Arc::new(FailingChannel)), SchedulerConfig::default()).await
    }

    async fn build(
        channel_override: Option<Arc<dyn PickupCodeChannel>>,
        scheduler: SchedulerConfig,
    ) -> Self {
        let db = setup_db().await;
        let clock = ManualClock::new(t0());
        let channel = RecordingChannel::default();
        let active_channel: Arc<dyn PickupCodeChannel> = match channel_override {
            Some(channel) => channel,
            None => Arc::new(channel.clone()),
        };

        let pickup = PickupConfig::with_secret(SECRET);
        let codes = PickupCodeGenerator::from_config(&pickup).unwrap();
        let commission = CommissionEngine::new(&CommissionConfig::default());
        let notifier =
            NotificationDispatcher::new(db.clone(), active_channel, Arc::new(clock.clone()));

        let orders = OrderService::new(
            db.clone(),
            codes,
            pickup.clone(),
            commission.clone(),
            notifier,
            Arc::new(clock.clone()),
        );
        let expiry = ExpiryService::new(
            db.clone(),
            orders.clone(),
            scheduler,
            Arc::new(clock.clone()),
        );
        let invoices = InvoiceService::new(db.clone(), commission, Arc::new(clock.clone()));

        Self {
            db,
            clock,
            channel,
            pickup,
            orders,
            expiry,
            invoices,
        }
    }

    pub async fn order(&self, order_id: i32) -> orders::Model {
        orders::Entity::find_by_id(order_id)
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn meal(&self, meal_id: i32) -> meals::Model {
        meals::Entity::find_by_id(meal_id)
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn events_of(&self, order_id: i32, event_type: OrderEventType) -> Vec<events::Model> {
        events::Entity::find()
            .filter(events::Column::OrderId.eq(order_id))
            .filter(events::Column::EventType.eq(event_type))
            .all(&self.db)
            .await
            .unwrap()
    }

    /// Pending order of `quantity` x `meal` for customer `customer_id`.
    pub async fn place_order(
        &self,
        meal: &meals::Model,
        customer_id: i32,
        quantity: i32,
        created_at: DateTime<Utc>,
    ) -> orders::Model {
        let order = orders::ActiveModel {
            restaurant_id: Set(meal.restaurant_id),
            customer_id: Set(customer_id),
            customer_phone: Set(Some(CUSTOMER_PHONE.to_string())),
            status: Set(OrderStatus::Pending),
            total_amount: Set(meal.price * i64::from(quantity)),
            payment_method: Set(PaymentMethod::CashOnPickup),
            pickup_code_attempts: Set(0),
            created_at: Set(created_at),
            updated_at: Set(created_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap();

        order_items::ActiveModel {
            order_id: Set(order.id),
            meal_id: Set(meal.id),
            quantity: Set(quantity),
            price: Set(meal.price),
            original_price: Set(meal.original_price),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap();

        order
    }

    /// Pending -> accepted (45 minute window from now) -> ready.
    pub async fn ready_order(&self, order: &orders::Model) -> String {
        let now = self.clock_now();
        self.orders
            .accept(order.id, order.restaurant_id, now, now + Duration::minutes(45))
            .await
            .unwrap();
        self.orders
            .mark_ready(order.id, order.restaurant_id)
            .await
            .unwrap();
        self.channel.last_code(order.id)
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        use rescue_meals_backend::utils::Clock;
        self.clock.now()
    }
}

pub async fn seed_restaurant(
    db: &DatabaseConnection,
    name: &str,
    commission_rate_bp: Option<i32>,
    is_active: bool,
) -> restaurants::Model {
    restaurants::ActiveModel {
        name: Set(name.to_string()),
        commission_rate_bp: Set(commission_rate_bp),
        is_active: Set(is_active),
        created_at: Set(t0() - Duration::days(30)),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_meal(
    db: &DatabaseConnection,
    restaurant_id: i32,
    price: i64,
    quantity_available: i32,
    available_until: Option<DateTime<Utc>>,
) -> meals::Model {
    meals::ActiveModel {
        restaurant_id: Set(restaurant_id),
        name: Set("Surprise bag".to_string()),
        price: Set(price),
        original_price: Set(price * 3),
        quantity_available: Set(quantity_available),
        available_until: Set(available_until),
        created_at: Set(t0() - Duration::days(1)),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Completed order inserted directly, as if verified at `completed_at`.
pub async fn seed_completed_order(
    db: &DatabaseConnection,
    restaurant_id: i32,
    total_amount: i64,
    payment_method: PaymentMethod,
    completed_at: DateTime<Utc>,
    commission: Option<(i32, i64)>,
) -> orders::Model {
    orders::ActiveModel {
        restaurant_id: Set(restaurant_id),
        customer_id: Set(900),
        status: Set(OrderStatus::Completed),
        total_amount: Set(total_amount),
        payment_method: Set(payment_method),
        pickup_code_attempts: Set(1),
        accepted_at: Set(Some(completed_at - Duration::hours(1))),
        ready_at: Set(Some(completed_at - Duration::minutes(30))),
        completed_at: Set(Some(completed_at)),
        commission_rate_bp: Set(commission.map(|(bp, _)| bp)),
        commission_amount: Set(commission.map(|(_, amount)| amount)),
        created_at: Set(completed_at - Duration::hours(2)),
        updated_at: Set(completed_at),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// A code guaranteed to differ from `code` in every position.
pub fn wrong_code(code: &str) -> String {
    code.chars()
        .map(|c| if c == '9' { '0' } else { char::from(c as u8 + 1) })
        .collect()
}
