pub mod meals;
pub mod order_events;
pub mod order_items;
pub mod orders;
pub mod restaurant_invoice_items;
pub mod restaurant_invoices;
pub mod restaurants;

pub use meals as meal_entity;
pub use order_events as order_event_entity;
pub use order_events::OrderEventType;
pub use order_items as order_item_entity;
pub use orders as order_entity;
pub use orders::{CancelledBy, OrderStatus, PaymentMethod};
pub use restaurant_invoice_items as invoice_item_entity;
pub use restaurant_invoices as invoice_entity;
pub use restaurant_invoices::InvoiceStatus;
pub use restaurants as restaurant_entity;
