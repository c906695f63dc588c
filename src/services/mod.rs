pub mod commission;
pub mod expiry_service;
pub mod invoice_service;
pub mod notification_service;
pub mod order_event_log;
pub mod order_service;

pub use commission::*;
pub use expiry_service::*;
pub use invoice_service::*;
pub use notification_service::*;
pub use order_event_log::*;
pub use order_service::*;
