pub mod admin;
pub mod order;

pub use admin::admin_config;
pub use order::order_config;
