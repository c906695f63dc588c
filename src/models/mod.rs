pub mod admin;
pub mod common;
pub mod order;

pub use admin::*;
pub use common::*;
pub use order::*;
