pub mod clock;
pub mod pickup_code;

pub use clock::{Clock, ManualClock, SystemClock};
pub use pickup_code::PickupCodeGenerator;
