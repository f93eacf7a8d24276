//! Stream combinators for dashboard subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
