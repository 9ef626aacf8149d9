//! Identifier types shared by every crate in the fulfillment workspace.

mod types;

pub use types::{CouponId, OrderId, ProductId, UserId};
