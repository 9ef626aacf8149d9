pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use ledger::{Shortfall, quantities_by_product, release_all, reserve_all};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{FulfillmentStore, Reservation, StoreTransaction};
