//! Order persistence for the vehicle sales service.
//!
//! The [`OrderStore`] trait is the only way the saga touches stored orders.
//! Two implementations are provided: [`InMemoryOrderStore`] for tests and
//! local runs, and [`PostgresOrderStore`] backed by `sqlx`.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use store::{OrderStore, StatusUpdate};
