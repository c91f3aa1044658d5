//! `PostgreSQL` entity store for the ride-hailing backend.
//!
//! This crate provides [`PostgresEntityStore`], the production implementation of
//! the `EntityStore` trait from `ridehail-core`. It uses sqlx with a shared
//! connection pool and supports:
//!
//! - Users, ride requests, and rides in three tables with generated ids
//! - Guarded ride status transitions (row-locked read, then update)
//! - Embedded schema migrations
//!
//! # Example
//!
//! ```ignore
//! use ridehail_postgres::PostgresEntityStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresEntityStore::connect("postgres://localhost/rideshare", 10, 30).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod entity_store;

pub use entity_store::PostgresEntityStore;
