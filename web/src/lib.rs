//! HTTP surface for the ride dispatcher.
//!
//! Handlers are thin: extract, call the [`Dispatcher`], map the result.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an axum handler
//! 2. **Extract** the path id and JSON body ([`extractors`])
//! 3. **Dispatch** to the shared [`Dispatcher`]
//! 4. **Map** the result to a response, or a [`DispatchError`] to an [`AppError`]
//!
//! # Routes
//!
//! | Method | Path                                  | Success        |
//! |--------|---------------------------------------|----------------|
//! | POST   | `/users/register`                     | 201 + user     |
//! | POST   | `/drivers/:id/location`               | 200 + user     |
//! | POST   | `/rides/request`                      | 201 + ride     |
//! | GET    | `/rides/find-driver/:ride_request_id` | 200 + user     |
//! | GET    | `/health`                             | 200            |
//!
//! # Example
//!
//! ```ignore
//! use ridehail_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(dispatcher));
//! axum::serve(listener, app).await?;
//! ```
//!
//! [`Dispatcher`]: ridehail_core::dispatcher::Dispatcher
//! [`DispatchError`]: ridehail_core::dispatcher::DispatchError

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::AppError;
pub use router::build_router;
pub use state::AppState;
