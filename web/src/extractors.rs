//! Extractors whose rejections render as [`AppError`] JSON bodies.
//!
//! Axum's stock `Json` and `Path` reject with plain-text bodies. These
//! wrappers keep every error response in the `{code, message}` shape.

use crate::error::AppError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON request body.
///
/// Malformed JSON is a 400; JSON that does not fit `T` is a 422.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameters.
///
/// A segment that does not parse as `T` is a 400.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
