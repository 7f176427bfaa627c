//! API Routes
//!
//! Route handlers organized by functionality.

pub mod events;
pub mod health;

use crate::api::error::ApiError;

/// Fallback for any unmatched route
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
