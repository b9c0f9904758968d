//! HTTP API for the rollback agent
//!
//! - `POST /api/track`, `POST /api/complete`: operation lifecycle
//! - `POST /api/rollback`: one operation by id, or the last `count`
//! - `GET /api/operations`, `GET /api/operations/:id`: the operation log
//! - `GET /api/health`: liveness plus operation log connectivity

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use routes::{create_router, AppState};
