//! HTTP control plane for the ticker aggregation pipeline.

pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{create_router, serve, ApiState};
