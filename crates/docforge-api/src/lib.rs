//! # docforge-api
//!
//! HTTP API layer for DocForge built on Axum.
//!
//! One POST route per conversion operation plus `/convert/{operation}`,
//! streaming multipart intake into the scratch directory, streaming file
//! delivery that releases scratch files when the body is dropped, CORS and
//! request logging middleware, and health endpoints.

pub mod delivery;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
pub mod upload;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
