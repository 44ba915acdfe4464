//! # docforge-core
//!
//! Core crate for DocForge. Contains configuration schemas and the unified
//! error system shared by the converter pipeline and the HTTP layer.
//!
//! This crate has **no** internal dependencies on other DocForge crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
