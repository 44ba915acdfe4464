//! Convenience result type alias for DocForge.

use crate::error::AppError;

/// A specialized `Result` type for DocForge operations.
pub type AppResult<T> = Result<T, AppError>;
