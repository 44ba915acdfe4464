//! # DocForge Converter
//!
//! The conversion job pipeline: a request's saved upload goes through the
//! [`ProfileRegistry`] to pick a converter, the [`ConversionExecutor`] runs
//! it, the [`OutputResolver`] verifies the produced file, and a
//! [`DeliverySink`] hands it to the caller. Every scratch path a job touches
//! is owned by a [`TempArtifactTracker`] and removed on every exit path.
//!
//! ## Converters
//!
//! Document conversions go through LibreOffice (`--convert-to`), PDF
//! compression through Ghostscript (`pdfwrite` with a `PDFSETTINGS`
//! preset), and image compression through an in-process codec.

pub mod error;
pub mod executor;
pub mod filesystem;
pub mod image_codec;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod resolver;
pub mod tracker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::ConversionError;
pub use executor::{ConversionExecutor, ExecutionResult};
pub use metrics::ConversionMetrics;
pub use models::{
    CompressionLevel, ConversionJob, ConversionOptions, InputDescriptor, JobStatus, Operation,
};
pub use orchestrator::{Delivery, DeliverySink, JobOrchestrator, JobRequest};
pub use registry::{ConverterProfile, ProfileRegistry};
pub use resolver::OutputResolver;
pub use tracker::TempArtifactTracker;
