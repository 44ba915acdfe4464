//! Locating the artifact a converter produced.
//!
//! A zero exit status is not proof of output: LibreOffice in particular
//! exits 0 after failing to load a document. The resolver checks the file
//! the profile's naming rule says should exist.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::ConversionError;
use crate::models::ConversionJob;
use crate::registry::{ConverterProfile, expected_output_path};

/// Resolves and verifies converter output paths.
pub struct OutputResolver;

impl OutputResolver {
    /// Where the profile's converter writes for this job.
    pub fn expected_path(
        job: &ConversionJob,
        profile: &ConverterProfile,
    ) -> Result<PathBuf, ConversionError> {
        expected_output_path(
            profile,
            job.input()?,
            job.output_dir(),
            job.target_format().unwrap_or_default(),
        )
    }

    /// Verify the expected output exists as a regular file.
    ///
    /// Returns the path and its size in bytes.
    pub async fn resolve(
        job: &ConversionJob,
        profile: &ConverterProfile,
    ) -> Result<(PathBuf, u64), ConversionError> {
        let expected = Self::expected_path(job, profile)?;

        match tokio::fs::metadata(&expected).await {
            Ok(meta) if meta.is_file() => {
                debug!(
                    job_id = %job.id(),
                    path = %expected.display(),
                    size = meta.len(),
                    "Converter output located"
                );
                Ok((expected, meta.len()))
            }
            Ok(_) => {
                warn!(job_id = %job.id(), path = %expected.display(), "Output path is not a file");
                Err(ConversionError::OutputNotFound {
                    expected_path: expected,
                })
            }
            Err(_) => {
                warn!(job_id = %job.id(), path = %expected.display(), "Output file missing");
                Err(ConversionError::OutputNotFound {
                    expected_path: expected,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_core::config::conversion::ConversionConfig;

    use crate::models::{ConversionOptions, InputDescriptor, Operation};
    use crate::registry::ProfileRegistry;

    fn job(dir: &std::path::Path, operation: Operation, scratch: &str) -> ConversionJob {
        let mut job = ConversionJob::new(
            operation.id(),
            Some(InputDescriptor {
                path: dir.join(scratch),
                original_name: "report.docx".to_string(),
                size_bytes: 1,
            }),
            ConversionOptions::default(),
            dir,
        );
        job.start(operation, "pdf").expect("start");
        job
    }

    #[tokio::test]
    async fn test_present_output_resolves() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = ProfileRegistry::from_config(&ConversionConfig::default());
        let profile = registry.get(Operation::WordToPdf).expect("profile");
        let job = job(temp.path(), Operation::WordToPdf, "1700-abc.docx");
        std::fs::write(temp.path().join("1700-abc.pdf"), b"%PDF-1.4").expect("write");

        let (path, size) = OutputResolver::resolve(&job, profile).await.expect("resolve");
        assert_eq!(path, temp.path().join("1700-abc.pdf"));
        assert_eq!(size, 8);
    }

    #[tokio::test]
    async fn test_absent_output_is_output_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = ProfileRegistry::from_config(&ConversionConfig::default());
        let profile = registry.get(Operation::WordToPdf).expect("profile");
        let job = job(temp.path(), Operation::WordToPdf, "1700-abc.docx");

        match OutputResolver::resolve(&job, profile).await {
            Err(ConversionError::OutputNotFound { expected_path }) => {
                assert_eq!(expected_path, temp.path().join("1700-abc.pdf"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_directory_at_output_path_is_not_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let registry = ProfileRegistry::from_config(&ConversionConfig::default());
        let profile = registry.get(Operation::CompressPdf).expect("profile");
        let job = job(temp.path(), Operation::CompressPdf, "1700-abc.pdf");
        std::fs::create_dir(temp.path().join("compressed-1700-abc.pdf")).expect("mkdir");

        assert!(matches!(
            OutputResolver::resolve(&job, profile).await,
            Err(ConversionError::OutputNotFound { .. })
        ));
    }
}
