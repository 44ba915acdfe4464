//! Job orchestration.
//!
//! One call to [`JobOrchestrator::run`] is one request: the job is driven
//! through its state machine, and every scratch path it touches is owned by
//! a [`TempArtifactTracker`]. On failure the tracker is drained before the
//! error is returned; on success it travels with the [`Delivery`] so the
//! sink decides when the output is no longer needed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::ConversionError;
use crate::executor::ConversionExecutor;
use crate::filesystem::FsUtils;
use crate::metrics::ConversionMetrics;
use crate::models::{ConversionJob, ConversionOptions, InputDescriptor};
use crate::registry::{ProfileRegistry, profile_dir_path};
use crate::resolver::OutputResolver;
use crate::tracker::TempArtifactTracker;

/// Raw request fields handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Operation id as requested.
    pub operation: String,
    /// Saved upload, if one was received.
    pub input: Option<InputDescriptor>,
    /// Raw `level` form value.
    pub level: Option<String>,
}

/// A verified output ready to be handed to the caller.
#[derive(Debug)]
pub struct Delivery {
    /// Job that produced the output.
    pub job_id: Uuid,
    /// Scratch path of the output.
    pub path: PathBuf,
    /// Suggested file name for the caller.
    pub download_name: String,
    /// MIME type of the output.
    pub content_type: &'static str,
    /// Output size in bytes.
    pub size_bytes: u64,
    /// Owner of the job's scratch files. Dropping it removes them.
    pub tracker: TempArtifactTracker,
}

/// Hands a verified output to the caller.
///
/// Implementations take ownership of the [`Delivery`], including its
/// tracker, and must keep the tracker alive for as long as they read the
/// output file.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// What the transport produces from a delivery.
    type Output: Send;

    /// Deliver the output.
    async fn deliver(&self, delivery: Delivery) -> Result<Self::Output, ConversionError>;
}

/// Output of a job that reached `Succeeded`.
struct ConvertedOutput {
    path: PathBuf,
    size_bytes: u64,
    download_name: String,
    content_type: &'static str,
}

/// Drives conversion jobs from saved upload to delivery.
pub struct JobOrchestrator {
    registry: Arc<ProfileRegistry>,
    executor: ConversionExecutor,
    scratch_dir: PathBuf,
    metrics: Arc<ConversionMetrics>,
}

impl JobOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        registry: Arc<ProfileRegistry>,
        executor: ConversionExecutor,
        scratch_dir: impl Into<PathBuf>,
        metrics: Arc<ConversionMetrics>,
    ) -> Self {
        Self {
            registry,
            executor,
            scratch_dir: scratch_dir.into(),
            metrics,
        }
    }

    /// The profile registry.
    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// The shared metrics collector.
    pub fn metrics(&self) -> &Arc<ConversionMetrics> {
        &self.metrics
    }

    /// Directory holding every job's scratch files.
    pub fn scratch_dir(&self) -> &std::path::Path {
        &self.scratch_dir
    }

    /// Run one job to completion and hand its output to `sink`.
    #[instrument(skip(self, request, sink), fields(job_id, operation = %request.operation))]
    pub async fn run<S: DeliverySink>(
        &self,
        request: JobRequest,
        sink: &S,
    ) -> Result<S::Output, ConversionError> {
        let started = Instant::now();
        let options = ConversionOptions::from_raw(request.level.as_deref());
        let mut job = ConversionJob::new(
            request.operation,
            request.input,
            options,
            self.scratch_dir.clone(),
        );
        tracing::Span::current().record("job_id", job.id().to_string());

        let mut tracker = TempArtifactTracker::new(job.id());
        let input_bytes = match job.input() {
            Ok(input) => {
                tracker.register(&input.path);
                input.size_bytes
            }
            Err(_) => 0,
        };
        self.metrics.record_started(input_bytes);

        let output = match self.convert(&mut job, &mut tracker).await {
            Ok(output) => output,
            Err(err) => {
                self.record_failure(&mut job, &err);
                let report = tracker.cleanup().await;
                debug!(
                    job_id = %job.id(),
                    removed = report.removed,
                    failed = report.failed,
                    "Scratch cleanup after failure"
                );
                return Err(err);
            }
        };

        self.metrics
            .record_success(started.elapsed(), output.size_bytes);
        info!(
            job_id = %job.id(),
            download_name = %output.download_name,
            size = output.size_bytes,
            duration_ms = started.elapsed().as_millis() as u64,
            "Conversion succeeded"
        );

        let delivery = Delivery {
            job_id: job.id(),
            path: output.path,
            download_name: output.download_name,
            content_type: output.content_type,
            size_bytes: output.size_bytes,
            tracker,
        };

        sink.deliver(delivery).await.map_err(|err| {
            error!(job_id = %job.id(), error = %err, "Delivery failed");
            self.metrics.record_delivery_failure();
            err
        })
    }

    /// Pending through Succeeded. Any error leaves the job non-terminal for
    /// the caller to fail.
    async fn convert(
        &self,
        job: &mut ConversionJob,
        tracker: &mut TempArtifactTracker,
    ) -> Result<ConvertedOutput, ConversionError> {
        job.input()?;
        let profile = self.registry.resolve(job.requested_operation())?;
        let target = profile.target.resolve(job.input()?);
        job.start(profile.operation, target.clone())?;

        // Registered before launch so partial output is removed too.
        let expected = OutputResolver::expected_path(job, profile)?;
        tracker.register(&expected);
        if profile.needs_profile_dir() {
            tracker.register(profile_dir_path(job.input()?, job.output_dir())?);
        }

        let result = self.executor.execute(job, profile).await?;
        debug!(
            job_id = %job.id(),
            duration_ms = result.duration_ms,
            "Converter exited successfully"
        );

        job.begin_resolving()?;
        let (path, size_bytes) = OutputResolver::resolve(job, profile).await?;
        job.succeed(path.clone())?;

        Ok(ConvertedOutput {
            path,
            size_bytes,
            download_name: profile.download_name(job.input()?, &target),
            content_type: FsUtils::content_type_for_extension(&target),
        })
    }

    fn record_failure(&self, job: &mut ConversionJob, err: &ConversionError) {
        if let Err(transition) = job.fail(err) {
            debug!(job_id = %job.id(), error = %transition, "Job already terminal");
        }
        self.metrics.record_failure(err.code());

        if err.is_client_error() {
            warn!(
                job_id = %job.id(),
                code = err.code(),
                error = %err,
                "Job rejected"
            );
        } else {
            error!(
                job_id = %job.id(),
                code = err.code(),
                operation = %job.requested_operation(),
                error = %err,
                "Job failed"
            );
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use docforge_core::config::conversion::ConversionConfig;

    use crate::models::Operation;
    use crate::test_support::{
        CollectingSink, FailingSink, FakeConverter, FakeTools, scratch_entries, stage_input,
    };

    struct Harness {
        scratch: tempfile::TempDir,
        tools: FakeTools,
        orchestrator: JobOrchestrator,
    }

    fn harness(fake: FakeConverter) -> Harness {
        let scratch = tempfile::tempdir().expect("scratch");
        let tools = FakeTools::new(fake).expect("tools");
        let config = ConversionConfig::default();
        let orchestrator = JobOrchestrator::new(
            Arc::new(tools.registry(&config)),
            ConversionExecutor::new(&config),
            scratch.path(),
            Arc::new(ConversionMetrics::new()),
        );
        Harness {
            scratch,
            tools,
            orchestrator,
        }
    }

    fn request(h: &Harness, operation: &str, name: &str, level: Option<&str>) -> JobRequest {
        JobRequest {
            operation: operation.to_string(),
            input: Some(stage_input(h.scratch.path(), name, b"payload").expect("stage")),
            level: level.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_word_to_pdf_delivers_original_stem() {
        let h = harness(FakeConverter::Working);
        let delivered = h
            .orchestrator
            .run(request(&h, "word-to-pdf", "report.docx", None), &CollectingSink)
            .await
            .expect("run");

        assert_eq!(delivered.download_name, "report.pdf");
        assert_eq!(delivered.content_type, "application/pdf");
        assert_eq!(delivered.bytes, b"payload");
        assert!(scratch_entries(h.scratch.path()).is_empty());
    }

    #[tokio::test]
    async fn test_every_operation_produces_declared_target() {
        let cases = [
            ("pdf-to-word", "a.pdf", "a.docx"),
            ("word-to-pdf", "a.docx", "a.pdf"),
            ("pdf-to-powerpoint", "a.pdf", "a.pptx"),
            ("powerpoint-to-pdf", "a.pptx", "a.pdf"),
            ("pdf-to-excel", "a.pdf", "a.xlsx"),
            ("excel-to-pdf", "a.xlsx", "a.pdf"),
            ("compress-pdf", "a.pdf", "compressed-a.pdf"),
        ];
        let h = harness(FakeConverter::Working);

        for (operation, name, expected) in cases {
            let delivered = h
                .orchestrator
                .run(request(&h, operation, name, None), &CollectingSink)
                .await
                .expect(operation);
            assert_eq!(delivered.download_name, expected, "{operation}");
            assert!(scratch_entries(h.scratch.path()).is_empty(), "{operation}");
        }
    }

    #[tokio::test]
    async fn test_compress_pdf_low_uses_screen_preset() {
        let h = harness(FakeConverter::Working);
        let delivered = h
            .orchestrator
            .run(
                request(&h, "compress-pdf", "report.pdf", Some("low")),
                &CollectingSink,
            )
            .await
            .expect("run");

        assert_eq!(delivered.download_name, "compressed-report.pdf");
        assert!(h.tools.invocations().contains(&"-dPDFSETTINGS=/screen".to_string()));
    }

    #[tokio::test]
    async fn test_unrecognized_level_behaves_as_medium() {
        let h = harness(FakeConverter::Working);
        for level in [Some("bogus"), None, Some("medium")] {
            h.orchestrator
                .run(request(&h, "compress-pdf", "r.pdf", level), &CollectingSink)
                .await
                .expect("run");
        }

        let presets: Vec<String> = h
            .tools
            .invocations()
            .into_iter()
            .filter(|arg| arg.starts_with("-dPDFSETTINGS="))
            .collect();
        assert_eq!(presets, vec!["-dPDFSETTINGS=/ebook".to_string(); 3]);
    }

    #[tokio::test]
    async fn test_concurrent_identical_names_do_not_collide() {
        let h = harness(FakeConverter::Working);
        let first = JobRequest {
            operation: "word-to-pdf".to_string(),
            input: Some(stage_input(h.scratch.path(), "report.docx", b"first").expect("stage")),
            level: None,
        };
        let second = JobRequest {
            operation: "word-to-pdf".to_string(),
            input: Some(stage_input(h.scratch.path(), "report.docx", b"second").expect("stage")),
            level: None,
        };

        let (a, b) = futures::join!(
            h.orchestrator.run(first, &CollectingSink),
            h.orchestrator.run(second, &CollectingSink)
        );

        let (a, b) = (a.expect("first"), b.expect("second"));
        assert_eq!(a.bytes, b"first");
        assert_eq!(b.bytes, b"second");
        assert_eq!(a.download_name, "report.pdf");
        assert_eq!(b.download_name, "report.pdf");
        assert!(scratch_entries(h.scratch.path()).is_empty());

        let mut profiles: Vec<String> = h
            .tools
            .invocations()
            .into_iter()
            .filter(|arg| arg.starts_with("-env:UserInstallation=file://"))
            .collect();
        profiles.sort();
        profiles.dedup();
        assert_eq!(profiles.len(), 2);
    }

    #[tokio::test]
    async fn test_office_profile_dir_is_removed_after_run() {
        let h = harness(FakeConverter::Working);
        let req = request(&h, "pdf-to-word", "notes.pdf", None);
        let scratch_name = req
            .input
            .as_ref()
            .and_then(|i| i.scratch_name())
            .expect("scratch name")
            .to_string();

        h.orchestrator
            .run(req, &CollectingSink)
            .await
            .expect("run");

        let profile_arg = format!(
            "-env:UserInstallation={}",
            FsUtils::file_url(&h.scratch.path().join(format!("profile-{scratch_name}")))
        );
        assert!(h.tools.invocations().contains(&profile_arg));
        assert!(scratch_entries(h.scratch.path()).is_empty());
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_execution_failed() {
        let h = harness(FakeConverter::Failing);
        let err = h
            .orchestrator
            .run(request(&h, "word-to-pdf", "report.docx", None), &CollectingSink)
            .await
            .expect_err("fails");

        assert!(matches!(err, ConversionError::ExecutionFailed { .. }));
        assert!(scratch_entries(h.scratch.path()).is_empty());
        let snap = h.orchestrator.metrics().snapshot();
        assert_eq!(snap.failures_by_code.get("EXECUTION_FAILED"), Some(&1));
    }

    #[tokio::test]
    async fn test_zero_exit_without_output_is_output_not_found() {
        let h = harness(FakeConverter::Silent);
        let err = h
            .orchestrator
            .run(request(&h, "pdf-to-excel", "sheet.pdf", None), &CollectingSink)
            .await
            .expect_err("no output");

        assert!(matches!(err, ConversionError::OutputNotFound { .. }));
        assert!(scratch_entries(h.scratch.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_launches_nothing() {
        let h = harness(FakeConverter::Working);
        let err = h
            .orchestrator
            .run(
                JobRequest {
                    operation: "word-to-pdf".to_string(),
                    input: None,
                    level: None,
                },
                &CollectingSink,
            )
            .await
            .expect_err("missing");

        assert!(matches!(err, ConversionError::MissingInput));
        assert!(h.tools.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_operation_cleans_up_input() {
        let h = harness(FakeConverter::Working);
        let err = h
            .orchestrator
            .run(request(&h, "pdf-to-midi", "song.pdf", None), &CollectingSink)
            .await
            .expect_err("unsupported");

        assert!(matches!(err, ConversionError::UnsupportedOperation { .. }));
        assert!(h.tools.invocations().is_empty());
        assert!(scratch_entries(h.scratch.path()).is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_still_cleans_up() {
        let h = harness(FakeConverter::Working);
        let err = h
            .orchestrator
            .run(request(&h, "word-to-pdf", "report.docx", None), &FailingSink)
            .await
            .expect_err("delivery fails");

        assert!(matches!(err, ConversionError::DeliveryFailed { .. }));
        assert!(scratch_entries(h.scratch.path()).is_empty());
        let snap = h.orchestrator.metrics().snapshot();
        assert_eq!(snap.jobs_succeeded, 1);
        assert_eq!(snap.deliveries_failed, 1);
    }

    #[tokio::test]
    async fn test_compress_image_keeps_format() {
        let h = harness(FakeConverter::Working);
        let png = {
            let mut buf = std::io::Cursor::new(Vec::new());
            image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]))
                .write_to(&mut buf, image::ImageFormat::Png)
                .expect("encode");
            buf.into_inner()
        };
        let input = stage_input(h.scratch.path(), "photo.png", &png).expect("stage");

        let delivered = h
            .orchestrator
            .run(
                JobRequest {
                    operation: Operation::CompressImage.id().to_string(),
                    input: Some(input),
                    level: Some("high".to_string()),
                },
                &CollectingSink,
            )
            .await
            .expect("run");

        assert_eq!(delivered.download_name, "compressed-photo.png");
        assert_eq!(delivered.content_type, "image/png");
        assert_eq!(
            image::guess_format(&delivered.bytes).expect("format"),
            image::ImageFormat::Png
        );
        assert!(h.tools.invocations().is_empty());
        assert!(scratch_entries(h.scratch.path()).is_empty());
    }
}
