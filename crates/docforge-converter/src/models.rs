//! Domain models: operations, options, input descriptors, and the job
//! state machine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConversionError;

/// The closed set of conversions the service offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// PDF → Word (docx)
    PdfToWord,
    /// Word → PDF
    WordToPdf,
    /// PDF → PowerPoint (pptx)
    PdfToPowerpoint,
    /// PowerPoint → PDF
    PowerpointToPdf,
    /// PDF → Excel (xlsx)
    PdfToExcel,
    /// Excel → PDF
    ExcelToPdf,
    /// Ghostscript PDF re-encode at a quality preset
    CompressPdf,
    /// Image re-encode at a fixed quality
    CompressImage,
}

impl Operation {
    /// Every operation, in route order.
    pub const ALL: [Operation; 8] = [
        Self::PdfToWord,
        Self::WordToPdf,
        Self::PdfToPowerpoint,
        Self::PowerpointToPdf,
        Self::PdfToExcel,
        Self::ExcelToPdf,
        Self::CompressPdf,
        Self::CompressImage,
    ];

    /// Stable identifier, also used as the route segment.
    pub fn id(&self) -> &'static str {
        match self {
            Self::PdfToWord => "pdf-to-word",
            Self::WordToPdf => "word-to-pdf",
            Self::PdfToPowerpoint => "pdf-to-powerpoint",
            Self::PowerpointToPdf => "powerpoint-to-pdf",
            Self::PdfToExcel => "pdf-to-excel",
            Self::ExcelToPdf => "excel-to-pdf",
            Self::CompressPdf => "compress-pdf",
            Self::CompressImage => "compress-image",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Operation {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConversionError::UnsupportedOperation {
                operation: s.to_string(),
            })
    }
}

/// PDF compression level requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Smallest output, screen resolution.
    Low,
    /// Balanced output.
    #[default]
    Medium,
    /// Print quality.
    High,
}

impl CompressionLevel {
    /// Resolve a raw form value. Absent or unrecognized values become `Medium`.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => Self::Low,
            Some("high") => Self::High,
            _ => Self::Medium,
        }
    }

    /// Ghostscript `-dPDFSETTINGS` preset name.
    pub fn ghostscript_preset(&self) -> &'static str {
        match self {
            Self::Low => "screen",
            Self::Medium => "ebook",
            Self::High => "printer",
        }
    }
}

/// Operation-specific parameters, already validated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Compression level; ignored by non-compression operations.
    pub level: CompressionLevel,
}

impl ConversionOptions {
    /// Build options from raw request fields.
    pub fn from_raw(level: Option<&str>) -> Self {
        Self {
            level: CompressionLevel::resolve(level),
        }
    }
}

/// An uploaded file already persisted to the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// Absolute scratch path with a generated, collision-free name.
    pub path: PathBuf,
    /// File name as supplied by the caller. Only used for the download name.
    pub original_name: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

impl InputDescriptor {
    /// The generated scratch file name.
    pub fn scratch_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Lowercase extension of the scratch file, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Lifecycle of a single conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Created, not yet validated.
    Pending,
    /// Converter running.
    Executing,
    /// Converter finished, output being located.
    Resolving,
    /// Output verified.
    Succeeded,
    /// Terminal failure.
    Failed,
}

impl JobStatus {
    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether moving to `next` keeps the lifecycle one-directional.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Executing)
                | (Pending, Failed)
                | (Executing, Resolving)
                | (Executing, Failed)
                | (Resolving, Succeeded)
                | (Resolving, Failed)
        )
    }
}

/// One request's conversion, from validated input to verified output.
///
/// Owned exclusively by the orchestrator for the duration of a request.
#[derive(Debug)]
pub struct ConversionJob {
    id: Uuid,
    requested_operation: String,
    operation: Option<Operation>,
    input: Option<InputDescriptor>,
    options: ConversionOptions,
    output_dir: PathBuf,
    target_format: Option<String>,
    output_path: Option<PathBuf>,
    status: JobStatus,
    failure_reason: Option<String>,
}

impl ConversionJob {
    /// Create a pending job.
    pub fn new(
        requested_operation: impl Into<String>,
        input: Option<InputDescriptor>,
        options: ConversionOptions,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            requested_operation: requested_operation.into(),
            operation: None,
            input,
            options,
            output_dir: output_dir.into(),
            target_format: None,
            output_path: None,
            status: JobStatus::Pending,
            failure_reason: None,
        }
    }

    /// Job id, used for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Operation id as requested by the caller.
    pub fn requested_operation(&self) -> &str {
        &self.requested_operation
    }

    /// The recognized operation, once the job has started executing.
    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    /// The input descriptor, or `MissingInput`.
    pub fn input(&self) -> Result<&InputDescriptor, ConversionError> {
        self.input.as_ref().ok_or(ConversionError::MissingInput)
    }

    /// Validated options.
    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Directory converters write into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Output extension, known once the job starts executing.
    pub fn target_format(&self) -> Option<&str> {
        self.target_format.as_deref()
    }

    /// Verified output path, present only after success.
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Failure description, present only when failed.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Pending → Executing.
    pub fn start(
        &mut self,
        operation: Operation,
        target_format: impl Into<String>,
    ) -> Result<(), ConversionError> {
        self.transition(JobStatus::Executing)?;
        self.operation = Some(operation);
        self.target_format = Some(target_format.into());
        Ok(())
    }

    /// Executing → Resolving.
    pub fn begin_resolving(&mut self) -> Result<(), ConversionError> {
        self.transition(JobStatus::Resolving)
    }

    /// Resolving → Succeeded.
    pub fn succeed(&mut self, output_path: PathBuf) -> Result<(), ConversionError> {
        self.transition(JobStatus::Succeeded)?;
        self.output_path = Some(output_path);
        Ok(())
    }

    /// Any non-terminal status → Failed.
    pub fn fail(&mut self, reason: &ConversionError) -> Result<(), ConversionError> {
        self.transition(JobStatus::Failed)?;
        self.failure_reason = Some(reason.to_string());
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), ConversionError> {
        if !self.status.can_transition_to(next) {
            return Err(ConversionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
