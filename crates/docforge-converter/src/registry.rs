//! Operation → converter profile registry.
//!
//! Built once at startup from [`ConversionConfig`] and shared read-only
//! behind an `Arc`; nothing mutates it afterwards.

use std::collections::HashMap;
use std::path::Path;

use docforge_core::config::conversion::ConversionConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConversionError;
use crate::filesystem::FsUtils;
use crate::models::{InputDescriptor, Operation};

/// Program plus per-argument templates.
///
/// Placeholders are substituted inside each argument independently and the
/// result is passed to the OS as an argument vector, so no value can ever
/// be reinterpreted by a shell. Recognized placeholders: `{input}`,
/// `{output}`, `{output_dir}`, `{format}`, `{preset}`, `{profile_url}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    /// Executable name or path.
    pub program: String,
    /// Argument templates.
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Create a template.
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Whether any argument refers to `{name}`.
    pub fn uses_placeholder(&self, name: &str) -> bool {
        let token = format!("{{{name}}}");
        self.args.iter().any(|arg| arg.contains(&token))
    }
}

/// Placeholder for a per-job converter profile directory, as a `file://` URL.
pub const PROFILE_URL_PLACEHOLDER: &str = "profile_url";

/// Prefix of per-job converter profile directories.
pub const PROFILE_DIR_PREFIX: &str = "profile-";

/// How a profile performs its conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConverterEngine {
    /// Spawn an external program.
    Command(CommandTemplate),
    /// Re-encode in-process with the image codec.
    ImageCodec {
        /// Encoder quality (1-100).
        quality: u8,
    },
}

/// Extension of the produced artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetFormat {
    /// Always this extension.
    Fixed(&'static str),
    /// Whatever extension the input carries.
    SameAsInput,
}

impl TargetFormat {
    /// The concrete extension for an input.
    pub fn resolve(&self, input: &InputDescriptor) -> String {
        match self {
            Self::Fixed(ext) => (*ext).to_string(),
            Self::SameAsInput => input.extension().unwrap_or_default(),
        }
    }
}

/// How a converter names its output, relative to its input's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputNaming {
    /// `<stem>.<target>`, the LibreOffice `--convert-to` convention.
    ReplaceExtension,
    /// `<prefix><file name>`, used for paths this service chooses itself.
    Prefixed(&'static str),
}

impl OutputNaming {
    /// Apply the rule to a file name.
    pub fn file_name(&self, source_name: &str, target_format: &str) -> String {
        match self {
            Self::ReplaceExtension => {
                let stem = FsUtils::file_stem(source_name);
                if target_format.is_empty() {
                    stem.to_string()
                } else {
                    format!("{stem}.{target_format}")
                }
            }
            Self::Prefixed(prefix) => format!("{prefix}{source_name}"),
        }
    }
}

/// Everything needed to run and locate one kind of conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConverterProfile {
    /// Operation served by this profile.
    pub operation: Operation,
    /// Conversion engine.
    pub engine: ConverterEngine,
    /// Output extension rule.
    pub target: TargetFormat,
    /// Output naming rule, applied to the scratch name for the output file
    /// and to the original name for the download name.
    pub output_naming: OutputNaming,
}

impl ConverterProfile {
    /// The download name offered to the caller.
    pub fn download_name(&self, input: &InputDescriptor, target_format: &str) -> String {
        let original = FsUtils::sanitize_download_name(&input.original_name);
        self.output_naming.file_name(&original, target_format)
    }

    /// Whether runs need their own converter profile directory.
    pub fn needs_profile_dir(&self) -> bool {
        match &self.engine {
            ConverterEngine::Command(template) => {
                template.uses_placeholder(PROFILE_URL_PLACEHOLDER)
            }
            ConverterEngine::ImageCodec { .. } => false,
        }
    }

    /// Executable this profile depends on, if any.
    pub fn program(&self) -> Option<&str> {
        match &self.engine {
            ConverterEngine::Command(template) => Some(&template.program),
            ConverterEngine::ImageCodec { .. } => None,
        }
    }
}

/// Prefix for outputs of compression operations.
pub const COMPRESSED_PREFIX: &str = "compressed-";

/// Read-only map of operation → profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<Operation, ConverterProfile>,
}

impl ProfileRegistry {
    /// Build the standard registry from configuration.
    pub fn from_config(config: &ConversionConfig) -> Self {
        let disabled: Vec<Operation> = config
            .disabled_operations
            .iter()
            .filter_map(|id| match id.parse::<Operation>() {
                Ok(op) => Some(op),
                Err(_) => {
                    warn!(operation = %id, "Ignoring unknown operation in disabled_operations");
                    None
                }
            })
            .collect();

        let profiles = Operation::ALL
            .into_iter()
            .filter(|op| !disabled.contains(op))
            .map(|op| Self::standard_profile(op, config));

        Self::with_profiles(profiles)
    }

    /// Build a registry from explicit profiles.
    pub fn with_profiles(profiles: impl IntoIterator<Item = ConverterProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.operation, profile))
                .collect(),
        }
    }

    /// Look up the profile for an operation.
    pub fn get(&self, operation: Operation) -> Result<&ConverterProfile, ConversionError> {
        self.profiles
            .get(&operation)
            .ok_or_else(|| ConversionError::UnsupportedOperation {
                operation: operation.id().to_string(),
            })
    }

    /// Look up the profile for an operation id as received from a caller.
    pub fn resolve(&self, operation_id: &str) -> Result<&ConverterProfile, ConversionError> {
        let operation = operation_id.parse::<Operation>()?;
        self.get(operation)
    }

    /// Whether an operation is served.
    pub fn contains(&self, operation: Operation) -> bool {
        self.profiles.contains_key(&operation)
    }

    /// Served operations, in route order.
    pub fn operations(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| self.profiles.contains_key(op))
            .collect()
    }

    /// Distinct external programs the registry invokes.
    pub fn programs(&self) -> Vec<String> {
        let mut programs: Vec<String> = self
            .profiles
            .values()
            .filter_map(|p| p.program().map(str::to_string))
            .collect();
        programs.sort();
        programs.dedup();
        programs
    }

    /// Mutable access to every external command, for wrapping converters
    /// in tests.
    #[cfg(any(test, feature = "test-support"))]
    pub fn commands_mut(&mut self) -> impl Iterator<Item = &mut CommandTemplate> {
        self.profiles
            .values_mut()
            .filter_map(|p| match &mut p.engine {
                ConverterEngine::Command(template) => Some(template),
                ConverterEngine::ImageCodec { .. } => None,
            })
    }

    fn standard_profile(operation: Operation, config: &ConversionConfig) -> ConverterProfile {
        let office = |target: &'static str| ConverterProfile {
            operation,
            engine: ConverterEngine::Command(CommandTemplate::new(
                config.libreoffice_bin.clone(),
                &[
                    "-env:UserInstallation={profile_url}",
                    "--headless",
                    "--convert-to",
                    "{format}",
                    "--outdir",
                    "{output_dir}",
                    "{input}",
                ],
            )),
            target: TargetFormat::Fixed(target),
            output_naming: OutputNaming::ReplaceExtension,
        };

        match operation {
            Operation::PdfToWord => office("docx"),
            Operation::WordToPdf => office("pdf"),
            Operation::PdfToPowerpoint => office("pptx"),
            Operation::PowerpointToPdf => office("pdf"),
            Operation::PdfToExcel => office("xlsx"),
            Operation::ExcelToPdf => office("pdf"),
            Operation::CompressPdf => ConverterProfile {
                operation,
                engine: ConverterEngine::Command(CommandTemplate::new(
                    config.ghostscript_bin.clone(),
                    &[
                        "-sDEVICE=pdfwrite",
                        "-dCompatibilityLevel=1.4",
                        "-dPDFSETTINGS=/{preset}",
                        "-dNOPAUSE",
                        "-dQUIET",
                        "-dBATCH",
                        "-sOutputFile={output}",
                        "{input}",
                    ],
                )),
                target: TargetFormat::Fixed("pdf"),
                output_naming: OutputNaming::Prefixed(COMPRESSED_PREFIX),
            },
            Operation::CompressImage => ConverterProfile {
                operation,
                engine: ConverterEngine::ImageCodec {
                    quality: config.image_quality,
                },
                target: TargetFormat::SameAsInput,
                output_naming: OutputNaming::Prefixed(COMPRESSED_PREFIX),
            },
        }
    }
}

/// Expected output path for an input under a profile's naming rule.
pub fn expected_output_path(
    profile: &ConverterProfile,
    input: &InputDescriptor,
    output_dir: &Path,
    target_format: &str,
) -> Result<std::path::PathBuf, ConversionError> {
    let scratch_name = input.scratch_name().ok_or_else(|| ConversionError::UnsafePath {
        path: input.path.clone(),
    })?;
    Ok(output_dir.join(profile.output_naming.file_name(scratch_name, target_format)))
}

/// Per-job profile directory, derived from the input's scratch name.
///
/// LibreOffice instances sharing a profile hand their work to whichever
/// instance started first, so concurrent jobs must not share one.
pub fn profile_dir_path(
    input: &InputDescriptor,
    output_dir: &Path,
) -> Result<std::path::PathBuf, ConversionError> {
    let scratch_name = input.scratch_name().ok_or_else(|| ConversionError::UnsafePath {
        path: input.path.clone(),
    })?;
    Ok(output_dir.join(format!("{PROFILE_DIR_PREFIX}{scratch_name}")))
}
