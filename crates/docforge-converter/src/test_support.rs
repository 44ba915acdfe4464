//! Stand-in converters and sinks for exercising the pipeline without
//! LibreOffice or Ghostscript installed.
//!
//! The stand-ins are POSIX shell scripts run as `sh <script> <args...>`, so
//! the registry's argument templates reach them unchanged.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docforge_core::config::conversion::ConversionConfig;
use tempfile::TempDir;

use crate::error::ConversionError;
use crate::filesystem::FsUtils;
use crate::models::InputDescriptor;
use crate::orchestrator::{Delivery, DeliverySink};
use crate::registry::ProfileRegistry;

/// Behaviour of the stand-in converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeConverter {
    /// Follows the real tools' output conventions, copying the input.
    Working,
    /// Writes a diagnostic to stderr and exits 3.
    Failing,
    /// Exits 0 without writing anything.
    Silent,
    /// Never exits on its own.
    Hanging,
}

const LOG_PREAMBLE: &str = r#"#!/bin/sh
log="$(dirname "$0")/invocations.log"
printf '%s\n' "$@" >> "$log"
"#;

const WORKING_BODY: &str = r#"fmt=""; outdir=""; outfile=""; input=""; profile=""
while [ $# -gt 0 ]; do
  case "$1" in
    -env:UserInstallation=file://*) profile="${1#-env:UserInstallation=file://}" ;;
    --convert-to) fmt="$2"; shift 2; continue ;;
    --outdir) outdir="$2"; shift 2; continue ;;
    -sOutputFile=*) outfile="${1#-sOutputFile=}" ;;
    -*) ;;
    *) input="$1" ;;
  esac
  shift
done
if [ -n "$profile" ]; then
  mkdir -p "$profile/user"
fi
if [ -n "$outfile" ]; then
  cp "$input" "$outfile"
else
  base=$(basename "$input")
  cp "$input" "$outdir/${base%.*}.$fmt"
fi
"#;

const FAILING_BODY: &str = r#"echo "Error: source file could not be loaded" >&2
exit 3
"#;

const SILENT_BODY: &str = "exit 0\n";

const HANGING_BODY: &str = "exec sleep 30\n";

/// A directory holding one stand-in converter script and its invocation log.
pub struct FakeTools {
    dir: TempDir,
    script: PathBuf,
}

impl FakeTools {
    /// Write the stand-in script.
    pub fn new(kind: FakeConverter) -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let script = dir.path().join("converter.sh");
        let body = match kind {
            FakeConverter::Working => WORKING_BODY,
            FakeConverter::Failing => FAILING_BODY,
            FakeConverter::Silent => SILENT_BODY,
            FakeConverter::Hanging => HANGING_BODY,
        };
        std::fs::write(&script, format!("{LOG_PREAMBLE}{body}"))?;
        Ok(Self { dir, script })
    }

    /// The standard registry with every external command routed to the
    /// stand-in.
    pub fn registry(&self, config: &ConversionConfig) -> ProfileRegistry {
        let mut registry = ProfileRegistry::from_config(config);
        let script = self.script.to_string_lossy().into_owned();
        for command in registry.commands_mut() {
            command.args.insert(0, script.clone());
            command.program = "sh".to_string();
        }
        registry
    }

    /// Every argument the stand-in has received, one per entry.
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("invocations.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Save `contents` to the scratch directory the way an upload would be.
pub fn stage_input(
    scratch_dir: &Path,
    original_name: &str,
    contents: &[u8],
) -> io::Result<InputDescriptor> {
    let path = scratch_dir.join(FsUtils::generate_scratch_name(original_name));
    std::fs::write(&path, contents)?;
    Ok(InputDescriptor {
        path,
        original_name: original_name.to_string(),
        size_bytes: contents.len() as u64,
    })
}

/// Names of the entries currently in a directory.
pub fn scratch_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// What [`CollectingSink`] read from a delivery.
#[derive(Debug, Clone)]
pub struct Delivered {
    /// Suggested file name.
    pub download_name: String,
    /// MIME type.
    pub content_type: &'static str,
    /// Output contents.
    pub bytes: Vec<u8>,
}

/// Reads the output into memory, then releases the job's scratch files.
pub struct CollectingSink;

#[async_trait]
impl DeliverySink for CollectingSink {
    type Output = Delivered;

    async fn deliver(&self, mut delivery: Delivery) -> Result<Delivered, ConversionError> {
        let bytes = tokio::fs::read(&delivery.path).await;
        delivery.tracker.cleanup().await;
        Ok(Delivered {
            download_name: delivery.download_name,
            content_type: delivery.content_type,
            bytes: bytes?,
        })
    }
}

/// Fails every delivery, as if the client went away.
pub struct FailingSink;

#[async_trait]
impl DeliverySink for FailingSink {
    type Output = ();

    async fn deliver(&self, _delivery: Delivery) -> Result<(), ConversionError> {
        Err(ConversionError::DeliveryFailed {
            reason: "connection reset by peer".to_string(),
        })
    }
}
