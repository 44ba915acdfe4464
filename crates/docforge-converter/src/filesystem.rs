//! Filesystem utilities for the conversion pipeline.

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use crate::error::ConversionError;

/// Filesystem utility functions.
pub struct FsUtils;

impl FsUtils {
    /// Longest extension carried over from an uploaded file name.
    const MAX_EXTENSION_LEN: usize = 10;
    /// Longest download name offered back to the caller.
    const MAX_DOWNLOAD_NAME_LEN: usize = 200;

    /// Stem of a bare file name (`"report.final.docx"` → `"report.final"`).
    pub fn file_stem(name: &str) -> &str {
        match name.rfind('.') {
            Some(0) | None => name,
            Some(idx) => &name[..idx],
        }
    }

    /// Extension of an uploaded file name, reduced to a safe lowercase token.
    ///
    /// Returns `None` if the name has no extension or it contains anything
    /// other than ASCII alphanumerics.
    pub fn sanitize_extension(original_name: &str) -> Option<String> {
        let base = Self::base_name(original_name);
        let stem = Self::file_stem(base);
        if stem.len() == base.len() {
            return None;
        }
        let ext = &base[stem.len() + 1..];
        if ext.is_empty()
            || ext.len() > Self::MAX_EXTENSION_LEN
            || !ext.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Generate a collision-free scratch name: `<millis>-<uuid>[.<ext>]`.
    ///
    /// Only the sanitized extension of the original name survives, so the
    /// result is safe to hand to a converter.
    pub fn generate_scratch_name(original_name: &str) -> String {
        let millis = Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple();
        match Self::sanitize_extension(original_name) {
            Some(ext) => format!("{millis}-{suffix}.{ext}"),
            None => format!("{millis}-{suffix}"),
        }
    }

    /// Make an original file name fit for a `Content-Disposition` header.
    pub fn sanitize_download_name(name: &str) -> String {
        let sanitized: String = Self::base_name(name)
            .chars()
            .map(|c| match c {
                '"' | '\\' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .take(Self::MAX_DOWNLOAD_NAME_LEN)
            .collect();

        let trimmed = sanitized.trim();
        if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
            "download".to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Reject anything that is not an absolute scratch path a converter
    /// could not mistake for an option.
    pub fn ensure_scratch_path(path: &Path) -> Result<(), ConversionError> {
        let starts_with_dash = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('-'))
            .unwrap_or(true);

        if !path.is_absolute() || starts_with_dash {
            return Err(ConversionError::UnsafePath {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// `file://` URL for an absolute path, percent-encoding everything but
    /// unreserved characters and `/`.
    pub fn file_url(path: &Path) -> String {
        let raw = path.to_string_lossy();
        let mut url = String::with_capacity(raw.len() + 7);
        url.push_str("file://");
        for byte in raw.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                    url.push(byte as char)
                }
                _ => url.push_str(&format!("%{byte:02X}")),
            }
        }
        url
    }

    /// MIME type for an output extension.
    pub fn content_type_for_extension(ext: &str) -> &'static str {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => "application/pdf",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "doc" => "application/msword",
            "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "ppt" => "application/vnd.ms-powerpoint",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "xls" => "application/vnd.ms-excel",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            _ => "application/octet-stream",
        }
    }

    /// Last path component of a caller-supplied name, whichever separator it uses.
    fn base_name(name: &str) -> &str {
        name.rsplit(['/', '\\']).next().unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_sanitize_extension_edge_cases() {
        assert_eq!(FsUtils::sanitize_extension("report.DOCX").as_deref(), Some("docx"));
        assert_eq!(FsUtils::sanitize_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(FsUtils::sanitize_extension("noext"), None);
        assert_eq!(FsUtils::sanitize_extension(".bashrc"), None);
        assert_eq!(FsUtils::sanitize_extension("evil.pdf;rm -rf"), None);
        assert_eq!(FsUtils::sanitize_extension("dir.v2/plain"), None);
        assert_eq!(FsUtils::sanitize_extension("x.abcdefghijk"), None);
    }

    #[test]
    fn test_scratch_names_are_unique_and_safe() {
        let a = FsUtils::generate_scratch_name("$(reboot).pdf");
        let b = FsUtils::generate_scratch_name("$(reboot).pdf");
        assert_ne!(a, b);
        assert!(a.ends_with(".pdf"));
        assert!(!a.contains('$'));
        assert!(a.chars().next().is_some_and(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(FsUtils::file_stem("report.final.docx"), "report.final");
        assert_eq!(FsUtils::file_stem("report"), "report");
        assert_eq!(FsUtils::file_stem(".hidden"), ".hidden");
    }

    #[test]
    fn test_sanitize_download_name() {
        assert_eq!(FsUtils::sanitize_download_name("report.pdf"), "report.pdf");
        assert_eq!(
            FsUtils::sanitize_download_name("C:\\Users\\me\\a\"b.pdf"),
            "a_b.pdf"
        );
        assert_eq!(FsUtils::sanitize_download_name("line\nbreak.pdf"), "line_break.pdf");
        assert_eq!(FsUtils::sanitize_download_name(".."), "download");
        assert_eq!(FsUtils::sanitize_download_name(""), "download");
    }

    #[test]
    fn test_ensure_scratch_path() {
        assert!(FsUtils::ensure_scratch_path(&std::env::temp_dir().join("1-a.pdf")).is_ok());
        assert!(FsUtils::ensure_scratch_path(&PathBuf::from("relative.pdf")).is_err());
        assert!(
            FsUtils::ensure_scratch_path(&std::env::temp_dir().join("-oProxy.pdf")).is_err()
        );
    }

    #[test]
    fn test_file_url_encodes_reserved_bytes() {
        assert_eq!(
            FsUtils::file_url(Path::new("/tmp/scratch/profile-1-a.docx")),
            "file:///tmp/scratch/profile-1-a.docx"
        );
        assert_eq!(
            FsUtils::file_url(Path::new("/var/my docs/p#1%")),
            "file:///var/my%20docs/p%231%25"
        );
    }

    #[test]
    fn test_content_types() {
        assert_eq!(FsUtils::content_type_for_extension("PDF"), "application/pdf");
        assert_eq!(FsUtils::content_type_for_extension("jpeg"), "image/jpeg");
        assert_eq!(
            FsUtils::content_type_for_extension("zzz"),
            "application/octet-stream"
        );
    }
}
