// SPDX-License-Identifier: AGPL-3.0-or-later

//! Validation of uploaded scroll documents.
//!
//! Uploads are rejected before any content processing happens when they are too large, not
//! UTF-8, carry a blocked file extension or do not look like an HTML document at all.
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Maximum size of a single uploaded document.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// File extensions which are never accepted, independent of the detected content.
const BLOCKED_EXTENSIONS: [&str; 12] = [
    "exe", "com", "bat", "cmd", "msi", "sh", "ps1", "dll", "so", "dylib", "js", "jar",
];

/// Tags which identify a document as HTML when found within the first kilobyte.
static HTML_SNIFF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!doctype|<html|<head|<body").expect("valid regex"));

/// Reasons an upload gets rejected.
#[derive(Error, Debug, PartialEq)]
pub enum UploadError {
    #[error("File size {0:.1}MB exceeds maximum 50MB")]
    TooLarge(f64),

    #[error("File is not valid UTF-8 encoded text")]
    InvalidEncoding,

    #[error("File extension .{0} is not allowed for security reasons")]
    BlockedExtension(String),

    #[error("File does not appear to be valid HTML")]
    NotHtml,

    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Checks raw upload bytes and returns the decoded document content.
pub fn validate_upload(bytes: &[u8], filename: Option<&str>) -> Result<String, UploadError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge(bytes.len() as f64 / 1024.0 / 1024.0));
    }

    if let Some(name) = filename {
        if let Some(extension) = name.rsplit('.').next().filter(|ext| *ext != name) {
            let extension = extension.to_ascii_lowercase();
            if BLOCKED_EXTENSIONS.contains(&extension.as_str()) {
                return Err(UploadError::BlockedExtension(extension));
            }
        }
    }

    let content = std::str::from_utf8(bytes).map_err(|_| UploadError::InvalidEncoding)?;
    validate_html_content(content)?;

    Ok(content.to_string())
}

/// Checks that pasted or decoded content looks like an HTML document.
///
/// Only the first kilobyte is inspected, matching how little of a document is needed to
/// recognise its markup.
pub fn validate_html_content(content: &str) -> Result<(), UploadError> {
    if content.trim().is_empty() {
        return Err(UploadError::MissingField("HTML content"));
    }

    let head_len = content
        .char_indices()
        .take_while(|(idx, _)| *idx < 1024)
        .last()
        .map(|(idx, c)| idx + c.len_utf8())
        .unwrap_or(0);

    if !HTML_SNIFF.is_match(&content[..head_len]) {
        return Err(UploadError::NotHtml);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{validate_html_content, validate_upload, UploadError, MAX_UPLOAD_BYTES};

    #[test]
    fn accepts_small_html_file() {
        let content = validate_upload(b"<!DOCTYPE html><html><body>ok</body></html>", Some("paper.html"))
            .unwrap();
        assert!(content.contains("ok"));
    }

    #[test]
    fn rejects_oversized_upload() {
        let bytes = vec![b'a'; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            validate_upload(&bytes, Some("paper.html")),
            Err(UploadError::TooLarge(_))
        ));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let bytes = [0x3c, 0x68, 0xff, 0xfe];
        assert_eq!(
            validate_upload(&bytes, Some("paper.html")),
            Err(UploadError::InvalidEncoding)
        );
    }

    #[rstest]
    #[case("malware.exe", "exe")]
    #[case("script.sh", "sh")]
    #[case("payload.Js", "js")]
    fn rejects_blocked_extensions(#[case] filename: &str, #[case] extension: &str) {
        assert_eq!(
            validate_upload(b"<html></html>", Some(filename)),
            Err(UploadError::BlockedExtension(extension.to_string()))
        );
    }

    #[test]
    fn rejects_content_without_html_tags() {
        assert_eq!(
            validate_html_content("just a plain text note"),
            Err(UploadError::NotHtml)
        );
    }

    #[test]
    fn sniffs_tags_case_insensitively() {
        assert!(validate_html_content("<HTML><BODY>LOUD</BODY></HTML>").is_ok());
        assert!(validate_html_content("<!doctype html><p>quiet</p>").is_ok());
    }
}
