//! Base64 file helpers for blob fields (`cover` + `coverContentType`).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Human-readable decoded size of a base64 payload, e.g. `"1 234 bytes"`.
pub fn byte_size(base64: &str) -> String {
    format_as_bytes(size(base64))
}

fn padding_size(value: &str) -> usize {
    if value.ends_with("==") {
        2
    } else if value.ends_with('=') {
        1
    } else {
        0
    }
}

fn size(value: &str) -> usize {
    (value.len() / 4 * 3).saturating_sub(padding_size(value))
}

/// Groups digits in threes with spaces and appends ` bytes`.
pub fn format_as_bytes(size: usize) -> String {
    let digits = size.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 6);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out.push_str(" bytes");
    out
}

/// A file read for upload: base64 data plus its content type.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedFile {
    pub data: String,
    pub content_type: String,
}

impl LoadedFile {
    /// Sets `<field>` and `<field>ContentType` on a JSON object.
    pub fn apply_to(&self, target: &mut serde_json::Map<String, serde_json::Value>, field: &str) {
        target.insert(field.to_string(), self.data.clone().into());
        target.insert(format!("{}ContentType", field), self.content_type.clone().into());
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FileLoadError {
    #[error("File was expected to be an image but was found to be '{file_type}'")]
    NotImage { file_type: String },
    #[error("Could not extract file")]
    CouldNotExtract { file: String },
}

impl FileLoadError {
    /// Alert key, as reported to the user (`error.file.<key>`).
    pub fn key(&self) -> &'static str {
        match self {
            FileLoadError::NotImage { .. } => "not.image",
            FileLoadError::CouldNotExtract { .. } => "could.not.extract",
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            FileLoadError::NotImage { file_type } => vec![("fileType", file_type.clone())],
            FileLoadError::CouldNotExtract { file } => vec![("file", file.clone())],
        }
    }
}

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("bmp", "image/bmp"),
    ("ico", "image/x-icon"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("json", "application/json"),
    ("mp4", "video/mp4"),
    ("mp3", "audio/mpeg"),
];

/// Content type from the file extension; `application/octet-stream` when unknown.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    CONTENT_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, t)| *t)
        .unwrap_or("application/octet-stream")
}

/// Reads a file into base64. With `is_image`, anything but `image/*` is rejected.
pub fn load_file(path: &Path, is_image: bool) -> Result<LoadedFile, FileLoadError> {
    let content_type = content_type_for(path);
    if is_image && !content_type.starts_with("image/") {
        return Err(FileLoadError::NotImage {
            file_type: content_type.to_string(),
        });
    }
    let bytes = std::fs::read(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "file read failed");
        FileLoadError::CouldNotExtract {
            file: path.display().to_string(),
        }
    })?;
    Ok(LoadedFile {
        data: STANDARD.encode(bytes),
        content_type: content_type.to_string(),
    })
}

/// Decodes stored base64 data back to bytes.
pub fn decode_file(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn byte_size_accounts_for_padding() {
        assert_eq!(byte_size("aGVsbG8="), "5 bytes");
        assert_eq!(byte_size("aGk="), "2 bytes");
        assert_eq!(byte_size("aGVsbG8h"), "6 bytes");
        assert_eq!(byte_size(""), "0 bytes");
    }

    #[test]
    fn thousands_are_space_separated() {
        assert_eq!(format_as_bytes(999), "999 bytes");
        assert_eq!(format_as_bytes(1234), "1 234 bytes");
        assert_eq!(format_as_bytes(1_234_567), "1 234 567 bytes");
    }

    #[test]
    fn load_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poster.PNG");
        std::fs::File::create(&path).unwrap().write_all(b"hello").unwrap();
        let loaded = load_file(&path, true).unwrap();
        assert_eq!(loaded.content_type, "image/png");
        assert_eq!(loaded.data, "aGVsbG8=");
        assert_eq!(decode_file(&loaded.data).unwrap(), b"hello");

        let mut body = serde_json::Map::new();
        loaded.apply_to(&mut body, "cover");
        assert_eq!(body["coverContentType"], "image/png");
    }

    #[test]
    fn non_image_is_rejected_when_image_expected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "x").unwrap();
        let err = load_file(&path, true).unwrap_err();
        assert_eq!(err.key(), "not.image");
        assert_eq!(err.to_string(), "File was expected to be an image but was found to be 'text/plain'");
        assert!(load_file(&path, false).is_ok());
    }

    #[test]
    fn missing_file_cannot_be_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("gone.png"), true).unwrap_err();
        assert_eq!(err.key(), "could.not.extract");
    }
}
