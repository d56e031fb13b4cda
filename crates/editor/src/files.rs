use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::error::FileError;

const FALLBACK_MIME: &str = "application/octet-stream";

/// A file handed over by the host's picker or recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn mime_or_default(&self) -> &str {
        if self.mime.trim().is_empty() {
            FALLBACK_MIME
        } else {
            &self.mime
        }
    }
}

/// Stored attachment bytes re-materialized for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

pub fn validate(file: &IncomingFile, limit: usize) -> Result<(), FileError> {
    if file.bytes.is_empty() {
        return Err(FileError::Empty {
            name: file.name.clone(),
        });
    }
    if file.bytes.len() > limit {
        return Err(FileError::TooLarge {
            name: file.name.clone(),
            size: file.bytes.len(),
            limit,
        });
    }
    Ok(())
}

/// Like [`validate`], additionally requiring a MIME type under `family/`.
pub fn validate_kind(file: &IncomingFile, limit: usize, family: &str) -> Result<(), FileError> {
    validate(file, limit)?;
    let mime = file.mime.to_ascii_lowercase();
    if !mime
        .strip_prefix(family)
        .is_some_and(|rest| rest.starts_with('/'))
    {
        return Err(FileError::UnsupportedType {
            name: file.name.clone(),
            mime: file.mime.clone(),
        });
    }
    Ok(())
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Splits a base64 data URI into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), FileError> {
    let rest = uri
        .trim()
        .strip_prefix("data:")
        .ok_or(FileError::MalformedDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(FileError::MalformedDataUri)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(FileError::MalformedDataUri)?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| FileError::MalformedDataUri)?;
    let mime = if mime.is_empty() { FALLBACK_MIME } else { mime };
    Ok((mime.to_string(), bytes))
}

/// Human-readable size: bytes below 1 KiB, then KB and MB with one decimal.
pub fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.1} KB", value / KIB)
    } else {
        format!("{:.1} MB", value / (KIB * KIB))
    }
}

/// `m:ss` label for a duration in seconds.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
