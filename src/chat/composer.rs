use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;

use crate::chat::message::{ContentPart, MessageContent};

/// Image payload attached to a user turn.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    bytes: Vec<u8>,
    mime: String,
}

impl ImageAttachment {
    /// Sniffs the byte format; only PNG and JPEG pass the gate. Bytes are
    /// carried unrecoded.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AttachmentError> {
        let mime = match image::guess_format(&bytes) {
            Ok(ImageFormat::Png) => "image/png",
            Ok(ImageFormat::Jpeg) => "image/jpeg",
            _ => return Err(AttachmentError::UnsupportedFormat),
        };
        Ok(Self {
            bytes,
            mime: mime.to_string(),
        })
    }

    /// Reads and sniffs one image file.
    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = fs::read(path)
            .map_err(|source| AttachmentError::Read(path.display().to_string(), source))?;
        Self::from_bytes(bytes)
    }

    /// Wraps bytes whose content type was declared by the transport, e.g. a
    /// multipart upload. No sniffing happens on this path.
    pub fn with_declared_mime(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Encodes the attachment as a `data:<mime>;base64,<payload>` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug)]
pub enum AttachmentError {
    UnsupportedFormat,
    Read(String, io::Error),
}

impl fmt::Display for AttachmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat => {
                write!(f, "unsupported image format: only PNG and JPEG are accepted")
            }
            Self::Read(path, source) => write!(f, "failed to read image '{path}': {source}"),
        }
    }
}

impl std::error::Error for AttachmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(_, source) => Some(source),
            Self::UnsupportedFormat => None,
        }
    }
}

/// Builds the body of one user turn from optional text and an optional
/// image.
///
/// Text alone stays a plain string; an image produces a part sequence, text
/// part first when both are present. Callers guard that at least one input
/// exists before invoking.
pub fn compose_user_content(
    text: Option<&str>,
    image: Option<&ImageAttachment>,
) -> MessageContent {
    debug_assert!(text.is_some() || image.is_some());
    match (text, image) {
        (Some(text), None) => MessageContent::Text(text.to_string()),
        (None, Some(image)) => {
            MessageContent::Parts(vec![ContentPart::image(image.to_data_uri())])
        }
        (Some(text), Some(image)) => MessageContent::Parts(vec![
            ContentPart::text(text),
            ContentPart::image(image.to_data_uri()),
        ]),
        (None, None) => MessageContent::Text(String::new()),
    }
}
