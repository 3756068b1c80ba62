//! Content extraction seam.
//!
//! Format-specific parsing (PDF, images, spreadsheets, word processors) lives
//! outside this crate; callers plug their parsers in through
//! [`ContentExtractor`]. The built-in [`PlainTextExtractor`] covers UTF-8 text
//! formats so the service is usable out of the box.

use async_trait::async_trait;
use thiserror::Error;

/// Output of a successful extraction.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Full plain text content of the document.
    pub text: String,
    /// Page count, when the source format has pages.
    pub page_count: Option<usize>,
}

/// Errors raised while extracting text from uploaded bytes.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No extractor is available for the file type.
    #[error("no extractor available for file type '{file_type}'")]
    Unsupported {
        /// The rejected file type.
        file_type: String,
    },
    /// Bytes were not valid text in the expected encoding.
    #[error("file is not valid UTF-8 text")]
    InvalidEncoding,
    /// Extractor-specific failure.
    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Interface implemented by content extraction backends.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract plain text from the raw upload bytes.
    async fn extract(&self, bytes: &[u8], file_type: &str) -> Result<ExtractedText, ExtractionError>;
}

/// File types the plain-text extractor accepts.
const TEXT_FILE_TYPES: [&str; 7] = ["txt", "md", "markdown", "csv", "json", "log", "html"];

/// Extractor for UTF-8 text formats.
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    /// Construct the extractor.
    pub const fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8], file_type: &str) -> Result<ExtractedText, ExtractionError> {
        if !TEXT_FILE_TYPES.contains(&file_type) {
            return Err(ExtractionError::Unsupported {
                file_type: file_type.to_string(),
            });
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|_| ExtractionError::InvalidEncoding)?
            .to_string();
        Ok(ExtractedText {
            text,
            page_count: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_utf8_text() {
        let extractor = PlainTextExtractor::new();
        let result = extractor
            .extract("hello world".as_bytes(), "txt")
            .await
            .expect("extraction");
        assert_eq!(result.text, "hello world");
        assert_eq!(result.page_count, None);
    }

    #[tokio::test]
    async fn rejects_unsupported_type() {
        let extractor = PlainTextExtractor::new();
        let error = extractor
            .extract(&[0_u8, 1, 2], "pdf")
            .await
            .expect_err("unsupported");
        assert!(matches!(
            error,
            ExtractionError::Unsupported { file_type } if file_type == "pdf"
        ));
    }

    #[tokio::test]
    async fn rejects_invalid_utf8() {
        let extractor = PlainTextExtractor::new();
        let error = extractor
            .extract(&[0xff, 0xfe], "txt")
            .await
            .expect_err("bad encoding");
        assert!(matches!(error, ExtractionError::InvalidEncoding));
    }
}
