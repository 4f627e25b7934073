// ABOUTME: Error types for the termgrid rendering pipeline
// ABOUTME: Separates per-item failures that are skipped from fatal render errors

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("decode image: {0}")]
    Decode(String),

    #[error("fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("no images to compose")]
    EmptyInput,

    #[error("encode image: {0}")]
    Encoding(String),

    #[error("item source failed: {0}")]
    Source(String),

    #[error("rendering cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RenderError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        RenderError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors confined to one item or page; the render loop reports them and moves on.
    pub fn is_item_local(&self) -> bool {
        matches!(
            self,
            RenderError::Decode(_)
                | RenderError::Fetch { .. }
                | RenderError::Encoding(_)
                | RenderError::EmptyInput
        )
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => RenderError::Io(e),
            image::ImageError::Encoding(e) => RenderError::Encoding(e.to_string()),
            other => RenderError::Decode(other.to_string()),
        }
    }
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
