//! Error types.
//!
//! Extraction problems never surface here: a malformed table or list is
//! logged and skipped. Only failures of the rendering surface or the PDF
//! backend abort an export.

use thiserror::Error;

use crate::export::ExportFormat;

/// Page geometry that violates its own invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("page size must be positive (got {width}×{height})")]
    NonPositive { width: f32, height: f32 },

    #[error("margin {margin} must be less than half of the page {axis} ({extent})")]
    MarginTooLarge {
        margin: f32,
        axis: &'static str,
        extent: f32,
    },
}

/// An irrecoverable failure while rasterizing or serializing output.
#[derive(Error, Debug)]
pub enum RenderError {
    /// An image resource could not be loaded.
    #[error("image resource failed to load: {0}")]
    Image(String),

    /// The rendering surface failed to produce a raster.
    #[error("rendering surface error: {0}")]
    Surface(String),

    /// A rasterized page could not be encoded for embedding.
    #[error("page image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// The PDF backend rejected a resource.
    #[error("PDF backend error: {0}")]
    Pdf(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// The single user-facing error an export call can return.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to generate {}", .format.label())]
    Failed {
        format: ExportFormat,
        #[source]
        source: RenderError,
    },
}

impl ExportError {
    pub fn format(&self) -> ExportFormat {
        match self {
            ExportError::Failed { format, .. } => *format,
        }
    }
}
