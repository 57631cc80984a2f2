//! # page-forge – document export & pagination engine
//!
//! Turns an editor HTML fragment plus a map of `${name}` template variables
//! into a fixed-page or flow document. The stages are:
//!
//! 1. **Interpolate** – substitute template variables ([`interpolate`])
//! 2. **Extract** – HTML → ordered content blocks ([`blocks`]), or a DOM tree
//!    for raster mode and Word output ([`dom`])
//! 3. **Paginate** – analytic ([`pagination`]) or rasterized ([`raster`])
//!    page breaking, with tables split by row and their header repeated
//! 4. **Render** – PDF bytes via printpdf ([`render`]), RTF ([`rtf`]) or
//!    Word-compatible HTML ([`word`])
//!
//! [`export`] ties the stages together per output format. A C-compatible
//! FFI surface is exposed via the [`ffi`] module.

pub mod blocks;
pub mod dom;
pub mod error;
pub mod export;
pub mod ffi;
pub mod fonts;
pub mod geometry;
pub mod interpolate;
pub mod layout_config;
pub mod pagination;
pub mod raster;
pub mod render;
pub mod rtf;
pub mod surface;
pub mod templates;
pub mod theme;
pub mod word;

// Re-exports for convenience
pub use blocks::{extract, Alignment, ContentBlock};
pub use error::{ExportError, RenderError};
pub use export::{export, DocumentMeta, ExportFormat, ExportOptions, ExportOutput, ExportRequest};
pub use geometry::{PageGeometry, PageOrientation};
pub use interpolate::{interpolate, TemplateData, TemplateValue};
pub use surface::{RenderSurface, SoftwareSurface};
pub use theme::{ThemeConfig, ThemeKey};
