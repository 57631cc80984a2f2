//! Export – the adapter entry points that tie interpolation, extraction,
//! pagination and rendering into a single call per output format.
//!
//! Every call walks the same phases: `Idle → Preparing → Rendering →
//! Serialized → Idle`, or `→ Failed` when rendering fails. A failed call
//! returns only the error; no partial buffer ever reaches the caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::blocks::{extract, ContentBlock};
use crate::dom::{body_children, parse_html};
use crate::error::{ExportError, RenderError};
use crate::fonts::FontManager;
use crate::geometry::{PageGeometry, PageOrientation};
use crate::interpolate::{interpolate, interpolate_text_nodes, unresolved_variables, TemplateData};
use crate::layout_config::LayoutConfig;
use crate::pagination::{apply_footer, paginate_blocks, FooterSpec};
use crate::raster::{paginate_raster, raster_layout};
use crate::render::render_pdf;
use crate::rtf::to_rtf;
use crate::surface::{RenderSurface, SoftwareSurface};
use crate::theme::{ThemeConfig, ThemeKey};
use crate::word::{to_word_html, WORD_MIME_TYPE};

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// Output formats the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    /// Rasterized pages embedded as images.
    RasterPdf,
    /// Text, tables and lists drawn as PDF primitives.
    StructuredPdf,
    Rtf,
    /// HTML in a Word document shell.
    Word,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::RasterPdf,
        ExportFormat::StructuredPdf,
        ExportFormat::Rtf,
        ExportFormat::Word,
    ];

    /// Name used in the user-facing failure message.
    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::RasterPdf | ExportFormat::StructuredPdf => "PDF",
            ExportFormat::Rtf => "RTF document",
            ExportFormat::Word => "Word document",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::RasterPdf | ExportFormat::StructuredPdf => "pdf",
            ExportFormat::Rtf => "rtf",
            ExportFormat::Word => "doc",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::RasterPdf | ExportFormat::StructuredPdf => "application/pdf",
            ExportFormat::Rtf => "text/rtf",
            ExportFormat::Word => WORD_MIME_TYPE,
        }
    }

    pub fn is_paginated(self) -> bool {
        matches!(self, ExportFormat::RasterPdf | ExportFormat::StructuredPdf)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::RasterPdf => "raster-pdf",
            ExportFormat::StructuredPdf => "pdf",
            ExportFormat::Rtf => "rtf",
            ExportFormat::Word => "doc",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" | "structured-pdf" => Ok(ExportFormat::StructuredPdf),
            "raster-pdf" | "raster" => Ok(ExportFormat::RasterPdf),
            "rtf" => Ok(ExportFormat::Rtf),
            "doc" | "word" => Ok(ExportFormat::Word),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / options / output
// ---------------------------------------------------------------------------

/// Word and character counts shown in the PDF footer. Rendered verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub word_count: u64,
    pub char_count: u64,
}

/// Everything the caller hands over for one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    /// Editor HTML fragment.
    pub content: String,
    #[serde(default, deserialize_with = "theme_or_default")]
    pub theme: ThemeKey,
    #[serde(default)]
    pub meta: Option<DocumentMeta>,
    #[serde(default)]
    pub template_data: Option<TemplateData>,
}

fn theme_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<ThemeKey, D::Error> {
    let name = Option::<String>::deserialize(d)?;
    Ok(name.as_deref().map(ThemeKey::from_name).unwrap_or_default())
}

impl ExportRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_theme(mut self, theme: ThemeKey) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_meta(mut self, word_count: u64, char_count: u64) -> Self {
        self.meta = Some(DocumentMeta {
            word_count,
            char_count,
        });
        self
    }

    pub fn with_template_data(mut self, data: TemplateData) -> Self {
        self.template_data = Some(data);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }
}

/// Per-call rendering options.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Document title embedded in PDF metadata and the Word `<title>`.
    pub title: String,
    pub orientation: PageOrientation,
    /// Pixel density raster pages are drawn at.
    pub raster_dpi: f32,
    /// Pixel density of structured layout; 72 makes one pixel one point.
    pub structured_dpi: f32,
    /// Draw `Page i of N` in the PDF footer.
    pub page_numbers: bool,
    /// Substitute variables only inside text nodes, leaving attributes alone.
    pub text_nodes_only: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            title: "page-forge export".to_string(),
            orientation: PageOrientation::Portrait,
            raster_dpi: 96.0,
            structured_dpi: 72.0,
            page_numbers: true,
            text_nodes_only: false,
        }
    }
}

/// A complete export result.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    /// Page count for paginated formats.
    pub page_count: Option<usize>,
}

impl ExportOutput {
    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn suggested_filename(&self, stem: &str) -> String {
        format!("{stem}.{}", self.extension())
    }

    /// The buffer as text, for the flow formats.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Idle,
    /// Interpolation and extraction.
    Preparing,
    /// Pagination and rendering, or pass-through for flow formats.
    Rendering,
    Serialized,
    Failed,
}

struct ExportRun {
    format: ExportFormat,
    phase: ExportPhase,
}

impl ExportRun {
    fn start(format: ExportFormat) -> Self {
        Self {
            format,
            phase: ExportPhase::Idle,
        }
    }

    fn enter(&mut self, next: ExportPhase) {
        log::debug!("{} export: {:?} → {:?}", self.format, self.phase, next);
        self.phase = next;
    }

    /// Interpolate the request content.
    fn prepare(&mut self, request: &ExportRequest, options: &ExportOptions) -> String {
        self.enter(ExportPhase::Preparing);
        let data = request.template_data.as_ref();
        let missing = unresolved_variables(&request.content, data);
        if !missing.is_empty() {
            log::debug!("unresolved template variables: {}", missing.join(", "));
        }
        if options.text_nodes_only {
            interpolate_text_nodes(&request.content, data)
        } else {
            interpolate(&request.content, data)
        }
    }

    fn finish(
        mut self,
        result: Result<(Vec<u8>, Option<usize>), RenderError>,
    ) -> Result<ExportOutput, ExportError> {
        match result {
            Ok((bytes, page_count)) => {
                self.enter(ExportPhase::Serialized);
                self.enter(ExportPhase::Idle);
                Ok(ExportOutput {
                    bytes,
                    format: self.format,
                    page_count,
                })
            }
            Err(source) => {
                log::error!("{} export failed: {source}", self.format);
                self.enter(ExportPhase::Failed);
                Err(ExportError::Failed {
                    format: self.format,
                    source,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Export `request` as `format`. Raster PDF uses the built-in
/// [`SoftwareSurface`].
pub fn export(
    request: &ExportRequest,
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<ExportOutput, ExportError> {
    match format {
        ExportFormat::RasterPdf => {
            let theme = request.theme.config();
            let geometry = PageGeometry::a4(options.raster_dpi, theme.padding, options.orientation)
                .map_err(|e| ExportError::Failed {
                    format,
                    source: e.into(),
                })?;
            let mut surface = SoftwareSurface::new(&geometry);
            export_raster_pdf(request, options, &mut surface)
        }
        ExportFormat::StructuredPdf => export_structured_pdf(request, options),
        ExportFormat::Rtf => export_rtf(request, options),
        ExportFormat::Word => export_word(request, options),
    }
}

/// Raster PDF through a caller-supplied surface. The surface is held
/// exclusively for the whole call.
pub fn export_raster_pdf<S: RenderSurface + ?Sized>(
    request: &ExportRequest,
    options: &ExportOptions,
    surface: &mut S,
) -> Result<ExportOutput, ExportError> {
    let mut run = ExportRun::start(ExportFormat::RasterPdf);
    let html = run.prepare(request, options);
    run.enter(ExportPhase::Rendering);
    run.finish(render_raster(&html, request, options, surface))
}

fn render_raster<S: RenderSurface + ?Sized>(
    html: &str,
    request: &ExportRequest,
    options: &ExportOptions,
    surface: &mut S,
) -> Result<(Vec<u8>, Option<usize>), RenderError> {
    let theme = request.theme.config();
    let footer = footer_for(request, options);
    let geometry = PageGeometry::a4(options.raster_dpi, theme.padding, options.orientation)?;
    let nodes = body_children(&parse_html(html));

    let footer_px = footer.reserve_pt(&theme) * geometry.scale();
    let pages = paginate_raster(&nodes, surface, &geometry, &theme, footer_px)?;
    let mut config = raster_layout(&pages, &geometry, &theme)?;
    config.title = options.title.clone();
    apply_footer(&mut config, &footer, &theme, theme.padding, &FontManager::default());

    let page_count = config.pages.len();
    Ok((render_pdf(&config)?, Some(page_count)))
}

pub fn export_structured_pdf(
    request: &ExportRequest,
    options: &ExportOptions,
) -> Result<ExportOutput, ExportError> {
    let mut run = ExportRun::start(ExportFormat::StructuredPdf);
    let html = run.prepare(request, options);
    let blocks = extract(&html);
    run.enter(ExportPhase::Rendering);
    let result = structured_layout(&blocks, request, options).and_then(|config| {
        let page_count = config.pages.len();
        Ok((render_pdf(&config)?, Some(page_count)))
    });
    run.finish(result)
}

fn footer_for(request: &ExportRequest, options: &ExportOptions) -> FooterSpec {
    FooterSpec {
        page_numbers: options.page_numbers,
        meta: request.meta,
    }
}

fn structured_layout(
    blocks: &[ContentBlock],
    request: &ExportRequest,
    options: &ExportOptions,
) -> Result<LayoutConfig, RenderError> {
    let theme: ThemeConfig = request.theme.config();
    let fonts = FontManager::default();
    let footer = footer_for(request, options);
    let geometry = PageGeometry::a4(options.structured_dpi, theme.padding, options.orientation)?;

    let mut config = paginate_blocks(blocks, &geometry, &theme, &fonts, footer.reserve_pt(&theme));
    config.title = options.title.clone();
    config.page_background = Some(theme.background_color.to_array());
    apply_footer(&mut config, &footer, &theme, theme.padding, &fonts);
    Ok(config)
}

/// Structured-mode page layout without rendering, for inspection.
pub fn structured_layout_config(
    request: &ExportRequest,
    options: &ExportOptions,
) -> Result<LayoutConfig, ExportError> {
    let html = ExportRun::start(ExportFormat::StructuredPdf).prepare(request, options);
    structured_layout(&extract(&html), request, options).map_err(|source| ExportError::Failed {
        format: ExportFormat::StructuredPdf,
        source,
    })
}

/// Interpolated, extracted content blocks of a request.
pub fn content_blocks(request: &ExportRequest) -> Vec<ContentBlock> {
    extract(&interpolate(&request.content, request.template_data.as_ref()))
}

pub fn export_rtf(
    request: &ExportRequest,
    options: &ExportOptions,
) -> Result<ExportOutput, ExportError> {
    let mut run = ExportRun::start(ExportFormat::Rtf);
    let html = run.prepare(request, options);
    run.enter(ExportPhase::Rendering);
    let rtf = to_rtf(&html, &request.theme.config());
    run.finish(Ok((rtf.into_bytes(), None)))
}

pub fn export_word(
    request: &ExportRequest,
    options: &ExportOptions,
) -> Result<ExportOutput, ExportError> {
    let mut run = ExportRun::start(ExportFormat::Word);
    let html = run.prepare(request, options);
    run.enter(ExportPhase::Rendering);
    let doc = to_word_html(&html, &request.theme.config(), &options.title);
    run.finish(Ok((doc.into_bytes(), None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolate::TemplateValue;

    #[test]
    fn format_descriptors() {
        assert_eq!(ExportFormat::Word.extension(), "doc");
        assert_eq!(ExportFormat::Word.mime_type(), "application/msword");
        assert_eq!(ExportFormat::Rtf.extension(), "rtf");
        assert_eq!("raster-pdf".parse::<ExportFormat>(), Ok(ExportFormat::RasterPdf));
        assert_eq!("pdf".parse::<ExportFormat>(), Ok(ExportFormat::StructuredPdf));
        for f in ExportFormat::ALL {
            assert_eq!(f.to_string().parse::<ExportFormat>(), Ok(f));
        }
    }

    #[test]
    fn request_from_camel_case_json() {
        let req = ExportRequest::from_json(
            r#"{"content":"<p>${n}</p>","theme":"sepia","meta":{"wordCount":3,"charCount":12},"templateData":{"n":5}}"#,
        )
        .unwrap();
        assert_eq!(req.theme, ThemeKey::Default);
        assert_eq!(req.meta, Some(DocumentMeta { word_count: 3, char_count: 12 }));
        assert_eq!(
            req.template_data.unwrap().get("n"),
            Some(&TemplateValue::Number(5.0))
        );
    }

    #[test]
    fn failure_reports_format_label() {
        let err = ExportRun::start(ExportFormat::Word)
            .finish(Err(RenderError::Surface("gone".into())))
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to generate Word document");
        assert_eq!(err.format(), ExportFormat::Word);
    }

    #[test]
    fn suggested_filename_uses_extension() {
        let out = export_rtf(&ExportRequest::new("<p>x</p>"), &ExportOptions::default()).unwrap();
        assert_eq!(out.suggested_filename("notes"), "notes.rtf");
        assert_eq!(out.page_count, None);
    }

    #[test]
    fn text_nodes_only_keeps_attributes() {
        let mut data = TemplateData::new();
        data.insert("c".into(), "red".into());
        let req = ExportRequest::new(r#"<p class="${c}">${c}</p>"#).with_template_data(data);
        let options = ExportOptions {
            text_nodes_only: true,
            ..ExportOptions::default()
        };
        let out = export_word(&req, &options).unwrap();
        let text = out.as_text().unwrap();
        assert!(text.contains(r#"<p class="${c}">red</p>"#));
    }
}
