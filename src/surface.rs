//! Rendering surfaces – where raster mode turns DOM fragments into pixels.
//!
//! A surface is attached once per export, asked to rasterize fragments at
//! the content width, and detached when the export ends. [`ScratchContainer`]
//! owns the attach/detach pairing so the surface is released on every exit
//! path, including `?` returns and panics.
//!
//! [`SoftwareSurface`] is the built-in surface: it lays fragments out with
//! the bundled font's metrics and paints text glyphs, table grids, header
//! shading and embedded images.

use image::{imageops, Rgba, RgbaImage};

use crate::blocks::Alignment;
use crate::dom::{DomNode, ElementNode, Tag};
use crate::error::RenderError;
use crate::fonts::{wrap_text, FontManager};
use crate::geometry::PageGeometry;
use crate::pagination::{BLOCK_SPACING_PT, CELL_PADDING_PT, LIST_INDENT_PT, ROW_MIN_HEIGHT_PT, TABLE_MARGIN_PT};
use crate::render::parse_data_uri;
use crate::theme::ThemeConfig;

/// Something that can rasterize a DOM fragment at a fixed viewport width.
pub trait RenderSurface {
    /// Width in pixels every fragment is laid out at.
    fn viewport_width(&self) -> u32;

    /// Prepare the surface for one export run.
    fn attach(&mut self, theme: &ThemeConfig) -> Result<(), RenderError>;

    /// Rasterize `node` and return an image exactly as tall as its content.
    fn rasterize(&mut self, node: &DomNode) -> Result<RgbaImage, RenderError>;

    /// Release whatever `attach` acquired. Must be safe to call after a
    /// failed `rasterize`.
    fn detach(&mut self);
}

/// Scoped attachment of a surface. Detaches on drop.
pub struct ScratchContainer<'s, S: RenderSurface + ?Sized> {
    surface: &'s mut S,
}

impl<'s, S: RenderSurface + ?Sized> ScratchContainer<'s, S> {
    pub fn attach(surface: &'s mut S, theme: &ThemeConfig) -> Result<Self, RenderError> {
        surface.attach(theme)?;
        log::debug!("scratch container attached ({}px wide)", surface.viewport_width());
        Ok(Self { surface })
    }

    pub fn viewport_width(&self) -> u32 {
        self.surface.viewport_width()
    }

    pub fn rasterize(&mut self, node: &DomNode) -> Result<RgbaImage, RenderError> {
        self.surface.rasterize(node)
    }
}

impl<S: RenderSurface + ?Sized> Drop for ScratchContainer<'_, S> {
    fn drop(&mut self) {
        self.surface.detach();
        log::debug!("scratch container detached");
    }
}

// ---------------------------------------------------------------------------
// Software surface
// ---------------------------------------------------------------------------

/// CPU surface painting with the `image` crate.
pub struct SoftwareSurface {
    width: u32,
    scale: f32,
    fonts: FontManager,
    theme: Option<ThemeConfig>,
}

impl SoftwareSurface {
    /// A surface as wide as the content area of `geometry`, painting with
    /// the bundled faces.
    pub fn new(geometry: &PageGeometry) -> Self {
        Self::with_fonts(geometry, FontManager::bundled())
    }

    pub fn with_fonts(geometry: &PageGeometry, fonts: FontManager) -> Self {
        Self {
            width: geometry.content_width().round().max(1.0) as u32,
            scale: geometry.scale(),
            fonts,
            theme: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.theme.is_some()
    }
}

impl RenderSurface for SoftwareSurface {
    fn viewport_width(&self) -> u32 {
        self.width
    }

    fn attach(&mut self, theme: &ThemeConfig) -> Result<(), RenderError> {
        if self.theme.is_some() {
            return Err(RenderError::Surface("surface is already attached".into()));
        }
        self.theme = Some(theme.clone());
        Ok(())
    }

    fn rasterize(&mut self, node: &DomNode) -> Result<RgbaImage, RenderError> {
        let theme = self
            .theme
            .as_ref()
            .ok_or_else(|| RenderError::Surface("rasterize called on a detached surface".into()))?;

        let mut painter = Painter {
            theme,
            fonts: &self.fonts,
            scale: self.scale,
            ops: Vec::new(),
            y: 0.0,
        };
        painter.node(node, 0.0, self.width as f32)?;

        let height = painter.y.ceil().max(0.0) as u32;
        let mut canvas = RgbaImage::from_pixel(
            self.width,
            height,
            Rgba(theme.background_color.to_rgba8()),
        );
        for op in painter.ops {
            op.apply(&mut canvas);
        }
        Ok(canvas)
    }

    fn detach(&mut self) {
        self.theme = None;
    }
}

enum Paint {
    Fill {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: [u8; 4],
    },
    Image {
        x: f32,
        y: f32,
        image: RgbaImage,
    },
}

impl Paint {
    fn apply(self, canvas: &mut RgbaImage) {
        match self {
            Paint::Fill { x, y, w, h, color } => fill_rect(canvas, x, y, w, h, Rgba(color)),
            Paint::Image { x, y, image } => {
                imageops::overlay(canvas, &image, x.round() as i64, y.round() as i64)
            }
        }
    }
}

/// Fill a rectangle, clipped to the canvas.
pub(crate) fn fill_rect(canvas: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
    let x0 = x.round().max(0.0) as u32;
    let y0 = y.round().max(0.0) as u32;
    let x1 = ((x + w).round().max(0.0) as u32).min(canvas.width());
    let y1 = ((y + h).round().max(0.0) as u32).min(canvas.height());
    for py in y0..y1 {
        for px in x0..x1 {
            canvas.put_pixel(px, py, color);
        }
    }
}

/// Whitespace collapsed within each line; explicit breaks kept.
fn collapse(text: &str) -> String {
    text.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

fn is_block(tag: &Tag) -> bool {
    matches!(
        tag,
        Tag::Div | Tag::P | Tag::H(_) | Tag::Ul | Tag::Ol | Tag::Table | Tag::Hr | Tag::Unknown(_)
    )
}

/// Table rows in document order, looking through `thead`/`tbody`.
pub(crate) fn table_rows(table: &ElementNode) -> Vec<&ElementNode> {
    let mut rows = Vec::new();
    for child in table.element_children() {
        match child.tag {
            Tag::Tr => rows.push(child),
            Tag::Thead | Tag::Tbody => rows.extend(child.element_children().filter(|c| c.tag == Tag::Tr)),
            _ => {}
        }
    }
    rows
}

fn images_in<'a>(e: &'a ElementNode, out: &mut Vec<&'a ElementNode>) {
    for child in e.element_children() {
        if child.tag == Tag::Img {
            out.push(child);
        } else {
            images_in(child, out);
        }
    }
}

struct Painter<'a> {
    theme: &'a ThemeConfig,
    fonts: &'a FontManager,
    scale: f32,
    ops: Vec<Paint>,
    y: f32,
}

impl Painter<'_> {
    fn px(&self, pt: f32) -> f32 {
        pt * self.scale
    }

    fn node(&mut self, node: &DomNode, x: f32, width: f32) -> Result<(), RenderError> {
        match node {
            DomNode::Text(t) => {
                let text = collapse(t);
                if !text.is_empty() {
                    self.text(&text, x, width, None, Alignment::None);
                    self.y += self.px(BLOCK_SPACING_PT);
                }
                Ok(())
            }
            DomNode::Element(e) => self.element(e, x, width),
        }
    }

    fn element(&mut self, e: &ElementNode, x: f32, width: f32) -> Result<(), RenderError> {
        match e.tag {
            Tag::Table => self.table(e, x, width),
            Tag::Ul | Tag::Ol => self.list(e, x, width),
            Tag::Img => self.image(e, x, width),
            Tag::Hr => {
                self.y += self.px(BLOCK_SPACING_PT / 2.0);
                self.ops.push(Paint::Fill {
                    x,
                    y: self.y,
                    w: width,
                    h: self.px(1.0).max(1.0),
                    color: self.theme.table_border_color.to_rgba8(),
                });
                self.y += self.px(BLOCK_SPACING_PT / 2.0 + 1.0);
                Ok(())
            }
            Tag::Br => {
                self.y += self.fonts.line_height(self.px(self.theme.font_size), self.theme.line_height);
                Ok(())
            }
            _ if e.element_children().any(|c| is_block(&c.tag)) => {
                for child in &e.children {
                    self.node(child, x, width)?;
                }
                Ok(())
            }
            _ => {
                let level = match e.tag {
                    Tag::H(level) => Some(level),
                    _ => None,
                };
                let text = collapse(&e.text_content());
                if text.is_empty() {
                    // Empty paragraphs keep one line of height.
                    let mut images = Vec::new();
                    images_in(e, &mut images);
                    if images.is_empty() {
                        self.y += self
                            .fonts
                            .line_height(self.px(self.theme.font_size), self.theme.line_height);
                    }
                } else {
                    self.text(&text, x, width, level, e.alignment());
                }
                let mut images = Vec::new();
                images_in(e, &mut images);
                for img in images {
                    self.image(img, x, width)?;
                }
                self.y += self.px(BLOCK_SPACING_PT);
                Ok(())
            }
        }
    }

    /// Lay out wrapped text at the cursor and advance past it.
    fn text(&mut self, text: &str, x: f32, width: f32, heading: Option<u8>, align: Alignment) {
        let font_px = self.px(self.theme.heading_font_size(heading));
        let bold = heading.is_some();
        let lh = self.fonts.line_height(font_px, self.theme.line_height);
        for line in wrap_text(text, font_px, bold, width, self.fonts) {
            let w = self.fonts.measure_text_width(&line, font_px, bold).min(width);
            let dx = match align {
                Alignment::Center => (width - w) / 2.0,
                Alignment::Right => width - w,
                Alignment::Left | Alignment::Justify | Alignment::None => 0.0,
            };
            self.glyphs(&line, x + dx, self.y, font_px, bold, lh);
            self.y += lh;
        }
    }

    fn glyphs(&mut self, line: &str, x: f32, y: f32, font_px: f32, bold: bool, lh: f32) {
        let color = self.theme.font_color.to_rgba8();
        if let Some(image) = self.fonts.rasterize_line(line, font_px, bold, lh, color) {
            self.ops.push(Paint::Image { x, y, image });
        }
    }

    fn list(&mut self, e: &ElementNode, x: f32, width: f32) -> Result<(), RenderError> {
        let items: Vec<&ElementNode> = e.element_children().filter(|c| c.tag == Tag::Li).collect();
        if items.is_empty() {
            return Ok(());
        }
        let indent = self.px(LIST_INDENT_PT);
        let ordered = e.tag == Tag::Ol;
        for (i, item) in items.into_iter().enumerate() {
            let marker = if ordered { format!("{}.", i + 1) } else { "\u{2022}".to_string() };
            let top = self.y;
            self.text(&marker, x, indent, None, Alignment::Left);
            self.y = top;
            let text = collapse(&item.text_content());
            if text.is_empty() {
                self.y += self.fonts.line_height(self.px(self.theme.font_size), self.theme.line_height);
            } else {
                self.text(&text, x + indent, width - indent, None, Alignment::Left);
            }
        }
        self.y += self.px(BLOCK_SPACING_PT);
        Ok(())
    }

    fn table(&mut self, e: &ElementNode, x: f32, width: f32) -> Result<(), RenderError> {
        let rows = table_rows(e);
        let columns = rows
            .iter()
            .map(|r| r.element_children().filter(|c| matches!(c.tag, Tag::Td | Tag::Th)).count())
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return Ok(());
        }
        let col_width = width / columns as f32;
        let pad = self.px(CELL_PADDING_PT);
        let font_px = self.px(self.theme.font_size);
        let lh = self.fonts.line_height(font_px, self.theme.line_height);
        let border = self.theme.table_border_color.to_rgba8();
        let line = self.px(1.0).max(1.0);

        self.y += self.px(TABLE_MARGIN_PT);
        let table_top = self.y;
        for row in rows {
            let cells: Vec<&ElementNode> = row
                .element_children()
                .filter(|c| matches!(c.tag, Tag::Td | Tag::Th))
                .collect();
            let wrapped: Vec<(bool, Vec<String>)> = cells
                .iter()
                .map(|c| {
                    let bold = c.tag == Tag::Th;
                    let text = collapse(&c.text_content());
                    (bold, wrap_text(&text, font_px, bold, (col_width - 2.0 * pad).max(1.0), self.fonts))
                })
                .collect();
            let tallest = wrapped.iter().map(|(_, l)| l.len()).max().unwrap_or(1) as f32;
            let height = (tallest * lh + 2.0 * pad).max(self.px(ROW_MIN_HEIGHT_PT));
            let header = cells.iter().any(|c| c.tag == Tag::Th);

            if header {
                self.ops.push(Paint::Fill {
                    x,
                    y: self.y,
                    w: width,
                    h: height,
                    color: self.theme.table_header_bg.to_rgba8(),
                });
            }
            for (col, (bold, lines)) in wrapped.into_iter().enumerate() {
                let cx = x + col as f32 * col_width + pad;
                for (i, text) in lines.iter().enumerate() {
                    self.glyphs(text, cx, self.y + pad + i as f32 * lh, font_px, bold, lh);
                }
            }
            self.ops.push(Paint::Fill { x, y: self.y, w: width, h: line, color: border });
            self.y += height;
        }
        // Closing rule and column lines.
        self.ops.push(Paint::Fill { x, y: self.y - line, w: width, h: line, color: border });
        for col in 0..=columns {
            let cx = (x + col as f32 * col_width).min(x + width - line);
            self.ops.push(Paint::Fill {
                x: cx,
                y: table_top,
                w: line,
                h: self.y - table_top,
                color: border,
            });
        }
        self.y += self.px(TABLE_MARGIN_PT);
        Ok(())
    }

    fn image(&mut self, e: &ElementNode, x: f32, width: f32) -> Result<(), RenderError> {
        let src = e
            .src()
            .ok_or_else(|| RenderError::Image("<img> without a src attribute".into()))?;
        let bytes = parse_data_uri(src)?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|err| RenderError::Image(format!("decode error: {err}")))?
            .to_rgba8();

        let natural_w = decoded.width() as f32 * self.scale;
        let natural_h = decoded.height() as f32 * self.scale;
        let fit = if natural_w > width { width / natural_w } else { 1.0 };
        let w = (natural_w * fit).round().max(1.0) as u32;
        let h = (natural_h * fit).round().max(1.0) as u32;
        let image = if (w, h) == decoded.dimensions() {
            decoded
        } else {
            imageops::resize(&decoded, w, h, imageops::FilterType::Triangle)
        };
        self.ops.push(Paint::Image { x, y: self.y, image });
        self.y += h as f32;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::geometry::PageOrientation;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::io::Cursor;

    fn surface() -> SoftwareSurface {
        SoftwareSurface::new(&PageGeometry::a4(96.0, 30.0, PageOrientation::Portrait).unwrap())
    }

    fn png_data_uri(w: u32, h: u32) -> String {
        let img = RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(buf.into_inner()))
    }

    #[test]
    fn guard_detaches_on_drop() {
        let mut s = surface();
        {
            let _guard = ScratchContainer::attach(&mut s, &ThemeConfig::default()).unwrap();
        }
        assert!(!s.is_attached());
    }

    #[test]
    fn rasterize_requires_attach() {
        let mut s = surface();
        let nodes = parse_html("<p>x</p>");
        assert!(matches!(s.rasterize(&nodes[0]), Err(RenderError::Surface(_))));
    }

    #[test]
    fn taller_tables_rasterize_taller() {
        let mut s = surface();
        let mut guard = ScratchContainer::attach(&mut s, &ThemeConfig::default()).unwrap();
        let small = parse_html("<table><tr><td>a</td></tr></table>");
        let big = parse_html("<table><tr><td>a</td></tr><tr><td>b</td></tr><tr><td>c</td></tr></table>");
        let h1 = guard.rasterize(&small[0]).unwrap().height();
        let h3 = guard.rasterize(&big[0]).unwrap().height();
        assert!(h3 > h1);
        assert_eq!(guard.viewport_width(), guard.rasterize(&small[0]).unwrap().width());
    }

    #[test]
    fn data_uri_image_is_painted() {
        let mut s = surface();
        let mut guard = ScratchContainer::attach(&mut s, &ThemeConfig::default()).unwrap();
        let html = format!(r#"<p><img src="{}"></p>"#, png_data_uri(20, 40));
        let nodes = parse_html(&html);
        let img = guard.rasterize(&nodes[0]).unwrap();
        assert!(img.height() >= 40);
        assert_eq!(img.get_pixel(2, 2), &Rgba([200, 10, 10, 255]));
    }

    #[test]
    fn text_content_reaches_the_pixels() {
        let mut s = surface();
        let mut guard = ScratchContainer::attach(&mut s, &ThemeConfig::default()).unwrap();
        let hello = guard.rasterize(&parse_html("<p>Hello</p>")[0]).unwrap();
        let jello = guard.rasterize(&parse_html("<p>Jello</p>")[0]).unwrap();
        assert_eq!(hello.dimensions(), jello.dimensions());
        assert_ne!(hello.as_raw(), jello.as_raw());

        let cells_ab = guard.rasterize(&parse_html("<table><tr><td>ab</td></tr></table>")[0]).unwrap();
        let cells_ba = guard.rasterize(&parse_html("<table><tr><td>ba</td></tr></table>")[0]).unwrap();
        assert_ne!(cells_ab.as_raw(), cells_ba.as_raw());
    }

    #[test]
    fn empty_list_has_no_height() {
        let mut s = surface();
        let mut guard = ScratchContainer::attach(&mut s, &ThemeConfig::default()).unwrap();
        for html in ["<ul></ul>", "<ol>\n</ol>"] {
            assert_eq!(guard.rasterize(&parse_html(html)[0]).unwrap().height(), 0);
        }
    }

    #[test]
    fn remote_image_fails() {
        let mut s = surface();
        let mut guard = ScratchContainer::attach(&mut s, &ThemeConfig::default()).unwrap();
        let nodes = parse_html(r#"<img src="https://example.com/a.png">"#);
        assert!(matches!(guard.rasterize(&nodes[0]), Err(RenderError::Image(_))));
    }
}
