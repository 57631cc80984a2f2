//! Raster pagination – the screenshot-style PDF path.
//!
//! Top-level nodes of the editor HTML are rasterized one at a time through a
//! [`RenderSurface`] and stacked onto page-sized canvases. Tables are chunked
//! by row using the surface's own measurements, repeating the header row on
//! every continuation page. Any other node taller than a page is sliced at
//! page boundaries.

use std::io::Cursor;
use std::ops::Range;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::dom::{DomNode, ElementNode, Tag};
use crate::error::RenderError;
use crate::geometry::PageGeometry;
use crate::layout_config::{ImageContent, LayoutBox, LayoutConfig, PageLayout};
use crate::pagination::{chunk_table_rows, PaginationState};
use crate::surface::{table_rows, RenderSurface, ScratchContainer};
use crate::theme::ThemeConfig;

/// Something stacked onto a page canvas, for provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub role: String,
    pub y: u32,
    pub height: u32,
}

/// One page of raster output: a canvas covering the content area.
pub struct RasterPage {
    pub canvas: RgbaImage,
    pub placements: Vec<Placement>,
}

/// Paginate `nodes` by rasterizing them on `surface`.
///
/// `footer_px` is kept free at the bottom of every page. The surface is
/// attached for the duration of the call and detached before returning,
/// whether pagination succeeds or fails.
pub fn paginate_raster<S: RenderSurface + ?Sized>(
    nodes: &[DomNode],
    surface: &mut S,
    geometry: &PageGeometry,
    theme: &ThemeConfig,
    footer_px: f32,
) -> Result<Vec<RasterPage>, RenderError> {
    let mut scratch = ScratchContainer::attach(surface, theme)?;
    let mut pager = RasterPager::new(
        scratch.viewport_width(),
        geometry,
        footer_px,
        Rgba(theme.background_color.to_rgba8()),
    );

    for (index, node) in nodes.iter().enumerate() {
        if node.is_blank_text() {
            continue;
        }
        if let Some(table) = node.as_element().filter(|e| e.tag == Tag::Table) {
            pager.place_table(&mut scratch, index, table)?;
            continue;
        }
        let image = scratch.rasterize(node)?;
        pager.place(image, format!("node:{index}"));
    }
    Ok(pager.finish())
}

/// Convert raster pages into a layout the PDF renderer can draw: one
/// full-content-area image per page.
pub fn raster_layout(
    pages: &[RasterPage],
    geometry: &PageGeometry,
    theme: &ThemeConfig,
) -> Result<LayoutConfig, RenderError> {
    let s = geometry.scale();
    let margin = geometry.margin_px / s;
    let mut config = LayoutConfig::for_page(geometry);
    config.page_background = Some(theme.background_color.to_array());

    for (i, page) in pages.iter().enumerate() {
        let mut layout = PageLayout::new(i);
        let (w, h) = page.canvas.dimensions();
        let mut lb = LayoutBox::new(margin, margin, w as f32 / s, h as f32 / s).with_role("raster:page");
        lb.image = Some(ImageContent {
            src: encode_png_data_uri(&page.canvas)?,
            width: w as f32 / s,
            height: h as f32 / s,
            required: true,
        });
        layout.boxes.push(lb);
        config.pages.push(layout);
    }
    Ok(config)
}

/// Encode a canvas as an opaque PNG `data:` URI.
fn encode_png_data_uri(canvas: &RgbaImage) -> Result<String, RenderError> {
    let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, ImageFormat::Png)?;
    Ok(format!(
        "data:image/png;base64,{}",
        BASE64_STD.encode(buf.into_inner())
    ))
}

struct RasterPager {
    width: u32,
    capacity: u32,
    margin: f32,
    background: Rgba<u8>,
    state: PaginationState,
    pages: Vec<RasterPage>,
}

impl RasterPager {
    fn new(width: u32, geometry: &PageGeometry, footer_px: f32, background: Rgba<u8>) -> Self {
        let capacity = geometry.usable_height(footer_px).floor().max(1.0) as u32;
        let mut pager = Self {
            width,
            capacity,
            margin: geometry.margin_px,
            background,
            state: PaginationState::new(geometry.margin_px),
            pages: Vec::new(),
        };
        let first = pager.blank();
        pager.pages.push(first);
        pager
    }

    fn blank(&self) -> RasterPage {
        RasterPage {
            canvas: RgbaImage::from_pixel(self.width, self.capacity, self.background),
            placements: Vec::new(),
        }
    }

    /// Pixels used on the current page.
    fn used(&self) -> u32 {
        (self.state.vertical_offset_px - self.margin).round().max(0.0) as u32
    }

    fn room(&self) -> u32 {
        self.capacity.saturating_sub(self.used())
    }

    fn page_has_content(&self) -> bool {
        self.pages
            .last()
            .is_some_and(|p| !p.placements.is_empty())
    }

    fn break_page(&mut self) {
        self.state.break_page(self.margin);
        let page = self.blank();
        self.pages.push(page);
        log::debug!("raster page break → page {}", self.state.current_page_index);
    }

    fn draw(&mut self, image: &RgbaImage, role: String) {
        let y = self.used();
        let height = image.height();
        if let Some(page) = self.pages.last_mut() {
            imageops::overlay(&mut page.canvas, image, 0, y as i64);
            page.placements.push(Placement { role, y, height });
        }
        self.state.advance(height as f32);
    }

    /// Place a raster, breaking before it if it does not fit and slicing it
    /// if it is taller than an empty page.
    fn place(&mut self, image: RgbaImage, role: String) {
        let height = image.height();
        if height == 0 {
            return;
        }
        if height <= self.room() {
            self.draw(&image, role);
            return;
        }
        if self.page_has_content() {
            self.break_page();
        }
        if height <= self.capacity {
            self.draw(&image, role);
            return;
        }

        let mut top = 0;
        let mut part = 0;
        while top < height {
            if self.room() == 0 {
                self.break_page();
            }
            let take = self.room().min(height - top);
            let slice = imageops::crop_imm(&image, 0, top, image.width(), take).to_image();
            self.draw(&slice, format!("{role}:slice:{part}"));
            top += take;
            part += 1;
        }
        log::debug!("{role} sliced across {part} pages");
    }

    fn place_table<S: RenderSurface + ?Sized>(
        &mut self,
        scratch: &mut ScratchContainer<'_, S>,
        index: usize,
        table: &ElementNode,
    ) -> Result<(), RenderError> {
        let rows = table_rows(table);
        let has_header = rows.first().is_some_and(|r| r.element_children().any(|c| c.tag == Tag::Th));
        let (header, body) = if has_header {
            (rows.first().copied(), &rows[1..])
        } else {
            (None, &rows[..])
        };

        let whole = scratch.rasterize(&DomNode::Element(table.clone()))?;
        if whole.height() <= self.room() || whole.height() <= self.capacity || body.is_empty() {
            self.place(whole, format!("table:{index}:rows:0..{}", body.len()));
            return Ok(());
        }

        let chunks = chunk_table_rows(
            body.len(),
            self.room() as f32,
            self.capacity as f32,
            self.page_has_content(),
            |range: Range<usize>| {
                let node = table_with_rows(table, header, &body[range]);
                scratch.rasterize(&node).map(|img| img.height() as f32)
            },
        )?;
        log::debug!("table {index} split into {} chunks", chunks.len());

        for chunk in chunks {
            if chunk.starts_new_page {
                self.break_page();
            }
            let node = table_with_rows(table, header, &body[chunk.rows.clone()]);
            let image = scratch.rasterize(&node)?;
            self.place(
                image,
                format!("table:{index}:rows:{}..{}", chunk.rows.start, chunk.rows.end),
            );
        }
        Ok(())
    }

    fn finish(mut self) -> Vec<RasterPage> {
        if self.pages.len() > 1 && !self.page_has_content() {
            self.pages.pop();
        }
        self.pages
    }
}

/// A copy of `table` holding the header row (if any) followed by `rows`.
fn table_with_rows(table: &ElementNode, header: Option<&ElementNode>, rows: &[&ElementNode]) -> DomNode {
    let mut copy = ElementNode::new(Tag::Table);
    copy.attributes = table.attributes.clone();
    copy.children = header
        .into_iter()
        .chain(rows.iter().copied())
        .map(|row| DomNode::Element(row.clone()))
        .collect();
    DomNode::Element(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::geometry::PageOrientation;
    use crate::surface::SoftwareSurface;

    /// Surface with fixed heights: 24px per table row, 30px per other node,
    /// or the `data-height` attribute when present.
    #[derive(Default)]
    struct FixedSurface {
        attached: bool,
        detaches: usize,
        fail_after: Option<usize>,
        calls: usize,
        /// For every table rasterized, whether its first row is a header row.
        header_first: Vec<bool>,
    }

    impl RenderSurface for FixedSurface {
        fn viewport_width(&self) -> u32 {
            100
        }

        fn attach(&mut self, _theme: &ThemeConfig) -> Result<(), RenderError> {
            self.attached = true;
            Ok(())
        }

        fn rasterize(&mut self, node: &DomNode) -> Result<RgbaImage, RenderError> {
            self.calls += 1;
            if self.fail_after.is_some_and(|n| self.calls > n) {
                return Err(RenderError::Surface("lost context".into()));
            }
            let e = node.as_element();
            if let Some(t) = e.filter(|t| t.tag == Tag::Table) {
                let first = table_rows(t).first().copied();
                self.header_first
                    .push(first.is_some_and(|r| r.element_children().all(|c| c.tag == Tag::Th)));
            }
            let height = match e {
                Some(t) if t.tag == Tag::Table => 24 * table_rows(t).len() as u32,
                Some(e) => e.attr("data-height").and_then(|h| h.parse().ok()).unwrap_or(30),
                None => 30,
            };
            Ok(RgbaImage::new(100, height))
        }

        fn detach(&mut self) {
            self.attached = false;
            self.detaches += 1;
        }
    }

    fn geometry() -> PageGeometry {
        // 700px of usable height: 780 tall with a 40px margin.
        PageGeometry::new(200.0, 780.0, 40.0, 96.0).unwrap()
    }

    fn table_html(rows: usize) -> String {
        let mut html = String::from("<table><tr><th>A</th><th>B</th></tr>");
        for i in 0..rows {
            html.push_str(&format!("<tr><td>{i}</td><td>x</td></tr>"));
        }
        html.push_str("</table>");
        html
    }

    fn row_ranges(pages: &[RasterPage]) -> Vec<Vec<String>> {
        pages
            .iter()
            .map(|p| {
                p.placements
                    .iter()
                    .filter_map(|pl| pl.role.split(":rows:").nth(1).map(str::to_string))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn fifty_row_table_fills_two_pages() {
        let nodes = parse_html(&table_html(50));
        let mut surface = FixedSurface::default();
        let pages = paginate_raster(&nodes, &mut surface, &geometry(), &ThemeConfig::default(), 0.0).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(row_ranges(&pages), vec![vec!["0..28".to_string()], vec!["28..50".to_string()]]);
        // The whole table, each measured candidate and both emitted chunks.
        assert!(surface.header_first.len() > 3);
        assert!(surface.header_first.iter().all(|&h| h));
        assert_eq!(surface.detaches, 1);
        assert!(!surface.attached);
    }

    #[test]
    fn every_page_is_content_sized() {
        let nodes = parse_html(&table_html(50));
        let mut surface = FixedSurface::default();
        let pages = paginate_raster(&nodes, &mut surface, &geometry(), &ThemeConfig::default(), 0.0).unwrap();
        for page in &pages {
            assert_eq!(page.canvas.dimensions(), (100, 700));
            let used: u32 = page.placements.iter().map(|p| p.height).sum();
            assert!(used <= 700);
        }
    }

    #[test]
    fn small_nodes_stack_then_break() {
        let html: String = (0..30).map(|i| format!("<p>{i}</p>")).collect();
        let nodes = parse_html(&html);
        let mut surface = FixedSurface::default();
        let pages = paginate_raster(&nodes, &mut surface, &geometry(), &ThemeConfig::default(), 0.0).unwrap();
        // 23 × 30px = 690px fit on the first page.
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].placements.len(), 23);
        assert_eq!(pages[1].placements.len(), 7);
    }

    #[test]
    fn tall_node_is_sliced_without_loss() {
        let nodes = parse_html(r#"<p data-height="1500">tall</p>"#);
        let mut surface = FixedSurface::default();
        let pages = paginate_raster(&nodes, &mut surface, &geometry(), &ThemeConfig::default(), 0.0).unwrap();
        assert_eq!(pages.len(), 3);
        let total: u32 = pages.iter().flat_map(|p| &p.placements).map(|p| p.height).sum();
        assert_eq!(total, 1500);
    }

    #[test]
    fn empty_list_leaves_no_placement() {
        let nodes = parse_html("<p>a</p><ul></ul><ol></ol><p>b</p>");
        let mut surface = SoftwareSurface::new(&geometry());
        let pages = paginate_raster(&nodes, &mut surface, &geometry(), &ThemeConfig::default(), 0.0).unwrap();
        let roles: Vec<&str> = pages[0].placements.iter().map(|p| p.role.as_str()).collect();
        assert_eq!(roles, vec!["node:0", "node:3"]);
    }

    #[test]
    fn surface_is_detached_on_failure() {
        let nodes = parse_html(&table_html(50));
        let mut surface = FixedSurface {
            fail_after: Some(3),
            ..FixedSurface::default()
        };
        let result = paginate_raster(&nodes, &mut surface, &geometry(), &ThemeConfig::default(), 0.0);
        assert!(matches!(result, Err(RenderError::Surface(_))));
        assert_eq!(surface.detaches, 1);
        assert!(!surface.attached);
    }

    #[test]
    fn raster_layout_embeds_one_required_image_per_page() {
        let g = PageGeometry::a4(96.0, 30.0, PageOrientation::Portrait).unwrap();
        let nodes = parse_html("<p>one</p>");
        let mut surface = FixedSurface::default();
        let pages = paginate_raster(&nodes, &mut surface, &g, &ThemeConfig::default(), 0.0).unwrap();
        let config = raster_layout(&pages, &g, &ThemeConfig::default()).unwrap();
        assert_eq!(config.pages.len(), 1);
        let image = config.pages[0].boxes[0].image.as_ref().unwrap();
        assert!(image.required);
        assert!(image.src.starts_with("data:image/png;base64,"));
        assert!((config.page_width_pt - 595.28).abs() < 0.5);
    }
}
