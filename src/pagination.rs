//! Pagination – decides where pages break.
//!
//! Both PDF paths share one contract: a unit that fits on a page is never
//! split, a table row is never split, and a table that runs over a page
//! boundary continues on the next page with its header row repeated. The
//! row-chunking half of that contract lives in [`chunk_table_rows`] and is
//! driven by analytic measurement here (structured mode) and by repeated
//! rasterization in [`crate::raster`].
//!
//! Overflow tie-break: a unit overflows iff `offset + height > limit`; a unit
//! that lands exactly on the limit fits.

use std::convert::Infallible;
use std::ops::Range;

use crate::blocks::{Alignment, ContentBlock, ListBlock, Row, TableBlock, TextBlock};
use crate::export::DocumentMeta;
use crate::fonts::{wrap_text, FontManager};
use crate::geometry::PageGeometry;
use crate::layout_config::*;
use crate::theme::ThemeConfig;

/// Space after a paragraph or list, in points.
pub const BLOCK_SPACING_PT: f32 = 10.0;
/// Vertical margin around a table, in points.
pub const TABLE_MARGIN_PT: f32 = 10.0;
/// Minimum table row height, in points.
pub const ROW_MIN_HEIGHT_PT: f32 = 24.0;
/// Table cell padding, in points.
pub const CELL_PADDING_PT: f32 = 5.0;
/// Table border width, in points.
pub const BORDER_WIDTH_PT: f32 = 1.0;
/// Indent of list item text past its marker, in points.
pub const LIST_INDENT_PT: f32 = 18.0;

// ---------------------------------------------------------------------------
// Pagination state
// ---------------------------------------------------------------------------

/// Mutable cursor of one export run. Created when the run starts and owned
/// by it exclusively; the offset only grows, or resets to the top margin on
/// a page break.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState {
    /// 1-based index of the page being filled.
    pub current_page_index: usize,
    /// Distance from the top of the page to the next free pixel.
    pub vertical_offset_px: f32,
}

impl PaginationState {
    pub fn new(margin_px: f32) -> Self {
        Self {
            current_page_index: 1,
            vertical_offset_px: margin_px,
        }
    }

    pub fn advance(&mut self, height_px: f32) {
        self.vertical_offset_px += height_px.max(0.0);
    }

    pub fn break_page(&mut self, margin_px: f32) {
        self.current_page_index += 1;
        self.vertical_offset_px = margin_px;
    }
}

// ---------------------------------------------------------------------------
// Table chunking
// ---------------------------------------------------------------------------

/// A run of consecutive body rows placed together on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct TableChunk {
    /// Body row indices in this chunk.
    pub rows: Range<usize>,
    /// Measured height of the chunk including its header.
    pub height: f32,
    /// A page break precedes this chunk.
    pub starts_new_page: bool,
}

/// Split `row_count` body rows into page-sized chunks.
///
/// `measure(range)` returns the height of a chunk holding the header (if the
/// table has one) followed by the body rows in `range`. Rows are appended one
/// at a time; the row whose append overflows is rolled back and opens the
/// next chunk on a fresh page. A row that does not fit even on a fresh page
/// is emitted alone rather than retried.
///
/// `room` is the height left on the current page, `capacity` the usable
/// height of an empty page.
pub fn chunk_table_rows<E>(
    row_count: usize,
    room: f32,
    capacity: f32,
    page_has_content: bool,
    mut measure: impl FnMut(Range<usize>) -> Result<f32, E>,
) -> Result<Vec<TableChunk>, E> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut room = room;
    let mut fresh = !page_has_content;
    let mut new_page = false;

    while start < row_count {
        let mut end = start;
        let mut height = 0.0;
        while end < row_count {
            let candidate = measure(start..end + 1)?;
            if candidate > room {
                break;
            }
            end += 1;
            height = candidate;
        }

        if end == start {
            if !fresh {
                new_page = true;
                fresh = true;
                room = capacity;
                continue;
            }
            log::warn!("table row {start} is taller than a page; emitting it on its own");
            end = start + 1;
            height = measure(start..end)?;
        }

        chunks.push(TableChunk {
            rows: start..end,
            height,
            starts_new_page: new_page,
        });
        start = end;
        room -= height;
        new_page = false;
        fresh = false;
        if start < row_count {
            new_page = true;
            fresh = true;
            room = capacity;
        }
    }
    Ok(chunks)
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

/// What to draw at the bottom of every page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FooterSpec {
    pub page_numbers: bool,
    pub meta: Option<DocumentMeta>,
}

impl FooterSpec {
    pub fn is_empty(&self) -> bool {
        !self.page_numbers && self.meta.is_none()
    }

    /// Height reserved at the bottom of the content area, in points.
    pub fn reserve_pt(&self, theme: &ThemeConfig) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            theme.footer_font_size * theme.line_height + 16.0
        }
    }
}

/// Add the page-number and metadata footer to every page of `config`.
pub fn apply_footer(
    config: &mut LayoutConfig,
    footer: &FooterSpec,
    theme: &ThemeConfig,
    margin_pt: f32,
    fonts: &FontManager,
) {
    if footer.is_empty() {
        return;
    }
    let total = config.pages.len();
    let width = config.page_width_pt - 2.0 * margin_pt;
    let top = config.page_height_pt - margin_pt - footer.reserve_pt(theme);
    let size = theme.footer_font_size;
    let line_height = fonts.line_height(size, theme.line_height);
    let color = theme.footer_color.to_array();

    for page in &mut config.pages {
        let mut rule = LayoutBox::new(margin_pt, top + 6.0, width, 0.75).with_role("footer:rule");
        rule.background_color = Some(theme.footer_rule_color.to_array());
        page.boxes.push(rule);

        let text_top = top + 16.0;
        if let Some(meta) = &footer.meta {
            let label = format!("Words: {} | Characters: {}", meta.word_count, meta.char_count);
            page.boxes.push(text_box(
                margin_pt,
                text_top,
                width,
                vec![label],
                TextStyle {
                    font_size: size,
                    bold: false,
                    color,
                    line_height,
                    align: Alignment::Left,
                },
                fonts,
            )
            .with_role("footer:meta"));
        }
        if footer.page_numbers {
            let label = format!("Page {} of {}", page.page_index + 1, total);
            page.boxes.push(text_box(
                margin_pt,
                text_top,
                width,
                vec![label],
                TextStyle {
                    font_size: size,
                    bold: false,
                    color,
                    line_height,
                    align: Alignment::Right,
                },
                fonts,
            )
            .with_role("footer:page-number"));
        }
    }
}

// ---------------------------------------------------------------------------
// Structured mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    font_size: f32,
    bold: bool,
    color: [f32; 4],
    line_height: f32,
    align: Alignment,
}

/// Build a text box whose line offsets honour `style.align`.
fn text_box(
    x: f32,
    y: f32,
    width: f32,
    lines: Vec<String>,
    style: TextStyle,
    fonts: &FontManager,
) -> LayoutBox {
    let text_lines = lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let w = fonts.measure_text_width(&text, style.font_size, style.bold);
            let x_offset = match style.align {
                Alignment::Center => ((width - w) / 2.0).max(0.0),
                Alignment::Right => (width - w).max(0.0),
                Alignment::Left | Alignment::Justify | Alignment::None => 0.0,
            };
            TextLine {
                text,
                x_offset,
                y_offset: i as f32 * style.line_height,
            }
        })
        .collect::<Vec<_>>();
    let height = text_lines.len() as f32 * style.line_height;
    let mut lb = LayoutBox::new(x, y, width, height);
    lb.text = Some(TextContent {
        lines: text_lines,
        font_size: style.font_size,
        bold: style.bold,
        color: style.color,
        line_height: style.line_height,
        align: style.align,
    });
    lb
}

/// Lay out content blocks analytically and split them into pages.
///
/// `footer_pt` is the height kept free at the bottom of every page.
pub fn paginate_blocks(
    blocks: &[ContentBlock],
    geometry: &PageGeometry,
    theme: &ThemeConfig,
    fonts: &FontManager,
    footer_pt: f32,
) -> LayoutConfig {
    let mut pager = Pager::new(geometry, theme, fonts, footer_pt);
    for (index, block) in blocks.iter().enumerate() {
        if !block.is_renderable() {
            log::debug!("skipping empty block {index}");
            continue;
        }
        match block {
            ContentBlock::Text(text) => pager.place_text_block(index, text),
            ContentBlock::List(list) => pager.place_list(index, list),
            ContentBlock::Table(table) => pager.place_table(index, table),
        }
    }
    pager.finish()
}

/// Structured-mode cursor. Works in points; `geometry` pixels are converted
/// once at construction.
struct Pager<'a> {
    theme: &'a ThemeConfig,
    fonts: &'a FontManager,
    state: PaginationState,
    pages: Vec<PageLayout>,
    page_has_content: bool,
    margin: f32,
    limit: f32,
    capacity: f32,
    content_width: f32,
    page_width: f32,
    page_height: f32,
}

impl<'a> Pager<'a> {
    fn new(
        geometry: &PageGeometry,
        theme: &'a ThemeConfig,
        fonts: &'a FontManager,
        footer_pt: f32,
    ) -> Self {
        let s = geometry.scale();
        let margin = geometry.margin_px / s;
        let page_height = geometry.height_pt();
        let limit = page_height - margin - footer_pt;
        Self {
            theme,
            fonts,
            state: PaginationState::new(margin),
            pages: vec![PageLayout::new(0)],
            page_has_content: false,
            margin,
            limit,
            capacity: (limit - margin).max(0.0),
            content_width: geometry.content_width() / s,
            page_width: geometry.width_pt(),
            page_height,
        }
    }

    fn room(&self) -> f32 {
        self.limit - self.state.vertical_offset_px
    }

    fn fits(&self, height: f32) -> bool {
        self.state.vertical_offset_px + height <= self.limit
    }

    fn break_page(&mut self) {
        self.state.break_page(self.margin);
        self.pages.push(PageLayout::new(self.pages.len()));
        self.page_has_content = false;
        log::debug!("page break → page {}", self.state.current_page_index);
    }

    /// Break before a unit of `height` unless it fits or the page is empty.
    fn ensure_room(&mut self, height: f32) {
        if !self.fits(height) && self.page_has_content {
            self.break_page();
        }
    }

    fn push(&mut self, lb: LayoutBox) {
        if let Some(page) = self.pages.last_mut() {
            page.boxes.push(lb);
        }
        self.page_has_content = true;
    }

    /// Space after a block; never carried over to the next page.
    fn gap(&mut self, height: f32) {
        if self.fits(height) {
            self.state.advance(height);
        } else {
            self.state.vertical_offset_px = self.limit;
        }
    }

    fn body_style(&self, bold: bool) -> TextStyle {
        TextStyle {
            font_size: self.theme.font_size,
            bold,
            color: self.theme.font_color.to_array(),
            line_height: self.fonts.line_height(self.theme.font_size, self.theme.line_height),
            align: Alignment::Left,
        }
    }

    /// Place wrapped lines, keeping them together when they fit on one page
    /// and otherwise breaking between lines. `marker` is drawn beside the
    /// first line.
    fn place_lines(
        &mut self,
        lines: Vec<String>,
        style: TextStyle,
        x: f32,
        width: f32,
        marker: Option<(String, f32)>,
        role: &str,
    ) {
        let total = lines.len() as f32 * style.line_height;
        if total <= self.capacity {
            self.ensure_room(total);
        }

        let mut rest = lines;
        let mut marker = marker;
        while !rest.is_empty() {
            let fit = (self.room() / style.line_height + 1e-3).floor().max(0.0) as usize;
            let take = match fit.min(rest.len()) {
                0 if self.page_has_content => {
                    self.break_page();
                    continue;
                }
                0 => 1,
                n => n,
            };
            let tail = rest.split_off(take);
            let y = self.state.vertical_offset_px;
            if let Some((label, marker_x)) = marker.take() {
                let mstyle = TextStyle {
                    align: Alignment::Left,
                    ..style
                };
                self.push(
                    text_box(marker_x, y, x - marker_x, vec![label], mstyle, self.fonts)
                        .with_role(format!("{role}:marker")),
                );
            }
            let lb = text_box(x, y, width, rest, style, self.fonts).with_role(role);
            self.state.advance(lb.height);
            self.push(lb);
            rest = tail;
            if !rest.is_empty() {
                self.break_page();
            }
        }
    }

    fn place_text_block(&mut self, index: usize, block: &TextBlock) {
        let font_size = self.theme.heading_font_size(block.heading);
        let style = TextStyle {
            font_size,
            bold: block.heading.is_some(),
            color: self.theme.font_color.to_array(),
            line_height: self.fonts.line_height(font_size, self.theme.line_height),
            align: block.alignment,
        };
        let lines = wrap_text(&block.text, font_size, style.bold, self.content_width, self.fonts);
        self.place_lines(
            lines,
            style,
            self.margin,
            self.content_width,
            None,
            &format!("text:{index}"),
        );
        self.gap(BLOCK_SPACING_PT);
    }

    fn place_list(&mut self, index: usize, list: &ListBlock) {
        let style = self.body_style(false);
        let text_x = self.margin + LIST_INDENT_PT;
        let text_width = self.content_width - LIST_INDENT_PT;
        let items: Vec<Vec<String>> = list
            .items
            .iter()
            .map(|item| wrap_text(&item.content, style.font_size, false, text_width, self.fonts))
            .collect();

        let total: f32 = items
            .iter()
            .map(|lines| lines.len() as f32 * style.line_height)
            .sum();
        if total <= self.capacity {
            self.ensure_room(total);
        }

        for (i, lines) in items.into_iter().enumerate() {
            self.place_lines(
                lines,
                style,
                text_x,
                text_width,
                Some((list.marker(i), self.margin)),
                &format!("list:{index}:item:{i}"),
            );
        }
        self.gap(BLOCK_SPACING_PT);
    }

    fn row_lines(&self, row: &Row, col_width: f32) -> Vec<Vec<String>> {
        let inner = (col_width - 2.0 * CELL_PADDING_PT).max(1.0);
        row.iter()
            .map(|cell| {
                wrap_text(&cell.content, self.theme.font_size, cell.is_header, inner, self.fonts)
            })
            .collect()
    }

    fn row_height(&self, lines: &[Vec<String>]) -> f32 {
        let lh = self.fonts.line_height(self.theme.font_size, self.theme.line_height);
        let tallest = lines.iter().map(Vec::len).max().unwrap_or(1) as f32;
        (tallest * lh + 2.0 * CELL_PADDING_PT).max(ROW_MIN_HEIGHT_PT)
    }

    fn place_table(&mut self, index: usize, table: &TableBlock) {
        let columns = table.column_count().max(1);
        let col_width = self.content_width / columns as f32;

        let header = table.header().map(|row| {
            let lines = self.row_lines(row, col_width);
            let h = self.row_height(&lines);
            (row, lines, h)
        });
        let body: Vec<(&Row, Vec<Vec<String>>, f32)> = table
            .body()
            .iter()
            .map(|row| {
                let lines = self.row_lines(row, col_width);
                let h = self.row_height(&lines);
                (row, lines, h)
            })
            .collect();

        let header_h = header.as_ref().map_or(0.0, |h| h.2);
        let body_h: Vec<f32> = body.iter().map(|b| b.2).collect();
        let measure = |r: Range<usize>| -> Result<f32, Infallible> {
            Ok(header_h + body_h[r].iter().sum::<f32>())
        };

        if self.page_has_content {
            self.gap(TABLE_MARGIN_PT);
        }
        let total = header_h + body_h.iter().sum::<f32>();
        let chunks: Vec<TableChunk> = if total <= self.room() || total <= self.capacity {
            self.ensure_room(total);
            vec![TableChunk {
                rows: 0..body.len(),
                height: total,
                starts_new_page: false,
            }]
        } else {
            match chunk_table_rows(body.len(), self.room(), self.capacity, self.page_has_content, measure) {
                Ok(chunks) => chunks,
                Err(never) => match never {},
            }
        };

        for chunk in chunks {
            if chunk.starts_new_page {
                self.break_page();
            }
            if let Some((row, lines, h)) = &header {
                self.place_row(row, lines.clone(), *h, col_width, true, format!("table:{index}:header"));
            }
            for i in chunk.rows {
                let (row, lines, h) = &body[i];
                self.place_row(row, lines.clone(), *h, col_width, false, format!("table:{index}:row:{i}"));
            }
        }
        self.gap(TABLE_MARGIN_PT);
    }

    fn place_row(
        &mut self,
        row: &Row,
        lines: Vec<Vec<String>>,
        height: f32,
        col_width: f32,
        header: bool,
        role: String,
    ) {
        let y = self.state.vertical_offset_px;
        let border = BorderStyle {
            width: BORDER_WIDTH_PT,
            color: self.theme.table_border_color.to_array(),
        };
        // Short rows render the cells they have.
        for (col, (cell, cell_lines)) in row.iter().zip(lines).enumerate() {
            let x = self.margin + col as f32 * col_width;
            let style = self.body_style(cell.is_header || header);
            let mut lb = text_box(
                x,
                y,
                col_width,
                cell_lines,
                style,
                self.fonts,
            );
            for line in lb.text.iter_mut().flat_map(|t| t.lines.iter_mut()) {
                line.x_offset += CELL_PADDING_PT;
                line.y_offset += CELL_PADDING_PT;
            }
            lb.height = height;
            lb.border = Some(border.clone());
            if header {
                lb.background_color = Some(self.theme.table_header_bg.to_array());
            }
            self.push(lb.with_role(role.clone()));
        }
        self.state.advance(height);
    }

    fn finish(self) -> LayoutConfig {
        let mut pages = self.pages;
        // A trailing page opened by a break but never filled is dropped.
        if pages.len() > 1 && pages.last().is_some_and(|p| p.boxes.is_empty()) {
            pages.pop();
        }
        LayoutConfig {
            title: String::new(),
            page_width_pt: self.page_width,
            page_height_pt: self.page_height,
            page_background: None,
            pages,
        }
    }
}
