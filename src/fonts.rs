//! Text measurement and word wrapping for analytic layout.
//!
//! Without a loaded face we measure with per-glyph-class widths that track
//! Helvetica closely enough for line breaking. A TTF/OTF face loaded through
//! `ttf-parser` replaces the heuristic with real horizontal advances.
//!
//! Glyph painting for the software raster surface also lives here: outlines
//! come from `ttf-parser` and are filled with `ab_glyph_rasterizer`. DejaVu
//! Sans is bundled so text can always be painted.

use ab_glyph_rasterizer::{point, Point, Rasterizer};
use image::{Rgba, RgbaImage};

static BUNDLED_REGULAR: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");
static BUNDLED_BOLD: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

/// Vertical and horizontal metrics of a face, in font units.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// Measures strings for a regular and a bold face.
#[derive(Clone)]
pub struct FontManager {
    regular: Option<FontData>,
    bold: Option<FontData>,
}

impl FontManager {
    /// A manager that measures with the built-in Helvetica heuristic.
    pub fn new() -> Self {
        Self {
            regular: None,
            bold: None,
        }
    }

    /// A manager measuring with the bundled DejaVu Sans faces, so measured
    /// widths match painted glyphs.
    pub fn bundled() -> Self {
        let mut fonts = Self::new();
        for (bold, bytes) in [(false, BUNDLED_REGULAR), (true, BUNDLED_BOLD)] {
            if let Err(e) = fonts.load_font(bold, bytes.to_vec()) {
                log::warn!("bundled font unusable, falling back to heuristic metrics: {e}");
            }
        }
        fonts
    }

    /// Load a TTF/OTF face used for measurement of regular or bold text.
    pub fn load_font(&mut self, bold: bool, bytes: Vec<u8>) -> Result<(), String> {
        let face =
            ttf_parser::Face::parse(&bytes, 0).map_err(|e| format!("Failed to parse font: {e}"))?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        if bold {
            self.bold = Some(data);
        } else {
            self.regular = Some(data);
        }
        Ok(())
    }

    fn face_for(&self, bold: bool) -> Option<&FontData> {
        if bold {
            self.bold.as_ref().or(self.regular.as_ref())
        } else {
            self.regular.as_ref()
        }
    }

    pub fn has_real_fonts(&self) -> bool {
        self.regular.is_some()
    }

    /// Width of `text` at `font_size`, in the same unit as `font_size`.
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        if let Some(data) = self.face_for(bold) {
            if let Ok(face) = ttf_parser::Face::parse(&data.bytes, 0) {
                let scale = font_size / data.units_per_em;
                return text
                    .chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        None => font_size * 0.5,
                    })
                    .sum();
            }
        }
        let factor = if bold { 1.06 } else { 1.0 };
        text.chars().map(|c| heuristic_advance(c) * font_size * factor).sum()
    }

    /// Distance between baselines.
    pub fn line_height(&self, font_size: f32, line_height_factor: f32) -> f32 {
        font_size * line_height_factor
    }

    /// Ascender height; used to place the first baseline below a line's top.
    pub fn ascender(&self, font_size: f32, bold: bool) -> f32 {
        match self.face_for(bold) {
            Some(d) => d.ascender * font_size / d.units_per_em,
            None => font_size * 0.75,
        }
    }
}

impl FontManager {
    /// Paint one line of text as an image `line_height` tall, glyphs in
    /// `color` over a transparent background, baseline centred in the line.
    ///
    /// Uses the loaded face, or the bundled one when only heuristic metrics
    /// are configured. Returns `None` for text with no visible glyphs.
    pub fn rasterize_line(
        &self,
        text: &str,
        font_size: f32,
        bold: bool,
        line_height: f32,
        color: [u8; 4],
    ) -> Option<RgbaImage> {
        let bytes: &[u8] = match self.face_for(bold) {
            Some(data) => &data.bytes,
            None if bold => BUNDLED_BOLD,
            None => BUNDLED_REGULAR,
        };
        let face = match ttf_parser::Face::parse(bytes, 0) {
            Ok(face) => face,
            Err(e) => {
                log::warn!("cannot paint text, font failed to parse: {e}");
                return None;
            }
        };
        let scale = font_size / face.units_per_em() as f32;
        let ascent = face.ascender() as f32 * scale;
        let descent = face.descender() as f32 * scale;
        let baseline = (line_height - (ascent - descent)) / 2.0 + ascent;

        let advance = |ch: char| {
            face.glyph_index(ch)
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map_or(font_size * 0.5, |a| a as f32 * scale)
        };
        let width: f32 = text.chars().map(&advance).sum();
        let w = width.ceil() as usize + 2;
        let h = line_height.ceil().max(1.0) as usize;
        if width <= 0.0 {
            return None;
        }

        let mut sink = GlyphSink {
            raster: Rasterizer::new(w, h),
            scale,
            origin_x: 0.0,
            baseline,
            bounds: (w as f32, h as f32),
            start: point(0.0, 0.0),
            last: point(0.0, 0.0),
            drawn: false,
        };
        for ch in text.chars() {
            if let Some(gid) = face.glyph_index(ch) {
                face.outline_glyph(gid, &mut sink);
            }
            sink.origin_x += advance(ch);
        }
        if !sink.drawn {
            return None;
        }

        let mut image = RgbaImage::new(w as u32, h as u32);
        let [r, g, b, a] = color;
        sink.raster.for_each_pixel_2d(|x, y, coverage| {
            let alpha = (coverage.clamp(0.0, 1.0) * a as f32).round() as u8;
            if alpha > 0 {
                image.put_pixel(x, y, Rgba([r, g, b, alpha]));
            }
        });
        Some(image)
    }
}

/// Feeds `ttf-parser` outlines, in font units, to the rasterizer in pixels.
struct GlyphSink {
    raster: Rasterizer,
    scale: f32,
    origin_x: f32,
    baseline: f32,
    bounds: (f32, f32),
    start: Point,
    last: Point,
    drawn: bool,
}

impl GlyphSink {
    fn map(&self, x: f32, y: f32) -> Point {
        point(
            (self.origin_x + x * self.scale).clamp(0.0, self.bounds.0),
            (self.baseline - y * self.scale).clamp(0.0, self.bounds.1),
        )
    }
}

impl ttf_parser::OutlineBuilder for GlyphSink {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.start = p;
        self.last = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.map(x, y);
        self.raster.draw_line(self.last, p);
        self.last = p;
        self.drawn = true;
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (c, p) = (self.map(x1, y1), self.map(x, y));
        self.raster.draw_quad(self.last, c, p);
        self.last = p;
        self.drawn = true;
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (c1, c2, p) = (self.map(x1, y1), self.map(x2, y2), self.map(x, y));
        self.raster.draw_cubic(self.last, c1, c2, p);
        self.last = p;
        self.drawn = true;
    }

    fn close(&mut self) {
        if (self.last.x, self.last.y) != (self.start.x, self.start.y) {
            self.raster.draw_line(self.last, self.start);
        }
        self.last = self.start;
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Approximate Helvetica advance widths as a fraction of the em.
fn heuristic_advance(c: char) -> f32 {
    match c {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 0.25,
        ' ' | 'f' | 't' | 'I' | '(' | ')' | '[' | ']' | '-' | '/' => 0.3,
        'r' => 0.35,
        'm' | 'w' | '%' => 0.85,
        'M' | 'W' | '@' => 0.9,
        '0'..='9' => 0.556,
        c if c.is_ascii_uppercase() => 0.67,
        c if c.is_ascii_lowercase() => 0.53,
        c if c.is_whitespace() => 0.3,
        _ => 0.6,
    }
}

/// Word-wrap text to fit within `max_width`. Explicit `\n` always breaks; a
/// single word wider than the line is broken between characters.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines: Vec<String> = Vec::new();
    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in words {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if fonts.measure_text_width(&candidate, font_size, bold) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if fonts.measure_text_width(word, font_size, bold) <= max_width {
                current = word.to_string();
            } else {
                let mut pieces = break_word(word, font_size, bold, max_width, fonts);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn break_word(
    word: &str,
    font_size: f32,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for ch in word.chars() {
        piece.push(ch);
        if piece.chars().count() > 1 && fonts.measure_text_width(&piece, font_size, bold) > max_width {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(ch);
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_width_scales_with_size() {
        let mgr = FontManager::default();
        let small = mgr.measure_text_width("Hello", 10.0, false);
        let big = mgr.measure_text_width("Hello", 20.0, false);
        assert!((big - 2.0 * small).abs() < 0.01);
        assert!(mgr.measure_text_width("Hello", 10.0, true) > small);
    }

    #[test]
    fn narrow_glyphs_are_narrower() {
        let mgr = FontManager::default();
        assert!(mgr.measure_text_width("iiii", 12.0, false) < mgr.measure_text_width("MMMM", 12.0, false));
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = wrap_text("Hello world foo bar", 16.0, false, 60.0, &mgr);
        assert!(lines.len() >= 2, "Expected wrapping, got {:?}", lines);
    }

    #[test]
    fn explicit_newlines_break() {
        let mgr = FontManager::default();
        let lines = wrap_text("a\nb", 12.0, false, 500.0, &mgr);
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn bundled_faces_measure_real_advances() {
        let mgr = FontManager::bundled();
        assert!(mgr.has_real_fonts());
        assert!(mgr.measure_text_width("Hello", 12.0, true) > mgr.measure_text_width("Hello", 12.0, false));
    }

    #[test]
    fn glyphs_differ_for_equal_width_strings() {
        let mgr = FontManager::bundled();
        let black = [0, 0, 0, 255];
        let hj = mgr.rasterize_line("HJ", 16.0, false, 24.0, black).unwrap();
        let jh = mgr.rasterize_line("JH", 16.0, false, 24.0, black).unwrap();
        assert_eq!(hj.dimensions(), jh.dimensions());
        assert_ne!(hj.as_raw(), jh.as_raw());
    }

    #[test]
    fn painted_line_is_not_a_solid_bar() {
        let mgr = FontManager::default();
        let img = mgr.rasterize_line("Hello", 16.0, false, 24.0, [0, 0, 0, 255]).unwrap();
        let inked = img.pixels().filter(|p| p[3] > 128).count();
        let total = (img.width() * img.height()) as usize;
        assert!(inked > 0);
        assert!(inked < total / 2);
    }

    #[test]
    fn blank_text_paints_nothing() {
        let mgr = FontManager::bundled();
        assert!(mgr.rasterize_line("   ", 16.0, false, 24.0, [0, 0, 0, 255]).is_none());
    }

    #[test]
    fn long_word_is_broken_without_loss() {
        let mgr = FontManager::default();
        let word = "x".repeat(80);
        let lines = wrap_text(&word, 12.0, false, 100.0, &mgr);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }
}
