//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).
//!
//! Both PDF modes end here: structured mode hands over text, table and list
//! boxes; raster mode hands over one page-sized image per page.

use std::collections::{BTreeMap, HashMap};

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use crate::error::RenderError;
use crate::layout_config::*;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes.
///
/// An image whose `src` is not a base64 data URI, or whose bytes cannot be
/// decoded, is skipped with a `log::warn` unless it is marked `required`, in
/// which case the whole render fails.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>, RenderError> {
    let page_w = Mm(config.page_width_pt * 0.352778); // pt → mm
    let page_h = Mm(config.page_height_pt * 0.352778);

    let mut doc = PdfDocument::new(&config.title);

    // ── Pre-register all images ────────────────────────────────────────────
    let mut all_srcs: BTreeMap<&str, bool> = BTreeMap::new();
    for (_, lbox) in config.boxes() {
        if let Some(img) = &lbox.image {
            *all_srcs.entry(img.src.as_str()).or_default() |= img.required;
        }
    }

    let mut image_resources: HashMap<String, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();
    let mut skipped = 0usize;

    for (src, required) in all_srcs {
        match load_image(src, &mut doc, &mut img_warnings) {
            Ok(res) => {
                image_resources.insert(src.to_string(), res);
            }
            Err(e) if required => return Err(e),
            Err(e) => {
                log::warn!("Skipping image: {e}");
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        log::debug!("{skipped} optional image(s) skipped");
    }

    // ── Render pages ──────────────────────────────────────────────────────
    let mut pages = Vec::new();

    for page_layout in &config.pages {
        let mut ops = Vec::new();

        if let Some(bg) = config.page_background {
            let full = rect_points(
                0.0,
                0.0,
                config.page_width_pt,
                config.page_height_pt,
                config.page_height_pt,
            );
            fill_rect(&mut ops, bg, full);
        }
        for lbox in &page_layout.boxes {
            render_box(&mut ops, lbox, config.page_height_pt, &image_resources);
        }

        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    // Ensure at least one page.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    log::debug!("rendering {} PDF page(s)", pages.len());
    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());

    Ok(bytes)
}

fn load_image(
    src: &str,
    doc: &mut PdfDocument,
    warnings: &mut Vec<PdfWarnMsg>,
) -> Result<ImageResource, RenderError> {
    let bytes = parse_data_uri(src)?;

    // Decode with the `image` crate to obtain pixel dimensions.
    let dyn_img = ::image::load_from_memory(&bytes)
        .map_err(|e| RenderError::Image(format!("decode error: {e}")))?;
    let (px_width, px_height) = (dyn_img.width(), dyn_img.height());

    // Register with printpdf as a reusable XObject.
    let raw = RawImage::decode_from_bytes(&bytes, warnings)
        .map_err(|e| RenderError::Pdf(format!("image encode error: {e}")))?;
    let xobj_id = doc.add_image(&raw);

    Ok(ImageResource {
        xobj_id,
        px_width,
        px_height,
    })
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s
        .chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82, // single low-9 quote
            '\u{201E}' => 0x84, // double low-9 quote
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91, // left single quote
            '\u{2019}' => 0x92, // right single quote
            '\u{201C}' => 0x93, // left double quote
            '\u{201D}' => 0x94, // right double quote
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en-dash
            '\u{2014}' => 0x97, // em-dash
            '\u{2122}' => 0x99, // trademark
            '\u{00A0}' => 0x20, // non-breaking space -> space
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect();
    // SAFETY: intentionally non-UTF-8 for 0x80-0x9F range; printpdf passes
    // these bytes straight to the PDF stream, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
///
/// Returns `Err` if `src` is not a data URI or does not use base64 encoding.
pub(crate) fn parse_data_uri(src: &str) -> Result<Vec<u8>, RenderError> {
    let Some(rest) = src.strip_prefix("data:") else {
        let preview: String = src.chars().take(80).collect();
        return Err(RenderError::Image(format!(
            "image src must be a base64 data URI \
             (e.g. `data:image/png;base64,...`), got {preview:?}"
        )));
    };
    let (header, b64_data) = rest.split_once(',').ok_or_else(|| {
        RenderError::Image("invalid data URI: missing `,` after the header".to_string())
    })?;
    if !header.contains(";base64") {
        return Err(RenderError::Image(
            "only base64-encoded data URIs are supported".to_string(),
        ));
    }
    BASE64_STD
        .decode(b64_data.trim())
        .map_err(|e| RenderError::Image(format!("base64 decode error: {e}")))
}

fn rgb(c: [f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn corner(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Corners of a top-left-origin rectangle in PDF (bottom-left) coordinates.
fn rect_points(x: f32, top: f32, width: f32, height: f32, page_height: f32) -> Vec<LinePoint> {
    let y2 = page_height - top;
    let y1 = y2 - height;
    vec![
        corner(x, y2),
        corner(x + width, y2),
        corner(x + width, y1),
        corner(x, y1),
    ]
}

fn fill_rect(ops: &mut Vec<Op>, color: [f32; 4], points: Vec<LinePoint>) {
    ops.push(Op::SetFillColor { col: rgb(color) });
    ops.push(Op::DrawPolygon {
        polygon: Polygon {
            rings: vec![PolygonRing { points }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        },
    });
}

/// Render one LayoutBox into PDF ops.
fn render_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    images: &HashMap<String, ImageResource>,
) {
    // PDF coordinate system: origin at bottom-left.
    // Our layout uses origin at top-left. Convert:
    let pdf_y = page_height - lbox.y;

    // Background
    if let Some(bg) = lbox.background_color {
        let points = rect_points(lbox.x, lbox.y, lbox.width, lbox.height, page_height);
        fill_rect(ops, bg, points);
    }

    // Border
    if let Some(border) = &lbox.border {
        ops.push(Op::SetOutlineColor {
            col: rgb(border.color),
        });
        ops.push(Op::SetOutlineThickness {
            pt: Pt(border.width),
        });
        ops.push(Op::DrawLine {
            line: Line {
                points: rect_points(lbox.x, lbox.y, lbox.width, lbox.height, page_height),
                is_closed: true,
            },
        });
    }

    // Text
    if let Some(text) = &lbox.text {
        let font = if text.bold {
            BuiltinFont::HelveticaBold
        } else {
            BuiltinFont::Helvetica
        };

        for tline in &text.lines {
            if tline.text.is_empty() {
                continue;
            }
            let text_x = lbox.x + tline.x_offset;
            // Baseline ≈ top of line + ascender (approx 0.75 × font_size),
            // centred within the line's leading.
            let leading = (text.line_height - text.font_size).max(0.0) / 2.0;
            let text_y = pdf_y - tline.y_offset - leading - text.font_size * 0.75;

            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(text_x),
                    y: Pt(text_y),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(text.font_size),
                font,
            });
            ops.push(Op::SetLineHeight {
                lh: Pt(text.line_height),
            });
            ops.push(Op::SetFillColor {
                col: rgb(text.color),
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(to_winlatin(&tline.text))],
                font,
            });
            ops.push(Op::EndTextSection);
        }
    }

    // Image – embed from pre-registered XObject
    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(&img.src) {
            // translate_y = bottom edge of image in PDF coordinates.
            let img_bottom_y = page_height - lbox.y - img.height;

            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = if res.px_width > 0 {
                img.width / res.px_width as f32
            } else {
                1.0
            };
            let scale_y = if res.px_height > 0 {
                img.height / res.px_height as f32
            } else {
                1.0
            };

            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(lbox.x)),
                    translate_y: Some(Pt(img_bottom_y)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PageGeometry, PageOrientation};

    fn a4() -> LayoutConfig {
        let geometry = PageGeometry::a4(72.0, 30.0, PageOrientation::Portrait).unwrap();
        LayoutConfig::for_page(&geometry)
    }

    #[test]
    fn render_empty_page() {
        let config = a4();
        let bytes = render_pdf(&config).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        // PDF magic number
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn optional_bad_image_is_skipped() {
        let mut config = a4();
        let mut page = PageLayout::new(0);
        let mut lb = LayoutBox::new(10.0, 10.0, 50.0, 50.0);
        lb.image = Some(ImageContent {
            src: "https://example.com/x.png".into(),
            width: 50.0,
            height: 50.0,
            required: false,
        });
        page.boxes.push(lb);
        config.pages.push(page);
        assert!(render_pdf(&config).is_ok());
    }

    #[test]
    fn required_bad_image_fails() {
        let mut config = a4();
        let mut page = PageLayout::new(0);
        let mut lb = LayoutBox::new(10.0, 10.0, 50.0, 50.0);
        lb.image = Some(ImageContent {
            src: "data:image/png;base64,AAAA".into(),
            width: 50.0,
            height: 50.0,
            required: true,
        });
        page.boxes.push(lb);
        config.pages.push(page);
        assert!(matches!(render_pdf(&config), Err(RenderError::Image(_))));
    }

    #[test]
    fn data_uri_parsing() {
        assert_eq!(parse_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert!(parse_data_uri("data:text/plain,hi").is_err());
        assert!(parse_data_uri("/img.png").is_err());
    }

    #[test]
    fn page_background_renders() {
        let mut config = a4();
        config.page_background = Some([0.97, 0.97, 0.98, 1.0]);
        for i in 0..3 {
            config.pages.push(PageLayout::new(i));
        }
        let bytes = render_pdf(&config).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }
}
