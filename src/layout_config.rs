//! Layout config – the frozen page-by-page description handed from
//! pagination to the PDF renderer. Every coordinate is in PDF points with the
//! origin at the top-left of the page.

use serde::{Deserialize, Serialize};

use crate::blocks::Alignment;
use crate::geometry::PageGeometry;

/// Every page of one export, with page size and the boxes placed on each page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    /// Theme background painted under each page's boxes.
    #[serde(default)]
    pub page_background: Option<[f32; 4]>,
    pub pages: Vec<PageLayout>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    /// Boxes in paint order.
    pub boxes: Vec<LayoutBox>,
}

impl PageLayout {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            boxes: Vec::new(),
        }
    }
}

/// A rectangle on a page: a fill, a border, wrapped text or an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<BorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,

    /// Which block and part produced the box, e.g. `table:0:row:3` or
    /// `footer:page-number`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

/// Text already wrapped to the box width by the paginator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub bold: bool,
    pub color: [f32; 4],
    /// Distance between baselines, in points.
    pub line_height: f32,
    pub align: Alignment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub x_offset: f32,
    pub y_offset: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    /// A `data:` URI.
    pub src: String,
    pub width: f32,
    pub height: f32,
    /// When set, failing to load the image fails the render instead of
    /// skipping the image.
    #[serde(default)]
    pub required: bool,
}

impl LayoutConfig {
    /// No pages yet, sized to `geometry`.
    pub fn for_page(geometry: &PageGeometry) -> Self {
        Self {
            title: Self::default_title(),
            page_width_pt: geometry.width_pt(),
            page_height_pt: geometry.height_pt(),
            page_background: None,
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "page-forge export".to_string()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }

    /// Every box on every page, in page order.
    pub fn boxes(&self) -> impl Iterator<Item = (usize, &LayoutBox)> {
        self.pages
            .iter()
            .flat_map(|p| p.boxes.iter().map(move |b| (p.page_index, b)))
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            border: None,
            text: None,
            image: None,
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// All text lines joined by newlines, or an empty string.
    pub fn plain_text(&self) -> String {
        self.text
            .as_ref()
            .map(|t| {
                t.lines
                    .iter()
                    .map(|l| l.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_roles() {
        let geometry = PageGeometry::a4(72.0, 30.0, crate::geometry::PageOrientation::Portrait).unwrap();
        let mut config = LayoutConfig::for_page(&geometry);
        let mut page = PageLayout::new(0);
        page.boxes
            .push(LayoutBox::new(1.0, 2.0, 3.0, 4.0).with_role("table:0:row:1"));
        config.pages.push(page);

        let parsed = LayoutConfig::from_json(&config.to_json()).unwrap();
        assert_eq!(parsed.pages[0].boxes[0].role.as_deref(), Some("table:0:row:1"));
        assert_eq!(parsed.title, "page-forge export");
        assert!((parsed.page_width_pt - 595.28).abs() < 0.01);
        assert!(parsed.pages[0].boxes[0].text.is_none());
    }
}
