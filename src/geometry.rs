//! Page geometry – fixed per export call, derived from A4 at a chosen DPI.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// A4 width in millimetres.
pub const A4_WIDTH_MM: f32 = 210.0;
/// A4 height in millimetres.
pub const A4_HEIGHT_MM: f32 = 297.0;

const MM_PER_INCH: f32 = 25.4;
/// PDF user-space units per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page size and margin in pixels at some DPI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_px: f32,
    pub height_px: f32,
    pub margin_px: f32,
    /// Pixels per inch; 72 makes one pixel one PDF point.
    pub dpi: f32,
}

impl PageGeometry {
    pub fn new(width_px: f32, height_px: f32, margin_px: f32, dpi: f32) -> Result<Self, GeometryError> {
        if width_px <= 0.0 || height_px <= 0.0 {
            return Err(GeometryError::NonPositive {
                width: width_px,
                height: height_px,
            });
        }
        if margin_px < 0.0 || margin_px >= width_px / 2.0 {
            return Err(GeometryError::MarginTooLarge {
                margin: margin_px,
                axis: "width",
                extent: width_px,
            });
        }
        if margin_px >= height_px / 2.0 {
            return Err(GeometryError::MarginTooLarge {
                margin: margin_px,
                axis: "height",
                extent: height_px,
            });
        }
        Ok(Self {
            width_px,
            height_px,
            margin_px,
            dpi,
        })
    }

    /// A4 at `dpi`, with a margin given in points (theme padding).
    pub fn a4(dpi: f32, margin_pt: f32, orientation: PageOrientation) -> Result<Self, GeometryError> {
        let w = A4_WIDTH_MM / MM_PER_INCH * dpi;
        let h = A4_HEIGHT_MM / MM_PER_INCH * dpi;
        let (w, h) = match orientation {
            PageOrientation::Portrait => (w, h),
            PageOrientation::Landscape => (h, w),
        };
        Self::new(w, h, margin_pt * dpi / POINTS_PER_INCH, dpi)
    }

    /// Pixels per PDF point.
    pub fn scale(&self) -> f32 {
        self.dpi / POINTS_PER_INCH
    }

    pub fn content_width(&self) -> f32 {
        self.width_px - 2.0 * self.margin_px
    }

    /// Lowest y (from the top) content may reach, leaving `footer_px` free.
    pub fn content_bottom(&self, footer_px: f32) -> f32 {
        self.height_px - self.margin_px - footer_px
    }

    /// Height available to content on an empty page.
    pub fn usable_height(&self, footer_px: f32) -> f32 {
        (self.content_bottom(footer_px) - self.margin_px).max(0.0)
    }

    pub fn width_pt(&self) -> f32 {
        self.width_px / self.scale()
    }

    pub fn height_pt(&self) -> f32 {
        self.height_px / self.scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_at_72_dpi_is_points() {
        let g = PageGeometry::a4(72.0, 30.0, PageOrientation::Portrait).unwrap();
        assert!((g.width_px - 595.28).abs() < 0.1);
        assert!((g.height_px - 841.89).abs() < 0.1);
        assert_eq!(g.margin_px, 30.0);
    }

    #[test]
    fn a4_at_96_dpi_scales_margin() {
        let g = PageGeometry::a4(96.0, 30.0, PageOrientation::Portrait).unwrap();
        assert!((g.width_px - 793.7).abs() < 0.1);
        assert!((g.margin_px - 40.0).abs() < 0.01);
        assert!((g.width_pt() - 595.28).abs() < 0.1);
    }

    #[test]
    fn landscape_swaps_axes() {
        let g = PageGeometry::a4(72.0, 30.0, PageOrientation::Landscape).unwrap();
        assert!(g.width_px > g.height_px);
    }

    #[test]
    fn rejects_oversized_margin() {
        assert!(matches!(
            PageGeometry::new(100.0, 400.0, 50.0, 72.0),
            Err(GeometryError::MarginTooLarge { axis: "width", .. })
        ));
        assert!(matches!(
            PageGeometry::new(400.0, 100.0, 60.0, 72.0),
            Err(GeometryError::MarginTooLarge { axis: "height", .. })
        ));
        assert!(PageGeometry::new(0.0, 100.0, 1.0, 72.0).is_err());
    }

    #[test]
    fn usable_height_subtracts_footer() {
        let g = PageGeometry::new(500.0, 800.0, 50.0, 72.0).unwrap();
        assert_eq!(g.usable_height(0.0), 700.0);
        assert_eq!(g.usable_height(20.0), 680.0);
    }
}
