//! Theme presets – pure styling data shared by every output format.
//!
//! A theme only influences pagination through its padding, which becomes the
//! page margin and therefore shrinks the usable page height.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
                a: 1.0,
            }),
            3 => Some(Self {
                r: channel(&hex[0..1].repeat(2))?,
                g: channel(&hex[1..2].repeat(2))?,
                b: channel(&hex[2..3].repeat(2))?,
                a: 1.0,
            }),
            _ => None,
        }
    }

    /// Hex literal for a preset; presets are authored here so a bad literal
    /// degrades to black instead of failing an export.
    fn preset(hex: &str) -> Self {
        Self::from_hex(hex).unwrap_or(Self::BLACK)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// 8-bit RGBA, for the software rasterizer.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// `#rrggbb`, for CSS in the Word shell.
    pub fn to_hex(self) -> String {
        let [r, g, b, _] = self.to_rgba8();
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// The fixed set of selectable themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeKey {
    #[default]
    Default,
    Modern,
    Minimal,
    Professional,
}

impl ThemeKey {
    pub const ALL: [ThemeKey; 4] = [
        ThemeKey::Default,
        ThemeKey::Modern,
        ThemeKey::Minimal,
        ThemeKey::Professional,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThemeKey::Default => "default",
            ThemeKey::Modern => "modern",
            ThemeKey::Minimal => "minimal",
            ThemeKey::Professional => "professional",
        }
    }

    /// Parse a theme name; unknown names fall back to [`ThemeKey::Default`].
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            log::debug!("unknown theme {name:?}, using default");
            ThemeKey::Default
        })
    }

    pub fn config(self) -> ThemeConfig {
        ThemeConfig::for_key(self)
    }
}

impl fmt::Display for ThemeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThemeKey::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown theme: {s}"))
    }
}

/// Resolved styling for one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub key: ThemeKey,
    /// Body font size in points.
    pub font_size: f32,
    /// Page padding in points; becomes the page margin.
    pub padding: f32,
    pub font_color: Color,
    pub background_color: Color,
    pub table_header_bg: Color,
    pub table_border_color: Color,
    /// Line height factor applied to every font size.
    pub line_height: f32,
    /// Footer (page number / metadata) font size in points.
    pub footer_font_size: f32,
    pub footer_color: Color,
    pub footer_rule_color: Color,
}

impl ThemeConfig {
    pub fn for_key(key: ThemeKey) -> Self {
        let (font_size, padding, font, bg, header, border) = match key {
            ThemeKey::Default => (12.0, 30.0, "#000000", "#ffffff", "#f1f3f5", "#dddddd"),
            ThemeKey::Modern => (11.0, 40.0, "#1a1a1a", "#f8f9fa", "#e9ecef", "#dee2e6"),
            ThemeKey::Minimal => (10.0, 20.0, "#2d2d2d", "#ffffff", "#f8f9fa", "#eaeaea"),
            ThemeKey::Professional => (12.0, 35.0, "#333333", "#ffffff", "#e6f0ff", "#c8d6e5"),
        };
        Self {
            key,
            font_size,
            padding,
            font_color: Color::preset(font),
            background_color: Color::preset(bg),
            table_header_bg: Color::preset(header),
            table_border_color: Color::preset(border),
            line_height: 1.5,
            footer_font_size: 8.0,
            footer_color: Color::preset("#666666"),
            footer_rule_color: Color::preset("#e5e5e5"),
        }
    }

    /// Font size for a heading level (1–6), or the body size for `None`.
    pub fn heading_font_size(&self, level: Option<u8>) -> f32 {
        let scale = match level {
            Some(1) => 2.0,
            Some(2) => 1.5,
            Some(3) => 1.25,
            Some(4) => 1.1,
            Some(_) => 1.0,
            None => return self.font_size,
        };
        self.font_size * scale
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self::for_key(ThemeKey::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_theme_falls_back() {
        assert_eq!(ThemeKey::from_name("neon"), ThemeKey::Default);
        assert_eq!(ThemeKey::from_name("Modern"), ThemeKey::Modern);
    }

    #[test]
    fn presets_carry_expected_padding() {
        assert_eq!(ThemeKey::Modern.config().padding, 40.0);
        assert_eq!(ThemeKey::Minimal.config().font_size, 10.0);
    }

    #[test]
    fn hex_round_trip() {
        let c = Color::from_hex("#e6f0ff").unwrap();
        assert_eq!(c.to_hex(), "#e6f0ff");
        assert_eq!(Color::from_hex("#fff").unwrap(), Color::WHITE);
        assert!(Color::from_hex("#12").is_none());
    }

    #[test]
    fn theme_key_serde_is_lowercase() {
        let json = serde_json::to_string(&ThemeKey::Professional).unwrap();
        assert_eq!(json, "\"professional\"");
    }
}
