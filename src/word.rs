//! Word-compatible HTML adapter – flow output, no pagination.
//!
//! The body is the editor HTML with blank paragraphs made explicit, wrapped
//! in an HTML shell carrying the Office namespaces and a `w:WordDocument`
//! block so word processors open it in print layout as a native document.

use std::fmt::Write as _;

use crate::dom::{body_children, parse_html, preserve_empty_paragraphs, to_html};
use crate::theme::ThemeConfig;

/// MIME type Word registers for `.doc` imports.
pub const WORD_MIME_TYPE: &str = "application/msword";

const WORD_DOCUMENT_SETTINGS: &str = r#"  <!--[if gte mso 9]>
  <xml>
    <w:WordDocument>
      <w:View>Print</w:View>
      <w:Zoom>100</w:Zoom>
      <w:TrackMoves>false</w:TrackMoves>
      <w:TrackFormatting/>
      <w:ValidateAgainstSchemas/>
      <w:SaveIfXMLInvalid>false</w:SaveIfXMLInvalid>
      <w:IgnoreMixedContent>false</w:IgnoreMixedContent>
      <w:DoNotPromoteQF/>
      <w:LidThemeOther>EN-US</w:LidThemeOther>
      <w:Compatibility>
        <w:BreakWrappedTables/>
        <w:SnapToGridInCell/>
        <w:WrapTextWithPunct/>
        <w:DontGrowAutofit/>
        <w:SplitPgBreakAndParaMark/>
      </w:Compatibility>
      <w:DoNotOptimizeForBrowser/>
    </w:WordDocument>
  </xml>
  <![endif]-->
"#;

/// Serialize editor HTML as a Word-importable HTML document.
pub fn to_word_html(html: &str, theme: &ThemeConfig, title: &str) -> String {
    let mut nodes = body_children(&parse_html(html));
    preserve_empty_paragraphs(&mut nodes);
    let body = to_html(&nodes);

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(
        "<html xmlns:o=\"urn:schemas-microsoft-com:office:office\"\n      \
         xmlns:w=\"urn:schemas-microsoft-com:office:word\"\n      \
         xmlns:m=\"http://schemas.microsoft.com/office/2004/12/omml\"\n      \
         xmlns=\"http://www.w3.org/TR/REC-html40\">\n",
    );
    out.push_str("<head>\n");
    out.push_str("  <meta charset=\"utf-8\">\n");
    out.push_str("  <meta name=\"ProgId\" content=\"Word.Document\">\n");
    let _ = writeln!(out, "  <title>{}</title>", escape_title(title));
    out.push_str(WORD_DOCUMENT_SETTINGS);
    out.push_str(&stylesheet(theme));
    out.push_str("</head>\n<body>\n");
    out.push_str(&body);
    out.push_str("\n</body>\n</html>\n");
    out
}

fn escape_title(title: &str) -> String {
    title
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn stylesheet(theme: &ThemeConfig) -> String {
    let mut css = String::from("  <style>\n");
    let _ = writeln!(
        css,
        "    body {{ font-family: 'Calibri', sans-serif; font-size: {}pt; line-height: {}; color: {}; background: {}; }}",
        theme.font_size,
        theme.line_height,
        theme.font_color.to_hex(),
        theme.background_color.to_hex()
    );
    css.push_str("    table { border-collapse: collapse; width: 100%; margin: 10px 0; }\n");
    let _ = writeln!(
        css,
        "    table, th, td {{ border: 1px solid {}; padding: 5px; }}",
        theme.table_border_color.to_hex()
    );
    let _ = writeln!(
        css,
        "    th {{ background-color: {}; font-weight: bold; }}",
        theme.table_header_bg.to_hex()
    );
    css.push_str("    p { margin-top: 0; margin-bottom: 0; min-height: 1em; }\n");
    css.push_str(
        "    p.empty-paragraph { mso-line-height-rule: exactly; margin-top: 0; margin-bottom: 0; }\n",
    );
    css.push_str("    .MsoNormal { margin: 0in; margin-bottom: .0001pt; mso-pagination: widow-orphan; }\n");
    for align in ["left", "center", "right", "justify"] {
        let _ = writeln!(css, "    .text-align-{align} {{ text-align: {align}; }}");
    }
    css.push_str("    ul, ol { margin-top: 0; margin-bottom: 0; padding-left: 2em; }\n");
    css.push_str("    h1, h2, h3, h4, h5, h6 { margin-top: 12pt; margin-bottom: 6pt; font-weight: bold; }\n");
    for level in 1..=6u8 {
        let _ = writeln!(
            css,
            "    h{level} {{ font-size: {}pt; }}",
            theme.heading_font_size(Some(level))
        );
    }
    css.push_str("    br { mso-data-placement: same-cell; }\n");
    css.push_str("  </style>\n");
    css
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeKey;

    #[test]
    fn shell_carries_office_namespaces() {
        let out = to_word_html("<p>x</p>", &ThemeConfig::default(), "Doc");
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains("xmlns:w=\"urn:schemas-microsoft-com:office:word\""));
        assert!(out.contains("<meta name=\"ProgId\" content=\"Word.Document\">"));
        assert!(out.contains("<w:View>Print</w:View>"));
        assert!(out.contains("<body>\n<p>x</p>\n</body>"));
    }

    #[test]
    fn empty_paragraphs_get_nbsp() {
        let out = to_word_html("<p></p><p>X</p><p></p>", &ThemeConfig::default(), "Doc");
        let empty = r#"<p class="empty-paragraph">&nbsp;</p>"#;
        assert_eq!(out.matches(empty).count(), 2);
        let x = out.find("<p>X</p>").unwrap();
        assert!(out[..x].contains(empty));
        assert!(out[x..].contains(empty));
    }

    #[test]
    fn line_breaks_stay_in_cell() {
        let out = to_word_html("<p>a<br>b</p>", &ThemeConfig::default(), "Doc");
        assert!(out.contains(r#"<br style="mso-data-placement:same-cell">"#));
    }

    #[test]
    fn theme_colors_reach_the_stylesheet() {
        let theme = ThemeKey::Professional.config();
        let out = to_word_html("<p>x</p>", &theme, "Doc");
        assert!(out.contains("background-color: #e6f0ff"));
        assert!(out.contains("border: 1px solid #c8d6e5"));
    }
}
