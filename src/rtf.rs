//! RTF adapter – flow output, no pagination.
//!
//! Walks the parsed DOM paragraph by paragraph. Inline `strong`/`b`, `em`/`i`
//! and `u` become `\b`, `\i` and `\ul` groups, `<br>` becomes `\line`, and a
//! paragraph with no visible text becomes a double paragraph break so blank
//! lines survive the round trip into a word processor.

use crate::blocks::Alignment;
use crate::dom::{body_children, parse_html, DomNode, ElementNode, Tag};
use crate::surface::table_rows;
use crate::theme::{Color, ThemeConfig};

const EMPTY_PARAGRAPH: &str = "\\par\\par ";

/// Serialize editor HTML as an RTF document styled with `theme`.
pub fn to_rtf(html: &str, theme: &ThemeConfig) -> String {
    let nodes = body_children(&parse_html(html));
    let mut writer = RtfWriter {
        out: header(theme),
        theme,
    };
    writer.blocks(&nodes);
    writer.out.push('}');
    writer.out
}

fn color_entry(c: Color) -> String {
    let [r, g, b, _] = c.to_rgba8();
    format!("\\red{r}\\green{g}\\blue{b};")
}

fn header(theme: &ThemeConfig) -> String {
    let mut rtf = String::from("{\\rtf1\\ansi\\ansicpg1252\\deff0\n");
    rtf.push_str("{\\fonttbl\\f0\\fswiss\\fcharset0 Helvetica;}\n");
    rtf.push_str(&format!(
        "{{\\colortbl;{}{}}}\n",
        color_entry(theme.font_color),
        color_entry(theme.background_color)
    ));
    rtf.push_str("\\margl1440\\margr1440\\viewkind0\\uc1\n");
    rtf.push_str(&format!("\\pard\\f0\\fs{} \\cf1 ", half_points(theme.font_size)));
    rtf
}

/// RTF font sizes are in half-points.
fn half_points(pt: f32) -> u32 {
    (pt * 2.0).round().max(1.0) as u32
}

/// Escape text for an RTF body. Non-ASCII becomes `\uN?` (UTF-16 code
/// units, signed), a non-breaking space becomes `\~`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '\u{00A0}' => out.push_str("\\~"),
            '\n' | '\r' | '\t' => out.push(' '),
            c if c.is_ascii() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{}?", *unit as i16));
                }
            }
        }
    }
    out
}

fn alignment_word(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left | Alignment::None => "\\ql",
        Alignment::Center => "\\qc",
        Alignment::Right => "\\qr",
        Alignment::Justify => "\\qj",
    }
}

fn is_blank(e: &ElementNode) -> bool {
    e.text_content().trim().is_empty() && !e.children.iter().any(|c| matches!(c, DomNode::Element(el) if el.tag == Tag::Br))
}

struct RtfWriter<'a> {
    out: String,
    theme: &'a ThemeConfig,
}

impl RtfWriter<'_> {
    fn blocks(&mut self, nodes: &[DomNode]) {
        // Inline runs between block elements form one paragraph.
        let mut run: Vec<&DomNode> = Vec::new();
        for node in nodes {
            let block = node
                .as_element()
                .filter(|e| !e.tag.is_inline());
            match block {
                Some(e) => {
                    self.loose(&run);
                    run.clear();
                    self.block(e);
                }
                None => run.push(node),
            }
        }
        self.loose(&run);
    }

    fn loose(&mut self, run: &[&DomNode]) {
        if run.iter().all(|n| n.is_blank_text()) {
            return;
        }
        self.out.push_str("\\pard\\ql ");
        for node in run {
            self.inline(node);
        }
        self.out.push_str("\\par\n");
    }

    fn block(&mut self, e: &ElementNode) {
        match &e.tag {
            Tag::Ul | Tag::Ol => self.list(e),
            Tag::Table => self.table(e),
            Tag::Hr => self.out.push_str("\\pard\\brdrb\\brdrs\\brdrw10\\brsp20 \\par\n"),
            Tag::Div | Tag::Body | Tag::Html | Tag::Unknown(_)
                if e.element_children().any(|c| !c.tag.is_inline()) =>
            {
                self.blocks(&e.children)
            }
            Tag::Head => {}
            Tag::H(level) => {
                let size = half_points(self.theme.heading_font_size(Some(*level)));
                self.out
                    .push_str(&format!("\\pard{} {{\\b\\fs{size} ", alignment_word(e.alignment())));
                self.children(e);
                self.out.push_str("}\\par\n");
            }
            _ if is_blank(e) => self.out.push_str(EMPTY_PARAGRAPH),
            _ => {
                self.out
                    .push_str(&format!("\\pard{} ", alignment_word(e.alignment())));
                self.children(e);
                self.out.push_str("\\par\n");
            }
        }
    }

    fn children(&mut self, e: &ElementNode) {
        for child in &e.children {
            self.inline(child);
        }
    }

    fn inline(&mut self, node: &DomNode) {
        let e = match node {
            DomNode::Text(t) => {
                self.out.push_str(&escape(&collapse_spaces(t)));
                return;
            }
            DomNode::Element(e) => e,
        };
        let group = match e.tag {
            Tag::Strong | Tag::B => Some("\\b"),
            Tag::Em | Tag::I => Some("\\i"),
            Tag::U => Some("\\ul"),
            _ => None,
        };
        match (group, &e.tag) {
            (Some(word), _) => {
                self.out.push('{');
                self.out.push_str(word);
                self.out.push(' ');
                self.children(e);
                self.out.push('}');
            }
            (None, Tag::Br) => self.out.push_str("\\line "),
            (None, Tag::Img) => log::debug!("RTF output skips an embedded image"),
            _ => self.children(e),
        }
    }

    fn list(&mut self, e: &ElementNode) {
        let ordered = e.tag == Tag::Ol;
        for (i, item) in e.element_children().filter(|c| c.tag == Tag::Li).enumerate() {
            let marker = if ordered {
                format!("{}.", i + 1)
            } else {
                "\\bullet".to_string()
            };
            self.out
                .push_str(&format!("\\pard\\fi-360\\li720\\ql {marker}\\tab "));
            self.children(item);
            self.out.push_str("\\par\n");
        }
    }

    fn table(&mut self, e: &ElementNode) {
        for row in table_rows(e) {
            self.out.push_str("\\pard\\ql ");
            let cells: Vec<&ElementNode> = row
                .element_children()
                .filter(|c| matches!(c.tag, Tag::Td | Tag::Th))
                .collect();
            for (i, cell) in cells.iter().enumerate() {
                if i > 0 {
                    self.out.push_str("\\tab ");
                }
                if cell.tag == Tag::Th {
                    self.out.push_str("{\\b ");
                    self.children(cell);
                    self.out.push('}');
                } else {
                    self.children(cell);
                }
            }
            self.out.push_str("\\par\n");
        }
    }
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{00A0}' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}
