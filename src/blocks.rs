//! Content block extraction – HTML string → ordered [`ContentBlock`] list.
//!
//! Tables and lists are pulled out first and replaced by placeholder tokens
//! so their position in the text stream survives tag stripping. Paragraphs
//! and headings are then tagged with an alignment/level marker, every other
//! tag is removed, and the stream is split back apart at the placeholders.
//!
//! Recognition is pattern based and single pass: a table or list nested
//! inside a cell or item is not recognised as a structure of its own, its
//! text is flattened into the enclosing cell or item.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// Private-use code points delimit placeholders and markers so that no
// literal document text can be mistaken for one.
const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';
const MARKER_OPEN: char = '\u{E002}';
const MARKER_CLOSE: char = '\u{E003}';
const MARKER_END: char = '\u{E004}';

// ---------------------------------------------------------------------------
// Block types
// ---------------------------------------------------------------------------

/// Horizontal alignment of a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
    /// No directive present; the renderer's default applies.
    #[default]
    None,
}

impl Alignment {
    pub fn from_keyword(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(Alignment::Left),
            "center" | "middle" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
            Alignment::None => "none",
        }
    }

    fn code(self) -> char {
        match self {
            Alignment::Left => 'l',
            Alignment::Center => 'c',
            Alignment::Right => 'r',
            Alignment::Justify => 'j',
            Alignment::None => 'n',
        }
    }

    fn from_code(c: char) -> Self {
        match c {
            'l' => Alignment::Left,
            'c' => Alignment::Center,
            'r' => Alignment::Right,
            'j' => Alignment::Justify,
            _ => Alignment::None,
        }
    }

    /// Detect alignment from a tag's raw attribute text.
    ///
    /// Precedence: inline `text-align` style, then a `text-align-*` class,
    /// then the legacy `align` attribute.
    pub fn from_attributes(attrs: &str) -> Self {
        let caps = [style_align_regex(), class_align_regex(), attr_align_regex()];
        caps.iter()
            .find_map(|re| re.captures(attrs).and_then(|c| Alignment::from_keyword(&c[1])))
            .unwrap_or_default()
    }
}

/// A paragraph or heading reduced to plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub alignment: Alignment,
    /// Heading level 1–6, `None` for body text.
    pub heading: Option<u8>,
}

/// One table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub content: String,
    pub is_header: bool,
}

pub type Row = Vec<Cell>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableBlock {
    pub rows: Vec<Row>,
}

impl TableBlock {
    /// The first row counts as a header only if it holds at least one `<th>`.
    pub fn has_header(&self) -> bool {
        self.rows
            .first()
            .is_some_and(|row| row.iter().any(|c| c.is_header))
    }

    pub fn header(&self) -> Option<&Row> {
        if self.has_header() {
            self.rows.first()
        } else {
            None
        }
    }

    /// Rows after the header (all rows when there is no header).
    pub fn body(&self) -> &[Row] {
        if self.has_header() {
            &self.rows[1..]
        } else {
            &self.rows
        }
    }

    /// Column count of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListBlock {
    pub items: Vec<ListItem>,
    pub ordered: bool,
}

impl ListBlock {
    /// Prefix for the item at zero-based `index`; ordinals come from
    /// position only.
    pub fn marker(&self, index: usize) -> String {
        if self.ordered {
            format!("{}.", index + 1)
        } else {
            "\u{2022}".to_string()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One structural unit of a document, in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentBlock {
    Text(TextBlock),
    Table(TableBlock),
    List(ListBlock),
}

impl ContentBlock {
    /// Empty tables and lists are parsed but never rendered.
    pub fn is_renderable(&self) -> bool {
        match self {
            ContentBlock::Text(t) => !t.text.trim().is_empty(),
            ContentBlock::Table(t) => !t.is_empty(),
            ContentBlock::List(l) => !l.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("static pattern is valid"))
        }
    };
}

cached_regex!(table_regex, r"(?is)<table\b[^>]*>(.*?)</table\s*>");
cached_regex!(row_regex, r"(?is)<tr\b[^>]*>(.*?)</tr\s*>");
cached_regex!(cell_regex, r"(?is)<(th|td)\b[^>]*>(.*?)</t[hd]\s*>");
cached_regex!(list_regex, r"(?is)<(ul|ol)\b[^>]*>(.*?)</(?:ul|ol)\s*>");
cached_regex!(item_regex, r"(?is)<li\b[^>]*>(.*?)</li\s*>");
cached_regex!(
    block_regex,
    r"(?is)<(p|h[1-6])\b([^>]*)>(.*?)</(?:p|h[1-6])\s*>"
);
cached_regex!(br_regex, r"(?i)<br\s*/?>");
cached_regex!(tag_regex, r"(?s)<[^>]*>");
cached_regex!(excess_newlines_regex, r"\n[ \t]*\n(?:[ \t]*\n)+");
cached_regex!(
    style_align_regex,
    r#"(?i)style\s*=\s*["'][^"']*text-align\s*:\s*([a-z]+)"#
);
cached_regex!(
    class_align_regex,
    r#"(?i)class\s*=\s*["'][^"']*\btext-align-([a-z]+)"#
);
cached_regex!(attr_align_regex, r#"(?i)\balign\s*=\s*["']?([a-z]+)"#);
cached_regex!(
    placeholder_regex,
    "\u{E000}([TL])([0-9]+)\u{E001}"
);
cached_regex!(
    marker_regex,
    "(?s)\u{E002}([lcrjn])([0-6])\u{E003}(.*?)\u{E004}"
);
cached_regex!(stray_marker_regex, "\u{E002}[lcrjn][0-6]\u{E003}|\u{E004}");

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Decode the entities the editor emits; `&nbsp;` becomes a plain space.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace('\u{00A0}', " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Strip every tag from an inline fragment and collapse whitespace; `<br>`
/// becomes a single space.
pub fn inline_text(fragment: &str) -> String {
    let spaced = br_regex().replace_all(fragment, " ");
    let stripped = tag_regex().replace_all(&spaced, "");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Raw cells of each `<tr>` in a table body: `(is_header, inner_html)`.
pub(crate) fn table_cells_html(table_inner: &str) -> Vec<Vec<(bool, &str)>> {
    row_regex()
        .captures_iter(table_inner)
        .filter_map(|row| row.get(1))
        .map(|row| {
            cell_regex()
                .captures_iter(row.as_str())
                .filter_map(|cell| {
                    let is_header = cell[1].eq_ignore_ascii_case("th");
                    cell.get(2).map(|m| (is_header, m.as_str()))
                })
                .collect()
        })
        .collect()
}

/// Raw inner HTML of each `<li>` in a list body.
pub(crate) fn list_items_html(list_inner: &str) -> Vec<&str> {
    item_regex()
        .captures_iter(list_inner)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

pub(crate) fn parse_table(table_inner: &str) -> TableBlock {
    let rows = table_cells_html(table_inner)
        .into_iter()
        .map(|cells| {
            cells
                .into_iter()
                .map(|(is_header, html)| Cell {
                    content: inline_text(html),
                    is_header,
                })
                .collect()
        })
        .collect();
    TableBlock { rows }
}

pub(crate) fn parse_list(list_inner: &str, ordered: bool) -> ListBlock {
    let items = list_items_html(list_inner)
        .into_iter()
        .map(|html| ListItem {
            content: inline_text(html),
        })
        .collect();
    ListBlock { items, ordered }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Parse `html` into content blocks in reading order.
pub fn extract(html: &str) -> Vec<ContentBlock> {
    // 1. Tables
    let mut tables: Vec<TableBlock> = Vec::new();
    let without_tables = table_regex().replace_all(html, |caps: &regex::Captures| {
        let table = parse_table(&caps[1]);
        if table.is_empty() {
            log::warn!("table {} has no parsable rows; it will be skipped", tables.len());
        }
        tables.push(table);
        placeholder('T', tables.len() - 1)
    });

    // 2. Lists
    let mut lists: Vec<ListBlock> = Vec::new();
    let without_lists = list_regex().replace_all(&without_tables, |caps: &regex::Captures| {
        let ordered = caps[1].eq_ignore_ascii_case("ol");
        let list = parse_list(&caps[2], ordered);
        if list.is_empty() {
            log::warn!("list {} has no items; it will be skipped", lists.len());
        }
        lists.push(list);
        placeholder('L', lists.len() - 1)
    });

    // 3. Paragraph / heading markers (line breaks first, so they survive)
    let with_breaks = br_regex().replace_all(&without_lists, "\n");
    let marked = block_regex().replace_all(&with_breaks, |caps: &regex::Captures| {
        let level = match caps[1].to_ascii_lowercase().as_str() {
            "p" => 0,
            h => h[1..].parse::<u8>().unwrap_or(0),
        };
        let alignment = Alignment::from_attributes(&caps[2]);
        format!(
            "\n\n{MARKER_OPEN}{}{level}{MARKER_CLOSE}{}{MARKER_END}\n\n",
            alignment.code(),
            &caps[3]
        )
    });

    // 4. Strip remaining tags, decode, normalise breaks
    let stripped = tag_regex().replace_all(&marked, "");
    let decoded = decode_entities(&stripped);
    let text = excess_newlines_regex().replace_all(&decoded, "\n\n");

    // 5. Reassemble in order
    let mut blocks = Vec::new();
    let mut cursor = 0;
    for caps in placeholder_regex().captures_iter(&text) {
        let Some(whole) = caps.get(0) else { continue };
        push_text_blocks(&text[cursor..whole.start()], &mut blocks);
        cursor = whole.end();

        let index: usize = caps[2].parse().unwrap_or(usize::MAX);
        let block = match &caps[1] {
            "T" => tables.get(index).cloned().map(ContentBlock::Table),
            _ => lists.get(index).cloned().map(ContentBlock::List),
        };
        match block {
            Some(b) => blocks.push(b),
            None => log::warn!("dangling structure placeholder {}", whole.as_str()),
        }
    }
    push_text_blocks(&text[cursor..], &mut blocks);
    blocks
}

fn placeholder(kind: char, index: usize) -> String {
    format!("\n\n{PLACEHOLDER_OPEN}{kind}{index}{PLACEHOLDER_CLOSE}\n\n")
}

/// Split a run of residual text into paragraphs. Each marked span is one
/// paragraph carrying its alignment and level; loose text outside any
/// paragraph splits on blank lines.
fn push_text_blocks(segment: &str, blocks: &mut Vec<ContentBlock>) {
    let mut cursor = 0;
    for caps in marker_regex().captures_iter(segment) {
        let Some(whole) = caps.get(0) else { continue };
        push_loose(&segment[cursor..whole.start()], blocks);
        cursor = whole.end();
        let alignment = caps[1]
            .chars()
            .next()
            .map(Alignment::from_code)
            .unwrap_or_default();
        let level = caps[2].parse::<u8>().unwrap_or(0);
        push_text(&caps[3], alignment, (level > 0).then_some(level), blocks);
    }
    push_loose(&segment[cursor..], blocks);
}

fn push_loose(raw: &str, blocks: &mut Vec<ContentBlock>) {
    let cleaned = stray_marker_regex().replace_all(raw, "");
    for para in cleaned.split("\n\n") {
        push_text(para, Alignment::None, None, blocks);
    }
}

fn push_text(raw: &str, alignment: Alignment, heading: Option<u8>, blocks: &mut Vec<ContentBlock>) {
    let text = tidy_lines(raw);
    if !text.is_empty() {
        blocks.push(ContentBlock::Text(TextBlock {
            text,
            alignment,
            heading,
        }));
    }
}

/// Collapse runs of spaces inside each line and trim the paragraph, keeping
/// explicit line breaks.
fn tidy_lines(para: &str) -> String {
    let lines: Vec<String> = para
        .split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect();
    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(blocks: &[ContentBlock]) -> Vec<&TextBlock> {
        blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn inline_style_alignment() {
        let blocks = extract(r#"<p style="text-align: center">X</p>"#);
        assert_eq!(
            blocks,
            vec![ContentBlock::Text(TextBlock {
                text: "X".into(),
                alignment: Alignment::Center,
                heading: None,
            })]
        );
    }

    #[test]
    fn class_alignment() {
        let blocks = extract(r#"<p class="text-align-right">Y</p>"#);
        assert_eq!(texts(&blocks)[0].alignment, Alignment::Right);
    }

    #[test]
    fn legacy_align_attribute() {
        let blocks = extract(r#"<h2 align="justify">Z</h2><p>plain</p>"#);
        let t = texts(&blocks);
        assert_eq!(t[0].alignment, Alignment::Justify);
        assert_eq!(t[0].heading, Some(2));
        assert_eq!(t[1].alignment, Alignment::None);
        assert_eq!(t[1].heading, None);
    }

    #[test]
    fn tables_and_lists_keep_position() {
        let html = "<p>before</p><table><tr><th>H</th></tr><tr><td>1</td></tr></table>\
                    <p>middle</p><ul><li>a</li></ul><p>after</p>";
        let kinds: Vec<&str> = extract(html)
            .iter()
            .map(|b| match b {
                ContentBlock::Text(_) => "text",
                ContentBlock::Table(_) => "table",
                ContentBlock::List(_) => "list",
            })
            .collect();
        assert_eq!(kinds, vec!["text", "table", "text", "list", "text"]);
    }

    #[test]
    fn row_count_is_preserved() {
        let html = "<table><tr><td>a</td></tr><tr><td>b</td></tr></table>\
                    <p>x</p>\
                    <table><thead><tr><th>h</th></tr></thead><tbody><tr><td>c</td></tr><tr><td>d</td></tr></tbody></table>";
        let rows: usize = extract(html)
            .iter()
            .map(|b| match b {
                ContentBlock::Table(t) => t.rows.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(rows, 5);
    }

    #[test]
    fn header_row_requires_th_in_first_row() {
        let html = "<table><tr><td>a</td></tr><tr><th>b</th></tr></table>";
        let ContentBlock::Table(t) = &extract(html)[0] else {
            panic!("expected table");
        };
        assert!(!t.has_header());
        assert_eq!(t.body().len(), 2);
        assert!(t.rows[1][0].is_header);
    }

    #[test]
    fn cell_markup_is_stripped() {
        let html = "<table><tr><th><strong>Name</strong></th><td>A&amp;B&nbsp;Co</td></tr></table>";
        let ContentBlock::Table(t) = &extract(html)[0] else {
            panic!("expected table");
        };
        assert_eq!(t.rows[0][0].content, "Name");
        assert_eq!(t.rows[0][1].content, "A&B Co");
    }

    #[test]
    fn ordered_list_markers_come_from_position() {
        let html = r#"<ol start="7"><li value="9">a</li><li>b</li></ol>"#;
        let ContentBlock::List(l) = &extract(html)[0] else {
            panic!("expected list");
        };
        assert!(l.ordered);
        assert_eq!(l.marker(0), "1.");
        assert_eq!(l.marker(1), "2.");
    }

    #[test]
    fn empty_structures_are_parsed_but_not_renderable() {
        let blocks = extract("<table></table><ul></ul>");
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| !b.is_renderable()));
    }

    #[test]
    fn br_becomes_newline_inside_paragraph() {
        let blocks = extract("<p>line one<br>line two</p>");
        assert_eq!(texts(&blocks)[0].text, "line one\nline two");
    }

    #[test]
    fn empty_paragraphs_produce_no_blocks() {
        let blocks = extract("<p></p><p>X</p><p>   </p>");
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn literal_brackets_are_not_placeholders() {
        let blocks = extract("<p>See [TABLE_0] here</p>");
        assert_eq!(texts(&blocks)[0].text, "See [TABLE_0] here");
    }

    #[test]
    fn alignment_does_not_leak_into_following_text() {
        let blocks = extract(r#"<p style="text-align:center">a<br><br>b</p>tail"#);
        let t = texts(&blocks);
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].text, "a\n\nb");
        assert_eq!(t[0].alignment, Alignment::Center);
        assert_eq!(t[1].alignment, Alignment::None);
    }

    #[test]
    fn loose_text_becomes_a_block() {
        let blocks = extract("Just text<p>para</p>tail");
        let t: Vec<&str> = texts(&blocks).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(t, vec!["Just text", "para", "tail"]);
    }
}
