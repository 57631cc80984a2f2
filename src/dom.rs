//! HTML parser – converts an editor HTML fragment into a simple DOM tree.
//!
//! The tree is what raster pagination walks and what the Word adapter
//! rewrites before serialising it back out. Supported elements:
//! - Block: div, p, h1-h6, ul, ol, li, table, thead, tbody, tr, td, th, hr
//! - Inline: span, strong, b, em, i, u, br, img
//!
//! Unknown tags are kept so that round-tripping through [`to_html`] never
//! drops content.

use crate::blocks::Alignment;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    P,
    /// Heading level 1–6.
    H(u8),
    Ul,
    Ol,
    Li,
    Table,
    Thead,
    Tbody,
    Tr,
    Td,
    Th,
    Span,
    Strong,
    B,
    Em,
    I,
    U,
    Br,
    Hr,
    Img,
    Body,
    Html,
    Head,
    /// Catch-all for unknown tags; kept and treated as blocks.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Tag::H(lower.as_bytes()[1] - b'0'),
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "strong" => Tag::Strong,
            "b" => Tag::B,
            "em" => Tag::Em,
            "i" => Tag::I,
            "u" => Tag::U,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            "img" => Tag::Img,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            _ => Tag::Unknown(lower),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Tag::Div => "div".into(),
            Tag::P => "p".into(),
            Tag::H(level) => format!("h{level}"),
            Tag::Ul => "ul".into(),
            Tag::Ol => "ol".into(),
            Tag::Li => "li".into(),
            Tag::Table => "table".into(),
            Tag::Thead => "thead".into(),
            Tag::Tbody => "tbody".into(),
            Tag::Tr => "tr".into(),
            Tag::Td => "td".into(),
            Tag::Th => "th".into(),
            Tag::Span => "span".into(),
            Tag::Strong => "strong".into(),
            Tag::B => "b".into(),
            Tag::Em => "em".into(),
            Tag::I => "i".into(),
            Tag::U => "u".into(),
            Tag::Br => "br".into(),
            Tag::Hr => "hr".into(),
            Tag::Img => "img".into(),
            Tag::Body => "body".into(),
            Tag::Html => "html".into(),
            Tag::Head => "head".into(),
            Tag::Unknown(name) => name.clone(),
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Br | Tag::Hr | Tag::Img)
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Span | Tag::Strong | Tag::B | Tag::Em | Tag::I | Tag::U | Tag::Br | Tag::Img
        )
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, Tag::Strong | Tag::B | Tag::Th | Tag::H(_))
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

impl DomNode {
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            DomNode::Element(e) => Some(e),
            DomNode::Text(_) => None,
        }
    }

    pub fn is_blank_text(&self) -> bool {
        matches!(self, DomNode::Text(t) if t.trim().is_empty())
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

/// An element node carrying tag, attributes (in source order), and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn add_class(&mut self, class: &str) {
        if self.classes().contains(&class) {
            return;
        }
        let joined = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            collect_text(child, &mut out);
        }
        out
    }

    /// Alignment from an inline `text-align`, a `text-align-*` class, or a
    /// legacy `align` attribute, in that order.
    pub fn alignment(&self) -> Alignment {
        let from_style = self.inline_style().and_then(|style| {
            style.split(';').find_map(|decl| {
                let (key, value) = decl.split_once(':')?;
                if key.trim().eq_ignore_ascii_case("text-align") {
                    Alignment::from_keyword(value)
                } else {
                    None
                }
            })
        });
        from_style
            .or_else(|| {
                self.classes()
                    .iter()
                    .find_map(|c| c.strip_prefix("text-align-").and_then(Alignment::from_keyword))
            })
            .or_else(|| self.attr("align").and_then(Alignment::from_keyword))
            .unwrap_or_default()
    }

    /// Element children only, skipping text.
    pub fn element_children(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(DomNode::as_element)
    }
}

fn collect_text(node: &DomNode, out: &mut String) {
    match node {
        DomNode::Text(t) => out.push_str(t),
        DomNode::Element(e) if e.tag == Tag::Br => out.push('\n'),
        DomNode::Element(e) => {
            for child in &e.children {
                collect_text(child, out);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over HTML
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes.
///
/// Tolerant of editor output: a closing tag that matches no open element is
/// skipped, and an element left open is closed by its nearest matching
/// ancestor's end tag.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    let mut nodes = Vec::new();
    while !parser.eof() {
        nodes.extend(parser.parse_nodes());
        if parser.starts_with("</") {
            parser.skip_closing_tag();
        }
    }
    nodes
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    open: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            open: Vec::new(),
        }
    }

    fn parse_nodes(&mut self) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            if self.eof() {
                break;
            }
            if self.starts_with("</") {
                let name = self.peek_closing_name();
                if self.open.iter().any(|o| *o == name) {
                    break;
                }
                // Stray end tag with no open element to close.
                self.skip_closing_tag();
                continue;
            }
            if let Some(node) = self.parse_node() {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_past("-->");
            return None;
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past(">");
            return None;
        }
        if self.starts_with("<") && self.next_is_tag_start() {
            return Some(self.parse_element());
        }
        self.parse_text()
    }

    fn next_is_tag_start(&self) -> bool {
        self.input.as_bytes()
            .get(self.pos + 1)
            .is_some_and(|b| b.is_ascii_alphabetic())
    }

    fn parse_text(&mut self) -> Option<DomNode> {
        let start = self.pos;
        // A lone '<' that does not open a tag is literal text.
        self.step_char();
        while !self.eof() && self.byte() != b'<' {
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        if raw.trim().is_empty() && raw.contains('\n') {
            // Formatting whitespace between tags.
            return None;
        }
        Some(DomNode::Text(decode_entities(raw)))
    }

    fn parse_element(&mut self) -> DomNode {
        self.pos += 1; // '<'
        let tag_name = self.parse_name();
        let mut elem = ElementNode::new(Tag::from_name(&tag_name));

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if key.is_empty() {
                // Nothing parseable here; step over one whole character.
                if self.pos == before {
                    self.step_char();
                }
                continue;
            }
            elem.attributes.push((key, value));
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.pos += 1;
        }
        if elem.tag.is_void() {
            return DomNode::Element(elem);
        }

        let own_name = tag_name.to_ascii_lowercase();
        self.open.push(own_name.clone());
        elem.children = self.parse_nodes();
        self.open.pop();

        if self.starts_with("</") && self.peek_closing_name() == own_name {
            self.skip_closing_tag();
        }
        DomNode::Element(elem)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let b = self.byte();
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn peek_closing_name(&self) -> String {
        let rest = &self.input[self.pos + 2..];
        rest.chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == ':')
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn skip_closing_tag(&mut self) {
        self.skip_past(">");
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_name().to_ascii_lowercase();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.pos += 1;
        self.skip_whitespace();
        (key, self.parse_attr_value())
    }

    fn parse_attr_value(&mut self) -> String {
        if self.eof() {
            return String::new();
        }
        let quote = self.byte();
        if quote == b'"' || quote == b'\'' {
            self.pos += 1;
            let start = self.pos;
            while !self.eof() && self.byte() != quote {
                self.pos += 1;
            }
            let val = decode_entities(&self.input[start..self.pos]);
            if !self.eof() {
                self.pos += 1;
            }
            val
        } else {
            let start = self.pos;
            while !self.eof() {
                let b = self.byte();
                if b.is_ascii_whitespace() || b == b'>' || b == b'/' {
                    break;
                }
                self.pos += 1;
            }
            self.input[start..self.pos].to_string()
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.byte().is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn skip_past(&mut self, needle: &str) {
        match self.input[self.pos..].find(needle) {
            Some(i) => self.pos += i + needle.len(),
            None => self.pos = self.input.len(),
        }
    }

    fn step_char(&mut self) {
        self.pos += self.input[self.pos..].chars().next().map_or(1, char::len_utf8);
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Current byte. Every delimiter we test for is ASCII, so stopping on one
    /// always leaves `pos` on a char boundary.
    fn byte(&self) -> u8 {
        self.input.as_bytes()[self.pos]
    }
}

/// Decode character entities; `&nbsp;` is kept as U+00A0 so it can be
/// serialised back as `&nbsp;`.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Serialisation
// ---------------------------------------------------------------------------

/// Serialise nodes back to HTML.
pub fn to_html(nodes: &[DomNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &DomNode, out: &mut String) {
    match node {
        DomNode::Text(t) => out.push_str(&escape_text(t)),
        DomNode::Element(e) => {
            let name = e.tag.name();
            out.push('<');
            out.push_str(&name);
            for (k, v) in &e.attributes {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                out.push_str(&escape_text(v).replace('"', "&quot;"));
                out.push('"');
            }
            out.push('>');
            if e.tag.is_void() {
                return;
            }
            for child in &e.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&name);
            out.push('>');
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\u{00A0}', "&nbsp;")
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes.to_vec()
}

/// Give every empty `<p>`/`<div>` a non-breaking space and the
/// `empty-paragraph` class, and mark every `<br>` to stay in its cell, so a
/// word processor keeps blank lines a browser would collapse.
pub fn preserve_empty_paragraphs(nodes: &mut [DomNode]) {
    for node in nodes.iter_mut() {
        let DomNode::Element(e) = node else { continue };
        match e.tag {
            Tag::P | Tag::Div if e.text_content().trim().is_empty() && !has_image(e) => {
                e.children = vec![DomNode::Text("\u{00A0}".to_string())];
                e.add_class("empty-paragraph");
            }
            Tag::Br => e.set_attr("style", "mso-data-placement:same-cell"),
            _ => preserve_empty_paragraphs(&mut e.children),
        }
    }
}

fn has_image(e: &ElementNode) -> bool {
    e.element_children()
        .any(|c| c.tag == Tag::Img || has_image(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(nodes: &[DomNode]) -> &ElementNode {
        nodes
            .iter()
            .find_map(DomNode::as_element)
            .expect("expected an element")
    }

    #[test]
    fn parse_simple_div() {
        let nodes = parse_html(r#"<div class="flex p-4"><p>Hello</p></div>"#);
        assert_eq!(nodes.len(), 1);
        let e = first_element(&nodes);
        assert_eq!(e.tag, Tag::Div);
        assert_eq!(e.classes(), vec!["flex", "p-4"]);
        assert_eq!(e.children.len(), 1);
    }

    #[test]
    fn non_ascii_inside_tags_is_stepped_over() {
        let nodes = parse_html("<p é>x</p><p “x”>y</p><p data-ñ=\"1\" class=\"k\">z</p>");
        let texts: Vec<String> = nodes.iter().map(DomNode::text_content).collect();
        assert_eq!(texts, vec!["x", "y", "z"]);
        assert!(nodes.iter().all(|n| n.as_element().is_some_and(|e| e.tag == Tag::P)));
        assert_eq!(nodes[2].as_element().and_then(|e| e.attr("class")), Some("k"));
    }

    #[test]
    fn stray_value_does_not_swallow_tag_end() {
        let nodes = parse_html(r#"<p ="v">text</p>"#);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text_content(), "text");
    }

    #[test]
    fn text_may_start_with_multibyte_char() {
        let nodes = parse_html("é<b>x</b>");
        assert_eq!(nodes[0], DomNode::Text("é".into()));
    }

    #[test]
    fn parse_void_elements() {
        let nodes = parse_html(r#"<p>a<br>b<img src="logo.png"></p>"#);
        let p = first_element(&nodes);
        assert_eq!(p.children.len(), 4);
        assert_eq!(p.text_content(), "a\nb");
        assert_eq!(p.children[3].as_element().and_then(|e| e.src()), Some("logo.png"));
    }

    #[test]
    fn keeps_spaces_between_inline_elements() {
        let nodes = parse_html("<p><strong>a</strong> <em>b</em></p>");
        assert_eq!(first_element(&nodes).text_content(), "a b");
    }

    #[test]
    fn heading_levels() {
        let nodes = parse_html("<h5>x</h5>");
        assert_eq!(first_element(&nodes).tag, Tag::H(5));
    }

    #[test]
    fn stray_closing_tag_does_not_truncate() {
        let nodes = parse_html("<p>one</p></div><p>two</p>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].text_content(), "two");
    }

    #[test]
    fn unclosed_inline_is_closed_by_parent() {
        let nodes = parse_html("<p><strong>bold</p><p>next</p>");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text_content(), "bold");
    }

    #[test]
    fn parse_table() {
        let nodes = parse_html(
            "<table><tr><th>Name</th><th>Age</th></tr><tr><td>Alice</td><td>30</td></tr></table>",
        );
        let table = first_element(&nodes);
        assert_eq!(table.tag, Tag::Table);
        assert_eq!(table.children.len(), 2);
    }

    #[test]
    fn alignment_sources() {
        let a = parse_html(r#"<p style="color:red; text-align: right">x</p>"#);
        assert_eq!(first_element(&a).alignment(), Alignment::Right);
        let b = parse_html(r#"<p class="x text-align-center">x</p>"#);
        assert_eq!(first_element(&b).alignment(), Alignment::Center);
        let c = parse_html(r#"<p align="justify">x</p>"#);
        assert_eq!(first_element(&c).alignment(), Alignment::Justify);
    }

    #[test]
    fn serialises_back_with_escaping() {
        let html = r#"<p class="a">x &amp; y&nbsp;z<br></p>"#;
        assert_eq!(to_html(&parse_html(html)), html);
    }

    #[test]
    fn preserves_empty_paragraphs() {
        let mut nodes = parse_html("<p></p><p>X</p><p> </p><p>a<br>b</p>");
        preserve_empty_paragraphs(&mut nodes);
        assert_eq!(
            to_html(&nodes),
            "<p class=\"empty-paragraph\">&nbsp;</p><p>X</p>\
             <p class=\"empty-paragraph\">&nbsp;</p>\
             <p>a<br style=\"mso-data-placement:same-cell\">b</p>"
        );
    }
}
