//! Sample editor documents for testing and demonstration.
//!
//! Each sample exercises a different part of the export path. They are the
//! fragments an editor hands over: no `<html>`/`<body>` wrapper.

/// An 8×8 blue PNG.
pub const SAMPLE_IMAGE_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAgAAAAICAIAAABLbSncAAAAEUlEQVR4nGOQizqBFTEMLQkAGBlQATpZBa0AAAAASUVORK5CYII=";

/// Names accepted by [`sample`].
pub const SAMPLE_NAMES: [&str; 6] = ["letter", "invoice", "lists", "blank-lines", "image", "long-table"];

/// Look up a sample by name.
pub fn sample(name: &str) -> Option<String> {
    let html = match name {
        "letter" => letter_template().to_string(),
        "invoice" => invoice_template().to_string(),
        "lists" => lists_template().to_string(),
        "blank-lines" => blank_lines_template().to_string(),
        "image" => image_template(),
        "long-table" => long_table_template(60),
        _ => return None,
    };
    Some(html)
}

/// Letter with template variables and every alignment encoding.
pub fn letter_template() -> &'static str {
    r##"
<h1 style="text-align:center">Letter of Intent</h1>
<p class="text-align-right">${city}, ${date}</p>
<p>Dear ${recipient},</p>
<p style="text-align: justify">We are pleased to confirm the order of ${quantity} units at a unit
price of ${price}. Delivery is expected within ${lead_days} days of this letter.</p>
<p align="center"><strong>Reference:</strong> <em>${reference}</em></p>
<p>Kind regards,<br>${sender}</p>
"##
}

/// Invoice with a header row and a handful of line items.
pub fn invoice_template() -> &'static str {
    r##"
<h2>Invoice ${number}</h2>
<p>Billed to <strong>${customer}</strong></p>
<table>
    <thead>
        <tr><th>Item</th><th>Qty</th><th>Price</th><th>Total</th></tr>
    </thead>
    <tbody>
        <tr><td>Web Development</td><td>40</td><td>$150.00</td><td>$6,000.00</td></tr>
        <tr><td>Design Services</td><td>20</td><td>$125.00</td><td>$2,500.00</td></tr>
        <tr><td>Hosting (Annual)</td><td>1</td><td>$500.00</td><td>$500.00</td></tr>
    </tbody>
</table>
<p class="text-align-right"><strong>Total: $9,000.00</strong></p>
"##
}

/// Ordered and unordered lists, with misleading source numbering.
pub fn lists_template() -> &'static str {
    r##"
<h3>Checklist</h3>
<ul>
    <li>Review the draft</li>
    <li>Collect <em>signatures</em></li>
</ul>
<ol start="4">
    <li value="10">First step</li>
    <li>Second step</li>
    <li>Third step</li>
</ol>
"##
}

/// Blank paragraphs the flow formats must keep.
pub fn blank_lines_template() -> &'static str {
    "<p></p><p>Between blank lines</p><p></p><div></div><p>After a blank div</p>"
}

/// A paragraph followed by an embedded image.
pub fn image_template() -> String {
    format!(r#"<p>Logo below</p><p><img src="{SAMPLE_IMAGE_DATA_URI}"></p><p>Logo above</p>"#)
}

/// A three-column table with `rows` body rows, long enough to span pages.
pub fn long_table_template(rows: usize) -> String {
    let mut html = String::from("<p>Inventory</p><table><tr><th>#</th><th>Part</th><th>Stock</th></tr>");
    for i in 1..=rows {
        html.push_str(&format!(
            "<tr><td>{i}</td><td>Part {i}</td><td>{}</td></tr>",
            (i * 7) % 50
        ));
    }
    html.push_str("</table><p>End of inventory</p>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_valid_html() {
        for name in SAMPLE_NAMES {
            let html = sample(name).unwrap();
            let dom = crate::dom::parse_html(&html);
            assert!(!dom.is_empty(), "sample '{name}' should parse to non-empty DOM");
            assert!(!crate::blocks::extract(&html).is_empty());
        }
    }

    #[test]
    fn unknown_sample_is_none() {
        assert!(sample("nope").is_none());
    }
}
