//! Template variables – `${name}` substitution against caller-supplied values.
//!
//! Substitution is partial-tolerant: a placeholder whose name is not present
//! in the data is left in the output byte-for-byte so the author can spot it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// A primitive value bound to a template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Number(f64),
    Text(String),
}

/// Mapping from variable name to value.
pub type TemplateData = BTreeMap<String, TemplateValue>;

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateValue::Text(s) => f.write_str(s),
            // f64's Display is plain decimal (never exponent form) and drops
            // a trailing ".0" for integral values.
            TemplateValue::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::Text(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::Text(s)
    }
}

impl From<f64> for TemplateValue {
    fn from(n: f64) -> Self {
        TemplateValue::Number(n)
    }
}

impl From<i64> for TemplateValue {
    fn from(n: i64) -> Self {
        TemplateValue::Number(n as f64)
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"))
}

fn text_node_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">([^<]*)<").expect("text node pattern is valid"))
}

/// Replace every `${name}` whose name is bound in `data`.
///
/// Returns `text` unchanged when `data` is `None`.
pub fn interpolate(text: &str, data: Option<&TemplateData>) -> String {
    let Some(data) = data else {
        return text.to_string();
    };
    placeholder_regex()
        .replace_all(text, |caps: &Captures| match data.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Like [`interpolate`], but only touches text that sits between a `>` and
/// the next `<`, so attribute values inside tags are never rewritten.
pub fn interpolate_text_nodes(html: &str, data: Option<&TemplateData>) -> String {
    if data.is_none() {
        return html.to_string();
    }
    text_node_regex()
        .replace_all(html, |caps: &Captures| {
            format!(">{}<", interpolate(&caps[1], data))
        })
        .into_owned()
}

/// Names referenced in `text` that `data` does not bind, in first-seen order.
pub fn unresolved_variables(text: &str, data: Option<&TemplateData>) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(text) {
        let name = &caps[1];
        let bound = data.is_some_and(|d| d.contains_key(name));
        if !bound && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, TemplateValue)]) -> TemplateData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn substitutes_known_names() {
        let d = data(&[("name", "World".into())]);
        assert_eq!(interpolate("<p>Hello ${name}</p>", Some(&d)), "<p>Hello World</p>");
    }

    #[test]
    fn leaves_unknown_names_verbatim() {
        let d = data(&[("name", "World".into())]);
        assert_eq!(
            interpolate("${greeting}, ${name}!", Some(&d)),
            "${greeting}, World!"
        );
    }

    #[test]
    fn absent_data_is_identity() {
        let s = "Total: ${amount}";
        assert_eq!(interpolate(s, None), s);
    }

    #[test]
    fn numbers_use_plain_decimal() {
        let d = data(&[
            ("qty", 3.0.into()),
            ("price", 19.5.into()),
            ("big", 1e21.into()),
        ]);
        assert_eq!(
            interpolate("${qty} x ${price} ${big}", Some(&d)),
            "3 x 19.5 1000000000000000000000"
        );
    }

    #[test]
    fn idempotent_once_resolved() {
        let d = data(&[("a", "x".into())]);
        let once = interpolate("${a} ${b}", Some(&d));
        assert_eq!(interpolate(&once, Some(&d)), once);
    }

    #[test]
    fn non_word_names_are_not_placeholders() {
        let d = data(&[("a-b", "x".into())]);
        assert_eq!(interpolate("${a-b}", Some(&d)), "${a-b}");
    }

    #[test]
    fn text_nodes_only() {
        let d = data(&[("cls", "bad".into()), ("who", "Ana".into())]);
        let html = r#"<p class="${cls}">Hi ${who}</p>"#;
        assert_eq!(
            interpolate_text_nodes(html, Some(&d)),
            r#"<p class="${cls}">Hi Ana</p>"#
        );
    }

    #[test]
    fn reports_unresolved_once_in_order() {
        let d = data(&[("b", "1".into())]);
        assert_eq!(
            unresolved_variables("${c} ${b} ${a} ${c}", Some(&d)),
            vec!["c".to_string(), "a".to_string()]
        );
        assert_eq!(unresolved_variables("${x}", None), vec!["x".to_string()]);
    }

    #[test]
    fn template_value_from_json() {
        let d: TemplateData = serde_json::from_str(r#"{"n": 42, "s": "ok"}"#).unwrap();
        assert_eq!(d["n"], TemplateValue::Number(42.0));
        assert_eq!(d["s"], TemplateValue::Text("ok".into()));
    }
}
