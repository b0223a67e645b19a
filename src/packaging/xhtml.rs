//! Re-serialisation of captured chapter HTML as an XHTML content document.
//!
//! Captured chapters are HTML5 documents as rendered by the reader. EPUB
//! content documents must be well-formed XML, so the body is walked with
//! `scraper` and written back out with void elements self-closed and text
//! escaped. Head content, scripts and links are dropped; the packaged
//! stylesheet is linked instead.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const DROPPED_ELEMENTS: [&str; 5] = ["script", "noscript", "link", "base", "meta"];

/// Attributes whose values may point at a cached resource.
const REFERENCE_ATTRIBUTES: [&str; 3] = ["src", "href", "poster"];

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Prefixes bound on the document element (`xml` is always bound).
const BOUND_PREFIXES: [&str; 4] = ["xml", "xmlns", "xlink", "epub"];

/// Write a complete XHTML document for one chapter.
///
/// `references` maps absolute cache paths to their location inside the
/// package; matching attribute values are rewritten.
#[must_use]
pub fn chapter_document(
    html: &str,
    title: &str,
    lang: &str,
    link_stylesheet: bool,
    references: &HashMap<String, String>,
) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() + 512);

    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n");
    out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\"");
    push_attribute(&mut out, "xmlns:xlink", XLINK_NS);
    push_attribute(&mut out, "lang", lang);
    push_attribute(&mut out, "xml:lang", lang);
    out.push_str(">\n<head>\n<meta charset=\"utf-8\" />\n<title>");
    escape_into(&mut out, title, false);
    out.push_str("</title>\n");
    if link_stylesheet {
        out.push_str("<link rel=\"stylesheet\" type=\"text/css\" href=\"stylesheet.css\" />\n");
    }
    out.push_str("</head>\n<body>");

    if let Some(body) = document.select(&BODY_SELECTOR).next() {
        write_children(&mut out, body, references);
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn write_children(out: &mut String, element: ElementRef<'_>, references: &HashMap<String, String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            write_element(out, child_element, references);
            continue;
        }
        if let Node::Text(text) = child.value() {
            escape_into(out, text, false);
        }
    }
}

fn write_element(out: &mut String, element: ElementRef<'_>, references: &HashMap<String, String>) {
    let name = element.value().name();
    if DROPPED_ELEMENTS.contains(&name) || !is_xml_name(name) {
        return;
    }

    out.push('<');
    out.push_str(name);

    let mut written: Vec<String> = Vec::new();
    for (qualified, value) in &element.value().attrs {
        let Some(attr) = attribute_name(qualified.prefix.as_deref(), &qualified.local) else {
            continue;
        };
        if written.contains(&attr) {
            continue;
        }
        let value: &str = value;
        let value = if REFERENCE_ATTRIBUTES.contains(&&*qualified.local) {
            references.get(value).map_or(value, String::as_str)
        } else {
            value
        };
        push_attribute(out, &attr, value);
        written.push(attr);
    }

    // Inline SVG in HTML usually omits its namespace declaration.
    let in_svg = &*element.value().name.ns == SVG_NS;
    if in_svg && name == "svg" && !written.iter().any(|attr| attr == "xmlns") {
        push_attribute(out, "xmlns", SVG_NS);
    }

    if VOID_ELEMENTS.contains(&name) {
        out.push_str(" />");
        return;
    }

    out.push('>');
    write_children(out, element, references);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(out, value, true);
    out.push('"');
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            // Control characters other than whitespace are not allowed in XML 1.0.
            c if c.is_control() && !matches!(c, '\n' | '\r' | '\t') => {}
            c => out.push(c),
        }
    }
}

/// Serialised name of an attribute, or `None` when it cannot be written as
/// a namespace-well-formed XML attribute.
///
/// The HTML parser keeps prefixes of foreign-content attributes such as
/// `xlink:href` and `xmlns:xlink` apart from the local name.
fn attribute_name(prefix: Option<&str>, local: &str) -> Option<String> {
    if !is_xml_name(local) {
        return None;
    }
    match prefix {
        Some(prefix) if is_xml_name(prefix) => Some(format!("{prefix}:{local}")),
        Some(_) => None,
        None => match local.split_once(':') {
            Some((prefix, _)) if !BOUND_PREFIXES.contains(&prefix) => None,
            _ => Some(local.to_string()),
        },
    }
}

/// Conservative XML name check; attributes like `@click` are dropped.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}
