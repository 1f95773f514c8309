//! Minimal path queries over parsed markup.
//!
//! Supports the handful of `//a/b/c` lookups the handlers need: the first
//! step matches at any depth, later steps match direct children. Missing
//! nodes read as empty strings.

use xmltree::{Element, XMLNode};

use crate::sanitize;

/// Parse a body as XML. Malformed input yields `None`.
pub fn parse(body: &str) -> Option<Element> {
    Element::parse(body.trim_start().as_bytes()).ok()
}

/// Parse an HTML page as XML after rewriting HTML named entities.
pub fn parse_html(body: &str) -> Option<Element> {
    parse(&sanitize::numeric_entities(body))
}

/// First direct text (or CDATA) child of an element.
pub fn own_text(element: &Element) -> Option<&str> {
    element.children.iter().find_map(|node| match node {
        XMLNode::Text(t) | XMLNode::CData(t) => Some(t.as_str()),
        _ => None,
    })
}

/// Text of the named direct child, or `""`.
pub fn child_text<'a>(element: &'a Element, name: &str) -> &'a str {
    element
        .get_child(name)
        .and_then(own_text)
        .unwrap_or("")
}

/// First element matching `//path[0]/path[1]/...` in document order.
pub fn first_element<'a>(root: &'a Element, path: &[&str]) -> Option<&'a Element> {
    let (head, tail) = path.split_first()?;
    descendants_named(root, head)
        .into_iter()
        .find_map(|start| walk_children(start, tail, &|_| true))
}

/// First text node selected by `//path[0]/.../text()` in document order.
pub fn first_text(root: &Element, path: &[&str]) -> Option<String> {
    let (head, tail) = path.split_first()?;
    descendants_named(root, head)
        .into_iter()
        .find_map(|start| walk_children(start, tail, &|e| own_text(e).is_some()))
        .and_then(own_text)
        .map(str::to_string)
}

/// Like [`first_text`] but absent nodes read as `""`.
pub fn text_or_empty(root: &Element, path: &[&str]) -> String {
    first_text(root, path).unwrap_or_default()
}

fn descendants_named<'a>(root: &'a Element, name: &str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    collect_named(root, name, &mut found);
    found
}

fn collect_named<'a>(element: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    if element.name == name {
        found.push(element);
    }
    for child in child_elements(element) {
        collect_named(child, name, found);
    }
}

fn walk_children<'a>(
    element: &'a Element,
    path: &[&str],
    accept: &dyn Fn(&Element) -> bool,
) -> Option<&'a Element> {
    match path.split_first() {
        None => accept(element).then_some(element),
        Some((head, tail)) => child_elements(element)
            .filter(|child| child.name == *head)
            .find_map(|child| walk_children(child, tail, accept)),
    }
}

/// Direct element children, skipping text and comments.
pub fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(XMLNode::as_element)
}
