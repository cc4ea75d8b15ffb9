//! Owned HTML tree for the normalisation pipeline.
//!
//! Model output is parsed once with `scraper` (html5ever underneath, so
//! unclosed tags and stray text never fail) and copied into a small owned
//! tree of [`Node`]s. The extractor and sanitizer mutate that tree in place;
//! the Markdown projector only reads it.

use crate::pipeline::postprocess::strip_code_fences;
use scraper::{ElementRef, Html};

/// Elements serialised without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    /// Concatenated text of this node and all its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => {
                for child in &el.children {
                    child.collect_text(out);
                }
            }
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&escape_text(t)),
            Node::Element(el) => el.write_html(out),
        }
    }
}

/// An element with ordered attributes and an ordered class list.
///
/// `class` is kept out of `attrs` so class rewrites never touch attribute
/// order; it is serialised first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub classes: Vec<String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|(k, _)| k == name)?;
        Some(self.attrs.remove(pos).1)
    }

    /// True when `name` is one of the classes or the whole class string.
    ///
    /// Compound names such as `"image caption"` match an element carrying
    /// exactly those classes in that order.
    pub fn matches_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c == name) || self.classes.join(" ") == name
    }

    /// First descendant element with the given tag, in document order.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.child_elements().find_map(|el| {
            if el.tag == tag {
                Some(el)
            } else {
                el.find(tag)
            }
        })
    }

    /// All descendant elements whose tag is in `tags`, in document order.
    pub fn find_all<'a>(&'a self, tags: &[&str]) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_all(tags, &mut found);
        found
    }

    fn collect_all<'a>(&'a self, tags: &[&str], found: &mut Vec<&'a Element>) {
        for el in self.child_elements() {
            if tags.contains(&el.tag.as_str()) {
                found.push(el);
            }
            el.collect_all(tags, found);
        }
    }

    pub fn has_descendant(&self, tag: &str) -> bool {
        self.find(tag).is_some()
    }

    /// Direct element children.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }

    /// Serialise this element and its subtree as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        if !self.classes.is_empty() {
            out.push_str(" class=\"");
            out.push_str(&escape_attr(&self.classes.join(" ")));
            out.push('"');
        }
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape_attr(v));
            out.push('"');
        }
        out.push('>');
        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

/// A parsed page: the children of `<body>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub body: Vec<Node>,
}

impl Document {
    /// Parse model output into a tree.
    ///
    /// A surrounding ```` ```html ```` fence is removed first; anything outside
    /// `<body>` (doctype, head, comments) is discarded.
    pub fn parse(html: &str) -> Self {
        let source = strip_code_fences(html);
        let parsed = Html::parse_document(&source);
        let body = parsed
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "body")
            .map(convert_children)
            .unwrap_or_default();
        Self { body }
    }

    /// Visit every element in document order (pre-order), mutably.
    pub fn for_each_element_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        walk_mut(&mut self.body, f);
    }

    /// Serialise the body inside a human-readable ```` ```html ```` fence.
    ///
    /// Each top-level child goes on its own line; whitespace-only text nodes
    /// between them are dropped.
    pub fn to_fenced_html(&self) -> String {
        let mut out = String::from("```html\n<html><body>\n");
        for node in &self.body {
            if let Node::Text(t) = node {
                if t.trim().is_empty() {
                    continue;
                }
            }
            node.write_html(&mut out);
            out.push('\n');
        }
        out.push_str("</body></html>\n```");
        out
    }
}

fn walk_mut(nodes: &mut [Node], f: &mut impl FnMut(&mut Element)) {
    for node in nodes {
        if let Node::Element(el) = node {
            f(el);
            walk_mut(&mut el.children, f);
        }
    }
}

fn convert_children(parent: ElementRef<'_>) -> Vec<Node> {
    parent
        .children()
        .filter_map(|child| {
            if let Some(el) = ElementRef::wrap(child) {
                Some(Node::Element(convert_element(el)))
            } else {
                child.value().as_text().map(|text| {
                    let text: &str = text;
                    Node::Text(text.to_string())
                })
            }
        })
        .collect()
}

fn convert_element(el: ElementRef<'_>) -> Element {
    let value = el.value();
    let mut element = Element::new(value.name());
    for (name, v) in value.attrs() {
        if name == "class" {
            element.classes = v.split_whitespace().map(str::to_string).collect();
        } else {
            element.attrs.push((name.to_string(), v.to_string()));
        }
    }
    element.children = convert_children(el);
    element
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}
