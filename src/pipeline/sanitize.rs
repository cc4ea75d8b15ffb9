//! HTML sanitisation: remove presentation noise and model bookkeeping, and
//! normalise the model's class taxonomy.
//!
//! ## Pass Order
//!
//! 1. drop `color` declarations from `style` attributes
//! 2. drop `data-bbox` / `data-polygon`
//! 3. collapse synonym classes onto canonical names, deduplicated
//! 4. empty `div.image.caption` containers and mark them `image`
//! 5. empty elements whose canonical class is in [`CLEARED_CLASSES`]
//!
//! Passes 4 and 5 key off canonical names, so 3 must run first. Running the
//! whole sanitizer again on its output changes nothing.

use crate::pipeline::dom::{Document, Element};
use crate::pipeline::extract::{BBOX_ATTR, POLYGON_ATTR};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Raw class name → canonical class name.
pub const CLASS_COLLAPSE: &[(&str, &str)] = &[
    ("formula.machine_printed", "formula"),
    ("formula.handwritten", "formula"),
];

/// Class marking an image together with its caption.
const IMAGE_CAPTION_CLASS: &str = "image caption";
const IMAGE_CLASS: &str = "image";

/// Canonical classes whose raw content is not trustworthy prose.
pub const CLEARED_CLASSES: &[&str] = &["music sheet", "chemical formula", "chart"];

static RE_COLOR_PROPERTY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*color\s*:").unwrap());

/// Run every pass over the document in place.
pub fn sanitize(doc: &mut Document) {
    doc.for_each_element_mut(&mut strip_color_styles);
    doc.for_each_element_mut(&mut |el| {
        el.remove_attr(BBOX_ATTR);
        el.remove_attr(POLYGON_ATTR);
    });
    doc.for_each_element_mut(&mut collapse_classes);
    doc.for_each_element_mut(&mut clear_image_captions);
    doc.for_each_element_mut(&mut clear_unreliable_content);
}

/// Sanitize and serialise in one step, as the human-readable fenced HTML.
pub fn sanitize_to_fenced_html(doc: &mut Document) -> String {
    sanitize(doc);
    doc.to_fenced_html()
}

// ── Pass 1: colour styles ────────────────────────────────────────────────────

fn strip_color_styles(el: &mut Element) {
    let Some(style) = el.attr("style") else {
        return;
    };
    let kept = remove_color_declarations(style);
    if kept.is_empty() {
        el.remove_attr("style");
    } else {
        el.set_attr("style", kept);
    }
}

/// Drop every `color:` declaration from a style string.
///
/// Remaining declarations are re-joined with `;`, without a trailing one.
pub fn remove_color_declarations(style: &str) -> String {
    style
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty() && !RE_COLOR_PROPERTY.is_match(decl))
        .collect::<Vec<_>>()
        .join(";")
}

// ── Pass 3: class collapse ───────────────────────────────────────────────────

fn canonical_class(name: &str) -> &str {
    CLASS_COLLAPSE
        .iter()
        .find(|(raw, _)| *raw == name)
        .map_or(name, |&(_, canonical)| canonical)
}

fn collapse_classes(el: &mut Element) {
    if el.classes.is_empty() {
        return;
    }
    let mut collapsed: Vec<String> = Vec::with_capacity(el.classes.len());
    for class in &el.classes {
        let canonical = canonical_class(class);
        if !collapsed.iter().any(|c| c == canonical) {
            collapsed.push(canonical.to_string());
        }
    }
    el.classes = collapsed;
}

// ── Pass 4: image captions ───────────────────────────────────────────────────

fn clear_image_captions(el: &mut Element) {
    if el.tag == "div" && el.matches_class(IMAGE_CAPTION_CLASS) {
        debug!("Clearing image caption container");
        el.children.clear();
        el.classes = vec![IMAGE_CLASS.to_string()];
    }
}

// ── Pass 5: unreliable content ───────────────────────────────────────────────

fn clear_unreliable_content(el: &mut Element) {
    if CLEARED_CLASSES.iter().any(|c| el.matches_class(c)) {
        debug!("Clearing <{}> with class {:?}", el.tag, el.classes);
        el.children.clear();
        el.remove_attr("format");
    }
}
