//! Pipeline stages for vision-model HTML to Markdown normalisation.
//!
//! Each submodule implements exactly one transformation step over a single
//! page. Keeping stages separate makes each independently testable, and the
//! only state shared between them is the owned [`dom::Document`] tree and the
//! [`extract::RegionMap`] produced for it.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ dom ──▶ extract ──▶ sanitize ──▶ markdown ──▶ inline
//! (bytes)  (parse)  (crop)      (clean)      (project)    (data URIs)
//! ```
//!
//! 1. [`input`]    : a page is image bytes plus the model's HTML
//! 2. [`dom`]      : strip fences, parse with html5ever into an owned tree
//! 3. [`extract`]  : crop every `img[data-bbox]` (boxes mapped through
//!    [`geometry`]) and JPEG-encode it via [`encode`]
//! 4. [`sanitize`] : drop colour styles and coordinates, collapse classes,
//!    empty unreliable containers
//! 5. [`markdown`] : per-tag rule table, blank-line collapse via
//!    [`postprocess`]
//! 6. [`inline`]   : optional, rewrites `![alt](img-n.jpg)` to base64 URIs

pub mod dom;
pub mod encode;
pub mod extract;
pub mod geometry;
pub mod inline;
pub mod input;
pub mod markdown;
pub mod postprocess;
pub mod sanitize;
