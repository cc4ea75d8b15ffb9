//! Asset inlining: rewrite Markdown image references into base64 data URIs.
//!
//! Every `![alt](path)` is looked up in an [`ImageSource`]. A hit becomes
//! `![alt](data:image/jpeg;base64,<payload>)`; a miss keeps the reference
//! with an empty payload, so a broken lookup never drops an image from the
//! document or fails it. References that already carry a `data:` URI are left
//! alone, which makes inlining safe to run twice.
//!
//! Two sources ship with the crate: the extractor's [`RegionMap`] (raw JPEG
//! bytes, encoded on lookup) and a plain `HashMap<String, String>` of
//! already-encoded payloads, the shape an external parsing service returns.

use crate::pipeline::encode::{jpeg_data_uri, to_base64};
use crate::pipeline::extract::RegionMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{debug, warn};

static RE_IMAGE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").unwrap());

/// Resolves an image reference to its base64 payload.
pub trait ImageSource {
    /// Standard base64 of the image stored under `path`, if known.
    fn base64_for(&self, path: &str) -> Option<Cow<'_, str>>;
}

impl ImageSource for RegionMap {
    fn base64_for(&self, path: &str) -> Option<Cow<'_, str>> {
        self.get(path).map(|bytes| Cow::Owned(to_base64(bytes)))
    }
}

impl ImageSource for HashMap<String, String> {
    fn base64_for(&self, path: &str) -> Option<Cow<'_, str>> {
        self.get(path).map(|payload| Cow::Borrowed(payload.as_str()))
    }
}

/// Replace every resolvable image reference with an inline data URI.
pub fn inline_images<S: ImageSource + ?Sized>(markdown: &str, images: &S) -> String {
    let mut inlined = 0usize;
    let mut missing = 0usize;

    let out = RE_IMAGE_REF.replace_all(markdown, |caps: &Captures| {
        let alt = &caps[1];
        let path = &caps[2];
        if path.starts_with("data:") {
            return caps[0].to_string();
        }

        let payload = match images.base64_for(path) {
            Some(payload) => {
                inlined += 1;
                payload
            }
            None => {
                warn!("Image '{}' not found in image map, embedding empty data", path);
                missing += 1;
                Cow::Borrowed("")
            }
        };
        format!("![{}]({})", alt, jpeg_data_uri(&payload))
    });

    debug!("Inlined {} images ({} unresolved)", inlined, missing);
    out.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::ImageRegion;
    use crate::pipeline::geometry::PixelRect;

    fn region_map(entries: &[(&str, &[u8])]) -> RegionMap {
        let mut map = RegionMap::new();
        for (name, bytes) in entries {
            map.insert(ImageRegion {
                name: name.to_string(),
                rect: PixelRect {
                    x: 0,
                    y: 0,
                    width: 1,
                    height: 1,
                },
                bytes: bytes.to_vec(),
            });
        }
        map
    }

    #[test]
    fn inlines_known_region() {
        let map = region_map(&[("img-1.jpg", b"hello")]);
        assert_eq!(
            inline_images("![x](img-1.jpg)", &map),
            "![x](data:image/jpeg;base64,aGVsbG8=)"
        );
    }

    #[test]
    fn unknown_path_gets_empty_payload() {
        let map = RegionMap::new();
        assert_eq!(
            inline_images("before ![fig](img-9.jpg) after", &map),
            "before ![fig](data:image/jpeg;base64,) after"
        );
    }

    #[test]
    fn inlines_every_reference_and_keeps_alt() {
        let map = region_map(&[("img-1.jpg", b"a"), ("img-2.jpg", b"b")]);
        let md = "# T\n\n![one](img-1.jpg)\n\ntext ![](img-2.jpg)";
        assert_eq!(
            inline_images(md, &map),
            "# T\n\n![one](data:image/jpeg;base64,YQ==)\n\ntext ![](data:image/jpeg;base64,Yg==)"
        );
    }

    #[test]
    fn external_base64_map() {
        let mut map = HashMap::new();
        map.insert("page_1_img.png".to_string(), "QUJD".to_string());
        assert_eq!(
            inline_images("![p](page_1_img.png)", &map),
            "![p](data:image/jpeg;base64,QUJD)"
        );
    }

    #[test]
    fn existing_data_uris_and_links_are_untouched() {
        let map = region_map(&[("img-1.jpg", b"hello")]);
        let md = "![x](data:image/jpeg;base64,QUJD) and [link](img-1.jpg)";
        assert_eq!(inline_images(md, &map), md);
    }

    #[test]
    fn inlining_twice_is_stable() {
        let map = region_map(&[("img-1.jpg", b"hello")]);
        let once = inline_images("![x](img-1.jpg)", &map);
        assert_eq!(inline_images(&once, &map), once);
    }
}
