//! Image region extraction: crop every `<img data-bbox>` out of the source
//! image and point the element at the cropped asset.
//!
//! The model marks figures with an `img` placeholder whose `data-bbox` holds
//! `"x1 y1 x2 y2"` in its resized coordinate space. For each placeholder, in
//! document order:
//!
//! 1. drop it when it duplicates its parent's box and the parent has nested
//!    `div`s (the model repeats a wrapper region as an image);
//! 2. parse and normalise the box, map it back to original pixels;
//! 3. crop, encode as JPEG and register it as `img-<n>.jpg`;
//! 4. rewrite the element's `src` to that filename.

use crate::error::Vl2MdError;
use crate::pipeline::dom::{Document, Element, Node};
use crate::pipeline::encode::encode_region;
use crate::pipeline::geometry::{BoundingBox, PixelRect, ScaleTransform};
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, warn};

/// Attribute carrying a model-space bounding box.
pub const BBOX_ATTR: &str = "data-bbox";
/// Attribute carrying a model-space polygon.
pub const POLYGON_ATTR: &str = "data-polygon";

/// One cropped sub-image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRegion {
    /// Synthetic filename, `img-<n>.jpg`.
    pub name: String,
    /// Crop rectangle in original pixel space.
    pub rect: PixelRect,
    /// JPEG bytes.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Extracted regions in document order, addressable by filename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RegionMap {
    regions: Vec<ImageRegion>,
}

impl RegionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a region's bytes by filename.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.regions
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.bytes.as_slice())
    }

    pub fn insert(&mut self, region: ImageRegion) {
        match self.regions.iter_mut().find(|r| r.name == region.name) {
            Some(existing) => *existing = region,
            None => self.regions.push(region),
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRegion> {
        self.regions.iter()
    }
}

impl<'a> IntoIterator for &'a RegionMap {
    type Item = &'a ImageRegion;
    type IntoIter = std::slice::Iter<'a, ImageRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

/// Filename of the `n`-th region (1-indexed).
pub fn region_name(n: usize) -> String {
    format!("img-{n}.jpg")
}

/// Crops regions out of one source image.
///
/// Holds the per-document counter; create one per document.
pub struct RegionExtractor<'a> {
    image: &'a DynamicImage,
    transform: ScaleTransform,
    jpeg_quality: u8,
    regions: RegionMap,
}

impl<'a> RegionExtractor<'a> {
    /// `resized` is the `(width, height)` the vision model worked on.
    pub fn new(
        image: &'a DynamicImage,
        resized: (u32, u32),
        jpeg_quality: u8,
    ) -> Result<Self, Vl2MdError> {
        let transform = ScaleTransform::new((image.width(), image.height()), resized)?;
        Ok(Self {
            image,
            transform,
            jpeg_quality,
            regions: RegionMap::new(),
        })
    }

    /// Walk the document, crop every image placeholder and return the regions.
    pub fn extract(mut self, doc: &mut Document) -> Result<RegionMap, Vl2MdError> {
        // Body has no box of its own, so top-level images are never redundant.
        self.visit_children(&mut doc.body, None, false)?;
        debug!("Extracted {} image regions", self.regions.len());
        Ok(self.regions)
    }

    fn visit_children(
        &mut self,
        children: &mut Vec<Node>,
        parent_bbox: Option<&str>,
        parent_has_div: bool,
    ) -> Result<(), Vl2MdError> {
        let mut i = 0;
        while i < children.len() {
            let Node::Element(child) = &mut children[i] else {
                i += 1;
                continue;
            };

            if child.tag == "img" && child.attr(BBOX_ATTR).is_some() {
                let redundant = parent_has_div && child.attr(BBOX_ATTR) == parent_bbox;
                if redundant {
                    debug!("Dropping redundant image region {:?}", parent_bbox);
                    children.remove(i);
                    continue;
                }
                self.extract_region(child)?;
            } else {
                let bbox = child.attr(BBOX_ATTR).map(str::to_owned);
                let has_div = child.has_descendant("div");
                self.visit_children(&mut child.children, bbox.as_deref(), has_div)?;
            }
            i += 1;
        }
        Ok(())
    }

    fn extract_region(&mut self, element: &mut Element) -> Result<(), Vl2MdError> {
        let raw = element.attr(BBOX_ATTR).unwrap_or_default();
        let invalid = || Vl2MdError::InvalidBoundingBox {
            element: element.to_html(),
            value: raw.to_string(),
        };
        let bbox: BoundingBox = raw.parse().map_err(|_| invalid())?;
        let original = self
            .transform
            .to_original(&bbox.normalized())
            .ok_or_else(invalid)?;
        let (rect, clamped) =
            PixelRect::clamp_to(&original, self.image.width(), self.image.height());
        let name = region_name(self.regions.len() + 1);
        if clamped {
            warn!(
                "Region {} box {} clamped to {}x{}+{}+{}",
                name, original, rect.width, rect.height, rect.x, rect.y
            );
        }

        let bytes = {
            let crop = self.image.crop_imm(rect.x, rect.y, rect.width, rect.height);
            encode_region(&crop, self.jpeg_quality).map_err(|e| Vl2MdError::RegionEncode {
                region: name.clone(),
                detail: e.to_string(),
            })?
        };
        debug!("Region {} ← model box {} → {:?}", name, bbox, rect);

        element.set_attr("src", name.as_str());
        self.regions.insert(ImageRegion { name, rect, bytes });
        Ok(())
    }
}
