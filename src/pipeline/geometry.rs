//! Coordinate spaces: model-space bounding boxes and their mapping back onto
//! the original image's pixel grid.
//!
//! The vision model never sees the original image. Its preprocessor resizes
//! every input to a multiple of the patch size (see [`smart_resize`]) and all
//! `data-bbox` coordinates it emits live in that resized space. Before a
//! region can be cropped, its box has to be projected back with
//! [`ScaleTransform::to_original`].

use crate::error::Vl2MdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aspect ratios above this are rejected by the model preprocessor.
const MAX_ASPECT_RATIO: f64 = 200.0;

/// Four integers `(x1, y1, x2, y2)` delimiting a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoundingBox {
    pub fn new(x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Swap coordinates so that `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }
}

/// Error returned when a `data-bbox` string is not four integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBoundingBoxError(pub String);

impl fmt::Display for ParseBoundingBoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected four integers, got {:?}", self.0)
    }
}

impl std::error::Error for ParseBoundingBoxError {}

impl FromStr for BoundingBox {
    type Err = ParseBoundingBoxError;

    /// Parse the whitespace-separated `"x1 y1 x2 y2"` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseBoundingBoxError(s.to_string());
        let values = s
            .split_whitespace()
            .map(|v| v.parse::<i64>().map_err(|_| err()))
            .collect::<Result<Vec<_>, _>>()?;
        match values.as_slice() {
            [x1, y1, x2, y2] => Ok(Self::new(*x1, *y1, *x2, *y2)),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.x1, self.y1, self.x2, self.y2)
    }
}

/// A crop rectangle inside an image, guaranteed non-empty and in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Clamp a normalised box to an image of `width`×`height` pixels.
    ///
    /// Degenerate or out-of-bounds boxes shrink to at least one pixel so the
    /// crop can always be encoded. Returns the rect and whether clamping
    /// changed the box.
    pub fn clamp_to(bbox: &BoundingBox, width: u32, height: u32) -> (Self, bool) {
        let (x, w) = clamp_span(bbox.x1, bbox.x2, width);
        let (y, h) = clamp_span(bbox.y1, bbox.y2, height);
        let rect = Self {
            x,
            y,
            width: w,
            height: h,
        };
        let exact = i64::from(x) == bbox.x1
            && i64::from(y) == bbox.y1
            && i64::from(x + w) == bbox.x2
            && i64::from(y + h) == bbox.y2;
        (rect, !exact)
    }
}

fn clamp_span(start: i64, end: i64, limit: u32) -> (u32, u32) {
    let limit = i64::from(limit.max(1));
    let start = start.clamp(0, limit - 1);
    let end = end.clamp(start + 1, limit);
    (start as u32, (end - start) as u32)
}

/// Maps boxes between the model's resized space and the original pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleTransform {
    original_width: u32,
    original_height: u32,
    resized_width: u32,
    resized_height: u32,
}

impl ScaleTransform {
    /// Build a transform; every dimension must be non-zero.
    pub fn new(
        original: (u32, u32),
        resized: (u32, u32),
    ) -> Result<Self, Vl2MdError> {
        for (w, h) in [original, resized] {
            if w == 0 || h == 0 {
                return Err(Vl2MdError::InvalidDimensions {
                    width: w,
                    height: h,
                    reason: "dimensions must be non-zero".into(),
                });
            }
        }
        Ok(Self {
            original_width: original.0,
            original_height: original.1,
            resized_width: resized.0,
            resized_height: resized.1,
        })
    }

    /// `resized_width / original_width`.
    pub fn scale_x(&self) -> f64 {
        f64::from(self.resized_width) / f64::from(self.original_width)
    }

    /// `resized_height / original_height`.
    pub fn scale_y(&self) -> f64 {
        f64::from(self.resized_height) / f64::from(self.original_height)
    }

    /// Project a resized-space box onto the original pixel grid.
    ///
    /// Equivalent to dividing each coordinate by its scale factor and
    /// truncating, computed in integers so that `(0, 0, W', H')` maps to
    /// exactly `(0, 0, W, H)`.
    ///
    /// Returns `None` when a coordinate is too large to scale.
    pub fn to_original(&self, bbox: &BoundingBox) -> Option<BoundingBox> {
        let map = |v: i64, original: u32, resized: u32| {
            v.checked_mul(i64::from(original))
                .map(|scaled| scaled / i64::from(resized))
        };
        Some(BoundingBox {
            x1: map(bbox.x1, self.original_width, self.resized_width)?,
            y1: map(bbox.y1, self.original_height, self.resized_height)?,
            x2: map(bbox.x2, self.original_width, self.resized_width)?,
            y2: map(bbox.y2, self.original_height, self.resized_height)?,
        })
    }
}

/// Compute the size the vision model resizes a `width`×`height` image to.
///
/// Both sides become multiples of `factor`, the area is kept within
/// `[min_pixels, max_pixels]` and the aspect ratio is preserved as closely
/// as the rounding allows. Returns `(width, height)`.
pub fn smart_resize(
    width: u32,
    height: u32,
    factor: u32,
    min_pixels: u32,
    max_pixels: u32,
) -> Result<(u32, u32), Vl2MdError> {
    if width == 0 || height == 0 {
        return Err(Vl2MdError::InvalidDimensions {
            width,
            height,
            reason: "dimensions must be non-zero".into(),
        });
    }
    let (w, h) = (f64::from(width), f64::from(height));
    if w.max(h) / w.min(h) > MAX_ASPECT_RATIO {
        return Err(Vl2MdError::InvalidDimensions {
            width,
            height,
            reason: format!("aspect ratio must be at most {MAX_ASPECT_RATIO}"),
        });
    }

    let f = f64::from(factor.max(1));
    let round_by = |v: f64| (v / f).round_ties_even() * f;
    let floor_by = |v: f64| (v / f).floor() * f;
    let ceil_by = |v: f64| (v / f).ceil() * f;

    let mut h_bar = f.max(round_by(h));
    let mut w_bar = f.max(round_by(w));
    if h_bar * w_bar > f64::from(max_pixels) {
        let beta = (h * w / f64::from(max_pixels)).sqrt();
        h_bar = f.max(floor_by(h / beta));
        w_bar = f.max(floor_by(w / beta));
    } else if h_bar * w_bar < f64::from(min_pixels) {
        let beta = (f64::from(min_pixels) / (h * w)).sqrt();
        h_bar = ceil_by(h * beta);
        w_bar = ceil_by(w * beta);
    }

    Ok((w_bar as u32, h_bar as u32))
}
