//! Geometry Resolver - fit source art into a placeholder
//!
//! Pure and total. Every runtime that composes frames goes through
//! [`resolve_placement`], so the pixel output cannot drift between them.

use serde::{Deserialize, Serialize};

use crate::templates::Rect;

/// Near-exact-fit applies when `|sw - pw| + |sh - ph|` is below this.
/// Empirically chosen; tunable pending visual QA.
pub const NEAR_FIT_MAX_SIZE_DIFF: f64 = 50.0;

/// Near-exact-fit also requires at least this fill ratio. Tunable, like
/// [`NEAR_FIT_MAX_SIZE_DIFF`].
pub const NEAR_FIT_MIN_QR_SCALE: f64 = 0.98;

/// Intrinsic size of a vector document in its own user units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Source and placeholder were already close in size.
    NearExact,
    /// Source is shrunk to leave a margin inside the placeholder.
    Margin,
}

/// Uniform scale plus the top-left offset of the scaled source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub fit: FitMode,
}

impl Placement {
    /// Bounding box of a `source`-sized document once this placement is applied.
    pub fn bounds(&self, source: Size) -> Rect {
        Rect::new(
            self.offset_x,
            self.offset_y,
            source.width * self.scale,
            source.height * self.scale,
        )
    }
}

pub fn resolve_placement(placeholder: &Rect, qr_scale: f64, source: Size) -> Placement {
    let size_diff =
        (source.width - placeholder.width).abs() + (source.height - placeholder.height).abs();

    let (scale, fit) = if size_diff < NEAR_FIT_MAX_SIZE_DIFF && qr_scale >= NEAR_FIT_MIN_QR_SCALE {
        // Per-axis ratio first, fill ratio last: avoids compounding rounding
        // when the source is already almost the placeholder's size.
        let ratio = (placeholder.width / source.width).min(placeholder.height / source.height);
        (ratio * qr_scale, FitMode::NearExact)
    } else {
        let scale_x = placeholder.width * qr_scale / source.width;
        let scale_y = placeholder.height * qr_scale / source.height;
        (scale_x.min(scale_y), FitMode::Margin)
    };

    Placement {
        scale,
        offset_x: placeholder.x + (placeholder.width - source.width * scale) / 2.0,
        offset_y: placeholder.y + (placeholder.height - source.height * scale) / 2.0,
        fit,
    }
}
