//! Sizing Advisor
//!
//! Decides what resolution to request from the barcode renderer so the art is
//! still crisp after the compositor scales it down into the placeholder.

use serde::{Deserialize, Serialize};

use crate::templates::TemplateDescriptor;

/// Source art is rendered this much larger than the placeholder's short side
/// so antialiasing after the scale-down does not blur module edges.
pub const OVERSAMPLE_FACTOR: f64 = 1.2;

pub const MIN_SOURCE_SIZE: u32 = 200;

/// Where the composed output is headed. Determines the resolution ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingProfile {
    /// Full-size output for download or print
    #[default]
    Client,
    /// Thumbnails and previews, rasterized smaller
    Preview,
}

impl SizingProfile {
    pub fn max_source_size(self) -> u32 {
        match self {
            Self::Client => 1000,
            Self::Preview => 800,
        }
    }
}

/// Resolution to render the source barcode at for `descriptor`.
///
/// An explicit `qrSize` wins unchanged. Otherwise the placeholder's short
/// side is oversampled and clamped to the profile's range.
pub fn advise_source_size(descriptor: &TemplateDescriptor, profile: SizingProfile) -> u32 {
    if let Some(size) = descriptor.qr_size {
        return size;
    }

    let short_side = descriptor.placeholder.width.min(descriptor.placeholder.height);
    let advised = (short_side * OVERSAMPLE_FACTOR).floor();
    let clamped = advised.clamp(f64::from(MIN_SOURCE_SIZE), f64::from(profile.max_source_size()));
    clamped as u32
}
