//! FrameCode Core - Framed QR Compositor
//!
//! # The Five Laws (Non-Negotiable)
//! 1. SVG Is Truth
//! 2. Templates Are Contracts, checked once at load
//! 3. One Compositing Algorithm, thin I/O adapters
//! 4. Deterministic Output
//! 5. Errors Surface, never a fallback image

pub mod artwork;
pub mod barcode;
pub mod compositor;
pub mod document;
pub mod geometry;
pub mod hashing;
pub mod pipeline;
pub mod sizing;
pub mod templates;
pub mod validation;
pub mod xml;

pub use artwork::{ArtworkError, ArtworkLoader, CachingLoader, FsArtworkLoader, HttpArtworkLoader};
pub use compositor::{ComposeError, ComposedDocument, Compositor, InsertionPoint, PLACEHOLDER_MARKER_ID};
pub use document::{Document, Element, Node};
pub use geometry::{resolve_placement, FitMode, Placement, Size};
pub use hashing::{canonical_json, compute_job_hash, compute_manifest_hash, sha256_hex};
pub use pipeline::{ComposeRequest, ComposedAsset, FramePipeline, PipelineError};
pub use sizing::{advise_source_size, SizingProfile};
pub use templates::{CatalogError, Rect, TemplateCatalog, TemplateDescriptor, TemplateId};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
