//! Frame Pipeline - Single Entry Point
//!
//! Looks up the template, loads its artwork and composes. Every framed code
//! goes through [`FramePipeline::compose`]; nothing else touches the
//! compositor with catalog data.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::artwork::{ArtworkError, ArtworkLoader};
use crate::barcode::{render_qr_svg, BarcodeError};
use crate::compositor::{ComposeError, Compositor};
use crate::geometry::Placement;
use crate::hashing::{compute_job_hash, sha256_hex};
use crate::sizing::{advise_source_size, SizingProfile};
use crate::templates::{CatalogError, TemplateCatalog, TemplateDescriptor};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Artwork(#[from] ArtworkError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Barcode(#[from] BarcodeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// True when the template id was not in the catalog.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::Catalog(CatalogError::NotFound(_)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeRequest {
    pub template_id: String,
    /// Barcode art produced by the caller, as SVG markup.
    pub source_svg: String,
}

/// A composed frame plus what is needed to reproduce or verify it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedAsset {
    pub template_id: String,
    pub engine_version: String,
    pub markup: String,
    /// SHA-256 of `markup`.
    pub markup_hash: String,
    pub job_hash: String,
    pub placement: Placement,
    pub marker_replaced: bool,
}

/// The frame pipeline - catalog, artwork and compositor wired together
pub struct FramePipeline {
    catalog: Arc<TemplateCatalog>,
    loader: Box<dyn ArtworkLoader>,
    compositor: Compositor,
}

impl FramePipeline {
    pub fn new(catalog: Arc<TemplateCatalog>, loader: Box<dyn ArtworkLoader>) -> Self {
        Self {
            catalog,
            loader,
            compositor: Compositor::new(),
        }
    }

    /// Use a compositor configured with a different marker id.
    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// List all available templates
    pub fn list_templates(&self) -> &[TemplateDescriptor] {
        self.catalog.list()
    }

    pub fn templates_in_category(&self, category: &str) -> Vec<&TemplateDescriptor> {
        self.catalog.list_by_category(category)
    }

    /// Get a specific template
    pub fn get_template(&self, id: &str) -> Result<&TemplateDescriptor, PipelineError> {
        Ok(self.catalog.get(id)?)
    }

    /// Resolution to render the barcode at before composing into `template_id`.
    pub fn advise(&self, template_id: &str, profile: SizingProfile) -> Result<u32, PipelineError> {
        let descriptor = self.catalog.get(template_id)?;
        Ok(advise_source_size(descriptor, profile))
    }

    /// Compose caller-supplied barcode art into a template's artwork.
    pub fn compose(&self, request: &ComposeRequest) -> Result<ComposedAsset, PipelineError> {
        let span = tracing::info_span!("compose", template = %request.template_id);
        let _enter = span.enter();

        let descriptor = self.catalog.get(&request.template_id)?;
        let artwork = self.loader.load(&descriptor.asset_ref)?;
        let composed = self
            .compositor
            .compose_markup(&request.source_svg, &artwork, descriptor)?;

        let job_hash = compute_job_hash(
            &descriptor.id,
            descriptor,
            &request.source_svg,
            ENGINE_VERSION,
        )?;

        tracing::info!(
            marker = composed.marker_replaced,
            bytes = composed.markup.len(),
            "frame composed"
        );

        Ok(ComposedAsset {
            template_id: descriptor.id.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            markup_hash: sha256_hex(composed.markup.as_bytes()),
            markup: composed.markup,
            job_hash,
            placement: composed.placement,
            marker_replaced: composed.marker_replaced,
        })
    }

    /// Render `data` as a QR code at the advised resolution and compose it.
    pub fn compose_qr(
        &self,
        template_id: &str,
        data: &str,
        profile: SizingProfile,
    ) -> Result<ComposedAsset, PipelineError> {
        let size = self.advise(template_id, profile)?;
        let source_svg = render_qr_svg(data, size)?;
        self.compose(&ComposeRequest {
            template_id: template_id.to_string(),
            source_svg,
        })
    }
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("templates", &self.catalog.len())
            .field("compositor", &self.compositor)
            .finish_non_exhaustive()
    }
}
