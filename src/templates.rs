//! Template Catalog - Frame Templates Are Contracts
//!
//! The catalog is loaded once and never mutated afterwards. Every descriptor
//! is validated at load time; a bad entry aborts the load.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::hashing::compute_manifest_hash;
use crate::validation::{DescriptorValidator, ViolationSeverity};

pub type TemplateId = String;

/// Fill ratio used when a descriptor omits `qrScale`.
pub const DEFAULT_QR_SCALE: f64 = 0.95;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate template id: {0}")]
    DuplicateId(TemplateId),

    #[error("Invalid template {id}: {reasons}")]
    InvalidTemplate { id: TemplateId, reasons: String },

    #[error("Template not found: {0}")]
    NotFound(TemplateId),
}

/// Axis-aligned rectangle in the artwork's own coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// True when `other` lies inside `self`, allowing `eps` of slack on each edge.
    pub fn contains_rect(&self, other: &Rect, eps: f64) -> bool {
        other.x >= self.x - eps
            && other.y >= self.y - eps
            && other.x + other.width <= self.x + self.width + eps
            && other.y + other.height <= self.y + self.height + eps
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    pub id: TemplateId,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub asset_ref: String,
    pub placeholder: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_size: Option<u32>,
    #[serde(default = "default_qr_scale")]
    pub qr_scale: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

fn default_qr_scale() -> f64 { DEFAULT_QR_SCALE }

/// Frame template catalog - ordered, immutable after construction
#[derive(Debug, Default)]
pub struct TemplateCatalog {
    templates: Vec<TemplateDescriptor>,
    index: HashMap<TemplateId, usize>,
}

impl TemplateCatalog {
    /// Read and validate a catalog asset (a JSON array of descriptors).
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            templates = catalog.len(),
            "template catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let descriptors: Vec<TemplateDescriptor> = serde_json::from_str(json)?;
        Self::from_descriptors(descriptors)
    }

    /// Build a catalog, rejecting duplicates and any descriptor with an
    /// error-level violation. Warnings are logged and kept.
    pub fn from_descriptors(descriptors: Vec<TemplateDescriptor>) -> Result<Self, CatalogError> {
        let validator = DescriptorValidator::new();
        let mut index = HashMap::with_capacity(descriptors.len());

        for (position, descriptor) in descriptors.iter().enumerate() {
            let result = validator.validate(descriptor);
            for warning in result.violations.iter().filter(|v| v.severity == ViolationSeverity::Warning) {
                tracing::warn!(
                    template = %descriptor.id,
                    rule = %warning.rule,
                    "{}",
                    warning.message
                );
            }
            if !result.valid {
                return Err(CatalogError::InvalidTemplate {
                    id: descriptor.id.clone(),
                    reasons: result.error_summary(),
                });
            }
            if index.insert(descriptor.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateId(descriptor.id.clone()));
            }
        }

        Ok(Self { templates: descriptors, index })
    }

    pub fn get(&self, id: &str) -> Result<&TemplateDescriptor, CatalogError> {
        self.index
            .get(id)
            .map(|&i| &self.templates[i])
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// All descriptors in catalog order.
    pub fn list(&self) -> &[TemplateDescriptor] {
        &self.templates
    }

    /// Descriptors in `category`, still in catalog order.
    pub fn list_by_category(&self, category: &str) -> Vec<&TemplateDescriptor> {
        self.templates.iter().filter(|t| t.category == category).collect()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.templates
            .iter()
            .map(|t| t.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// SHA-256 over the canonical JSON of every descriptor.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        compute_manifest_hash(&self.templates)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"id": "envelope", "name": "Envelope", "category": "mail",
         "assetRef": "frames/envelope.svg",
         "placeholder": {"x": 100, "y": 100, "width": 200, "height": 200},
         "tags": ["paper", "letter"]},
        {"id": "sign", "name": "Sign", "category": "outdoor",
         "assetRef": "frames/sign.svg",
         "placeholder": {"x": 10, "y": 20, "width": 300, "height": 500},
         "qrScale": 0.8},
        {"id": "postcard", "name": "Postcard", "category": "mail",
         "assetRef": "frames/postcard.svg",
         "placeholder": {"x": 0, "y": 0, "width": 400, "height": 400},
         "qrSize": 512}
    ]"#;

    #[test]
    fn test_catalog_preserves_order() {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        let ids: Vec<_> = catalog.list().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["envelope", "sign", "postcard"]);
    }

    #[test]
    fn test_default_qr_scale_applied() {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.get("envelope").unwrap().qr_scale, DEFAULT_QR_SCALE);
        assert_eq!(catalog.get("sign").unwrap().qr_scale, 0.8);
    }

    #[test]
    fn test_list_by_category_keeps_catalog_order() {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        let mail: Vec<_> = catalog.list_by_category("mail").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(mail, ["envelope", "postcard"]);
        assert!(catalog.list_by_category("nope").is_empty());
        assert_eq!(catalog.categories(), ["mail", "outdoor"]);
    }

    #[test]
    fn test_get_unknown_id() {
        let catalog = TemplateCatalog::from_json(CATALOG).unwrap();
        let err = catalog.get("missing").unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(ref id) if id == "missing"));
    }

    #[test]
    fn test_zero_width_placeholder_rejected() {
        let json = r#"[{"id": "bad", "name": "Bad", "category": "x", "assetRef": "bad.svg",
            "placeholder": {"x": 0, "y": 0, "width": 0, "height": 100}}]"#;
        let err = TemplateCatalog::from_json(json).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidTemplate { ref id, .. } if id == "bad"));
    }

    #[test]
    fn test_qr_scale_out_of_range_rejected() {
        for scale in ["0", "1.5", "-0.2"] {
            let json = format!(
                r#"[{{"id": "s", "name": "S", "category": "x", "assetRef": "s.svg",
                "placeholder": {{"x": 0, "y": 0, "width": 10, "height": 10}}, "qrScale": {scale}}}]"#
            );
            assert!(TemplateCatalog::from_json(&json).is_err(), "qrScale {scale} accepted");
        }
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let json = r#"[
            {"id": "a", "name": "A", "category": "x", "assetRef": "a.svg",
             "placeholder": {"x": 0, "y": 0, "width": 10, "height": 10}},
            {"id": "a", "name": "A2", "category": "x", "assetRef": "a2.svg",
             "placeholder": {"x": 0, "y": 0, "width": 10, "height": 10}}
        ]"#;
        assert!(matches!(
            TemplateCatalog::from_json(json),
            Err(CatalogError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_fingerprint_stable() {
        let a = TemplateCatalog::from_json(CATALOG).unwrap();
        let b = TemplateCatalog::from_json(CATALOG).unwrap();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }
}
