//! Descriptor Validation - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! The catalog loader maps errors to a fatal load failure and logs warnings.

use serde::{Deserialize, Serialize};

use crate::templates::TemplateDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub template_id: String,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    /// `rule: message` for every error, joined with `; `.
    pub fn error_summary(&self) -> String {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Error)
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait DescriptorRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, descriptor: &TemplateDescriptor) -> Vec<ValidationViolation>;
}

fn error(rule: &str, message: &str, expected: &str, actual: String) -> ValidationViolation {
    ValidationViolation {
        rule: rule.to_string(),
        severity: ViolationSeverity::Error,
        message: message.to_string(),
        expected: Some(expected.to_string()),
        actual: Some(actual),
    }
}

// --- Concrete Rules ---

pub struct IdentityRule;

impl DescriptorRule for IdentityRule {
    fn name(&self) -> &'static str { "identity" }

    fn check(&self, descriptor: &TemplateDescriptor) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        if descriptor.id.trim().is_empty() {
            violations.push(error(self.name(), "Template id is empty", "non-empty id", format!("{:?}", descriptor.id)));
        }
        if descriptor.asset_ref.trim().is_empty() {
            violations.push(error(
                self.name(),
                "Asset reference is empty",
                "non-empty assetRef",
                format!("{:?}", descriptor.asset_ref),
            ));
        }
        violations
    }
}

pub struct PlaceholderRule;

impl DescriptorRule for PlaceholderRule {
    fn name(&self) -> &'static str { "placeholder" }

    fn check(&self, descriptor: &TemplateDescriptor) -> Vec<ValidationViolation> {
        let p = &descriptor.placeholder;
        let mut violations = vec![];

        if ![p.x, p.y, p.width, p.height].iter().all(|v| v.is_finite()) {
            violations.push(error(
                self.name(),
                "Placeholder has non-finite coordinates",
                "finite x, y, width, height",
                format!("{:?}", p),
            ));
        } else if p.width <= 0.0 || p.height <= 0.0 {
            violations.push(error(
                self.name(),
                "Placeholder dimensions must be positive",
                "width > 0 and height > 0",
                format!("{}x{}", p.width, p.height),
            ));
        }

        violations
    }
}

pub struct QrScaleRule;

impl DescriptorRule for QrScaleRule {
    fn name(&self) -> &'static str { "qr_scale" }

    fn check(&self, descriptor: &TemplateDescriptor) -> Vec<ValidationViolation> {
        let scale = descriptor.qr_scale;
        if scale.is_finite() && scale > 0.0 && scale <= 1.0 {
            return vec![];
        }
        vec![error(self.name(), "Fill ratio out of range", "(0, 1]", format!("{}", scale))]
    }
}

pub struct QrSizeRule;

impl DescriptorRule for QrSizeRule {
    fn name(&self) -> &'static str { "qr_size" }

    fn check(&self, descriptor: &TemplateDescriptor) -> Vec<ValidationViolation> {
        let Some(size) = descriptor.qr_size else {
            return vec![];
        };
        if size == 0 {
            return vec![error(self.name(), "Explicit source size must be positive", "> 0", "0".to_string())];
        }

        // Below the placeholder's short side the barcode gets upscaled and blurs.
        let short_side = descriptor.placeholder.width.min(descriptor.placeholder.height);
        if f64::from(size) < short_side {
            return vec![ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Warning,
                message: "Explicit source size is smaller than the placeholder".to_string(),
                expected: Some(format!(">= {}", short_side)),
                actual: Some(size.to_string()),
            }];
        }
        vec![]
    }
}

/// Runs every rule against a descriptor
pub struct DescriptorValidator {
    rules: Vec<Box<dyn DescriptorRule>>,
}

impl DescriptorValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(IdentityRule),
                Box::new(PlaceholderRule),
                Box::new(QrScaleRule),
                Box::new(QrSizeRule),
            ],
        }
    }

    pub fn validate(&self, descriptor: &TemplateDescriptor) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.check(descriptor))
            .collect();

        let valid = !violations.iter().any(|v| v.severity == ViolationSeverity::Error);
        ValidationResult {
            valid,
            violations,
            template_id: descriptor.id.clone(),
        }
    }
}

impl Default for DescriptorValidator {
    fn default() -> Self {
        Self::new()
    }
}
