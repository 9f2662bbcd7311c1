//! On-disk rule documents (`base.json`, `customers/<profile>/config.json`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single rule document. Every section is optional; `{}` is a valid document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleDocument {
    /// Customer name as shown in prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,

    pub signals: Signals,

    /// Allowed surface treatments with their trigger keywords.
    pub surface_treatments: Vec<SurfaceTreatmentOption>,

    /// Material pattern → guidance for reading the material field.
    pub material_hints: BTreeMap<String, String>,

    pub prompt_additions: PromptAdditions,

    /// Categories whose base entries this document replaces instead of extends.
    pub replace: Vec<RuleCategory>,
}

/// Detection patterns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Signals {
    pub tolerated_lengths: Vec<TolerancePattern>,
    pub holes: Vec<HolePattern>,
}

/// A dimension notation that marks a critical tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TolerancePattern {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A hole notation and the fields it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolePattern {
    pub pattern: String,
    #[serde(default)]
    pub capture: HoleCapture,
}

/// Hole fields implied by a [`HolePattern`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoleCapture {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<String>,
}

/// A surface treatment display name with the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceTreatmentOption {
    pub display_name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Extra prompt lines per extraction section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptAdditions {
    pub holes: Vec<String>,
    pub tolerated_lengths: Vec<String>,
    pub surface_treatment: Vec<String>,
    pub material: Vec<String>,
}

impl PromptAdditions {
    pub(crate) fn extend(&mut self, other: PromptAdditions) {
        self.holes.extend(other.holes);
        self.tolerated_lengths.extend(other.tolerated_lengths);
        self.surface_treatment.extend(other.surface_treatment);
        self.material.extend(other.material);
    }

    pub fn is_empty(&self) -> bool {
        self.holes.is_empty()
            && self.tolerated_lengths.is_empty()
            && self.surface_treatment.is_empty()
            && self.material.is_empty()
    }
}

/// Rule categories a customer document may replace wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleCategory {
    TolerancePatterns,
    HolePatterns,
    SurfaceTreatments,
    MaterialHints,
    PromptAdditions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_valid() {
        let doc: RuleDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.customer_name.is_none());
        assert!(doc.signals.holes.is_empty());
        assert!(doc.replace.is_empty());
    }

    #[test]
    fn test_document_fields() {
        let json = r#"{
            "customerName": "ELTEN",
            "signals": {
                "holes": [{"pattern": "M6 (6H)", "capture": {"type": "tapped", "threadSize": "M6", "tolerance": "6H"}}]
            },
            "surfaceTreatments": [{"displayName": "Poedercoaten", "keywords": ["powder coat"]}],
            "materialHints": {"RVS": "include the thickness"},
            "replace": ["surfaceTreatments"]
        }"#;

        let doc: RuleDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.customer_name.as_deref(), Some("ELTEN"));
        assert_eq!(doc.signals.holes[0].capture.kind.as_deref(), Some("tapped"));
        assert_eq!(doc.surface_treatments[0].keywords, vec!["powder coat"]);
        assert_eq!(doc.replace, vec![RuleCategory::SurfaceTreatments]);
    }
}
