//! Extracted drawing data as returned by the model (camelCase on the wire).

use serde::{Deserialize, Deserializer, Serialize};

/// One part extracted from a single drawing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedItem {
    /// Part number (the drawing's file stem after normalization).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,

    /// Free-text description from the title block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Full material descriptor, including thickness (e.g. "RVS 2 mm").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,

    /// Surface treatment display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_treatment: Option<String>,

    /// Hole specifications in drawing order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub holes: Vec<HoleSpec>,

    /// Length dimensions carrying an explicit tolerance, in drawing order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tolerated_lengths: Vec<ToleratedLength>,

    /// Part numbers listed in the drawing's BOM table.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bom_part_numbers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A hole or group of identical holes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,

    #[serde(rename = "type", default)]
    pub kind: HoleKind,

    /// Diameter of plain and reamed holes (e.g. "20" or "Ø19.5").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter: Option<String>,

    /// Thread descriptor of tapped holes (e.g. "M6" or "4x M6").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_size: Option<String>,

    /// Tolerance class (e.g. "H7", "6H").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_tolerance: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_tolerance: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl HoleSpec {
    /// Number of holes this entry stands for; missing or zero counts as one.
    pub fn quantity(&self) -> u32 {
        self.count.filter(|c| *c > 0).unwrap_or(1)
    }
}

/// Kind of hole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum HoleKind {
    /// Threaded hole.
    Tapped,
    /// Pre-drilled and reamed to a fit.
    Reamed,
    /// Any other drilled hole.
    #[default]
    Plain,
}

impl HoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoleKind::Tapped => "tapped",
            HoleKind::Reamed => "reamed",
            HoleKind::Plain => "plain",
        }
    }

    /// Parse the model's free-form hole type.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "tapped" | "threaded" | "tap" | "tapgat" => HoleKind::Tapped,
            "reamed" | "ream" | "geruimd" => HoleKind::Reamed,
            _ => HoleKind::Plain,
        }
    }
}

impl From<Option<String>> for HoleKind {
    fn from(label: Option<String>) -> Self {
        label.as_deref().map(HoleKind::from_label).unwrap_or_default()
    }
}

impl From<HoleKind> for String {
    fn from(kind: HoleKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A length dimension with explicit tolerance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToleratedLength {
    /// Nominal dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,

    /// "parenthesized" marks reference dimensions that carry no real tolerance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_tolerance: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_tolerance: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ToleratedLength {
    /// Reference dimensions shown in parentheses.
    pub fn is_reference(&self) -> bool {
        self.tolerance_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("parenthesized"))
    }
}

/// Treat blank strings and the model's "None"/"null" placeholders as absent.
pub fn meaningful(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    if value.is_empty()
        || value.eq_ignore_ascii_case("none")
        || value.eq_ignore_ascii_case("null")
    {
        None
    } else {
        Some(value)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hole_kind_labels() {
        assert_eq!(HoleKind::from_label("tapped"), HoleKind::Tapped);
        assert_eq!(HoleKind::from_label("Threaded"), HoleKind::Tapped);
        assert_eq!(HoleKind::from_label("reamed"), HoleKind::Reamed);
        assert_eq!(HoleKind::from_label("normal"), HoleKind::Plain);
        assert_eq!(HoleKind::from_label("drilled"), HoleKind::Plain);
    }

    #[test]
    fn test_item_from_model_json() {
        let json = r#"{
            "partNumber": null,
            "material": "RVS 2 mm",
            "holes": [
                {"count": 4, "type": "tapped", "threadSize": "M6"},
                {"type": "normal", "diameter": "20", "tolerance": "H7"},
                {"type": null, "diameter": "8"}
            ],
            "toleratedLengths": null,
            "bomPartNumbers": []
        }"#;

        let item: ExtractedItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.material.as_deref(), Some("RVS 2 mm"));
        assert_eq!(item.holes.len(), 3);
        assert_eq!(item.holes[2].kind, HoleKind::Plain);
        assert_eq!(item.holes[0].kind, HoleKind::Tapped);
        assert_eq!(item.holes[0].quantity(), 4);
        assert_eq!(item.holes[1].kind, HoleKind::Plain);
        assert_eq!(item.holes[1].quantity(), 1);
        assert!(item.tolerated_lengths.is_empty());
    }

    #[test]
    fn test_meaningful() {
        assert_eq!(meaningful(Some(" H7 ")), Some("H7"));
        assert_eq!(meaningful(Some("None")), None);
        assert_eq!(meaningful(Some("")), None);
        assert_eq!(meaningful(None), None);
    }

    #[test]
    fn test_reference_dimension() {
        let length = ToleratedLength {
            tolerance_type: Some("parenthesized".to_string()),
            ..Default::default()
        };
        assert!(length.is_reference());
    }
}
