//! Operator warnings derived from an extracted item.
//!
//! Order: tapped holes (ascending thread size), then reamed and toleranced
//! holes (ascending diameter), then toleranced lengths in drawing order,
//! then the surface treatment. A category without the data it needs is
//! left out.

mod grouping;
pub mod patterns;

use crate::models::item::{ExtractedItem, meaningful};
use crate::rules::EffectiveConfig;

use grouping::{bored_groups, limits, tapped_groups};

/// Warning lines for one item. Pure and deterministic.
pub fn generate_warnings(item: &ExtractedItem, config: &EffectiveConfig) -> Vec<String> {
    let mut warnings: Vec<String> = Vec::new();

    warnings.extend(tapped_groups(&item.holes).iter().map(|group| group.message()));
    warnings.extend(bored_groups(&item.holes).iter().map(|group| group.message()));

    for length in &item.tolerated_lengths {
        if length.is_reference() {
            continue;
        }
        let Some(dimension) = meaningful(length.dimension.as_deref()) else {
            continue;
        };
        if let Some(tolerance) = limits(length.upper_tolerance.as_deref(), length.lower_tolerance.as_deref()) {
            warnings.push(format!("{dimension} {tolerance} toleranced length"));
        }
    }

    if let Some(treatment) = config.canonical_surface_treatment(item.surface_treatment.as_deref()) {
        warnings.push(format!("Surface treatment: {treatment}"));
    }

    warnings
}
