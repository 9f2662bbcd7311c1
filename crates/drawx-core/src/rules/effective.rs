//! Merged, customer-aware rule set.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::models::item::{ExtractedItem, HoleKind, HoleSpec, meaningful};

use super::CustomerProfile;
use super::document::{
    HolePattern, PromptAdditions, RuleCategory, RuleDocument, TolerancePattern,
};

/// Merged, customer-aware rule set for one batch. Read-only once built.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    profile: CustomerProfile,
    customer_name: String,
    tolerance_patterns: Vec<TolerancePattern>,
    hole_patterns: Vec<HolePattern>,
    /// Lowercased keyword → display name.
    surface_treatments: BTreeMap<String, String>,
    material_hints: BTreeMap<String, String>,
    prompt_additions: PromptAdditions,
}

impl EffectiveConfig {
    /// Merge a base document with an optional customer override.
    pub fn merge(profile: CustomerProfile, base: RuleDocument, customer: Option<RuleDocument>) -> Self {
        let customer_name = customer
            .as_ref()
            .and_then(|c| c.customer_name.clone())
            .or_else(|| match profile {
                CustomerProfile::Base => base.customer_name.clone(),
                _ => None,
            })
            .unwrap_or_else(|| profile.canonical_name().to_string());

        let mut config = Self {
            profile,
            customer_name,
            tolerance_patterns: Vec::new(),
            hole_patterns: Vec::new(),
            surface_treatments: BTreeMap::new(),
            material_hints: BTreeMap::new(),
            prompt_additions: PromptAdditions::default(),
        };

        config.extend(base);
        if let Some(customer) = customer {
            config.extend(customer);
        }

        debug!(
            profile = %profile,
            tolerance_patterns = config.tolerance_patterns.len(),
            hole_patterns = config.hole_patterns.len(),
            surface_keywords = config.surface_treatments.len(),
            "Resolved effective rules"
        );

        config
    }

    fn extend(&mut self, doc: RuleDocument) {
        let replaces = |category| doc.replace.contains(&category);

        if replaces(RuleCategory::TolerancePatterns) {
            self.tolerance_patterns.clear();
        }
        if replaces(RuleCategory::HolePatterns) {
            self.hole_patterns.clear();
        }
        if replaces(RuleCategory::SurfaceTreatments) {
            self.surface_treatments.clear();
        }
        if replaces(RuleCategory::MaterialHints) {
            self.material_hints.clear();
        }
        if replaces(RuleCategory::PromptAdditions) {
            self.prompt_additions = PromptAdditions::default();
        }

        for pattern in doc.signals.tolerated_lengths {
            upsert(&mut self.tolerance_patterns, pattern, |a, b| a.pattern.trim() == b.pattern.trim());
        }
        for pattern in doc.signals.holes {
            upsert(&mut self.hole_patterns, pattern, |a, b| a.pattern.trim() == b.pattern.trim());
        }

        for option in doc.surface_treatments {
            let display = option.display_name.trim().to_string();
            if display.is_empty() {
                continue;
            }
            self.surface_treatments.insert(display.to_lowercase(), display.clone());
            for keyword in option.keywords {
                let keyword = keyword.trim().to_lowercase();
                if !keyword.is_empty() {
                    self.surface_treatments.insert(keyword, display.clone());
                }
            }
        }

        self.material_hints.extend(doc.material_hints);
        self.prompt_additions.extend(doc.prompt_additions);
    }

    pub fn profile(&self) -> CustomerProfile {
        self.profile
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn tolerance_patterns(&self) -> &[TolerancePattern] {
        &self.tolerance_patterns
    }

    pub fn hole_patterns(&self) -> &[HolePattern] {
        &self.hole_patterns
    }

    pub fn surface_treatments(&self) -> &BTreeMap<String, String> {
        &self.surface_treatments
    }

    pub fn material_hints(&self) -> &BTreeMap<String, String> {
        &self.material_hints
    }

    pub fn prompt_additions(&self) -> &PromptAdditions {
        &self.prompt_additions
    }

    /// Display names with the keywords that select them, grouped by display name.
    pub fn surface_treatment_options(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut options: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (keyword, display) in &self.surface_treatments {
            let keywords = options.entry(display.as_str()).or_default();
            if *keyword != display.to_lowercase() {
                keywords.push(keyword.as_str());
            }
        }
        options
    }

    /// Display name for a raw surface treatment: exact keyword first, then the
    /// longest keyword contained in the text.
    pub fn surface_treatment_display(&self, raw: &str) -> Option<&str> {
        let needle = raw.trim().to_lowercase();
        if let Some(display) = self.surface_treatments.get(&needle) {
            return Some(display.as_str());
        }
        self.surface_treatments
            .iter()
            .filter(|(keyword, _)| needle.contains(keyword.as_str()))
            .max_by_key(|(keyword, _)| keyword.len())
            .map(|(_, display)| display.as_str())
    }

    /// Canonical surface treatment for an item, or `None` when nothing meaningful remains.
    pub fn canonical_surface_treatment(&self, raw: Option<&str>) -> Option<String> {
        let raw = meaningful(raw)?;
        let display = self.surface_treatment_display(raw).unwrap_or(raw);
        meaningful(Some(display)).map(str::to_string)
    }

    /// First hole recipe (base entries before customer entries) whose pattern occurs in `text`.
    pub fn hole_recipe_for(&self, text: &str) -> Option<&HolePattern> {
        let haystack = text.to_lowercase();
        self.hole_patterns.iter().find(|recipe| {
            let pattern = recipe.pattern.trim().to_lowercase();
            !pattern.is_empty() && haystack.contains(&pattern)
        })
    }

    /// Apply rule-driven fixes to a freshly extracted item.
    ///
    /// The source document stem becomes the part number.
    pub fn normalize_item(&self, mut item: ExtractedItem, source: &str) -> ExtractedItem {
        item.part_number = Some(source.to_string());
        item.surface_treatment = self.canonical_surface_treatment(item.surface_treatment.as_deref());
        for hole in &mut item.holes {
            self.apply_hole_recipe(hole);
        }
        item
    }

    fn apply_hole_recipe(&self, hole: &mut HoleSpec) {
        let Some(notes) = meaningful(hole.notes.as_deref()) else {
            return;
        };
        let Some(recipe) = self.hole_recipe_for(notes) else {
            return;
        };
        let capture = &recipe.capture;

        if hole.kind == HoleKind::Plain {
            if let Some(kind) = capture.kind.as_deref() {
                hole.kind = HoleKind::from_label(kind);
            }
        }
        fill_missing(&mut hole.diameter, capture.diameter.as_deref());
        fill_missing(&mut hole.thread_size, capture.thread_size.as_deref());
        fill_missing(&mut hole.tolerance, capture.tolerance.as_deref());
    }
}

fn upsert<T>(list: &mut Vec<T>, entry: T, same: impl Fn(&T, &T) -> bool) {
    match list.iter_mut().find(|existing| same(existing, &entry)) {
        Some(existing) => *existing = entry,
        None => list.push(entry),
    }
}

fn fill_missing(field: &mut Option<String>, value: Option<&str>) {
    if meaningful(field.as_deref()).is_none() {
        if let Some(value) = value {
            *field = Some(value.to_string());
        }
    }
}
