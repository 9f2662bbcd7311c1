//! Hole grouping and ordering.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use crate::models::item::{HoleKind, HoleSpec, meaningful};

use super::patterns::{bare_diameter, diameter_value, split_count, thread_size};

/// Identical holes merged into one warning line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HoleGroup {
    pub kind: HoleKind,
    /// Thread designator ("M6") or diameter ("Ø20").
    pub label: String,
    pub tolerance: Option<String>,
    pub quantity: u32,
    /// Sort key: thread size or diameter.
    size: Option<Decimal>,
}

impl HoleGroup {
    pub fn message(&self) -> String {
        let count = if self.quantity > 1 {
            format!("{}x ", self.quantity)
        } else {
            String::new()
        };
        match (self.kind, &self.tolerance) {
            (HoleKind::Tapped, Some(tolerance)) => {
                format!("{count}{} ({tolerance}) tapped hole", self.label)
            }
            (HoleKind::Tapped, None) => format!("{count}{} tapped hole", self.label),
            (HoleKind::Reamed, Some(tolerance)) => {
                format!("{count}{} {tolerance} reamed hole", self.label)
            }
            (HoleKind::Reamed, None) => format!("{count}{} reamed hole", self.label),
            (HoleKind::Plain, Some(tolerance)) => format!("{count}{} {tolerance} hole", self.label),
            (HoleKind::Plain, None) => format!("{count}{} hole", self.label),
        }
    }

    fn same_group(&self, other: &HoleGroup) -> bool {
        self.kind == other.kind && self.label == other.label && self.tolerance == other.tolerance
    }

    /// Known sizes ascending, unknown sizes last; ties broken by label, then tolerance.
    fn order(&self, other: &HoleGroup) -> Ordering {
        let by_size = match (&self.size, &other.size) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_size
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.label.cmp(&other.label))
            .then_with(|| self.tolerance.cmp(&other.tolerance))
    }
}

/// Tapped holes grouped by thread and tolerance, ascending by thread size.
pub(crate) fn tapped_groups(holes: &[HoleSpec]) -> Vec<HoleGroup> {
    let groups = holes
        .iter()
        .filter(|hole| hole.kind == HoleKind::Tapped)
        .filter_map(|hole| {
            let (prefix_count, label) = split_count(meaningful(hole.thread_size.as_deref())?);
            if label.is_empty() {
                return None;
            }
            Some(HoleGroup {
                kind: HoleKind::Tapped,
                label: label.to_string(),
                tolerance: meaningful(hole.tolerance.as_deref()).map(str::to_string),
                quantity: quantity(hole, prefix_count),
                size: thread_size(label),
            })
        });
    merge_and_sort(groups)
}

/// Reamed holes, and plain holes that carry a tolerance, ascending by diameter.
pub(crate) fn bored_groups(holes: &[HoleSpec]) -> Vec<HoleGroup> {
    let groups = holes
        .iter()
        .filter(|hole| hole.kind != HoleKind::Tapped)
        .filter_map(|hole| {
            let tolerance = hole_tolerance(hole);
            if hole.kind == HoleKind::Plain && tolerance.is_none() {
                return None;
            }
            let (prefix_count, diameter) = split_count(meaningful(hole.diameter.as_deref())?);
            let diameter = bare_diameter(diameter);
            if diameter.is_empty() {
                return None;
            }
            Some(HoleGroup {
                kind: hole.kind,
                label: format!("Ø{diameter}"),
                tolerance,
                quantity: quantity(hole, prefix_count),
                size: diameter_value(diameter),
            })
        });
    merge_and_sort(groups)
}

/// Explicit count wins over a count written into the descriptor.
fn quantity(hole: &HoleSpec, prefix_count: Option<u32>) -> u32 {
    match (hole.count, prefix_count) {
        (Some(count), _) if count > 0 => count,
        (_, Some(count)) if count > 0 => count,
        _ => 1,
    }
}

/// Tolerance class when present, otherwise the limit deviations.
fn hole_tolerance(hole: &HoleSpec) -> Option<String> {
    if let Some(class) = meaningful(hole.tolerance.as_deref()) {
        return Some(class.to_string());
    }
    limits(hole.upper_tolerance.as_deref(), hole.lower_tolerance.as_deref())
}

/// `"+0.2/-0.1"`, `"±0.2"` for symmetric limits, missing sides as `+0` / `-0`.
pub(crate) fn limits(upper: Option<&str>, lower: Option<&str>) -> Option<String> {
    let upper = meaningful(upper);
    let lower = meaningful(lower);
    if upper.is_none() && lower.is_none() {
        return None;
    }
    let upper = upper.unwrap_or("+0");
    let lower = lower.unwrap_or("-0");

    match (upper.strip_prefix('+'), lower.strip_prefix('-')) {
        (Some(u), Some(l)) if u == l => Some(format!("±{u}")),
        _ => Some(format!("{upper}/{lower}")),
    }
}

fn merge_and_sort(groups: impl Iterator<Item = HoleGroup>) -> Vec<HoleGroup> {
    let mut merged: Vec<HoleGroup> = Vec::new();
    for group in groups {
        match merged.iter_mut().find(|existing| existing.same_group(&group)) {
            Some(existing) => existing.quantity += group.quantity,
            None => merged.push(group),
        }
    }
    merged.sort_by(HoleGroup::order);
    merged
}
