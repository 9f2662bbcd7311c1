//! Customer profiles and rule resolution.
//!
//! A batch runs against one [`EffectiveConfig`]: the base rule document merged
//! with zero or one customer override. Pattern lists are concatenated (a
//! customer entry with the same pattern text overrides the base entry in
//! place), keyword maps are overwritten per key, and prompt additions are
//! appended. A customer document can opt out of extending a category by
//! listing it under `replace`.

pub mod document;
mod effective;
pub mod prompt;
mod resolver;

pub use document::{
    HoleCapture, HolePattern, PromptAdditions, RuleCategory, RuleDocument, SurfaceTreatmentOption,
    TolerancePattern,
};
pub use effective::EffectiveConfig;
pub use resolver::RuleResolver;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Closed set of rule profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerProfile {
    /// Generic rules only.
    Base,
    Elten,
    Rademaker,
}

impl CustomerProfile {
    /// Every profile, base first.
    pub const ALL: [CustomerProfile; 3] = [
        CustomerProfile::Base,
        CustomerProfile::Elten,
        CustomerProfile::Rademaker,
    ];

    /// Profiles that carry their own rule document.
    pub const NAMED: [CustomerProfile; 2] = [CustomerProfile::Elten, CustomerProfile::Rademaker];

    /// Identifier used on the command line and as the rule directory name.
    pub fn id(&self) -> &'static str {
        match self {
            CustomerProfile::Base => "base",
            CustomerProfile::Elten => "elten",
            CustomerProfile::Rademaker => "rademaker",
        }
    }

    /// Name as printed on drawings.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            CustomerProfile::Base => "BASE",
            CustomerProfile::Elten => "ELTEN",
            CustomerProfile::Rademaker => "RADEMAKER",
        }
    }
}

impl fmt::Display for CustomerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for CustomerProfile {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_lowercase();
        CustomerProfile::ALL
            .into_iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| RuleError::InvalidCustomer(s.to_string()))
    }
}

/// How the profile for a batch is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerSelection {
    /// Classify the first document of the batch.
    Auto,
    /// Use this profile.
    Profile(CustomerProfile),
}

impl FromStr for CustomerSelection {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(CustomerSelection::Auto)
        } else {
            s.parse().map(CustomerSelection::Profile)
        }
    }
}

impl fmt::Display for CustomerSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerSelection::Auto => f.write_str("auto"),
            CustomerSelection::Profile(profile) => profile.fmt(f),
        }
    }
}
