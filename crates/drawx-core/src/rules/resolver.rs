//! Rule document loading and merging.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::RuleError;

use super::document::RuleDocument;
use super::effective::EffectiveConfig;
use super::{CustomerProfile, CustomerSelection};

/// Loads rule documents from a rules directory:
///
/// ```text
/// <root>/base.json
/// <root>/customers/<profile>/config.json
/// ```
#[derive(Debug, Clone)]
pub struct RuleResolver {
    root: PathBuf,
}

impl RuleResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_path(&self) -> PathBuf {
        self.root.join("base.json")
    }

    pub fn customer_path(&self, profile: CustomerProfile) -> PathBuf {
        self.root.join("customers").join(profile.id()).join("config.json")
    }

    /// Resolve a customer identifier given as text.
    pub fn resolve(&self, customer: &str) -> Result<EffectiveConfig, RuleError> {
        let profile: CustomerProfile = customer.parse()?;
        self.resolve_profile(profile)
    }

    /// Merge the base document with the profile's override.
    ///
    /// The base document is always required; a named profile also requires its
    /// own document.
    pub fn resolve_profile(&self, profile: CustomerProfile) -> Result<EffectiveConfig, RuleError> {
        let base = load_document(&self.base_path())?;
        let customer = match profile {
            CustomerProfile::Base => None,
            named => Some(load_document(&self.customer_path(named))?),
        };

        info!(profile = %profile, root = %self.root.display(), "Resolved rules");
        Ok(EffectiveConfig::merge(profile, base, customer))
    }

    /// Check that every profile resolves before anything is sent to the model.
    pub fn preflight(&self) -> Result<(), RuleError> {
        for profile in CustomerProfile::ALL {
            self.resolve_profile(profile)?;
        }
        Ok(())
    }

    /// Check the rule documents a selection may need: all of them in auto mode.
    pub fn check(&self, selection: CustomerSelection) -> Result<(), RuleError> {
        match selection {
            CustomerSelection::Auto => self.preflight(),
            CustomerSelection::Profile(profile) => self.resolve_profile(profile).map(|_| ()),
        }
    }
}

fn load_document(path: &Path) -> Result<RuleDocument, RuleError> {
    let content = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => RuleError::ConfigMissing(path.to_path_buf()),
        _ => RuleError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;

    debug!(path = %path.display(), "Loading rule document");

    serde_json::from_str(&content).map_err(|e| RuleError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn rules_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "base.json",
            r#"{"signals": {"toleratedLengths": [{"pattern": "50 ±0.2"}]}}"#,
        );
        write(
            dir.path(),
            "customers/elten/config.json",
            r#"{"customerName": "ELTEN", "signals": {"toleratedLengths": [{"pattern": "(40)"}]}}"#,
        );
        dir
    }

    #[test]
    fn test_resolve_base() {
        let dir = rules_dir();
        let config = RuleResolver::new(dir.path()).resolve("base").unwrap();
        assert_eq!(config.profile(), CustomerProfile::Base);
        assert_eq!(config.tolerance_patterns().len(), 1);
    }

    #[test]
    fn test_resolve_customer() {
        let dir = rules_dir();
        let config = RuleResolver::new(dir.path()).resolve("ELTEN").unwrap();
        assert_eq!(config.customer_name(), "ELTEN");
        assert_eq!(config.tolerance_patterns().len(), 2);
    }

    #[test]
    fn test_invalid_customer() {
        let dir = rules_dir();
        let err = RuleResolver::new(dir.path()).resolve("acme").unwrap_err();
        assert!(matches!(err, RuleError::InvalidCustomer(_)));
    }

    #[test]
    fn test_missing_customer_document() {
        let dir = rules_dir();
        let resolver = RuleResolver::new(dir.path());
        let err = resolver.resolve("rademaker").unwrap_err();
        match err {
            RuleError::ConfigMissing(path) => {
                assert_eq!(path, resolver.customer_path(CustomerProfile::Rademaker))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(resolver.preflight().is_err());
    }

    #[test]
    fn test_missing_base_document() {
        let dir = TempDir::new().unwrap();
        let err = RuleResolver::new(dir.path()).resolve("base").unwrap_err();
        assert!(matches!(err, RuleError::ConfigMissing(_)));
    }

    #[test]
    fn test_malformed_document() {
        let dir = rules_dir();
        write(dir.path(), "customers/rademaker/config.json", "{ not json");
        let err = RuleResolver::new(dir.path()).resolve("rademaker").unwrap_err();
        assert!(matches!(err, RuleError::Parse { .. }));
    }

    #[test]
    fn test_check_selection() {
        let dir = rules_dir();
        let resolver = RuleResolver::new(dir.path());
        assert!(resolver.check(CustomerSelection::Profile(CustomerProfile::Elten)).is_ok());
        // rademaker rules are missing
        assert!(resolver.check(CustomerSelection::Auto).is_err());
    }

    #[test]
    fn test_preflight() {
        let dir = rules_dir();
        write(dir.path(), "customers/rademaker/config.json", "{}");
        assert!(RuleResolver::new(dir.path()).preflight().is_ok());
    }
}
