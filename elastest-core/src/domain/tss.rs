//! Test support services
//!
//! ElasTest identifies its test support services (browsers, big-data, monitoring,
//! security, device emulation) by UUID. Builds request them by short code, so
//! codes are resolved through a catalog before association.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// A test support service requested for an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSupportService {
    /// Platform UUID of the service
    pub id: String,
    /// Short code, e.g. "EUS"
    pub name: String,
    #[serde(rename = "selected")]
    pub enabled: bool,
}

impl TestSupportService {
    pub fn new(id: impl Into<String>, name: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled,
        }
    }
}

/// Errors raised while loading a catalog table
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate service code in catalog: {0}")]
    DuplicateCode(String),
}

/// One row of the catalog table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    services: Vec<CatalogEntry>,
}

/// Ordered table mapping service short codes to platform UUIDs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TssCatalog {
    entries: Vec<CatalogEntry>,
}

impl TssCatalog {
    /// Creates a catalog from explicit entries, rejecting duplicate codes
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.code == entry.code) {
                return Err(CatalogError::DuplicateCode(entry.code.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// The services known to this version of the platform
    pub fn builtin() -> Self {
        let entries = [
            ("EUS", "29216b91-497c-43b7-a5c4-6613f13fa0e9"),
            ("EBS", "a1920b13-7d11-4ebc-a732-f86a108ea49c"),
            ("EMS", "bab3ae67-8c1d-46ec-a940-94183a443825"),
            ("ESS", "af7947d9-258b-4dd1-b1ca-17450db25ef7"),
            ("EDS", "fe5e0531-b470-441f-9c69-721c2b4875f2"),
        ]
        .into_iter()
        .map(|(code, id)| CatalogEntry {
            code: code.to_string(),
            id: id.to_string(),
        })
        .collect();

        Self { entries }
    }

    /// Parses a catalog from TOML
    ///
    /// ```toml
    /// [[services]]
    /// code = "EUS"
    /// id = "29216b91-497c-43b7-a5c4-6613f13fa0e9"
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(source)?;
        Self::new(file.services)
    }

    /// Loads a catalog from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Looks up the platform UUID of a short code
    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.id.as_str())
    }

    /// Resolves requested codes to services
    ///
    /// Returns one enabled service per requested code known to the catalog,
    /// in catalog order. Unknown codes are dropped.
    pub fn resolve<S: AsRef<str>>(&self, codes: &[S]) -> Vec<TestSupportService> {
        self.entries
            .iter()
            .filter(|e| codes.iter().any(|c| c.as_ref() == e.code))
            .map(|e| TestSupportService::new(e.id.clone(), e.code.clone(), true))
            .collect()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.code.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TssCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
