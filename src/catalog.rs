use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde_json::Value;

use crate::error::CatalogError;
use crate::model::{Agreement, AgreementStatus};
use crate::schema::parse_agreement;

// Mock contracts shipped with the binary
const SAMPLE_DATA: &str = include_str!("../data/agreements.json");

/// Status part of a catalog search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(AgreementStatus),
}

impl StatusFilter {
    /// `all` (or an empty label) matches every status.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() || label.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Only(AgreementStatus::from_label(label))
        }
    }

    fn matches(&self, status: &AgreementStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted.as_str().eq_ignore_ascii_case(status.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgreementFilter {
    /// Matched case-insensitively against agreement id and name.
    pub query: String,
    pub status: StatusFilter,
}

impl AgreementFilter {
    pub fn matches(&self, agreement: &Agreement) -> bool {
        let query = self.query.trim().to_lowercase();
        let matches_query = query.is_empty()
            || agreement.id.to_lowercase().contains(&query)
            || agreement.name.to_lowercase().contains(&query);
        matches_query && self.status.matches(&agreement.status)
    }
}

/// The set of agreements the viewer works on. Passed around explicitly, never global.
#[derive(Debug, Clone, Default)]
pub struct AgreementCatalog {
    agreements: Vec<Agreement>,
}

impl AgreementCatalog {
    pub fn new(agreements: Vec<Agreement>) -> Self {
        Self { agreements }
    }

    pub fn sample() -> Result<Self, CatalogError> {
        Self::from_json_str(SAMPLE_DATA)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        info!("Loading agreements from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Accepts `[ ... ]` or `{ "agreements": [ ... ] }`. Any invalid record fails the whole load.
    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let root: Value = serde_json::from_str(content)?;
        let records = match &root {
            Value::Array(records) => records,
            Value::Object(fields) => match fields.get("agreements") {
                Some(Value::Array(records)) => records,
                _ => return Err(CatalogError::Layout),
            },
            _ => return Err(CatalogError::Layout),
        };

        let mut seen = HashSet::new();
        let mut agreements = Vec::with_capacity(records.len());
        for (index, raw) in records.iter().enumerate() {
            let agreement = parse_agreement(raw).map_err(|source| CatalogError::Schema { index, source })?;
            if !seen.insert(agreement.id.clone()) {
                return Err(CatalogError::DuplicateId(agreement.id));
            }
            agreements.push(agreement);
        }

        debug!("Catalog holds {} agreements", agreements.len());
        Ok(Self::new(agreements))
    }

    pub fn get(&self, id: &str) -> Option<&Agreement> {
        self.agreements.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agreement> {
        self.agreements.iter()
    }

    pub fn len(&self) -> usize {
        self.agreements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agreements.is_empty()
    }

    /// Matching agreements in catalog order.
    pub fn search(&self, filter: &AgreementFilter) -> Vec<&Agreement> {
        self.agreements.iter().filter(|a| filter.matches(a)).collect()
    }
}
