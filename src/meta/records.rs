use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Dataset;

/// A registered geocollection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geocollection {
    #[serde(flatten)]
    pub dataset: Dataset,
}

/// A face-level refinement of exactly one geocollection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topocollection {
    pub geocollection: String,
    #[serde(flatten)]
    pub dataset: Dataset,
    /// No feature→faces mapping has been written yet.
    pub empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionMeta {
    /// File the overlap data was imported from.
    pub filepath: Option<PathBuf>,
    /// Content hashes of both sides at import time.
    pub first_sha256: Option<String>,
    pub second_sha256: Option<String>,
}

impl IntersectionMeta {
    /// Metadata for the `(second, first)` direction.
    pub(crate) fn reversed(&self) -> Self {
        Self {
            filepath: self.filepath.clone(),
            first_sha256: self.second_sha256.clone(),
            second_sha256: self.first_sha256.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingMeta {
    /// Geocollection of the IA units the loading is defined on, if known.
    pub geocollection: Option<String>,
    pub description: Option<String>,
}

/// Feature areas of one geocollection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaMeta {
    /// File the areas were imported from.
    pub filepath: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionTableMeta {
    /// Geocollection defining the extension table's spatial scale.
    pub geocollection: String,
    #[serde(default)]
    pub description: Option<String>,
}
