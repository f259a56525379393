use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{common::sha256_file, error::RegionalError};

/// Raster formats recognised by extension; anything else is read as vector.
const RASTER_EXTENSIONS: [&str; 6] = ["tif", "tiff", "asc", "nc", "vrt", "img"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Vector,
    Raster,
}

impl CollectionKind {
    pub fn detect(path: &Path) -> Self {
        let raster = path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| RASTER_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if raster { CollectionKind::Raster } else { CollectionKind::Vector }
    }
}

/// What a caller supplies when registering a geo- or topocollection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSpec {
    pub filepath: Option<PathBuf>,
    /// Vector attribute holding the feature id.
    pub field: Option<String>,
    pub layer: Option<String>,
    /// Raster band; defaults to 1 for rasters.
    pub band: Option<u32>,
}

impl DatasetSpec {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { filepath: Some(path.into()), ..Self::default() }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn with_band(mut self, band: u32) -> Self {
        self.band = Some(band);
        self
    }
}

/// A validated spatial dataset: the spec plus the detected kind and the
/// content hash of its source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub filepath: Option<PathBuf>,
    pub kind: Option<CollectionKind>,
    pub sha256: Option<String>,
    pub field: Option<String>,
    pub layer: Option<String>,
    pub band: Option<u32>,
}

impl Dataset {
    /// Hash the source file (if any) and detect its kind.
    pub(crate) fn from_spec(spec: DatasetSpec) -> Result<Self> {
        let DatasetSpec { filepath, field, layer, band } = spec;
        let (kind, sha256) = match &filepath {
            Some(path) => {
                let sha256 = sha256_file(path)
                    .with_context(|| format!("Failed to hash spatial dataset {}", path.display()))?;
                (Some(CollectionKind::detect(path)), Some(sha256))
            }
            None => (None, None),
        };
        let band = match kind {
            Some(CollectionKind::Raster) => band.or(Some(1)),
            _ => band,
        };
        Ok(Self { filepath, kind, sha256, field, layer, band })
    }

    pub fn is_raster(&self) -> bool { self.kind == Some(CollectionKind::Raster) }

    pub(crate) fn require_source(&self, name: &str) -> Result<&Path> {
        self.filepath.as_deref()
            .ok_or_else(|| RegionalError::MissingSpatialSourceData(name.to_string()).into())
    }

    pub(crate) fn require_field(&self, name: &str) -> Result<&str> {
        self.field.as_deref()
            .ok_or_else(|| RegionalError::IncompleteSpatialDefinition {
                collection: name.to_string(),
                field: "field",
            }.into())
    }

    /// True when every non-empty attribute of `descriptor` equals ours.
    pub(crate) fn matches(&self, descriptor: &DatasetDescriptor) -> bool {
        fn same(filter: &Option<String>, ours: &Option<String>) -> bool {
            match filter.as_deref() {
                None | Some("") => true,
                Some(value) => ours.as_deref() == Some(value),
            }
        }
        same(&descriptor.sha256, &self.sha256)
            && same(&descriptor.field, &self.field)
            && same(&descriptor.layer, &self.layer)
            && descriptor.band.is_none_or(|band| self.band == Some(band))
    }
}

/// Dataset description carried by exchange documents and remote requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetDescriptor {
    pub sha256: Option<String>,
    pub field: Option<String>,
    pub layer: Option<String>,
    pub band: Option<u32>,
}

impl From<&Dataset> for DatasetDescriptor {
    fn from(dataset: &Dataset) -> Self {
        Self {
            sha256: dataset.sha256.clone(),
            field: dataset.field.clone(),
            layer: dataset.layer.clone(),
            band: dataset.band,
        }
    }
}
