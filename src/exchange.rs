//! Intersection and area exchange documents.
//!
//! ```json
//! {"metadata": {"first": {"sha256": "…", "field": "name"}, "second": {…}},
//!  "data": [[first_id, second_id, area], …]}
//! ```
//!
//! Each side is resolved to a registered collection by its descriptor. A side
//! resolving to topocollections routes the import through the topological
//! merge. A document without `second` carries feature (or face) areas of a
//! single collection: `"data": [[id, area], …]`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    common::read_json_maybe_compressed,
    context::SpatialContext,
    error::RegionalError,
    meta::{AreaMeta, DatasetDescriptor, IntersectionMeta},
    spatial::{FeatureId, SpatialUnit},
    topography::relabel,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeMetadata {
    pub first: DatasetDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<DatasetDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExchangeData {
    Intersections(Vec<(FeatureId, FeatureId, f64)>),
    Areas(Vec<(FeatureId, f64)>),
}

impl Default for ExchangeData {
    fn default() -> Self { ExchangeData::Intersections(Vec::new()) }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeDocument {
    pub metadata: ExchangeMetadata,
    pub data: ExchangeData,
}

/// What an exchange import created.
#[derive(Debug, Clone, PartialEq)]
pub enum Imported {
    /// Intersection pairs, both directions of each.
    Intersections(Vec<(String, String)>),
    /// Geocollections that received feature areas.
    Areas(Vec<String>),
}

impl Imported {
    pub fn intersections(&self) -> &[(String, String)] {
        match self {
            Imported::Intersections(pairs) => pairs,
            Imported::Areas(_) => &[],
        }
    }

    pub fn areas(&self) -> &[String] {
        match self {
            Imported::Intersections(_) => &[],
            Imported::Areas(names) => names,
        }
    }
}

/// Registered collections a descriptor can refer to.
#[derive(Debug, Default)]
struct Candidates {
    geo: Vec<String>,
    topo: Vec<String>,
}

impl Candidates {
    fn names(&self) -> impl Iterator<Item = &String> { self.geo.iter().chain(&self.topo) }

    fn describe(&self) -> String {
        format!("{:?}", self.names().collect::<Vec<_>>())
    }
}

fn configuration(message: String) -> anyhow::Error {
    RegionalError::Configuration(message).into()
}

fn both_directions(pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    pairs.into_iter()
        .flat_map(|(a, b)| [(a.clone(), b.clone()), (b, a)])
        .collect()
}

impl SpatialContext {
    /// Import an exchange document from disk.
    pub fn import_exchange(&mut self, path: &Path) -> Result<Imported> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read exchange document {}", path.display()))?;
        self.import_exchange_bytes(&bytes, Some(path))
    }

    /// Import an exchange document: plain, bzip2- or gzip-compressed JSON.
    pub fn import_exchange_bytes(&mut self, bytes: &[u8], filepath: Option<&Path>) -> Result<Imported> {
        let document: ExchangeDocument = read_json_maybe_compressed(bytes)
            .context("Failed to parse exchange document")?;
        self.import_exchange_document(document, filepath)
    }

    pub fn import_exchange_document(&mut self, document: ExchangeDocument, filepath: Option<&Path>) -> Result<Imported> {
        let first = self.possible_collections(&document.metadata.first);
        let Some(second) = document.metadata.second.as_ref() else {
            let data = match document.data {
                ExchangeData::Areas(data) => data,
                ExchangeData::Intersections(data) if data.is_empty() => Vec::new(),
                ExchangeData::Intersections(_) => {
                    return Err(configuration("area document carries intersection triples".to_string()))
                }
            };
            return self.import_exchange_area(first, data, filepath).map(Imported::Areas);
        };
        let second = self.possible_collections(second);
        let ExchangeData::Intersections(data) = document.data else {
            return Err(configuration("intersection document carries area pairs".to_string()));
        };

        if let Some(name) = first.names().find(|name| second.names().any(|other| other == *name)) {
            return Err(configuration(format!("self-intersection of {name}")));
        }

        if !first.topo.is_empty() || !second.topo.is_empty() {
            return self.import_exchange_topological(first, second, data, filepath)
                .map(|pairs| Imported::Intersections(both_directions(pairs)));
        }

        let (a, b) = match (first.geo.as_slice(), second.geo.as_slice()) {
            ([a], [b]) => (a.clone(), b.clone()),
            _ => return Err(configuration(format!(
                "expected exactly one geocollection per side, found {} and {}",
                first.describe(),
                second.describe()
            ))),
        };
        if self.has_intersection(&a, &b) {
            return Err(RegionalError::AlreadyExists(format!("intersection ({a}, {b})")).into());
        }

        let meta = IntersectionMeta {
            filepath: filepath.map(Path::to_path_buf),
            first_sha256: self.geocollection(&a)?.dataset.sha256.clone(),
            second_sha256: self.geocollection(&b)?.dataset.sha256.clone(),
        };
        self.import_intersection(&a, &b, meta, relabel(data, &a, &b))?;
        Ok(Imported::Intersections(both_directions(vec![(a, b)])))
    }

    fn import_exchange_area(
        &mut self,
        candidates: Candidates,
        data: Vec<(FeatureId, f64)>,
        filepath: Option<&Path>,
    ) -> Result<Vec<String>> {
        match (candidates.geo.as_slice(), candidates.topo.is_empty()) {
            ([name], true) => {
                let name = name.clone();
                self.register_area(&name, AreaMeta { filepath: filepath.map(Path::to_path_buf) })?;
                let values = data.into_iter()
                    .map(|(feature, area)| (SpatialUnit::feature(name.as_str(), feature), area))
                    .collect();
                self.write_area(&name, values)?;
                tracing::info!(geocollection = %name, "imported feature areas");
                Ok(vec![name])
            }
            ([], false) => self.import_topographies_area(&candidates.topo, &data, filepath),
            _ => Err(configuration(format!(
                "an area document needs one geocollection or only topocollections, found {}",
                candidates.describe()
            ))),
        }
    }

    fn import_exchange_topological(
        &mut self,
        first: Candidates,
        second: Candidates,
        data: Vec<(FeatureId, FeatureId, f64)>,
        filepath: Option<&Path>,
    ) -> Result<Vec<(String, String)>> {
        if !first.topo.is_empty() && !second.topo.is_empty() {
            return Err(configuration(format!(
                "both sides are topocollections: {} and {}",
                first.describe(),
                second.describe()
            )));
        }
        let (topo, geo, data) = if first.topo.is_empty() {
            let swapped = data.into_iter().map(|(a, b, area)| (b, a, area)).collect();
            (second, first, swapped)
        } else {
            (first, second, data)
        };

        let target = match (topo.geo.is_empty(), geo.geo.as_slice()) {
            (true, [target]) => target.clone(),
            _ => return Err(configuration(format!(
                "a topological import needs topocollections on one side and one geocollection on the other, found {} and {}",
                topo.describe(),
                geo.describe()
            ))),
        };

        self.import_topographies_intersection(&topo.topo, &target, &data, filepath)
    }

    /// Geocollections and non-empty topocollections matching every
    /// non-empty attribute of `descriptor`.
    fn possible_collections(&self, descriptor: &DatasetDescriptor) -> Candidates {
        let geo = self.geocollections.iter()
            .filter(|(_, gc)| gc.dataset.matches(descriptor))
            .map(|(name, _)| name.clone())
            .collect();
        let topo = self.topocollections.iter()
            .filter(|(_, tc)| !tc.empty && tc.dataset.matches(descriptor))
            .map(|(name, _)| name.clone())
            .collect();
        Candidates { geo, topo }
    }
}
