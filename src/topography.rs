//! Topographies: feature→faces mappings of topocollections, and the merge
//! that folds face-level overlaps back onto geocollection features.

use std::{collections::{BTreeMap, BTreeSet}, path::Path};

use ahash::AHashMap;
use anyhow::{Context, Result};

use crate::{
    common::{read_json_maybe_compressed, sha256_file, write_json_gzip},
    context::{DataKind, SpatialContext},
    error::RegionalError,
    intersection::OverlapTriple,
    meta::{AreaMeta, DatasetSpec, IntersectionMeta},
    spatial::{FeatureId, SpatialUnit},
};

/// Feature id → ids of the faces that make up the feature.
pub type TopoMapping = BTreeMap<FeatureId, Vec<FeatureId>>;

/// Sum face-level overlaps per `(feature, counterpart)`.
///
/// A face listed for several features counts for each of them; a face listed
/// twice for the same feature counts once. Faces missing from `mapping` are
/// dropped. Output is sorted by feature, then counterpart.
pub fn merge<T: Ord + Clone>(data: &[(FeatureId, T, f64)], mapping: &TopoMapping) -> Vec<(FeatureId, T, f64)> {
    let mut by_face: AHashMap<&FeatureId, Vec<(&T, f64)>> = AHashMap::new();
    for (face, other, area) in data {
        by_face.entry(face).or_default().push((other, *area));
    }

    let mut merged: BTreeMap<(FeatureId, T), f64> = BTreeMap::new();
    for (feature, faces) in mapping {
        let faces: BTreeSet<&FeatureId> = faces.iter().collect();
        for face in faces {
            let Some(overlaps) = by_face.get(face) else { continue };
            for &(other, area) in overlaps {
                *merged.entry((feature.clone(), other.clone())).or_insert(0.0) += area;
            }
        }
    }

    merged.into_iter()
        .map(|((feature, other), area)| (feature, other, area))
        .collect()
}

/// Sum face areas per feature, with the same face rules as [`merge`].
pub fn merge_areas(data: &[(FeatureId, f64)], mapping: &TopoMapping) -> Vec<(FeatureId, f64)> {
    let keyed: Vec<(FeatureId, (), f64)> = data.iter().map(|(face, area)| (face.clone(), (), *area)).collect();
    merge(&keyed, mapping)
        .into_iter()
        .map(|(feature, (), area)| (feature, area))
        .collect()
}

/// Qualify bare feature ids with their collection names.
pub fn relabel(data: Vec<(FeatureId, FeatureId, f64)>, first: &str, second: &str) -> Vec<OverlapTriple> {
    data.into_iter()
        .map(|(a, b, area)| (SpatialUnit::feature(first, a), SpatialUnit::feature(second, b), area))
        .collect()
}

impl SpatialContext {
    /// Store the feature→faces mapping of a topocollection; it is no longer
    /// empty afterwards. Every face is geomapped as `(topocollection, face)`.
    pub fn write_topography(&mut self, name: &str, mapping: TopoMapping) -> Result<()> {
        self.topocollection(name)?;
        let faces: BTreeSet<SpatialUnit> = mapping.values()
            .flatten()
            .map(|face| SpatialUnit::feature(name, face.clone()))
            .collect();
        self.geomap_all(&faces)?;

        let entries: Vec<(&FeatureId, &Vec<FeatureId>)> = mapping.iter().collect();
        let bytes = write_json_gzip(&entries)?;
        self.store_mut().put(&Self::raw_path(DataKind::Topography, name)?, &bytes)
            .with_context(|| format!("Failed to write topography {name}"))?;
        if let Some(record) = self.topocollections.get_mut(&name.to_string()) {
            record.empty = false;
        }
        self.flush_topocollections()?;
        tracing::debug!(topocollection = name, features = mapping.len(), faces = faces.len(), "wrote topography");
        Ok(())
    }

    /// Feature→faces mapping of a topocollection; empty if none was written.
    pub fn load_topography(&self, name: &str) -> Result<TopoMapping> {
        if self.topocollection(name)?.empty {
            return Ok(TopoMapping::new());
        }
        let bytes = self.store().get(&Self::raw_path(DataKind::Topography, name)?)
            .with_context(|| format!("Failed to read topography {name}"))?;
        let entries: Vec<(FeatureId, Vec<FeatureId>)> = read_json_maybe_compressed(&bytes)?;
        Ok(entries.into_iter().collect())
    }

    /// Non-empty mapping of a topocollection, or a topology error.
    pub(crate) fn require_topography(&self, name: &str) -> Result<TopoMapping> {
        let mapping = self.load_topography(name)?;
        if mapping.is_empty() {
            return Err(RegionalError::TopologyError(format!(
                "no topographical mapping data available for {name}"
            )).into());
        }
        Ok(mapping)
    }

    /// Import face-level overlaps between topocollection `name` and
    /// `target`, a geocollection. Creates the intersection between the
    /// topocollection's own geocollection and `target`, and its reverse.
    pub fn import_topography_intersection(
        &mut self,
        name: &str,
        target: &str,
        data: &[(FeatureId, FeatureId, f64)],
        filepath: Option<&Path>,
    ) -> Result<(String, String)> {
        let mut pairs = self.import_topographies_intersection(&[name.to_string()], target, data, filepath)?;
        pairs.pop().ok_or_else(|| RegionalError::TopologyError(format!("nothing merged for {name}")).into())
    }

    /// Import face-level overlaps shared by several topocollections (one face
    /// dataset refining several geocollections) against `target`. Faces are
    /// merged per geocollection; topocollections of the same geocollection
    /// are combined into one mapping. Returns one pair per geocollection.
    pub fn import_topographies_intersection(
        &mut self,
        names: &[String],
        target: &str,
        data: &[(FeatureId, FeatureId, f64)],
        filepath: Option<&Path>,
    ) -> Result<Vec<(String, String)>> {
        self.geocollection(target)?;
        let grouped = self.mappings_by_geocollection(names)?;
        if let Some(ours) = grouped.keys().find(|ours| self.has_intersection(ours, target)) {
            return Err(RegionalError::AlreadyExists(format!("intersection ({ours}, {target})")).into());
        }

        let mut pairs = Vec::with_capacity(grouped.len());
        for (ours, mapping) in grouped {
            let merged = merge(data, &mapping);
            tracing::info!(geocollection = %ours, target, features = merged.len(), "merged topographical faces");
            let meta = IntersectionMeta {
                filepath: filepath.map(Path::to_path_buf),
                first_sha256: self.geocollection(&ours)?.dataset.sha256.clone(),
                second_sha256: self.geocollection(target)?.dataset.sha256.clone(),
            };
            self.import_intersection(&ours, target, meta, relabel(merged, &ours, target))?;
            pairs.push((ours, target.to_string()));
        }
        Ok(pairs)
    }

    /// Import face areas shared by `names` as feature areas of their
    /// geocollections. Returns the geocollections that received areas.
    pub fn import_topographies_area(
        &mut self,
        names: &[String],
        data: &[(FeatureId, f64)],
        filepath: Option<&Path>,
    ) -> Result<Vec<String>> {
        let grouped = self.mappings_by_geocollection(names)?;
        if let Some(ours) = grouped.keys().find(|ours| self.areas.contains(*ours)) {
            return Err(RegionalError::AlreadyExists(format!("area of {ours}")).into());
        }

        let mut collections = Vec::with_capacity(grouped.len());
        for (ours, mapping) in grouped {
            let merged: Vec<(SpatialUnit, f64)> = merge_areas(data, &mapping)
                .into_iter()
                .map(|(feature, area)| (SpatialUnit::feature(ours.as_str(), feature), area))
                .collect();
            tracing::info!(geocollection = %ours, features = merged.len(), "merged topographical face areas");
            self.register_area(&ours, AreaMeta { filepath: filepath.map(Path::to_path_buf) })?;
            self.write_area(&ours, merged)?;
            collections.push(ours);
        }
        Ok(collections)
    }

    /// Non-empty mappings of `names`, combined per linked geocollection.
    fn mappings_by_geocollection(&self, names: &[String]) -> Result<BTreeMap<String, TopoMapping>> {
        let mut grouped: BTreeMap<String, TopoMapping> = BTreeMap::new();
        for name in names {
            let ours = self.topocollection(name)?.geocollection.clone();
            self.geocollection(&ours)?;
            let combined = grouped.entry(ours).or_default();
            for (feature, faces) in self.require_topography(name)? {
                combined.entry(feature).or_default().extend(faces);
            }
        }
        Ok(grouped)
    }

    /// Register a topocollection and write its mapping, unless the face file
    /// doesn't have the expected hash. Returns whether it was installed.
    pub fn install_topography(
        &mut self,
        name: &str,
        geocollection: &str,
        spec: DatasetSpec,
        expected_sha256: &str,
        mapping: TopoMapping,
    ) -> Result<bool> {
        let Some(path) = spec.filepath.as_deref() else {
            return Err(RegionalError::MissingSpatialSourceData(name.to_string()).into());
        };
        let found = sha256_file(path)?;
        if found != expected_sha256 {
            tracing::warn!(
                topocollection = name,
                path = %path.display(),
                expected = expected_sha256,
                found = %found,
                "topography face file has unexpected hash; skipping"
            );
            return Ok(false);
        }
        self.register_topocollection(name, geocollection, spec)?;
        self.write_topography(name, mapping)?;
        tracing::info!(topocollection = name, geocollection, "installed topography");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> FeatureId { FeatureId::from(s) }

    #[test]
    fn merge_sums_faces_per_feature() {
        let mapping: TopoMapping = [
            (id("foo"), vec![1.into(), 2.into(), 3.into()]),
            (id("bar"), vec![3.into(), 4.into(), 5.into()]),
        ].into_iter().collect();
        let data = vec![
            (FeatureId::Int(1), "up", 1.0),
            (FeatureId::Int(3), "up", 2.0),
            (FeatureId::Int(3), "down", 4.0),
            (FeatureId::Int(4), "down", 8.0),
        ];
        assert_eq!(merge(&data, &mapping), vec![
            (id("bar"), "down", 12.0),
            (id("bar"), "up", 2.0),
            (id("foo"), "down", 4.0),
            (id("foo"), "up", 3.0),
        ]);
    }

    #[test]
    fn merge_drops_unmapped_faces_and_duplicate_listings() {
        let mapping: TopoMapping = [(id("a"), vec![1.into(), 1.into()])].into_iter().collect();
        let data = vec![(FeatureId::Int(1), 0, 2.0), (FeatureId::Int(9), 0, 5.0)];
        assert_eq!(merge(&data, &mapping), vec![(id("a"), 0, 2.0)]);
    }

    #[test]
    fn face_areas_sum_per_feature() {
        let mapping: TopoMapping = [
            (id("foo"), vec![1.into(), 2.into()]),
            (id("bar"), vec![2.into(), 2.into()]),
        ].into_iter().collect();
        let data = vec![(FeatureId::Int(1), 1.5), (FeatureId::Int(2), 2.0), (FeatureId::Int(7), 9.0)];
        assert_eq!(merge_areas(&data, &mapping), vec![(id("bar"), 2.0), (id("foo"), 3.5)]);
    }

    fn shared_faces_context() -> SpatialContext {
        let mut ctx = SpatialContext::in_memory();
        for name in ["countries", "provinces", "cfs"] {
            ctx.register_geocollection(name, DatasetSpec::default()).unwrap();
        }
        ctx.register_topocollection("countries-topo", "countries", DatasetSpec::default()).unwrap();
        ctx.register_topocollection("provinces-topo", "provinces", DatasetSpec::default()).unwrap();
        ctx.write_topography("countries-topo", [(id("GH"), vec![1.into(), 2.into()])].into_iter().collect()).unwrap();
        ctx.write_topography("provinces-topo", [
            (id("north"), vec![1.into()]),
            (id("south"), vec![2.into()]),
        ].into_iter().collect()).unwrap();
        ctx
    }

    #[test]
    fn shared_faces_feed_every_geocollection() {
        let mut ctx = shared_faces_context();
        let names = vec!["countries-topo".to_string(), "provinces-topo".to_string()];
        let data = vec![
            (FeatureId::Int(1), FeatureId::Int(10), 1.5),
            (FeatureId::Int(2), FeatureId::Int(10), 2.5),
        ];
        let pairs = ctx.import_topographies_intersection(&names, "cfs", &data, None).unwrap();
        assert_eq!(pairs, vec![
            ("countries".to_string(), "cfs".to_string()),
            ("provinces".to_string(), "cfs".to_string()),
        ]);
        assert_eq!(
            ctx.load_intersection("countries", "cfs").unwrap(),
            vec![(SpatialUnit::feature("countries", "GH"), SpatialUnit::feature("cfs", 10), 4.0)]
        );
        assert_eq!(
            ctx.load_intersection("cfs", "provinces").unwrap(),
            vec![
                (SpatialUnit::feature("cfs", 10), SpatialUnit::feature("provinces", "north"), 1.5),
                (SpatialUnit::feature("cfs", 10), SpatialUnit::feature("provinces", "south"), 2.5),
            ]
        );
    }

    #[test]
    fn topocollections_of_one_geocollection_are_combined() {
        let mut ctx = shared_faces_context();
        ctx.register_topocollection("countries-extra", "countries", DatasetSpec::default()).unwrap();
        ctx.write_topography("countries-extra", [(id("TG"), vec![3.into()])].into_iter().collect()).unwrap();

        let names = vec!["countries-topo".to_string(), "countries-extra".to_string()];
        let data = vec![(FeatureId::Int(1), 1.0), (FeatureId::Int(3), 4.0)];
        let collections = ctx.import_topographies_area(&names, &data, None).unwrap();
        assert_eq!(collections, vec!["countries".to_string()]);
        assert_eq!(ctx.load_area("countries").unwrap(), vec![
            (SpatialUnit::feature("countries", "GH"), 1.0),
            (SpatialUnit::feature("countries", "TG"), 4.0),
        ]);

        let again = ctx.import_topographies_area(&names, &data, None).unwrap_err();
        assert!(matches!(again.downcast_ref::<RegionalError>(), Some(RegionalError::AlreadyExists(_))));
    }

    #[test]
    fn empty_topography_is_a_topology_error() {
        let mut ctx = SpatialContext::in_memory();
        ctx.register_geocollection("countries", DatasetSpec::default()).unwrap();
        ctx.register_geocollection("cfs", DatasetSpec::default()).unwrap();
        ctx.register_topocollection("countries-topo", "countries", DatasetSpec::default()).unwrap();

        let err = ctx.import_topography_intersection("countries-topo", "cfs", &[], None).unwrap_err();
        assert!(matches!(err.downcast_ref::<RegionalError>(), Some(RegionalError::TopologyError(_))));
    }

    #[test]
    fn import_relabels_and_reverses() {
        let mut ctx = SpatialContext::in_memory();
        ctx.register_geocollection("countries", DatasetSpec::default()).unwrap();
        ctx.register_geocollection("cfs", DatasetSpec::default()).unwrap();
        ctx.register_topocollection("countries-topo", "countries", DatasetSpec::default()).unwrap();
        ctx.write_topography("countries-topo", [
            (id("GH"), vec![1.into(), 2.into()]),
        ].into_iter().collect()).unwrap();
        assert!(!ctx.topocollection("countries-topo").unwrap().empty);

        let data = vec![
            (FeatureId::Int(1), FeatureId::Int(10), 1.5),
            (FeatureId::Int(2), FeatureId::Int(10), 2.5),
            (FeatureId::Int(2), FeatureId::Int(11), 1.0),
        ];
        let pair = ctx.import_topography_intersection("countries-topo", "cfs", &data, None).unwrap();
        assert_eq!(pair, ("countries".to_string(), "cfs".to_string()));

        let triples = ctx.load_intersection("countries", "cfs").unwrap();
        assert_eq!(triples, vec![
            (SpatialUnit::feature("countries", "GH"), SpatialUnit::feature("cfs", 10), 4.0),
            (SpatialUnit::feature("countries", "GH"), SpatialUnit::feature("cfs", 11), 1.0),
        ]);
        assert!(ctx.has_intersection("cfs", "countries"));

        let again = ctx.import_topography_intersection("countries-topo", "cfs", &data, None).unwrap_err();
        assert!(matches!(again.downcast_ref::<RegionalError>(), Some(RegionalError::AlreadyExists(_))));
    }

    #[test]
    fn install_skips_on_hash_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let faces = dir.path().join("faces.gpkg");
        std::fs::write(&faces, b"faces").unwrap();

        let mut ctx = SpatialContext::in_memory();
        ctx.register_geocollection("world", DatasetSpec::default()).unwrap();
        let mapping: TopoMapping = [(id("RER"), vec![1.into()])].into_iter().collect();

        let installed = ctx.install_topography("world-topo", "world", DatasetSpec::file(&faces), "0000", mapping.clone()).unwrap();
        assert!(!installed);
        assert!(ctx.topocollection("world-topo").is_err());

        let hash = crate::common::sha256_bytes(b"faces");
        let installed = ctx.install_topography("world-topo", "world", DatasetSpec::file(&faces), &hash, mapping).unwrap();
        assert!(installed);
        assert_eq!(ctx.load_topography("world-topo").unwrap().len(), 1);
    }
}
