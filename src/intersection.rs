//! Directed areal-overlap relations between two spatial datasets.
//!
//! Every write of `(first, second)` also writes the reversed
//! `(second, first)` relation, so both directions always hold the same
//! triples with swapped columns.

use anyhow::{Context, Result, bail, ensure};

use crate::{
    common::{read_json_maybe_compressed, write_json_gzip},
    context::{DataKind, SpatialContext},
    meta::IntersectionMeta,
    spatial::SpatialUnit,
    store::{Triples, read_triples_bytes, write_triples_bytes},
};

/// `(unit in first, unit in second, overlap area)`.
pub type OverlapTriple = (SpatialUnit, SpatialUnit, f64);

impl SpatialContext {
    /// Register (or replace) the metadata of `(first, second)` and the
    /// mirrored metadata of `(second, first)`.
    pub fn register_intersection(&mut self, first: &str, second: &str, meta: IntersectionMeta) -> Result<()> {
        ensure!(first != second, "Self-intersection of {first} is not allowed");
        self.intersections.insert((second.to_string(), first.to_string()), meta.reversed());
        self.intersections.insert((first.to_string(), second.to_string()), meta);
        self.flush_intersections()
    }

    /// Store raw overlap triples for `(first, second)` and, with swapped
    /// columns, for `(second, first)`, then process both.
    ///
    /// Every unit in both columns is geomapped before anything is persisted.
    /// Registers the pair with default metadata if needed.
    pub fn write_intersection(&mut self, first: &str, second: &str, triples: Vec<OverlapTriple>) -> Result<()> {
        ensure!(first != second, "Self-intersection of {first} is not allowed");
        if let Some((a, b, area)) = triples.iter().find(|(_, _, area)| area.is_nan() || *area < 0.0) {
            bail!("Overlap area between {a} and {b} must be non-negative, got {area}");
        }
        self.geomap_all(triples.iter().flat_map(|(a, b, _)| [a, b]))?;

        if !self.has_intersection(first, second) {
            self.register_intersection(first, second, IntersectionMeta::default())?;
        } else if !self.has_intersection(second, first) {
            let meta = self.intersection_meta(first, second)?.clone();
            self.register_intersection(first, second, meta)?;
        }

        let reversed: Vec<OverlapTriple> = triples.iter()
            .map(|(a, b, area)| (b.clone(), a.clone(), *area))
            .collect();
        self.write_direction(first, second, &triples)?;
        self.write_direction(second, first, &reversed)
    }

    fn write_direction(&mut self, first: &str, second: &str, triples: &[OverlapTriple]) -> Result<()> {
        let name = Self::pair_name(first, second);
        let bytes = write_json_gzip(&triples)?;
        self.store_mut().put(&Self::raw_path(DataKind::Intersection, &name)?, &bytes)
            .with_context(|| format!("Failed to write intersection ({first}, {second})"))?;
        tracing::debug!(first, second, triples = triples.len(), "wrote intersection");
        self.process_intersection(first, second)
    }

    /// Raw overlap triples of `(first, second)`.
    pub fn load_intersection(&self, first: &str, second: &str) -> Result<Vec<OverlapTriple>> {
        self.intersection_meta(first, second)?;
        let name = Self::pair_name(first, second);
        let bytes = self.store().get(&Self::raw_path(DataKind::Intersection, &name)?)
            .with_context(|| format!("Failed to read intersection ({first}, {second})"))?;
        read_json_maybe_compressed(&bytes)
    }

    /// Turn the raw triples into `(geomap row, geomap col, area)` arrays.
    pub fn process_intersection(&mut self, first: &str, second: &str) -> Result<()> {
        let triples = self.load_intersection(first, second)?;
        let processed = triples.iter()
            .map(|(a, b, area)| -> Result<(u32, u32, f64)> {
                Ok((self.geomap_id(a)?, self.geomap_id(b)?, *area))
            })
            .collect::<Result<Triples>>()?;
        let name = Self::pair_name(first, second);
        let bytes = write_triples_bytes(&processed)?;
        self.store_mut().put(&Self::processed_path(DataKind::Intersection, &name)?, &bytes)
    }

    /// Processed geomap-id triples of `(first, second)`.
    pub fn processed_intersection(&self, first: &str, second: &str) -> Result<Triples> {
        self.intersection_meta(first, second)?;
        let name = Self::pair_name(first, second);
        let bytes = self.store().get(&Self::processed_path(DataKind::Intersection, &name)?)
            .with_context(|| format!("Intersection ({first}, {second}) has not been processed"))?;
        read_triples_bytes(&bytes)
    }

    /// Rebuild `(second, first)` from `(first, second)`: swapped columns,
    /// same areas, mirrored metadata.
    pub fn create_reversed_intersection(&mut self, first: &str, second: &str) -> Result<(String, String)> {
        let meta = self.intersection_meta(first, second)?.clone();
        let triples = self.load_intersection(first, second)?;
        self.register_intersection(first, second, meta)?;
        self.write_intersection(first, second, triples)?;
        Ok((second.to_string(), first.to_string()))
    }

    /// Write an intersection and its reverse with `meta` in one step.
    pub fn import_intersection(
        &mut self,
        first: &str,
        second: &str,
        meta: IntersectionMeta,
        triples: Vec<OverlapTriple>,
    ) -> Result<()> {
        self.register_intersection(first, second, meta)?;
        self.write_intersection(first, second, triples)?;
        tracing::info!(first, second, "imported intersection");
        Ok(())
    }

    /// Register an intersection (both directions) with no overlap data,
    /// e.g. between collections known not to overlap.
    pub fn create_empty_intersection(&mut self, first: &str, second: &str) -> Result<()> {
        self.write_intersection(first, second, Vec::new())
    }
}
