//! Assembly of the factors of a regionalized chain.
//!
//! Every matrix is built against a row and a column [`IndexSpace`]. A space
//! is either supplied, shared with another matrix of the chain, or created
//! fresh from the entries in ascending key order. Entries outside a supplied
//! space are dropped.

use std::{collections::BTreeSet, hash::Hash};

use anyhow::Result;
use csrmat::CsrMatrix;

use crate::{
    context::SpatialContext,
    error::RegionalError,
    inventory::{Inventory, Key, Method},
    spatial::{IndexSpace, SpatialUnit},
};

/// Index space over geomap ids.
pub type UnitSpace = IndexSpace<u32>;

/// A matrix together with the spaces of its axes.
#[derive(Debug, Clone)]
pub struct Assembled<R: Hash + Eq, C: Hash + Eq> {
    pub matrix: CsrMatrix,
    pub rows: IndexSpace<R>,
    pub cols: IndexSpace<C>,
}

fn assemble<R, C>(
    label: &str,
    entries: Vec<(R, C, f64)>,
    rows: Option<&IndexSpace<R>>,
    cols: Option<&IndexSpace<C>>,
) -> Assembled<R, C>
where
    R: Hash + Eq + Clone + Ord,
    C: Hash + Eq + Clone + Ord,
{
    let rows = rows.cloned()
        .unwrap_or_else(|| IndexSpace::from_sorted(entries.iter().map(|(r, _, _)| r.clone())));
    let cols = cols.cloned()
        .unwrap_or_else(|| IndexSpace::from_sorted(entries.iter().map(|(_, c, _)| c.clone())));

    let total = entries.len();
    let triplets: Vec<(usize, usize, f64)> = entries.iter()
        .filter_map(|(r, c, v)| Some((rows.get(r)?, cols.get(c)?, *v)))
        .collect();
    let dropped = total - triplets.len();
    let matrix = CsrMatrix::from_triplets(rows.len(), cols.len(), triplets);
    tracing::debug!(matrix = label, rows = rows.len(), cols = cols.len(), nnz = matrix.nnz(), dropped, "assembled");

    Assembled { matrix, rows, cols }
}

/// Every `(source, target)` pair, self pairs included.
pub fn needed_intersections(sources: &[String], targets: &[String]) -> Vec<(String, String)> {
    sources.iter()
        .flat_map(|s| targets.iter().map(move |t| (s.clone(), t.clone())))
        .collect()
}

/// Fail with every pair in `pairs` that isn't registered.
pub fn check_intersections(ctx: &SpatialContext, pairs: &[(String, String)]) -> Result<()> {
    let missing: Vec<(String, String)> = pairs.iter()
        .filter(|(a, b)| !ctx.has_intersection(a, b))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(RegionalError::MissingIntersection(missing).into());
    }
    Ok(())
}

/// `M`: activities × inventory units, one `1` per activity at its location.
pub fn build_inventory_mapping(ctx: &SpatialContext, inventory: &Inventory) -> Result<Assembled<Key, u32>> {
    let mut entries = Vec::with_capacity(inventory.activities().len());
    for (key, location) in inventory.activities().keys().iter().zip(inventory.locations()) {
        entries.push((key.clone(), ctx.geomap_id(location)?, 1.0));
    }
    Ok(assemble("inv_mapping", entries, Some(inventory.activities()), None))
}

/// `Mₜ`: activities × faces of `topocollection`, one `1` per face of the
/// feature each activity is located in.
pub fn build_topological_mapping(
    ctx: &SpatialContext,
    inventory: &Inventory,
    topocollection: &str,
) -> Result<Assembled<Key, u32>> {
    let geocollection = &ctx.topocollection(topocollection)?.geocollection;
    let mapping = ctx.require_topography(topocollection)?;

    let mut entries = Vec::new();
    for (key, location) in inventory.activities().keys().iter().zip(inventory.locations()) {
        let faces = match location {
            SpatialUnit::Feature(collection, id) if collection == geocollection => mapping.get(id),
            _ => None,
        };
        let Some(faces) = faces else {
            return Err(RegionalError::TopologyError(format!(
                "activity {key} at {location} has no faces in {topocollection}"
            )).into());
        };
        let faces: BTreeSet<_> = faces.iter().collect();
        for face in faces {
            let id = ctx.geomap_id(&SpatialUnit::feature(topocollection, face.clone()))?;
            entries.push((key.clone(), id, 1.0));
        }
    }
    Ok(assemble("topo_mapping", entries, Some(inventory.activities()), None))
}

/// `R`: units × flows characterization factors. Without a supplied row
/// space the IA space is created from the factor locations.
pub fn build_characterization(
    ctx: &SpatialContext,
    method: &Method,
    rows: Option<&UnitSpace>,
    flows: &IndexSpace<Key>,
) -> Result<Assembled<u32, Key>> {
    let mut entries = Vec::with_capacity(method.cfs.len());
    for cf in &method.cfs {
        entries.push((ctx.geomap_id(&cf.location)?, cf.flow.clone(), cf.amount));
    }
    Ok(assemble("reg_cf", entries, rows, Some(flows)))
}

fn overlap_matrix(
    label: &str,
    ctx: &SpatialContext,
    pairs: &[(String, String)],
    rows: Option<&UnitSpace>,
    cols: Option<&UnitSpace>,
) -> Result<Assembled<u32, u32>> {
    check_intersections(ctx, pairs)?;
    let mut entries = Vec::new();
    for (first, second) in pairs {
        entries.extend(ctx.processed_intersection(first, second)?);
    }
    Ok(assemble(label, entries, rows, cols))
}

/// `G`: overlap areas from the union of `pairs`. Fails before assembly if
/// any pair is missing.
pub fn build_geo_transform(
    ctx: &SpatialContext,
    pairs: &[(String, String)],
    rows: Option<&UnitSpace>,
    cols: Option<&UnitSpace>,
) -> Result<Assembled<u32, u32>> {
    overlap_matrix("geo_transform", ctx, pairs, rows, cols)
}

/// `D`: overlaps between inventory units (or faces) and extension units.
pub fn build_distribution(
    ctx: &SpatialContext,
    pairs: &[(String, String)],
    rows: Option<&UnitSpace>,
    cols: Option<&UnitSpace>,
) -> Result<Assembled<u32, u32>> {
    overlap_matrix("distribution", ctx, pairs, rows, cols)
}

/// `L`: diagonal loading over the IA space.
pub fn build_loading(ctx: &SpatialContext, name: &str, ia: &UnitSpace) -> Result<CsrMatrix> {
    let entries = ctx.processed_loading(name)?;
    Ok(assemble("loading", entries, Some(ia), Some(ia)).matrix)
}

/// `X`: diagonal extension table over the extension space.
pub fn build_extension_table(ctx: &SpatialContext, name: &str, xtable: &UnitSpace) -> Result<CsrMatrix> {
    let entries = ctx.processed_extension_table(name)?;
    Ok(assemble("xtable", entries, Some(xtable), Some(xtable)).matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{inventory::InventoryDatabase, meta::{DatasetSpec, IntersectionMeta}, topography::TopoMapping};

    fn strings(names: &[&str]) -> Vec<String> { names.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn needed_pairs_are_the_full_product() {
        let pairs = needed_intersections(&strings(&["a", "b"]), &strings(&["b", "c"]));
        assert_eq!(pairs.len(), 4);
        assert!(pairs.contains(&("b".to_string(), "b".to_string())));
    }

    #[test]
    fn missing_pairs_are_all_listed() {
        let mut ctx = SpatialContext::in_memory();
        ctx.create_empty_intersection("a", "c").unwrap();
        let pairs = needed_intersections(&strings(&["a", "b"]), &strings(&["c", "d"]));
        let err = check_intersections(&ctx, &pairs).unwrap_err();
        assert_eq!(
            err.downcast_ref::<RegionalError>(),
            Some(&RegionalError::MissingIntersection(vec![
                ("a".into(), "d".into()),
                ("b".into(), "c".into()),
                ("b".into(), "d".into()),
            ]))
        );
    }

    #[test]
    fn supplied_spaces_drop_foreign_entries() {
        let mut ctx = SpatialContext::in_memory();
        let unit = SpatialUnit::named;
        ctx.import_intersection("places", "regions", IntersectionMeta::default(), vec![
            (unit("L"), unit("A"), 1.0),
            (unit("M"), unit("B"), 3.0),
        ]).unwrap();
        let l = ctx.geomap(&unit("L")).unwrap();
        let a = ctx.geomap(&unit("A")).unwrap();

        let pairs = vec![("places".to_string(), "regions".to_string())];
        let fresh = build_geo_transform(&ctx, &pairs, None, None).unwrap();
        assert_eq!(fresh.matrix.shape(), (2, 2));
        assert_eq!(fresh.matrix.sum(), 4.0);

        let rows = IndexSpace::from_sorted([l]);
        let cols = IndexSpace::from_sorted([a]);
        let limited = build_geo_transform(&ctx, &pairs, Some(&rows), Some(&cols)).unwrap();
        assert_eq!(limited.matrix.shape(), (1, 1));
        assert_eq!(limited.matrix.sum(), 1.0);
    }

    #[test]
    fn activities_without_faces_are_a_topology_error() {
        let mut ctx = SpatialContext::in_memory();
        ctx.register_geocollection("places", DatasetSpec::default()).unwrap();
        ctx.register_topocollection("topo", "places", DatasetSpec::default()).unwrap();
        let mapping: TopoMapping = [("L".into(), vec![1.into()])].into_iter().collect();
        ctx.write_topography("topo", mapping).unwrap();
        ctx.add_database(
            InventoryDatabase::new("inventory")
                .process("U", SpatialUnit::feature("places", "L"), &[])
                .process("V", "GLO", &[]),
        ).unwrap();

        let databases = ["inventory".to_string()].into_iter().collect();
        let inventory = Inventory::calculate(&ctx, &[], &databases).unwrap();
        let err = build_topological_mapping(&ctx, &inventory, "topo").unwrap_err();
        assert!(matches!(err.downcast_ref::<RegionalError>(), Some(RegionalError::TopologyError(_))));
    }
}
