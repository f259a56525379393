//! Shared fixtures: places L-O overlap regions A-C, two flows F and G.
#![allow(dead_code)]

use regional_lcia::{
    DatasetSpec, ExtensionTableMeta, FeatureId, IntersectionMeta, InventoryDatabase, Key, LoadingMeta, Method,
    OverlapTriple, SpatialContext, SpatialUnit, TopoMapping,
};

pub fn key(database: &str, code: &str) -> Key { Key::new(database, code) }

pub fn flow(code: &str) -> Key { key("biosphere", code) }

pub fn activity(code: &str) -> Key { key("inventory", code) }

pub fn unit(name: &str) -> SpatialUnit { SpatialUnit::named(name) }

pub fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

pub fn biosphere() -> InventoryDatabase {
    InventoryDatabase::new("biosphere")
        .with_geocollections(&[])
        .emission("F")
        .emission("G")
}

/// U at L emits one unit of each flow; the other activities emit nothing.
pub fn inventory() -> InventoryDatabase {
    InventoryDatabase::new("inventory")
        .with_depends(&["biosphere"])
        .with_geocollections(&["places"])
        .process("U", "L", &[(flow("F"), 1.0), (flow("G"), 1.0)])
        .process("V", "M", &[(flow("F"), 1.0)])
        .process("X", "N", &[])
        .process("Y", "O", &[])
        .process("Z", "O", &[])
}

pub fn places_to_regions() -> Vec<OverlapTriple> {
    vec![
        (unit("L"), unit("A"), 1.0),
        (unit("M"), unit("A"), 2.0),
        (unit("M"), unit("B"), 3.0),
        (unit("N"), unit("B"), 5.0),
        (unit("N"), unit("C"), 8.0),
        (unit("O"), unit("C"), 13.0),
    ]
}

pub fn regional_method() -> Method {
    Method::new("regional")
        .with_geocollections(&["regions"])
        .cf(flow("F"), 1.0, "A")
        .cf(flow("F"), 3.0, "B")
        .cf(flow("F"), 5.0, "C")
        .cf(flow("G"), 2.0, "A")
        .cf(flow("G"), 4.0, "B")
        .cf(flow("G"), 6.0, "C")
}

fn base_context() -> SpatialContext {
    let mut ctx = SpatialContext::in_memory();
    for name in ["places", "regions"] {
        ctx.register_geocollection(name, DatasetSpec::default()).unwrap();
    }
    ctx.add_database(biosphere()).unwrap();
    ctx
}

pub fn two_scale_context() -> SpatialContext {
    let mut ctx = SpatialContext::in_memory();
    populate_two_scales(&mut ctx);
    ctx
}

/// Places, regions, their intersection, the inventory and the regional method.
pub fn populate_two_scales(ctx: &mut SpatialContext) {
    for name in ["places", "regions"] {
        ctx.register_geocollection(name, DatasetSpec::default()).unwrap();
    }
    ctx.add_database(biosphere()).unwrap();
    ctx.import_intersection("places", "regions", IntersectionMeta::default(), places_to_regions()).unwrap();
    ctx.add_database(inventory()).unwrap();
    ctx.add_method(regional_method()).unwrap();
}

pub fn loading_context() -> SpatialContext {
    let mut ctx = two_scale_context();
    ctx.register_loading("background", LoadingMeta {
        geocollection: Some("regions".into()),
        description: None,
    }).unwrap();
    ctx.write_loading("background", vec![(unit("A"), 2.0), (unit("B"), 4.0), (unit("C"), 8.0)]).unwrap();
    ctx
}

pub fn one_scale_context() -> SpatialContext {
    let mut ctx = base_context();
    ctx.add_database(inventory()).unwrap();
    ctx.add_method(
        Method::new("inventory-scale")
            .with_geocollections(&["places"])
            .cf(flow("F"), 1.0, "L")
            .cf(flow("G"), 2.0, "L"),
    ).unwrap();
    ctx
}

fn register_grid(ctx: &mut SpatialContext) {
    ctx.register_geocollection("grid", DatasetSpec::default()).unwrap();
    ctx.import_intersection("grid", "regions", IntersectionMeta::default(), vec![
        (unit("g1"), unit("A"), 1.0),
        (unit("g2"), unit("A"), 1.0),
        (unit("g2"), unit("B"), 1.0),
        (unit("g3"), unit("B"), 4.0),
    ]).unwrap();
    ctx.register_extension_table("density", ExtensionTableMeta {
        geocollection: "grid".into(),
        description: Some("relative density".into()),
    }).unwrap();
    ctx.write_extension_table("density", vec![(unit("g1"), 1.0), (unit("g2"), 3.0), (unit("g3"), 0.5)]).unwrap();
    ctx.add_method(
        Method::new("regional")
            .with_geocollections(&["regions"])
            .cf(flow("F"), 1.0, "A")
            .cf(flow("G"), 2.0, "A")
            .cf(flow("F"), 3.0, "B")
            .cf(flow("G"), 4.0, "B"),
    ).unwrap();
}

pub fn extension_table_context() -> SpatialContext {
    let mut ctx = base_context();
    register_grid(&mut ctx);
    ctx.import_intersection("places", "grid", IntersectionMeta::default(), vec![
        (unit("L"), unit("g1"), 1.0),
        (unit("L"), unit("g2"), 1.0),
        (unit("M"), unit("g2"), 2.0),
        (unit("M"), unit("g3"), 2.0),
    ]).unwrap();
    ctx.add_database(
        InventoryDatabase::new("inventory")
            .with_depends(&["biosphere"])
            .with_geocollections(&["places"])
            .process("U", "L", &[(flow("F"), 1.0), (flow("G"), 1.0)])
            .process("V", "M", &[(flow("F"), 1.0)]),
    ).unwrap();
    ctx
}

pub fn topological_context() -> SpatialContext {
    let mut ctx = base_context();
    register_grid(&mut ctx);
    ctx.register_topocollection("places-topo", "places", DatasetSpec::default()).unwrap();
    let mapping: TopoMapping = [(FeatureId::from("L"), vec![FeatureId::from("f1"), FeatureId::from("f2")])]
        .into_iter()
        .collect();
    ctx.write_topography("places-topo", mapping).unwrap();
    ctx.import_intersection("places-topo", "grid", IntersectionMeta::default(), vec![
        (SpatialUnit::feature("places-topo", "f1"), unit("g1"), 1.0),
        (SpatialUnit::feature("places-topo", "f2"), unit("g2"), 1.0),
    ]).unwrap();
    ctx.add_database(
        InventoryDatabase::new("inventory")
            .with_depends(&["biosphere"])
            .with_geocollections(&["places"])
            .process("U", SpatialUnit::feature("places", "L"), &[(flow("F"), 1.0), (flow("G"), 1.0)]),
    ).unwrap();
    ctx
}
