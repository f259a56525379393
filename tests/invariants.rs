//! Properties every registered state and every calculation should have.
mod common;

use common::*;
use regional_lcia::{RegionalLca, Scale, Variant};

#[test]
fn every_intersection_has_its_reverse() {
    for ctx in [two_scale_context(), extension_table_context(), topological_context()] {
        for (first, second) in ctx.intersections().keys() {
            assert!(ctx.has_intersection(second, first), "({second}, {first}) missing");
            let forward = ctx.load_intersection(first, second).unwrap();
            let mut reversed: Vec<_> = ctx.load_intersection(second, first).unwrap()
                .into_iter()
                .map(|(a, b, area)| (b, a, area))
                .collect();
            reversed.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mut forward = forward;
            forward.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_eq!(forward, reversed);
        }
    }
}

#[test]
fn scales_agree_with_the_score() {
    let demand = [(activity("U"), 1.5), (activity("V"), 0.5)];
    let cases = [
        (two_scale_context(), Variant::TwoSpatialScales),
        (loading_context(), Variant::loading("background")),
        (extension_table_context(), Variant::extension_tables("density")),
    ];
    for (ctx, variant) in cases {
        let scales = variant.scales();
        let mut lca = RegionalLca::new(&ctx, &demand, "regional", variant).unwrap();
        let score = lca.lcia().unwrap();
        assert!(score > 0.0);
        for &scale in scales {
            assert_close(lca.results(scale).unwrap().total(), score);
        }
    }
}

#[test]
fn transport_rows_sum_to_one() {
    let ctx = two_scale_context();
    let mut lca = RegionalLca::new(&ctx, &[(activity("U"), 1.0)], "regional", Variant::TwoSpatialScales).unwrap();
    lca.load_lcia_data().unwrap();
    let normalized = lca.factor("geo_transform_normalization").unwrap()
        .matmul(lca.factor("geo_transform").unwrap());
    for sum in normalized.row_sums() {
        assert_close(sum, 1.0);
    }
}

#[test]
fn one_scale_has_only_the_inventory_scale() {
    assert_eq!(Variant::OneSpatialScale.scales(), &[Scale::Inventory]);
    let ctx = one_scale_context();
    let mut lca = RegionalLca::new(&ctx, &[(activity("U"), 2.0)], "inventory-scale", Variant::OneSpatialScale).unwrap();
    assert_close(lca.lcia().unwrap(), 6.0);
    assert_close(lca.results_inv_spatial_scale().unwrap().total(), 6.0);
}

fn assert_mirrored(ctx: &regional_lcia::SpatialContext, first: &str, second: &str) {
    let mut forward = ctx.load_intersection(first, second).unwrap();
    let mut reversed: Vec<_> = ctx.load_intersection(second, first).unwrap()
        .into_iter()
        .map(|(a, b, area)| (b, a, area))
        .collect();
    forward.sort_by(|a, b| a.partial_cmp(b).unwrap());
    reversed.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(forward, reversed);
}

#[test]
fn rewrites_and_empty_pairs_keep_both_directions() {
    let mut ctx = two_scale_context();
    ctx.write_intersection("places", "regions", vec![(unit("L"), unit("A"), 5.0)]).unwrap();
    assert_mirrored(&ctx, "places", "regions");
    assert_eq!(ctx.load_intersection("regions", "places").unwrap(), vec![(unit("A"), unit("L"), 5.0)]);

    ctx.create_empty_intersection("places", "elsewhere").unwrap();
    assert!(ctx.has_intersection("elsewhere", "places"));
    assert_mirrored(&ctx, "places", "elsewhere");

    // Only L → A is left, so U keeps its score and V loses it.
    let demand = [(activity("U"), 1.0), (activity("V"), 1.0)];
    let mut lca = RegionalLca::new(&ctx, &demand, "regional", Variant::TwoSpatialScales).unwrap();
    assert_close(lca.lcia().unwrap(), 3.0);
}
