mod build;
mod normalize;

pub use build::{
    Assembled, UnitSpace, build_characterization, build_distribution, build_extension_table, build_geo_transform,
    build_inventory_mapping, build_loading, build_topological_mapping, check_intersections, needed_intersections,
};
pub use normalize::{loading_normalization, reciprocal, row_normalization};
