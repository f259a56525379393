mod geomap;
mod index;
mod unit;

pub use geomap::Geomapping;
pub use index::IndexSpace;
pub use unit::{FeatureId, SpatialUnit};
