#![doc = "Regionalized life-cycle impact assessment public API"]
mod common;
mod config;
mod context;
mod error;
mod exchange;
mod intersection;
mod inventory;
mod lca;
mod loading;
mod matrix;
mod meta;
#[cfg(feature = "remote")]
mod remote;
mod spatial;
mod store;
mod topography;

#[doc(inline)]
pub use config::{DEFAULT_REMOTE_URL, Settings};

#[doc(inline)]
pub use context::SpatialContext;

#[doc(inline)]
pub use error::RegionalError;

#[doc(inline)]
pub use spatial::{FeatureId, Geomapping, IndexSpace, SpatialUnit};

#[doc(inline)]
pub use meta::{
    AreaMeta, CollectionKind, Dataset, DatasetDescriptor, DatasetSpec, ExtensionTableMeta, Geocollection,
    IntersectionMeta, LoadingMeta, Topocollection,
};

#[doc(inline)]
pub use store::{DataSink, DataSource, DataStore, DiskStore, MemStore, Registry, Triples};

#[doc(inline)]
pub use intersection::OverlapTriple;

#[doc(inline)]
pub use loading::UnitValues;

#[doc(inline)]
pub use topography::{TopoMapping, merge, merge_areas, relabel};

#[doc(inline)]
pub use exchange::{ExchangeData, ExchangeDocument, ExchangeMetadata, Imported};

#[doc(inline)]
pub use inventory::{
    Activity, ActivityKind, CharacterizationFactor, Exchange, GLOBAL_LOCATION, Inventory, InventoryDatabase, Key,
    Method, dependency_closure,
};

#[doc(inline)]
pub use matrix::{
    Assembled, UnitSpace, build_characterization, build_distribution, build_extension_table, build_geo_transform,
    build_inventory_mapping, build_loading, build_topological_mapping, check_intersections, loading_normalization,
    needed_intersections, reciprocal, row_normalization,
};

#[doc(inline)]
pub use lca::{Limitation, LimitationKind, LimitationMode, RegionalLca, Scale, ScaleResults, Variant};

#[doc(inline)]
#[cfg(feature = "remote")]
pub use remote::{Catalog, JobStatus, PendingJob, RemoteClient};

pub use csrmat::CsrMatrix;
