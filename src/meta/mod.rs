mod dataset;
mod records;

pub use dataset::{CollectionKind, Dataset, DatasetDescriptor, DatasetSpec};
pub use records::{AreaMeta, ExtensionTableMeta, Geocollection, IntersectionMeta, LoadingMeta, Topocollection};
