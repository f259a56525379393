mod processed;
mod registry;
mod source;

pub(crate) use processed::{read_triples_bytes, write_triples_bytes};
pub use processed::Triples;
pub use registry::Registry;
pub use source::{DataSink, DataSource, DataStore, DiskStore, MemStore};
