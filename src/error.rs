//! Domain failures raised by the regionalization engine.
//!
//! Public functions return `anyhow::Result`; a `RegionalError` travels inside
//! the `anyhow::Error` and can be recovered with `downcast_ref`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegionalError {
    /// Dependent inventory databases without geocollection metadata.
    #[error("Database(s) {0:?} don't specify their geocollections")]
    UnprocessedDatabase(Vec<String>),

    /// The impact assessment method has no geocollections attached.
    #[error("Method {0} is site-generic (no geocollections)")]
    SiteGenericMethod(String),

    /// Required (first, second) intersections that are not registered.
    #[error("Intersections needed but not found: {0:?}")]
    MissingIntersection(Vec<(String, String)>),

    /// IA geocollections that are not inventory geocollections.
    #[error("Method geocollections {0:?} are not inventory geocollections")]
    GeocollectionsMismatch(Vec<String>),

    #[error("Geocollection {0} has no source file")]
    MissingSpatialSourceData(String),

    #[error("Geocollection {collection} doesn't define `{field}`")]
    IncompleteSpatialDefinition { collection: String, field: &'static str },

    #[error("Topology error: {0}")]
    TopologyError(String),

    #[error("Referential integrity: {0}")]
    ReferentialIntegrity(String),

    #[error("Unknown {kind}: {name}")]
    UnknownObject { kind: &'static str, name: String },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid limitation: {0}")]
    InvalidLimitation(String),

    /// Results were requested at a scale the variant doesn't have.
    #[error("No {0} spatial scale for this calculation")]
    ScaleUnavailable(&'static str),

    #[error("Must do lcia calculation first")]
    NotCalculated,

    #[error("Remote service unreachable: {0}")]
    RemoteUnreachable(String),

    /// The remote service knows the request but hasn't computed it.
    #[error("Not yet calculated: {0}")]
    NotYetCalculated(String),

    #[error("Remote service returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },
}

impl RegionalError {
    pub(crate) fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownObject { kind, name: name.into() }
    }
}
