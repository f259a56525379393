use std::fmt;

use serde::{Deserialize, Serialize};

/// Feature identifier inside a geocollection or topocollection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Int(i64),
    Str(String),
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Int(id) => write!(f, "{id}"),
            FeatureId::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for FeatureId {
    fn from(id: i64) -> Self { FeatureId::Int(id) }
}

impl From<i32> for FeatureId {
    fn from(id: i32) -> Self { FeatureId::Int(id.into()) }
}

impl From<u32> for FeatureId {
    fn from(id: u32) -> Self { FeatureId::Int(id.into()) }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self { FeatureId::Str(id.to_string()) }
}

impl From<String> for FeatureId {
    fn from(id: String) -> Self { FeatureId::Str(id) }
}

/// A spatial unit: a bare name (e.g. a country code) or a
/// `(collection, feature id)` pair.
///
/// Serializes as `"GLO"` or `["countries", 42]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpatialUnit {
    Named(String),
    Feature(String, FeatureId),
}

impl SpatialUnit {
    pub fn named(name: impl Into<String>) -> Self { SpatialUnit::Named(name.into()) }

    pub fn feature(collection: impl Into<String>, id: impl Into<FeatureId>) -> Self {
        SpatialUnit::Feature(collection.into(), id.into())
    }

    /// Collection name for `Feature` units.
    pub fn collection(&self) -> Option<&str> {
        match self {
            SpatialUnit::Named(_) => None,
            SpatialUnit::Feature(collection, _) => Some(collection),
        }
    }
}

impl fmt::Display for SpatialUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialUnit::Named(name) => f.write_str(name),
            SpatialUnit::Feature(collection, id) => write!(f, "{collection}:{id}"),
        }
    }
}

impl From<&str> for SpatialUnit {
    fn from(name: &str) -> Self { SpatialUnit::Named(name.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shapes() {
        let units = vec![
            SpatialUnit::named("GLO"),
            SpatialUnit::feature("countries", 42),
            SpatialUnit::feature("regions", "A"),
        ];
        let json = serde_json::to_string(&units).unwrap();
        assert_eq!(json, r#"["GLO",["countries",42],["regions","A"]]"#);
        let back: Vec<SpatialUnit> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, units);
    }

    #[test]
    fn display() {
        assert_eq!(SpatialUnit::feature("countries", 7).to_string(), "countries:7");
        assert_eq!(SpatialUnit::named("RER").to_string(), "RER");
    }
}
