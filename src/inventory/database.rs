use std::fmt;

use serde::{Deserialize, Serialize};

use crate::spatial::SpatialUnit;

/// Location assumed for activities that don't declare one.
pub const GLOBAL_LOCATION: &str = "GLO";

/// `(database, code)` identifier of an activity or a biosphere flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub database: String,
    pub code: String,
}

impl Key {
    pub fn new(database: impl Into<String>, code: impl Into<String>) -> Self {
        Self { database: database.into(), code: code.into() }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.database, self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// A technosphere activity with a location and biosphere exchanges.
    Process,
    /// A biosphere flow.
    Emission,
}

/// Biosphere exchange of a process: `amount` of flow `input` per unit of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub input: Key,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub code: String,
    pub kind: ActivityKind,
    #[serde(default)]
    pub location: Option<SpatialUnit>,
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
}

impl Activity {
    /// Declared location, or the global location.
    pub fn location(&self) -> SpatialUnit {
        self.location.clone().unwrap_or_else(|| SpatialUnit::named(GLOBAL_LOCATION))
    }
}

/// An inventory database.
///
/// `geocollections` is `None` until the database has been processed for
/// regionalization; `Some(vec![])` is a processed database without locations
/// (e.g. the biosphere).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryDatabase {
    pub name: String,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub geocollections: Option<Vec<String>>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl InventoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), depends: Vec::new(), geocollections: None, activities: Vec::new() }
    }

    pub fn with_depends(mut self, depends: &[&str]) -> Self {
        self.depends = depends.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_geocollections(mut self, geocollections: &[&str]) -> Self {
        self.geocollections = Some(geocollections.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn process(mut self, code: &str, location: impl Into<SpatialUnit>, exchanges: &[(Key, f64)]) -> Self {
        self.activities.push(Activity {
            code: code.to_string(),
            kind: ActivityKind::Process,
            location: Some(location.into()),
            exchanges: exchanges.iter()
                .map(|(input, amount)| Exchange { input: input.clone(), amount: *amount })
                .collect(),
        });
        self
    }

    pub fn emission(mut self, code: &str) -> Self {
        self.activities.push(Activity {
            code: code.to_string(),
            kind: ActivityKind::Emission,
            location: None,
            exchanges: Vec::new(),
        });
        self
    }

    pub fn key(&self, activity: &Activity) -> Key { Key::new(&self.name, &activity.code) }

    pub fn processes(&self) -> impl Iterator<Item = &Activity> {
        self.activities.iter().filter(|a| a.kind == ActivityKind::Process)
    }

    pub fn get(&self, code: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.code == code)
    }
}

/// One characterization factor: `amount` for `flow` emitted in `location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterizationFactor {
    pub flow: Key,
    pub amount: f64,
    pub location: SpatialUnit,
}

/// Impact assessment method.
///
/// Without geocollections the method is site-generic and cannot be used for
/// regionalized calculations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    #[serde(default)]
    pub geocollections: Option<Vec<String>>,
    #[serde(default)]
    pub cfs: Vec<CharacterizationFactor>,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), geocollections: None, cfs: Vec::new() }
    }

    pub fn with_geocollections(mut self, geocollections: &[&str]) -> Self {
        self.geocollections = Some(geocollections.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn cf(mut self, flow: Key, amount: f64, location: impl Into<SpatialUnit>) -> Self {
        self.cfs.push(CharacterizationFactor { flow, amount, location: location.into() });
        self
    }
}
