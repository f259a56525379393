use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use super::SpatialUnit;

/// Append-only bijection from spatial units to dense `u32` ids.
///
/// Ids are handed out in first-use order and never reused, so every matrix
/// built from one mapping agrees on the id of a unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<SpatialUnit>", into = "Vec<SpatialUnit>")]
pub struct Geomapping {
    units: Vec<SpatialUnit>,
    ids: AHashMap<SpatialUnit, u32>,
}

impl Geomapping {
    pub fn new() -> Self { Self::default() }

    /// Id of `unit`, allocating the next id on first use.
    pub fn geomap(&mut self, unit: &SpatialUnit) -> u32 {
        if let Some(&id) = self.ids.get(unit) {
            return id;
        }
        let id = self.units.len() as u32;
        self.units.push(unit.clone());
        self.ids.insert(unit.clone(), id);
        id
    }

    /// Map every unit; returns the number of newly allocated ids.
    pub fn extend<'a>(&mut self, units: impl IntoIterator<Item = &'a SpatialUnit>) -> usize {
        let before = self.units.len();
        for unit in units {
            self.geomap(unit);
        }
        self.units.len() - before
    }

    /// Id of `unit` without allocating.
    pub fn get(&self, unit: &SpatialUnit) -> Option<u32> { self.ids.get(unit).copied() }

    pub fn reverse(&self, id: u32) -> Option<&SpatialUnit> { self.units.get(id as usize) }

    pub fn contains(&self, unit: &SpatialUnit) -> bool { self.ids.contains_key(unit) }

    pub fn len(&self) -> usize { self.units.len() }

    pub fn is_empty(&self) -> bool { self.units.is_empty() }
}

impl From<Vec<SpatialUnit>> for Geomapping {
    fn from(units: Vec<SpatialUnit>) -> Self {
        let mut mapping = Geomapping::default();
        mapping.extend(&units);
        mapping
    }
}

impl From<Geomapping> for Vec<SpatialUnit> {
    fn from(mapping: Geomapping) -> Self { mapping.units }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geomap_is_idempotent() {
        let mut mapping = Geomapping::new();
        let a = SpatialUnit::named("A");
        let b = SpatialUnit::feature("grid", 3);
        assert_eq!(mapping.geomap(&a), 0);
        assert_eq!(mapping.geomap(&b), 1);
        assert_eq!(mapping.geomap(&a), 0);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.reverse(1), Some(&b));
        assert_eq!(mapping.get(&SpatialUnit::named("C")), None);
    }

    #[test]
    fn serde_keeps_ids() {
        let mut mapping = Geomapping::new();
        mapping.extend(&[SpatialUnit::named("X"), SpatialUnit::named("Y")]);
        let json = serde_json::to_string(&mapping).unwrap();
        let back: Geomapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&SpatialUnit::named("Y")), Some(1));
        assert_eq!(back.len(), 2);
    }
}
