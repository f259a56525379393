use std::collections::BTreeSet;

use anyhow::{Context, Result, ensure};

use crate::{
    common::{ensure_dir_exists, safe_filename, sha256_file},
    config::Settings,
    error::RegionalError,
    inventory::{InventoryDatabase, Method},
    meta::{AreaMeta, Dataset, DatasetSpec, ExtensionTableMeta, Geocollection, IntersectionMeta, LoadingMeta, Topocollection},
    spatial::{Geomapping, SpatialUnit},
    store::{DataStore, DiskStore, MemStore, Registry},
};

const GEOMAPPING: &str = "geomapping.json";
const GEOCOLLECTIONS: &str = "geocollections.json";
const TOPOCOLLECTIONS: &str = "topocollections.json";
const INTERSECTIONS: &str = "intersections.json";
const LOADINGS: &str = "loadings.json";
const EXTENSION_TABLES: &str = "extension-tables.json";
const AREAS: &str = "areas.json";
const DATABASES: &str = "databases.json";
const METHODS: &str = "methods.json";

/// Kinds of stored objects with raw and processed data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataKind {
    Intersection,
    Loading,
    ExtensionTable,
    Topography,
    Area,
}

impl DataKind {
    fn dir(self) -> &'static str {
        match self {
            DataKind::Intersection => "intersections",
            DataKind::Loading => "loadings",
            DataKind::ExtensionTable => "extension-tables",
            DataKind::Topography => "topographies",
            DataKind::Area => "areas",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            DataKind::Intersection => "intersection",
            DataKind::Loading => "loading",
            DataKind::ExtensionTable => "xtable",
            DataKind::Topography => "topography",
            DataKind::Area => "area",
        }
    }
}

/// One regionalization session: the metadata registries, the geomapping and
/// the store behind them.
///
/// Every mutating operation takes `&mut self` and flushes what it changed.
pub struct SpatialContext {
    settings: Settings,
    store: Box<dyn DataStore>,
    pub(crate) geomapping: Geomapping,
    pub(crate) geocollections: Registry<String, Geocollection>,
    pub(crate) topocollections: Registry<String, Topocollection>,
    pub(crate) intersections: Registry<(String, String), IntersectionMeta>,
    pub(crate) loadings: Registry<String, LoadingMeta>,
    pub(crate) extension_tables: Registry<String, ExtensionTableMeta>,
    pub(crate) areas: Registry<String, AreaMeta>,
    pub(crate) databases: Registry<String, InventoryDatabase>,
    pub(crate) methods: Registry<String, Method>,
}

impl SpatialContext {
    /// Open (or create) a context stored in `settings.data_dir`.
    pub fn open(settings: &Settings) -> Result<Self> {
        ensure_dir_exists(&settings.data_dir)?;
        let store = DiskStore::new(&settings.data_dir);
        Self::with_store(Box::new(store), settings.clone())
    }

    /// Empty context backed by memory.
    pub fn in_memory() -> Self {
        Self {
            settings: Settings::default(),
            store: Box::new(MemStore::new()),
            geomapping: Geomapping::new(),
            geocollections: Registry::empty(GEOCOLLECTIONS),
            topocollections: Registry::empty(TOPOCOLLECTIONS),
            intersections: Registry::empty(INTERSECTIONS),
            loadings: Registry::empty(LOADINGS),
            extension_tables: Registry::empty(EXTENSION_TABLES),
            areas: Registry::empty(AREAS),
            databases: Registry::empty(DATABASES),
            methods: Registry::empty(METHODS),
        }
    }

    /// Load every registry from `store`.
    pub fn with_store(store: Box<dyn DataStore>, settings: Settings) -> Result<Self> {
        let src = store.as_ref();
        let geomapping = if src.has(GEOMAPPING) {
            let bytes = src.get(GEOMAPPING)?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("Failed to parse {GEOMAPPING}"))?
        } else {
            Geomapping::new()
        };
        Ok(Self {
            geomapping,
            geocollections: Registry::load(src, GEOCOLLECTIONS)?,
            topocollections: Registry::load(src, TOPOCOLLECTIONS)?,
            intersections: Registry::load(src, INTERSECTIONS)?,
            loadings: Registry::load(src, LOADINGS)?,
            extension_tables: Registry::load(src, EXTENSION_TABLES)?,
            areas: Registry::load(src, AREAS)?,
            databases: Registry::load(src, DATABASES)?,
            methods: Registry::load(src, METHODS)?,
            settings,
            store,
        })
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn geomapping(&self) -> &Geomapping { &self.geomapping }

    pub(crate) fn store(&self) -> &dyn DataStore { self.store.as_ref() }

    pub(crate) fn store_mut(&mut self) -> &mut dyn DataStore { self.store.as_mut() }

    /// Geomap id of `unit`, allocating (and persisting) a new one on first use.
    pub fn geomap(&mut self, unit: &SpatialUnit) -> Result<u32> {
        let known = self.geomapping.len();
        let id = self.geomapping.geomap(unit);
        if self.geomapping.len() != known {
            self.flush_geomapping()?;
        }
        Ok(id)
    }

    pub(crate) fn geomap_all<'a>(&mut self, units: impl IntoIterator<Item = &'a SpatialUnit>) -> Result<()> {
        if self.geomapping.extend(units) > 0 {
            self.flush_geomapping()?;
        }
        Ok(())
    }

    /// Geomap id of a unit that must already be mapped.
    pub(crate) fn geomap_id(&self, unit: &SpatialUnit) -> Result<u32> {
        self.geomapping.get(unit)
            .ok_or_else(|| RegionalError::unknown("spatial unit", unit.to_string()).into())
    }

    pub fn reverse_geomap(&self, id: u32) -> Option<&SpatialUnit> { self.geomapping.reverse(id) }

    pub(crate) fn flush_intersections(&mut self) -> Result<()> {
        self.intersections.flush(self.store.as_mut())
    }

    pub(crate) fn flush_topocollections(&mut self) -> Result<()> {
        self.topocollections.flush(self.store.as_mut())
    }

    fn flush_geomapping(&mut self) -> Result<()> {
        let bytes = serde_json::to_vec(&self.geomapping)
            .context("Failed to serialize geomapping")?;
        self.store.put(GEOMAPPING, &bytes)
    }

    // -- file names -------------------------------------------------------

    fn stem(kind: DataKind, name: &str) -> Result<String> {
        Ok(format!("{}.{}", safe_filename(name)?, kind.suffix()))
    }

    pub(crate) fn raw_path(kind: DataKind, name: &str) -> Result<String> {
        Ok(format!("{}/{}.json.gz", kind.dir(), Self::stem(kind, name)?))
    }

    pub(crate) fn processed_path(kind: DataKind, name: &str) -> Result<String> {
        Ok(format!("processed/{}.bin", Self::stem(kind, name)?))
    }

    /// Single-string name of a directed intersection.
    pub(crate) fn pair_name(first: &str, second: &str) -> String {
        format!("{first}\u{1f}{second}")
    }

    // -- geocollections and topocollections ---------------------------------

    /// Validate `spec`, hash its source file and store the record under `name`,
    /// replacing any previous record.
    pub fn register_geocollection(&mut self, name: &str, spec: DatasetSpec) -> Result<&Geocollection> {
        let dataset = Dataset::from_spec(spec)
            .with_context(|| format!("Failed to register geocollection {name}"))?;
        tracing::debug!(geocollection = name, kind = ?dataset.kind, "registered geocollection");
        self.geocollections.insert(name.to_string(), Geocollection { dataset });
        self.geocollections.flush(self.store.as_mut())?;
        self.geocollection(name)
    }

    pub fn geocollection(&self, name: &str) -> Result<&Geocollection> {
        self.geocollections.get(&name.to_string())
            .ok_or_else(|| RegionalError::unknown("geocollection", name).into())
    }

    pub fn geocollections(&self) -> &Registry<String, Geocollection> { &self.geocollections }

    /// Register a topocollection refining the registered `geocollection`.
    /// It stays empty until its feature→faces mapping is written.
    pub fn register_topocollection(&mut self, name: &str, geocollection: &str, spec: DatasetSpec) -> Result<&Topocollection> {
        if !self.geocollections.contains(&geocollection.to_string()) {
            return Err(RegionalError::ReferentialIntegrity(format!(
                "topocollection {name} refers to unknown geocollection {geocollection}"
            )).into());
        }
        let dataset = Dataset::from_spec(spec)
            .with_context(|| format!("Failed to register topocollection {name}"))?;
        let record = Topocollection { geocollection: geocollection.to_string(), dataset, empty: true };
        self.topocollections.insert(name.to_string(), record);
        self.topocollections.flush(self.store.as_mut())?;
        self.topocollection(name)
    }

    pub fn topocollection(&self, name: &str) -> Result<&Topocollection> {
        self.topocollections.get(&name.to_string())
            .ok_or_else(|| RegionalError::unknown("topocollection", name).into())
    }

    pub fn topocollections(&self) -> &Registry<String, Topocollection> { &self.topocollections }

    /// Dataset of a registered geo- or topocollection.
    pub(crate) fn dataset(&self, name: &str) -> Result<&Dataset> {
        if let Some(gc) = self.geocollections.get(&name.to_string()) {
            return Ok(&gc.dataset);
        }
        if let Some(tc) = self.topocollections.get(&name.to_string()) {
            return Ok(&tc.dataset);
        }
        Err(RegionalError::unknown("geocollection", name).into())
    }

    // -- loadings and extension tables ----------------------------------------

    pub fn register_loading(&mut self, name: &str, meta: LoadingMeta) -> Result<()> {
        if let Some(gc) = &meta.geocollection {
            if !self.geocollections.contains(gc) {
                return Err(RegionalError::ReferentialIntegrity(format!(
                    "loading {name} refers to unknown geocollection {gc}"
                )).into());
            }
        }
        self.loadings.insert(name.to_string(), meta);
        self.loadings.flush(self.store.as_mut())
    }

    pub fn loading(&self, name: &str) -> Result<&LoadingMeta> {
        self.loadings.get(&name.to_string())
            .ok_or_else(|| RegionalError::unknown("loading", name).into())
    }

    pub fn register_extension_table(&mut self, name: &str, meta: ExtensionTableMeta) -> Result<()> {
        if !self.geocollections.contains(&meta.geocollection) {
            return Err(RegionalError::ReferentialIntegrity(format!(
                "extension table {name} refers to unknown geocollection {}", meta.geocollection
            )).into());
        }
        self.extension_tables.insert(name.to_string(), meta);
        self.extension_tables.flush(self.store.as_mut())
    }

    pub fn extension_table(&self, name: &str) -> Result<&ExtensionTableMeta> {
        self.extension_tables.get(&name.to_string())
            .ok_or_else(|| RegionalError::unknown("extension table", name).into())
    }

    /// Register feature areas for the geocollection `name`.
    pub fn register_area(&mut self, name: &str, meta: AreaMeta) -> Result<()> {
        self.geocollection(name)?;
        if self.areas.contains(&name.to_string()) {
            return Err(RegionalError::AlreadyExists(format!("area of {name}")).into());
        }
        self.areas.insert(name.to_string(), meta);
        self.areas.flush(self.store.as_mut())
    }

    pub fn area(&self, name: &str) -> Result<&AreaMeta> {
        self.areas.get(&name.to_string())
            .ok_or_else(|| RegionalError::unknown("area", name).into())
    }

    pub fn areas(&self) -> &Registry<String, AreaMeta> { &self.areas }

    // -- intersections --------------------------------------------------------

    pub fn intersections(&self) -> &Registry<(String, String), IntersectionMeta> { &self.intersections }

    pub fn has_intersection(&self, first: &str, second: &str) -> bool {
        self.intersections.contains(&(first.to_string(), second.to_string()))
    }

    pub fn intersection_meta(&self, first: &str, second: &str) -> Result<&IntersectionMeta> {
        self.intersections.get(&(first.to_string(), second.to_string()))
            .ok_or_else(|| RegionalError::unknown("intersection", format!("({first}, {second})")).into())
    }

    /// Intersections whose recorded content hash no longer matches the
    /// current source file of one of their collections.
    pub fn stale_intersections(&self) -> Result<Vec<(String, String)>> {
        let mut stale = Vec::new();
        for ((first, second), meta) in self.intersections.iter() {
            let outdated = [(first, &meta.first_sha256), (second, &meta.second_sha256)]
                .into_iter()
                .any(|(name, recorded)| match (recorded, self.current_hash(name)) {
                    (Some(recorded), Some(current)) => *recorded != current,
                    _ => false,
                });
            if outdated {
                tracing::warn!(first = %first, second = %second, "intersection computed against outdated spatial data");
                stale.push((first.clone(), second.clone()));
            }
        }
        Ok(stale)
    }

    fn current_hash(&self, name: &str) -> Option<String> {
        let path = self.dataset(name).ok()?.filepath.as_deref()?;
        sha256_file(path).ok()
    }

    // -- inventory databases and methods --------------------------------------

    /// Store an inventory database, geomapping the location of every process.
    pub fn add_database(&mut self, database: InventoryDatabase) -> Result<()> {
        ensure!(!database.name.is_empty(), "Inventory database name must not be empty");
        let locations: BTreeSet<SpatialUnit> = database.processes().map(|a| a.location()).collect();
        self.geomap_all(&locations)?;
        tracing::debug!(database = %database.name, activities = database.activities.len(), "added database");
        self.databases.insert(database.name.clone(), database);
        self.databases.flush(self.store.as_mut())
    }

    pub fn database(&self, name: &str) -> Result<&InventoryDatabase> {
        self.databases.get(&name.to_string())
            .ok_or_else(|| RegionalError::unknown("database", name).into())
    }

    /// Store an impact assessment method, geomapping every factor location.
    pub fn add_method(&mut self, method: Method) -> Result<()> {
        let locations: BTreeSet<SpatialUnit> = method.cfs.iter().map(|cf| cf.location.clone()).collect();
        self.geomap_all(&locations)?;
        tracing::debug!(method = %method.name, cfs = method.cfs.len(), "added method");
        self.methods.insert(method.name.clone(), method);
        self.methods.flush(self.store.as_mut())
    }

    pub fn method(&self, name: &str) -> Result<&Method> {
        self.methods.get(&name.to_string())
            .ok_or_else(|| RegionalError::unknown("method", name).into())
    }

    // -- reset ----------------------------------------------------------------

    /// Remove an intersection in both directions, with its data.
    pub fn remove_intersection(&mut self, first: &str, second: &str) -> Result<()> {
        for (a, b) in [(first, second), (second, first)] {
            if self.intersections.remove(&(a.to_string(), b.to_string())).is_some() {
                let name = Self::pair_name(a, b);
                self.store.remove(&Self::raw_path(DataKind::Intersection, &name)?)?;
                self.store.remove(&Self::processed_path(DataKind::Intersection, &name)?)?;
            }
        }
        self.intersections.flush(self.store.as_mut())
    }

    /// Drop every registered object and its data. The geomapping is kept.
    pub fn reset(&mut self) -> Result<()> {
        let pairs: Vec<(String, String)> = self.intersections.keys().cloned().collect();
        for (first, second) in pairs {
            self.remove_intersection(&first, &second)?;
        }
        let loadings: Vec<String> = self.loadings.keys().cloned().collect();
        for name in loadings {
            self.store.remove(&Self::raw_path(DataKind::Loading, &name)?)?;
            self.store.remove(&Self::processed_path(DataKind::Loading, &name)?)?;
            self.loadings.remove(&name);
        }
        let tables: Vec<String> = self.extension_tables.keys().cloned().collect();
        for name in tables {
            self.store.remove(&Self::raw_path(DataKind::ExtensionTable, &name)?)?;
            self.store.remove(&Self::processed_path(DataKind::ExtensionTable, &name)?)?;
            self.extension_tables.remove(&name);
        }
        let areas: Vec<String> = self.areas.keys().cloned().collect();
        for name in areas {
            self.store.remove(&Self::raw_path(DataKind::Area, &name)?)?;
            self.store.remove(&Self::processed_path(DataKind::Area, &name)?)?;
            self.areas.remove(&name);
        }
        let topologies: Vec<String> = self.topocollections.keys().cloned().collect();
        for name in topologies {
            self.store.remove(&Self::raw_path(DataKind::Topography, &name)?)?;
            self.topocollections.remove(&name);
        }
        let geocollections: Vec<String> = self.geocollections.keys().cloned().collect();
        for name in geocollections {
            self.geocollections.remove(&name);
        }

        self.geocollections.flush(self.store.as_mut())?;
        self.topocollections.flush(self.store.as_mut())?;
        self.intersections.flush(self.store.as_mut())?;
        self.loadings.flush(self.store.as_mut())?;
        self.extension_tables.flush(self.store.as_mut())?;
        self.areas.flush(self.store.as_mut())?;
        tracing::info!("reset spatial registries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topocollection_needs_known_geocollection() {
        let mut ctx = SpatialContext::in_memory();
        let err = ctx.register_topocollection("topo", "countries", DatasetSpec::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegionalError>(),
            Some(RegionalError::ReferentialIntegrity(_))
        ));

        ctx.register_geocollection("countries", DatasetSpec::default()).unwrap();
        let topo = ctx.register_topocollection("topo", "countries", DatasetSpec::default()).unwrap();
        assert!(topo.empty);
        assert_eq!(topo.geocollection, "countries");
    }

    #[test]
    fn extension_table_needs_known_geocollection() {
        let mut ctx = SpatialContext::in_memory();
        let meta = ExtensionTableMeta { geocollection: "grid".into(), description: None };
        let err = ctx.register_extension_table("density", meta).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegionalError>(),
            Some(RegionalError::ReferentialIntegrity(_))
        ));
    }

    #[test]
    fn unknown_lookups_are_typed() {
        let ctx = SpatialContext::in_memory();
        let err = ctx.geocollection("nowhere").unwrap_err();
        assert_eq!(
            err.downcast_ref::<RegionalError>(),
            Some(&RegionalError::unknown("geocollection", "nowhere"))
        );
    }

    #[test]
    fn geomap_is_stable_across_calls() {
        let mut ctx = SpatialContext::in_memory();
        let a = ctx.geomap(&SpatialUnit::named("A")).unwrap();
        let b = ctx.geomap(&SpatialUnit::named("B")).unwrap();
        assert_eq!(ctx.geomap(&SpatialUnit::named("A")).unwrap(), a);
        assert_ne!(a, b);
        assert_eq!(ctx.reverse_geomap(b), Some(&SpatialUnit::named("B")));
    }

    #[test]
    fn registering_a_file_hashes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.geojson");
        std::fs::write(&path, b"{}").unwrap();

        let mut ctx = SpatialContext::in_memory();
        let gc = ctx.register_geocollection("places", DatasetSpec::file(&path).with_field("name")).unwrap();
        assert_eq!(gc.dataset.sha256.as_deref(), Some(crate::common::sha256_bytes(b"{}").as_str()));
        assert!(!gc.dataset.is_raster());
    }
}
