//! Per-unit scalar tables: loadings on the IA scale, extension tables on a
//! third scale and feature areas of a geocollection. All are processed into
//! diagonal `(id, id, value)` arrays.

use anyhow::{Context, Result};

use crate::{
    common::{read_json_maybe_compressed, write_json_gzip},
    context::{DataKind, SpatialContext},
    spatial::SpatialUnit,
    store::{Triples, read_triples_bytes, write_triples_bytes},
};

/// `(spatial unit, value)` rows of a loading or extension table.
pub type UnitValues = Vec<(SpatialUnit, f64)>;

impl SpatialContext {
    /// Store the values of a registered loading and process them.
    pub fn write_loading(&mut self, name: &str, data: UnitValues) -> Result<()> {
        self.loading(name)?;
        self.write_unit_values(DataKind::Loading, name, data)
    }

    pub fn load_loading(&self, name: &str) -> Result<UnitValues> {
        self.loading(name)?;
        self.read_unit_values(DataKind::Loading, name)
    }

    pub fn processed_loading(&self, name: &str) -> Result<Triples> {
        self.loading(name)?;
        self.read_processed_values(DataKind::Loading, name)
    }

    /// Store the values of a registered extension table and process them.
    pub fn write_extension_table(&mut self, name: &str, data: UnitValues) -> Result<()> {
        self.extension_table(name)?;
        self.write_unit_values(DataKind::ExtensionTable, name, data)
    }

    pub fn load_extension_table(&self, name: &str) -> Result<UnitValues> {
        self.extension_table(name)?;
        self.read_unit_values(DataKind::ExtensionTable, name)
    }

    pub fn processed_extension_table(&self, name: &str) -> Result<Triples> {
        self.extension_table(name)?;
        self.read_processed_values(DataKind::ExtensionTable, name)
    }

    /// Store the feature areas of a geocollection registered with
    /// [`register_area`](Self::register_area).
    pub fn write_area(&mut self, name: &str, data: UnitValues) -> Result<()> {
        self.area(name)?;
        self.write_unit_values(DataKind::Area, name, data)
    }

    pub fn load_area(&self, name: &str) -> Result<UnitValues> {
        self.area(name)?;
        self.read_unit_values(DataKind::Area, name)
    }

    pub fn processed_area(&self, name: &str) -> Result<Triples> {
        self.area(name)?;
        self.read_processed_values(DataKind::Area, name)
    }

    fn write_unit_values(&mut self, kind: DataKind, name: &str, data: UnitValues) -> Result<()> {
        self.geomap_all(data.iter().map(|(unit, _)| unit))?;
        let bytes = write_json_gzip(&data)?;
        self.store_mut().put(&Self::raw_path(kind, name)?, &bytes)
            .with_context(|| format!("Failed to write {kind:?} {name}"))?;

        let processed = data.iter()
            .map(|(unit, value)| -> Result<(u32, u32, f64)> {
                let id = self.geomap_id(unit)?;
                Ok((id, id, *value))
            })
            .collect::<Result<Triples>>()?;
        let bytes = write_triples_bytes(&processed)?;
        self.store_mut().put(&Self::processed_path(kind, name)?, &bytes)?;
        tracing::debug!(kind = ?kind, name, units = processed.len(), "processed unit values");
        Ok(())
    }

    fn read_unit_values(&self, kind: DataKind, name: &str) -> Result<UnitValues> {
        let bytes = self.store().get(&Self::raw_path(kind, name)?)
            .with_context(|| format!("No data written for {kind:?} {name}"))?;
        read_json_maybe_compressed(&bytes)
    }

    fn read_processed_values(&self, kind: DataKind, name: &str) -> Result<Triples> {
        let bytes = self.store().get(&Self::processed_path(kind, name)?)
            .with_context(|| format!("No processed data for {kind:?} {name}"))?;
        read_triples_bytes(&bytes)
    }
}
