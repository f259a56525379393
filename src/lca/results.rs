use anyhow::Result;
use csrmat::CsrMatrix;
use ndarray::Array1;

use crate::{error::RegionalError, inventory::Key, spatial::{IndexSpace, SpatialUnit}};

use super::Scale;

/// Characterized inventory projected onto one spatial scale: flows × units.
#[derive(Debug, Clone)]
pub struct ScaleResults {
    pub scale: Scale,
    pub units: Vec<SpatialUnit>,
    pub flows: IndexSpace<Key>,
    pub matrix: CsrMatrix,
}

impl ScaleResults {
    /// Per-unit results of one flow.
    pub fn by_flow(&self, flow: &Key) -> Result<Array1<f64>> {
        let row = self.flows.get(flow)
            .ok_or_else(|| RegionalError::unknown("flow", flow.to_string()))?;
        let mut values = Array1::<f64>::zeros(self.units.len());
        for (col, value) in self.matrix.row(row) {
            values[col] = value;
        }
        Ok(values)
    }

    /// Per-unit results summed over all flows.
    pub fn totals(&self) -> Array1<f64> { Array1::from(self.matrix.col_sums()) }

    pub fn total(&self) -> f64 { self.matrix.sum() }

    /// `(unit, total)` pairs for the units with a non-zero result.
    pub fn nonzero_units(&self) -> Vec<(&SpatialUnit, f64)> {
        self.units.iter()
            .zip(self.matrix.col_sums())
            .filter(|(_, total)| *total != 0.0)
            .collect()
    }
}
