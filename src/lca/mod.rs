//! Regionalized LCA calculations.
//!
//! Every variant is a chain of sparse factors from activities to flows,
//! `h_r = (F₁ · … · Fₙ)ᵗ ⊙ inventory`, plus the positions in that chain
//! where a spatial scale can be read off.

mod limitations;
mod regional;
mod results;

pub use limitations::{Limitation, LimitationKind, LimitationMode};
pub use regional::RegionalLca;
pub use results::ScaleResults;

/// Spatial scales a calculation can report results on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scale {
    Inventory,
    ExtensionTable,
    ImpactAssessment,
}

impl Scale {
    pub fn name(self) -> &'static str {
        match self {
            Scale::Inventory => "inventory",
            Scale::ExtensionTable => "extension table",
            Scale::ImpactAssessment => "impact assessment",
        }
    }
}

/// Which chain to compute.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    /// `M · R`; factors are defined on inventory units.
    OneSpatialScale,
    /// `M · N · G · R`.
    TwoSpatialScales,
    /// `M · N · G · L · R`, with `N` normalizing the loaded transport.
    TwoSpatialScalesWithGenericLoading { loading: String },
    /// `M · N_dx · D · X · N_g · G · R`.
    ExtensionTables { xtable: String, limitations: Vec<Limitation> },
    /// `N_t · Mₜ · D · X · N_g · G · R`, with faces of `topocollection`
    /// in place of inventory units.
    TopologicalExtensionTables { topocollection: String, xtable: String, limitations: Vec<Limitation> },
}

impl Variant {
    pub fn loading(loading: impl Into<String>) -> Self {
        Variant::TwoSpatialScalesWithGenericLoading { loading: loading.into() }
    }

    pub fn extension_tables(xtable: impl Into<String>) -> Self {
        Variant::ExtensionTables { xtable: xtable.into(), limitations: Vec::new() }
    }

    pub fn topological(topocollection: impl Into<String>, xtable: impl Into<String>) -> Self {
        Variant::TopologicalExtensionTables {
            topocollection: topocollection.into(),
            xtable: xtable.into(),
            limitations: Vec::new(),
        }
    }

    /// Add a limitation; ignored by variants without an extension table.
    pub fn with_limitation(mut self, limitation: Limitation) -> Self {
        if let Variant::ExtensionTables { limitations, .. }
            | Variant::TopologicalExtensionTables { limitations, .. } = &mut self
        {
            limitations.push(limitation);
        }
        self
    }

    pub fn limitations(&self) -> &[Limitation] {
        match self {
            Variant::ExtensionTables { limitations, .. }
            | Variant::TopologicalExtensionTables { limitations, .. } => limitations,
            _ => &[],
        }
    }

    /// Scales this variant can report results on.
    pub fn scales(&self) -> &'static [Scale] {
        match self {
            Variant::OneSpatialScale => &[Scale::Inventory],
            Variant::TwoSpatialScales | Variant::TwoSpatialScalesWithGenericLoading { .. } => {
                &[Scale::Inventory, Scale::ImpactAssessment]
            }
            Variant::ExtensionTables { .. } => &[Scale::Inventory, Scale::ExtensionTable, Scale::ImpactAssessment],
            Variant::TopologicalExtensionTables { .. } => &[Scale::ExtensionTable, Scale::ImpactAssessment],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Key;

    #[test]
    fn limitations_only_attach_to_extension_tables() {
        let limitation = Limitation::include(LimitationKind::Flows, [Key::new("bio", "F")]);
        let xt = Variant::extension_tables("density").with_limitation(limitation.clone());
        assert_eq!(xt.limitations().len(), 1);
        let two = Variant::TwoSpatialScales.with_limitation(limitation);
        assert!(two.limitations().is_empty());
    }

    #[test]
    fn topological_variant_has_no_inventory_scale() {
        assert!(!Variant::topological("topo", "density").scales().contains(&Scale::Inventory));
    }
}
