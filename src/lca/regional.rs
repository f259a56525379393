use std::collections::BTreeSet;

use anyhow::Result;
use csrmat::CsrMatrix;

use crate::{
    context::SpatialContext,
    error::RegionalError,
    inventory::{Inventory, Key, Method, dependency_closure},
    matrix::{
        UnitSpace, build_characterization, build_distribution, build_extension_table, build_geo_transform,
        build_inventory_mapping, build_loading, build_topological_mapping, check_intersections,
        loading_normalization, needed_intersections, row_normalization,
    },
    spatial::SpatialUnit,
};

use super::{LimitationKind, Scale, ScaleResults, Variant, limitations::validate_limitations};

/// A named factor of the chain.
type Factor = (&'static str, CsrMatrix);

/// Where a scale sits in the chain: `factors[..split]` maps activities onto
/// `units`, `factors[split..]` maps `units` onto flows.
#[derive(Debug, Clone)]
struct ScaleSplit {
    scale: Scale,
    split: usize,
    units: UnitSpace,
}

/// One regionalized LCA calculation.
///
/// Lifecycle: [`new`](Self::new) validates the metadata, [`lci`](Self::lci)
/// computes the inventory, [`load_lcia_data`](Self::load_lcia_data) builds
/// the chain and [`lcia_calculation`](Self::lcia_calculation) characterizes
/// the inventory. [`lcia`](Self::lcia) runs all of them.
pub struct RegionalLca<'a> {
    ctx: &'a SpatialContext,
    method: &'a Method,
    variant: Variant,
    demand: Vec<(Key, f64)>,
    databases: BTreeSet<String>,
    inventory_geocollections: Vec<String>,
    ia_geocollections: Vec<String>,
    inventory: Option<Inventory>,
    factors: Vec<Factor>,
    scales: Vec<ScaleSplit>,
    characterized: Option<CsrMatrix>,
}

impl<'a> RegionalLca<'a> {
    pub fn new(ctx: &'a SpatialContext, demand: &[(Key, f64)], method: &str, variant: Variant) -> Result<Self> {
        let method = ctx.method(method)?;
        let databases = dependency_closure(ctx, demand.iter().map(|(key, _)| key.database.as_str()))?;

        let mut unprocessed = Vec::new();
        let mut inventory_geocollections = BTreeSet::new();
        for name in &databases {
            match &ctx.database(name)?.geocollections {
                Some(gcs) => inventory_geocollections.extend(gcs.iter().cloned()),
                None => unprocessed.push(name.clone()),
            }
        }
        if !unprocessed.is_empty() {
            return Err(RegionalError::UnprocessedDatabase(unprocessed).into());
        }

        let ia_geocollections: BTreeSet<String> = match &method.geocollections {
            Some(gcs) if !gcs.is_empty() => gcs.iter().cloned().collect(),
            _ => return Err(RegionalError::SiteGenericMethod(method.name.clone()).into()),
        };

        let lca = Self {
            ctx,
            method,
            variant,
            demand: demand.to_vec(),
            databases,
            inventory_geocollections: inventory_geocollections.into_iter().collect(),
            ia_geocollections: ia_geocollections.into_iter().collect(),
            inventory: None,
            factors: Vec::new(),
            scales: Vec::new(),
            characterized: None,
        };
        lca.validate_variant()?;
        check_intersections(ctx, &lca.required_intersections())?;
        Ok(lca)
    }

    fn validate_variant(&self) -> Result<()> {
        match &self.variant {
            Variant::OneSpatialScale => {
                let extra: Vec<String> = self.ia_geocollections.iter()
                    .filter(|gc| !self.inventory_geocollections.contains(*gc))
                    .cloned()
                    .collect();
                if !extra.is_empty() {
                    return Err(RegionalError::GeocollectionsMismatch(extra).into());
                }
            }
            Variant::TwoSpatialScales => {}
            Variant::TwoSpatialScalesWithGenericLoading { loading } => {
                self.ctx.loading(loading)?;
            }
            Variant::ExtensionTables { xtable, limitations } => {
                self.ctx.extension_table(xtable)?;
                validate_limitations(limitations)?;
            }
            Variant::TopologicalExtensionTables { topocollection, xtable, limitations } => {
                self.ctx.extension_table(xtable)?;
                if self.ctx.topocollection(topocollection)?.empty {
                    return Err(RegionalError::TopologyError(format!(
                        "topocollection {topocollection} has no topographical mapping data"
                    )).into());
                }
                validate_limitations(limitations)?;
            }
        }
        Ok(())
    }

    /// Geocollection of the extension table of the variant.
    fn xtable_geocollection(&self) -> Option<&str> {
        match &self.variant {
            Variant::ExtensionTables { xtable, .. } | Variant::TopologicalExtensionTables { xtable, .. } => {
                self.ctx.extension_table(xtable).ok().map(|meta| meta.geocollection.as_str())
            }
            _ => None,
        }
    }

    /// `(source, target)` intersections the chain is built from.
    pub fn required_intersections(&self) -> Vec<(String, String)> {
        let xtable = self.xtable_geocollection().map(|gc| vec![gc.to_string()]).unwrap_or_default();
        match &self.variant {
            Variant::OneSpatialScale => Vec::new(),
            Variant::TwoSpatialScales | Variant::TwoSpatialScalesWithGenericLoading { .. } => {
                needed_intersections(&self.inventory_geocollections, &self.ia_geocollections)
            }
            Variant::ExtensionTables { .. } => {
                let mut pairs = needed_intersections(&self.inventory_geocollections, &xtable);
                pairs.extend(needed_intersections(&xtable, &self.ia_geocollections));
                pairs
            }
            Variant::TopologicalExtensionTables { topocollection, .. } => {
                let mut pairs = needed_intersections(&[topocollection.clone()], &xtable);
                pairs.extend(needed_intersections(&xtable, &self.ia_geocollections));
                pairs
            }
        }
    }

    /// Compute the inventory if it hasn't been computed yet.
    pub fn lci(&mut self) -> Result<&Inventory> {
        if self.inventory.is_none() {
            self.inventory = Some(Inventory::calculate(self.ctx, &self.demand, &self.databases)?);
        }
        self.inventory.as_ref().ok_or_else(|| RegionalError::NotCalculated.into())
    }

    /// Build every factor of the chain.
    pub fn load_lcia_data(&mut self) -> Result<()> {
        self.lci()?;
        let Some(inventory) = self.inventory.as_ref() else {
            return Err(RegionalError::NotCalculated.into());
        };
        let ctx = self.ctx;
        let method = self.method;
        let pairs = self.required_intersections();

        let (factors, scales) = match &self.variant {
            Variant::OneSpatialScale => {
                let m = build_inventory_mapping(ctx, inventory)?;
                let r = build_characterization(ctx, method, Some(&m.cols), inventory.flows())?;
                let scales = vec![ScaleSplit { scale: Scale::Inventory, split: 1, units: m.cols }];
                (vec![("inv_mapping", m.matrix), ("reg_cf", r.matrix)], scales)
            }
            Variant::TwoSpatialScales | Variant::TwoSpatialScalesWithGenericLoading { .. } => {
                let m = build_inventory_mapping(ctx, inventory)?;
                let r = build_characterization(ctx, method, None, inventory.flows())?;
                let g = build_geo_transform(ctx, &pairs, Some(&m.cols), Some(&r.rows))?;

                let mut factors = vec![("inv_mapping", m.matrix)];
                if let Variant::TwoSpatialScalesWithGenericLoading { loading } = &self.variant {
                    let l = build_loading(ctx, loading, &r.rows)?;
                    factors.push(("geo_transform_normalization", loading_normalization(&g.matrix, &l)));
                    factors.push(("geo_transform", g.matrix));
                    factors.push(("loading", l));
                } else {
                    factors.push(("geo_transform_normalization", row_normalization(&g.matrix)));
                    factors.push(("geo_transform", g.matrix));
                }
                let ia_split = factors.len() - 1;
                factors.push(("reg_cf", r.matrix));
                let scales = vec![
                    ScaleSplit { scale: Scale::Inventory, split: 1, units: m.cols },
                    ScaleSplit { scale: Scale::ImpactAssessment, split: ia_split, units: r.rows },
                ];
                (factors, scales)
            }
            Variant::ExtensionTables { xtable, limitations } => {
                let mut m = build_inventory_mapping(ctx, inventory)?;
                let (inv_xtable, xtable_ia) = pairs.split_at(self.inventory_geocollections.len());
                let d = build_distribution(ctx, inv_xtable, Some(&m.cols), None)?;
                let x = build_extension_table(ctx, xtable, &d.cols)?;
                let n_dx = row_normalization(&d.matrix.matmul(&x));
                let mut r = build_characterization(ctx, method, None, inventory.flows())?;
                let g = build_geo_transform(ctx, xtable_ia, Some(&d.cols), Some(&r.rows))?;
                let n_g = row_normalization(&g.matrix);

                for limitation in limitations {
                    match limitation.kind {
                        LimitationKind::Activities => m.matrix = limitation.apply_rows(&m.matrix, &m.rows),
                        LimitationKind::Flows => r.matrix = limitation.apply_cols(&r.matrix, &r.cols),
                    }
                }

                let factors = vec![
                    ("inv_mapping", m.matrix),
                    ("distribution_normalization", n_dx),
                    ("distribution", d.matrix),
                    ("xtable", x),
                    ("geo_transform_normalization", n_g),
                    ("geo_transform", g.matrix),
                    ("reg_cf", r.matrix),
                ];
                let scales = vec![
                    ScaleSplit { scale: Scale::Inventory, split: 1, units: m.cols },
                    ScaleSplit { scale: Scale::ExtensionTable, split: 4, units: d.cols },
                    ScaleSplit { scale: Scale::ImpactAssessment, split: 6, units: r.rows },
                ];
                (factors, scales)
            }
            Variant::TopologicalExtensionTables { topocollection, xtable, limitations } => {
                let mut mt = build_topological_mapping(ctx, inventory, topocollection)?;
                for limitation in limitations.iter().filter(|l| l.kind == LimitationKind::Activities) {
                    mt.matrix = limitation.apply_rows(&mt.matrix, &mt.rows);
                }
                let (topo_xtable, xtable_ia) = pairs.split_at(1);
                let d = build_distribution(ctx, topo_xtable, Some(&mt.cols), None)?;
                let x = build_extension_table(ctx, xtable, &d.cols)?;
                let n_t = row_normalization(&mt.matrix.matmul(&d.matrix).matmul(&x));
                let mut r = build_characterization(ctx, method, None, inventory.flows())?;
                for limitation in limitations.iter().filter(|l| l.kind == LimitationKind::Flows) {
                    r.matrix = limitation.apply_cols(&r.matrix, &r.cols);
                }
                let g = build_geo_transform(ctx, xtable_ia, Some(&d.cols), Some(&r.rows))?;
                let n_g = row_normalization(&g.matrix);

                let factors = vec![
                    ("topo_normalization", n_t),
                    ("topo_mapping", mt.matrix),
                    ("distribution", d.matrix),
                    ("xtable", x),
                    ("geo_transform_normalization", n_g),
                    ("geo_transform", g.matrix),
                    ("reg_cf", r.matrix),
                ];
                let scales = vec![
                    ScaleSplit { scale: Scale::ExtensionTable, split: 4, units: d.cols },
                    ScaleSplit { scale: Scale::ImpactAssessment, split: 6, units: r.rows },
                ];
                (factors, scales)
            }
        };

        for (name, matrix) in &factors {
            tracing::debug!(factor = name, shape = ?matrix.shape(), nnz = matrix.nnz(), "loaded factor");
        }
        self.factors = factors;
        self.scales = scales;
        self.characterized = None;
        Ok(())
    }

    /// Characterize the inventory: `(F₁ · … · Fₙ)ᵗ ⊙ inventory`.
    pub fn lcia_calculation(&mut self) -> Result<()> {
        if self.factors.is_empty() {
            self.load_lcia_data()?;
        }
        let inventory = self.inventory.as_ref().ok_or(RegionalError::NotCalculated)?;
        let chain = product(&self.factors).ok_or(RegionalError::NotCalculated)?;
        let characterized = chain.transpose().hadamard(inventory.matrix());
        tracing::info!(method = %self.method.name, score = characterized.sum(), "regionalized lcia");
        self.characterized = Some(characterized);
        Ok(())
    }

    /// Run the whole calculation and return the score.
    pub fn lcia(&mut self) -> Result<f64> {
        self.lci()?;
        self.load_lcia_data()?;
        self.lcia_calculation()?;
        self.score()
    }

    pub fn score(&self) -> Result<f64> {
        Ok(self.characterized_inventory()?.sum())
    }

    /// Flows × activities.
    pub fn characterized_inventory(&self) -> Result<&CsrMatrix> {
        self.characterized.as_ref().ok_or_else(|| RegionalError::NotCalculated.into())
    }

    pub fn inventory(&self) -> Option<&Inventory> { self.inventory.as_ref() }

    pub fn variant(&self) -> &Variant { &self.variant }

    pub fn databases(&self) -> &BTreeSet<String> { &self.databases }

    pub fn inventory_geocollections(&self) -> &[String] { &self.inventory_geocollections }

    pub fn ia_geocollections(&self) -> &[String] { &self.ia_geocollections }

    /// A factor of the loaded chain by name, e.g. `geo_transform`.
    pub fn factor(&self, name: &str) -> Option<&CsrMatrix> {
        self.factors.iter().find(|(n, _)| *n == name).map(|(_, m)| m)
    }

    /// Names of the loaded factors, in chain order.
    pub fn factor_names(&self) -> Vec<&'static str> { self.factors.iter().map(|(n, _)| *n).collect() }

    fn split(&self, scale: Scale) -> Result<&ScaleSplit> {
        if !self.variant.scales().contains(&scale) {
            return Err(RegionalError::ScaleUnavailable(scale.name()).into());
        }
        self.scales.iter()
            .find(|s| s.scale == scale)
            .ok_or_else(|| RegionalError::NotCalculated.into())
    }

    /// Spatial units of `scale`, in matrix order.
    pub fn spatial_units(&self, scale: Scale) -> Result<Vec<SpatialUnit>> {
        self.split(scale)?.units.keys().iter()
            .map(|&id| {
                self.ctx.reverse_geomap(id)
                    .cloned()
                    .ok_or_else(|| RegionalError::unknown("geomap id", id.to_string()).into())
            })
            .collect()
    }

    /// The characterized inventory read at `scale`: flows × units.
    pub fn results(&self, scale: Scale) -> Result<ScaleResults> {
        let split = self.split(scale)?;
        self.characterized_inventory()?;
        let inventory = self.inventory.as_ref().ok_or(RegionalError::NotCalculated)?;

        let (left, right) = self.factors.split_at(split.split);
        let left = product(left).ok_or(RegionalError::NotCalculated)?;
        let right = product(right).ok_or(RegionalError::NotCalculated)?;
        let matrix = right.transpose().hadamard(&inventory.matrix().matmul(&left));

        Ok(ScaleResults {
            scale,
            units: self.spatial_units(scale)?,
            flows: inventory.flows().clone(),
            matrix,
        })
    }

    pub fn results_inv_spatial_scale(&self) -> Result<ScaleResults> { self.results(Scale::Inventory) }

    pub fn results_xtable_spatial_scale(&self) -> Result<ScaleResults> { self.results(Scale::ExtensionTable) }

    pub fn results_ia_spatial_scale(&self) -> Result<ScaleResults> { self.results(Scale::ImpactAssessment) }
}

fn product(factors: &[Factor]) -> Option<CsrMatrix> {
    let ((_, first), rest) = factors.split_first()?;
    Some(rest.iter().fold(first.clone(), |acc, (_, m)| acc.matmul(m)))
}
