//! Life cycle inventory: biosphere flows per activity, scaled by the supply.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use csrmat::CsrMatrix;

use crate::{
    context::SpatialContext,
    error::RegionalError,
    spatial::{IndexSpace, SpatialUnit},
};

use super::{ActivityKind, Key};

/// Transitive `depends` closure of `roots`, roots included.
pub fn dependency_closure<'a>(
    ctx: &SpatialContext,
    roots: impl IntoIterator<Item = &'a str>,
) -> Result<BTreeSet<String>> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<String> = roots.into_iter().map(str::to_string).collect();
    while let Some(name) = stack.pop() {
        if seen.contains(&name) {
            continue;
        }
        let database = ctx.database(&name)?;
        stack.extend(database.depends.iter().filter(|d| !seen.contains(*d)).cloned());
        seen.insert(name);
    }
    Ok(seen)
}

/// `B · diag(s)`: flows × activities, plus the index spaces of both axes.
#[derive(Debug, Clone)]
pub struct Inventory {
    activities: IndexSpace<Key>,
    flows: IndexSpace<Key>,
    locations: Vec<SpatialUnit>,
    supply: Vec<f64>,
    matrix: CsrMatrix,
}

impl Inventory {
    /// Inventory of `supply` over every process in `databases`.
    ///
    /// The activity space holds all processes of the databases, so activities
    /// outside the supply are present with zero supply.
    pub fn calculate(ctx: &SpatialContext, supply: &[(Key, f64)], databases: &BTreeSet<String>) -> Result<Self> {
        let mut processes = BTreeMap::new();
        let mut flow_keys = BTreeSet::new();
        for name in databases {
            let database = ctx.database(name)?;
            for activity in &database.activities {
                match activity.kind {
                    ActivityKind::Process => {
                        flow_keys.extend(activity.exchanges.iter().map(|e| e.input.clone()));
                        processes.insert(database.key(activity), activity);
                    }
                    ActivityKind::Emission => {
                        flow_keys.insert(database.key(activity));
                    }
                }
            }
        }

        let activities = IndexSpace::from_sorted(processes.keys().cloned());
        let flows = IndexSpace::from_sorted(flow_keys);

        let mut demand = vec![0.0; activities.len()];
        for (key, amount) in supply {
            let col = activities.get(key)
                .ok_or_else(|| RegionalError::unknown("activity", key.to_string()))?;
            demand[col] += amount;
        }

        let mut triplets = Vec::new();
        let mut locations = Vec::with_capacity(activities.len());
        for (col, activity) in processes.values().enumerate() {
            locations.push(activity.location());
            for exchange in &activity.exchanges {
                if let Some(row) = flows.get(&exchange.input) {
                    triplets.push((row, col, exchange.amount * demand[col]));
                }
            }
        }
        let matrix = CsrMatrix::from_triplets(flows.len(), activities.len(), triplets);
        tracing::debug!(
            flows = flows.len(),
            activities = activities.len(),
            nnz = matrix.nnz(),
            "calculated inventory"
        );

        Ok(Self { activities, flows, locations, supply: demand, matrix })
    }

    pub fn activities(&self) -> &IndexSpace<Key> { &self.activities }

    pub fn flows(&self) -> &IndexSpace<Key> { &self.flows }

    /// Location of the activity at `position` in the activity space.
    pub fn location(&self, position: usize) -> Option<&SpatialUnit> { self.locations.get(position) }

    pub fn locations(&self) -> &[SpatialUnit] { &self.locations }

    pub fn supply(&self) -> &[f64] { &self.supply }

    /// Flows × activities.
    pub fn matrix(&self) -> &CsrMatrix { &self.matrix }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryDatabase;

    fn context() -> SpatialContext {
        let mut ctx = SpatialContext::in_memory();
        ctx.add_database(InventoryDatabase::new("biosphere").emission("F").emission("G")).unwrap();
        ctx.add_database(
            InventoryDatabase::new("inventory")
                .with_depends(&["biosphere"])
                .process("U", "L", &[(Key::new("biosphere", "F"), 1.0), (Key::new("biosphere", "G"), 2.0)])
                .process("V", "M", &[(Key::new("biosphere", "F"), 4.0)]),
        ).unwrap();
        ctx
    }

    #[test]
    fn closure_follows_depends() {
        let ctx = context();
        let closure = dependency_closure(&ctx, ["inventory"]).unwrap();
        assert_eq!(closure.into_iter().collect::<Vec<_>>(), vec!["biosphere", "inventory"]);
        assert!(dependency_closure(&ctx, ["nowhere"]).is_err());
    }

    #[test]
    fn inventory_scales_exchanges_by_supply() {
        let ctx = context();
        let databases = dependency_closure(&ctx, ["inventory"]).unwrap();
        let inventory = Inventory::calculate(&ctx, &[(Key::new("inventory", "U"), 3.0)], &databases).unwrap();

        assert_eq!(inventory.matrix().shape(), (2, 2));
        assert_eq!(inventory.supply(), &[3.0, 0.0]);
        assert_eq!(inventory.matrix().sum(), 9.0);
        let g = inventory.flows().get(&Key::new("biosphere", "G")).unwrap();
        assert_eq!(inventory.matrix().get(g, 0), 6.0);
        assert_eq!(inventory.location(1), Some(&SpatialUnit::named("M")));
    }

    #[test]
    fn unknown_supply_key() {
        let ctx = context();
        let databases = dependency_closure(&ctx, ["inventory"]).unwrap();
        let err = Inventory::calculate(&ctx, &[(Key::new("inventory", "foo"), 1.0)], &databases).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegionalError>(),
            Some(RegionalError::UnknownObject { kind: "activity", .. })
        ));
    }
}
