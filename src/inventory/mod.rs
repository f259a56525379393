mod database;
mod lci;

pub use database::{
    Activity, ActivityKind, CharacterizationFactor, Exchange, GLOBAL_LOCATION, InventoryDatabase, Key, Method,
};
pub use lci::{Inventory, dependency_closure};
