pub mod average_cost;

pub use average_cost::{AverageCostService, CostStore, PgCostStore};
