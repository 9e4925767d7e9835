use std::sync::Arc;

use sqlx::PgPool;

use crate::database::repository::Repository;
use crate::observer::{build_pipeline, ObserverPipeline};
use crate::services::AverageCostService;

/// Shared handles injected into every request as an `Extension`
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub repository: Repository,
    pub pipeline: Arc<ObserverPipeline>,
    pub average_cost: AverageCostService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let repository = Repository::new(pool.clone());
        let average_cost = AverageCostService::postgres(pool.clone());
        let pipeline = Arc::new(build_pipeline(repository.clone(), average_cost.clone()));
        Self {
            pool,
            repository,
            pipeline,
            average_cost,
        }
    }
}
