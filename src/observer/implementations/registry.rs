// Helper for assembling the full pipeline used by the REST API
use crate::database::repository::Repository;
use crate::observer::pipeline::ObserverPipeline;
use crate::observer::traits::ObserverBox;
use crate::services::AverageCostService;

use super::{
    AverageCostObserver, FieldValidator, OwnershipGuard, PasswordHasher, RecordLoader, SingleBootcampRule,
    SlugGenerator, SqlExecutor,
};

/// Register every observer the API relies on
pub fn build_pipeline(repository: Repository, average_cost: AverageCostService) -> ObserverPipeline {
    let mut pipeline = ObserverPipeline::new();
    pipeline.register_observer(ObserverBox::sync(RecordLoader::new(repository.clone())));
    pipeline.register_observer(ObserverBox::sync(FieldValidator));
    pipeline.register_observer(ObserverBox::sync(OwnershipGuard));
    pipeline.register_observer(ObserverBox::sync(SingleBootcampRule::new(repository.clone())));
    pipeline.register_observer(ObserverBox::sync(SlugGenerator));
    pipeline.register_observer(ObserverBox::sync(PasswordHasher));
    pipeline.register_observer(ObserverBox::sync(SqlExecutor::new(repository)));
    pipeline.register_observer(ObserverBox::asynchronous(AverageCostObserver::new(average_cost)));
    pipeline
}
