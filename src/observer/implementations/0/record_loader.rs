// Ring 0: Data Preparation - loads the target record and the parent record
use async_trait::async_trait;

use crate::database::collections;
use crate::database::repository::Repository;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

/// Loads `existing` for update/delete and `parent` for nested creates.
/// Either one missing is a 404.
pub struct RecordLoader {
    repository: Repository,
}

impl RecordLoader {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

impl Observer for RecordLoader {
    fn name(&self) -> &'static str {
        "RecordLoader"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::DataPreparation
    }

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }
}

#[async_trait]
impl SyncObserver for RecordLoader {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        match ctx.operation {
            Operation::Update | Operation::Delete => {
                let id = ctx.record_id.ok_or_else(|| {
                    ObserverError::SystemError(format!("{:?} requires a record id", ctx.operation))
                })?;
                let existing = self.repository.find_by_id_404(ctx.collection, id, None).await?;
                ctx.existing = Some(existing);
            }
            Operation::Create => {
                let (Some(parent_id), Some(parent_spec)) = (ctx.parent_id, ctx.collection.parent) else {
                    return Ok(());
                };
                let parent_collection = collections::lookup(parent_spec.collection).ok_or_else(|| {
                    ObserverError::SystemError(format!("Unknown parent collection {}", parent_spec.collection))
                })?;
                let parent = self
                    .repository
                    .find_by_id(parent_collection, parent_id, None)
                    .await?
                    .ok_or_else(|| {
                        ObserverError::NotFound(format!(
                            "No {} with the id of {}",
                            parent_collection.singular.to_lowercase(),
                            parent_id
                        ))
                    })?;
                ctx.parent = Some(parent);
            }
        }
        Ok(())
    }
}
