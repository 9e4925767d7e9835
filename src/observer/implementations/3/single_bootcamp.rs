// Ring 3: Business Logic - a publisher owns at most one bootcamp
use async_trait::async_trait;
use serde_json::Value;

use crate::database::collections::BOOTCAMPS;
use crate::database::repository::Repository;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

pub struct SingleBootcampRule {
    repository: Repository,
}

impl SingleBootcampRule {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

impl Observer for SingleBootcampRule {
    fn name(&self) -> &'static str {
        "SingleBootcampRule"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Business
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Create
    }

    fn applies_to_schema(&self, collection: &str) -> bool {
        collection == BOOTCAMPS.name
    }
}

#[async_trait]
impl SyncObserver for SingleBootcampRule {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let Some(actor) = ctx.actor.filter(|a| !a.is_admin()) else {
            return Ok(());
        };

        let published = self
            .repository
            .find_by_field(&BOOTCAMPS, "user", Value::String(actor.id.to_string()))
            .await?;
        if published.is_some() {
            return Err(ObserverError::ValidationError(format!(
                "The user with ID {} has already published a bootcamp",
                actor.id
            )));
        }
        Ok(())
    }
}
