// Ring 5: Database - writes the prepared changes
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::database::repository::Repository;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

pub struct SqlExecutor {
    repository: Repository,
}

impl SqlExecutor {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

impl Observer for SqlExecutor {
    fn name(&self) -> &'static str {
        "SqlExecutor"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Database
    }

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }
}

/// Validated client changes plus server-assigned fields; assigned wins
pub fn write_set(ctx: &ObserverContext) -> Map<String, Value> {
    let mut data = ctx.changes.clone();
    for (field, value) in &ctx.assigned {
        data.insert(field.clone(), value.clone());
    }
    data
}

#[async_trait]
impl SyncObserver for SqlExecutor {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let collection = ctx.collection;
        let result = match ctx.operation {
            Operation::Create => self.repository.insert(collection, &write_set(ctx)).await?,
            Operation::Update => {
                let id = require_id(ctx)?;
                self.repository.update(collection, id, &write_set(ctx)).await?
            }
            Operation::Delete => {
                let id = require_id(ctx)?;
                if !self.repository.delete(collection, id).await? {
                    return Err(crate::database::repository::not_found(collection, id).into());
                }
                ctx.existing.clone().unwrap_or_else(|| serde_json::json!({ "id": id.to_string() }))
            }
        };
        let label = record_label(&result);
        tracing::info!("{:?} {} {}", ctx.operation, collection.singular, label);
        ctx.result = Some(result);
        Ok(())
    }
}

/// Id of the written record for log lines
fn record_label(record: &Value) -> &str {
    record.get("id").and_then(Value::as_str).unwrap_or("-")
}

fn require_id(ctx: &ObserverContext) -> Result<uuid::Uuid, ObserverError> {
    ctx.record_id
        .ok_or_else(|| ObserverError::SystemError(format!("{:?} requires a record id", ctx.operation)))
}
