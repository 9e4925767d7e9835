// Ring 2: Security - only owners (or admins) may touch a record or add children to it
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::observer::context::{Actor, ObserverContext};
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

pub struct OwnershipGuard;

impl Observer for OwnershipGuard {
    fn name(&self) -> &'static str {
        "OwnershipGuard"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Security
    }

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }
}

fn owned_by(record: Option<&Value>, field: &str, actor: &Actor) -> bool {
    record
        .and_then(|r| r.get(field))
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        == Some(actor.id)
}

#[async_trait]
impl SyncObserver for OwnershipGuard {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        // System callers and admins bypass ownership
        let Some(actor) = ctx.actor.filter(|a| !a.is_admin()) else {
            return Ok(());
        };

        match ctx.operation {
            Operation::Create => {
                let Some(parent_spec) = ctx.collection.parent.filter(|p| p.owner_only) else {
                    return Ok(());
                };
                if !owned_by(ctx.parent.as_ref(), "user", &actor) {
                    return Err(ObserverError::SecurityError(format!(
                        "User {} is not authorized to add a {} to {} {}",
                        actor.id,
                        ctx.collection.singular.to_lowercase(),
                        parent_spec.field,
                        ctx.parent_id.map(|id| id.to_string()).unwrap_or_default()
                    )));
                }
            }
            Operation::Update | Operation::Delete => {
                let Some(owner_field) = ctx.collection.owner_field else {
                    return Ok(());
                };
                if !owned_by(ctx.existing.as_ref(), owner_field, &actor) {
                    let verb = if ctx.operation == Operation::Update { "update" } else { "delete" };
                    return Err(ObserverError::SecurityError(format!(
                        "User {} is not authorized to {} this {}",
                        actor.id,
                        verb,
                        ctx.collection.singular.to_lowercase()
                    )));
                }
            }
        }
        Ok(())
    }
}
