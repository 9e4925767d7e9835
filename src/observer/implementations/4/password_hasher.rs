// Ring 4: Enrichment - replace plaintext passwords with an argon2 hash before storage
use async_trait::async_trait;
use serde_json::Value;

use crate::auth::password::hash_password;
use crate::database::collections::USERS;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

pub struct PasswordHasher;

impl Observer for PasswordHasher {
    fn name(&self) -> &'static str {
        "PasswordHasher"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_schema(&self, collection: &str) -> bool {
        collection == USERS.name
    }
}

#[async_trait]
impl SyncObserver for PasswordHasher {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let Some(plain) = ctx.changes.get("password").and_then(Value::as_str).map(str::to_owned) else {
            return Ok(());
        };

        // argon2 is CPU bound
        let hash = tokio::task::spawn_blocking(move || hash_password(&plain))
            .await
            .map_err(|e| ObserverError::SystemError(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| ObserverError::SystemError(e.to_string()))?;

        ctx.changes.insert("password".to_string(), Value::String(hash));
        Ok(())
    }
}
