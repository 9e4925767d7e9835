use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::observer::context::ObserverContext;
use crate::observer::error::{ObserverError, ObserverResult};
use crate::observer::traits::{AsyncObserver, ObserverBox, ObserverRing, SyncObserver};

/// Executes observers in ring order.
///
/// Synchronous rings (0-6) run in sequence and the first error aborts the
/// operation. Asynchronous rings (7-9) are spawned once the database ring
/// has produced a result; their failures are logged and never reach the
/// caller.
pub struct ObserverPipeline {
    observers: BTreeMap<ObserverRing, Vec<ObserverBox>>,
}

impl ObserverPipeline {
    pub fn new() -> Self {
        Self { observers: BTreeMap::new() }
    }

    /// Register an observer, keeping each ring ordered by priority
    pub fn register_observer(&mut self, observer: ObserverBox) {
        let ring = observer.ring();
        let name = observer.name();
        let ring_observers = self.observers.entry(ring).or_default();
        ring_observers.push(observer);
        ring_observers.sort_by_key(|o| o.priority());

        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    pub fn observer_names(&self, ring: ObserverRing) -> Vec<&'static str> {
        self.observers
            .get(&ring)
            .map(|obs| obs.iter().map(|o| o.name()).collect())
            .unwrap_or_default()
    }

    pub async fn execute(&self, mut ctx: ObserverContext) -> Result<ObserverResult, ObserverError> {
        let start_time = Instant::now();
        let mut rings_executed = Vec::new();

        tracing::debug!(
            "Observer pipeline starting: operation={:?}, collection={}",
            ctx.operation,
            ctx.collection.name
        );

        for ring in ObserverRing::ALL.into_iter().filter(|r| r.is_synchronous()) {
            ctx.current_ring = Some(ring);
            if self.execute_ring(ring, &mut ctx).await? {
                rings_executed.push(ring);
            }
        }

        let record = ctx.result.clone().ok_or_else(|| {
            ObserverError::SystemError(format!(
                "No database observer produced a result for {:?} on {}",
                ctx.operation, ctx.collection.name
            ))
        })?;

        let background = self.spawn_async_rings(&ctx, &mut rings_executed);

        Ok(ObserverResult {
            record,
            execution_time: start_time.elapsed(),
            rings_executed,
            background,
        })
    }

    /// Returns whether any observer in the ring ran
    async fn execute_ring(&self, ring: ObserverRing, ctx: &mut ObserverContext) -> Result<bool, ObserverError> {
        let Some(observers) = self.observers.get(&ring) else {
            return Ok(false);
        };

        let mut ran = false;
        for observer in observers {
            let ObserverBox::Sync(sync) = observer else { continue };
            if !applies(observer, ctx) {
                continue;
            }
            ran = true;
            run_sync(sync.as_ref(), ctx).await?;
        }
        Ok(ran)
    }

    fn spawn_async_rings(&self, ctx: &ObserverContext, rings_executed: &mut Vec<ObserverRing>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for ring in ObserverRing::ALL.into_iter().filter(|r| r.is_asynchronous()) {
            let Some(observers) = self.observers.get(&ring) else { continue };
            let mut ran = false;
            for observer in observers {
                let ObserverBox::Async(async_observer) = observer else { continue };
                if !applies(observer, ctx) {
                    continue;
                }
                ran = true;
                let mut snapshot = ctx.clone();
                snapshot.current_ring = Some(ring);
                handles.push(tokio::spawn(run_async(Arc::clone(async_observer), snapshot)));
            }
            if ran {
                rings_executed.push(ring);
            }
        }
        handles
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn applies(observer: &ObserverBox, ctx: &ObserverContext) -> bool {
    if !observer.applies_to_operation(ctx.operation) {
        tracing::trace!("Observer {} skipped for operation {:?}", observer.name(), ctx.operation);
        return false;
    }
    if !observer.applies_to_schema(ctx.collection.name) {
        tracing::trace!("Observer {} skipped for collection {}", observer.name(), ctx.collection.name);
        return false;
    }
    true
}

async fn run_sync(observer: &dyn SyncObserver, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
    let observer_start = Instant::now();
    match timeout(observer.timeout(), observer.execute(ctx)).await {
        Ok(Ok(())) => {
            tracing::debug!("Observer: {} completed in {:?}", observer.name(), observer_start.elapsed());
            Ok(())
        }
        Ok(Err(error)) => {
            tracing::debug!("Observer: {} rejected the operation: {}", observer.name(), error);
            Err(error)
        }
        Err(_) => {
            tracing::error!("Observer: {} timed out after {:?}", observer.name(), observer.timeout());
            Err(ObserverError::TimeoutError(format!(
                "Observer {} timed out after {:?}",
                observer.name(),
                observer.timeout()
            )))
        }
    }
}

async fn run_async(observer: Arc<dyn AsyncObserver>, ctx: ObserverContext) {
    let observer_start = Instant::now();
    match timeout(observer.timeout(), observer.execute(&ctx)).await {
        Ok(Ok(())) => {
            tracing::debug!("Observer: {} completed in {:?}", observer.name(), observer_start.elapsed());
        }
        Ok(Err(error)) => {
            tracing::error!(
                "Observer: {} failed for {} {:?}: {}",
                observer.name(),
                ctx.collection.name,
                ctx.record_id,
                error
            );
        }
        Err(_) => {
            tracing::error!("Observer: {} timed out after {:?}", observer.name(), observer.timeout());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::collections::COURSES;
    use crate::observer::traits::{Observer, Operation};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Step {
        name: &'static str,
        ring: ObserverRing,
        fail: bool,
    }

    impl Observer for Step {
        fn name(&self) -> &'static str {
            self.name
        }
        fn ring(&self) -> ObserverRing {
            self.ring
        }
        fn applies_to_operation(&self, _op: Operation) -> bool {
            true
        }
    }

    #[async_trait]
    impl SyncObserver for Step {
        async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
            if self.fail {
                return Err(ObserverError::ValidationError(format!("{} failed", self.name)));
            }
            let trail = ctx.changes.entry("trail").or_insert_with(|| Value::Array(vec![]));
            if let Value::Array(items) = trail {
                items.push(json!(self.name));
            }
            if self.ring == ObserverRing::Database {
                ctx.result = Some(json!({ "trail": ctx.changes["trail"].clone() }));
            }
            Ok(())
        }
    }

    struct Slow;

    impl Observer for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn ring(&self) -> ObserverRing {
            ObserverRing::Business
        }
        fn applies_to_operation(&self, _op: Operation) -> bool {
            true
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(10)
        }
    }

    #[async_trait]
    impl SyncObserver for Slow {
        async fn execute(&self, _ctx: &mut ObserverContext) -> Result<(), ObserverError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        }
    }

    struct Follow {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Observer for Follow {
        fn name(&self) -> &'static str {
            "follow"
        }
        fn ring(&self) -> ObserverRing {
            ObserverRing::Integration
        }
        fn applies_to_operation(&self, op: Operation) -> bool {
            op != Operation::Delete
        }
    }

    #[async_trait]
    impl AsyncObserver for Follow {
        async fn execute(&self, _ctx: &ObserverContext) -> Result<(), ObserverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ObserverError::SystemError("downstream unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn step(name: &'static str, ring: ObserverRing) -> ObserverBox {
        ObserverBox::sync(Step { name, ring, fail: false })
    }

    fn ctx() -> ObserverContext {
        ObserverContext::create(&COURSES, Map::new())
    }

    #[tokio::test]
    async fn rings_run_in_order_regardless_of_registration() {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(step("db", ObserverRing::Database));
        pipeline.register_observer(step("validate", ObserverRing::InputValidation));
        pipeline.register_observer(step("load", ObserverRing::DataPreparation));

        let result = pipeline.execute(ctx()).await.unwrap();
        assert_eq!(result.record["trail"], json!(["load", "validate", "db"]));
        assert_eq!(
            result.rings_executed,
            vec![ObserverRing::DataPreparation, ObserverRing::InputValidation, ObserverRing::Database]
        );
    }

    #[tokio::test]
    async fn first_error_stops_the_pipeline() {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(ObserverBox::sync(Step {
            name: "guard",
            ring: ObserverRing::Security,
            fail: true,
        }));
        pipeline.register_observer(step("db", ObserverRing::Database));

        let err = pipeline.execute(ctx()).await.unwrap_err();
        assert_eq!(err, ObserverError::ValidationError("guard failed".into()));
    }

    #[tokio::test]
    async fn slow_observer_times_out() {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(ObserverBox::sync(Slow));
        pipeline.register_observer(step("db", ObserverRing::Database));

        let err = pipeline.execute(ctx()).await.unwrap_err();
        assert!(matches!(err, ObserverError::TimeoutError(_)));
    }

    #[tokio::test]
    async fn missing_database_ring_is_a_system_error() {
        let pipeline = ObserverPipeline::new();
        assert!(matches!(pipeline.execute(ctx()).await, Err(ObserverError::SystemError(_))));
    }

    #[tokio::test]
    async fn async_failures_do_not_reach_the_caller() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(step("db", ObserverRing::Database));
        pipeline.register_observer(ObserverBox::asynchronous(Follow { calls: calls.clone(), fail: true }));

        let result = pipeline.execute(ctx()).await.unwrap();
        assert_eq!(result.background.len(), 1);
        for handle in result.background {
            handle.await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_observers_respect_operation_filter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(step("db", ObserverRing::Database));
        pipeline.register_observer(ObserverBox::asynchronous(Follow { calls: calls.clone(), fail: false }));

        let delete = ObserverContext::delete(&COURSES, uuid::Uuid::new_v4());
        let result = pipeline.execute(delete).await.unwrap();
        assert!(result.background.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
