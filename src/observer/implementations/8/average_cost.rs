// Ring 8: Integration - refresh the owning bootcamp's averageCost after any course change
use std::time::Duration;

use async_trait::async_trait;

use crate::database::collections::COURSES;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{AsyncObserver, Observer, ObserverRing, Operation};
use crate::services::AverageCostService;

pub struct AverageCostObserver {
    service: AverageCostService,
}

impl AverageCostObserver {
    pub fn new(service: AverageCostService) -> Self {
        Self { service }
    }
}

impl Observer for AverageCostObserver {
    fn name(&self) -> &'static str {
        "AverageCostObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Integration
    }

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }

    fn applies_to_schema(&self, collection: &str) -> bool {
        collection == COURSES.name
    }

    fn timeout(&self) -> Duration {
        self.service.timeout()
    }
}

#[async_trait]
impl AsyncObserver for AverageCostObserver {
    async fn execute(&self, ctx: &ObserverContext) -> Result<(), ObserverError> {
        let bootcamp = ctx.record_uuid("bootcamp").ok_or_else(|| {
            ObserverError::SystemError(format!("Course {:?} has no bootcamp", ctx.record_id))
        })?;
        self.service.recompute(bootcamp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::manager::DatabaseError;
    use crate::observer::pipeline::ObserverPipeline;
    use crate::observer::traits::{ObserverBox, SyncObserver};
    use crate::services::CostStore;
    use serde_json::{json, Map};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    /// Stands in for the database ring: the course "row" points at `bootcamp`
    struct StoredCourse {
        bootcamp: Uuid,
    }

    impl Observer for StoredCourse {
        fn name(&self) -> &'static str {
            "StoredCourse"
        }

        fn ring(&self) -> ObserverRing {
            ObserverRing::Database
        }

        fn applies_to_operation(&self, _op: Operation) -> bool {
            true
        }
    }

    #[async_trait]
    impl SyncObserver for StoredCourse {
        async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
            ctx.result = Some(json!({ "id": Uuid::new_v4().to_string(), "bootcamp": self.bootcamp.to_string() }));
            Ok(())
        }
    }

    /// Fails every read
    struct OfflineStore;

    #[async_trait]
    impl CostStore for OfflineStore {
        async fn mean_tuition(&self, _bootcamp_id: Uuid) -> Result<Option<f64>, DatabaseError> {
            Err(DatabaseError::NotFound("store offline".into()))
        }

        async fn store_average_cost(&self, _id: Uuid, _average: Option<f64>) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    /// Courses per bootcamp, with every stored average kept in order
    #[derive(Default)]
    struct Ledger {
        tuition: Mutex<Vec<f64>>,
        stored: Mutex<Vec<Option<f64>>>,
    }

    #[async_trait]
    impl CostStore for Ledger {
        async fn mean_tuition(&self, _bootcamp_id: Uuid) -> Result<Option<f64>, DatabaseError> {
            let tuition = self.tuition.lock().unwrap();
            Ok((!tuition.is_empty()).then(|| tuition.iter().sum::<f64>() / tuition.len() as f64))
        }

        async fn store_average_cost(&self, _id: Uuid, average: Option<f64>) -> Result<(), DatabaseError> {
            self.stored.lock().unwrap().push(average);
            Ok(())
        }
    }

    fn pipeline(bootcamp: Uuid, store: Arc<dyn CostStore>) -> ObserverPipeline {
        let mut pipeline = ObserverPipeline::new();
        pipeline.register_observer(ObserverBox::sync(StoredCourse { bootcamp }));
        pipeline.register_observer(ObserverBox::asynchronous(AverageCostObserver::new(AverageCostService::new(
            store,
            Duration::from_secs(1),
        ))));
        pipeline
    }

    #[tokio::test]
    async fn aggregate_failure_never_fails_the_write() {
        let pipeline = pipeline(Uuid::new_v4(), Arc::new(OfflineStore));
        let result = pipeline.execute(ObserverContext::create(&COURSES, Map::new())).await.unwrap();
        assert_eq!(result.background.len(), 1);
        for handle in result.background {
            assert!(handle.await.is_ok());
        }
    }

    #[tokio::test]
    async fn concurrent_course_writes_settle_on_latest_courses() {
        let bootcamp = Uuid::new_v4();
        let store = Arc::new(Ledger::default());
        store.tuition.lock().unwrap().push(100.0);
        let pipeline = pipeline(bootcamp, store.clone());

        let mut background = Vec::new();
        for _ in 0..4 {
            let result = pipeline.execute(ObserverContext::create(&COURSES, Map::new())).await.unwrap();
            background.extend(result.background);
        }
        store.tuition.lock().unwrap().push(300.0);
        let last = pipeline.execute(ObserverContext::create(&COURSES, Map::new())).await.unwrap();
        background.extend(last.background);
        for handle in background {
            handle.await.unwrap();
        }

        let stored = store.stored.lock().unwrap();
        assert_eq!(stored.len(), 5);
        assert_eq!(stored.last(), Some(&Some(200.0)));
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl CostStore for Recorder {
        async fn mean_tuition(&self, bootcamp_id: Uuid) -> Result<Option<f64>, DatabaseError> {
            self.seen.lock().unwrap().push(bootcamp_id);
            Ok(Some(1000.0))
        }

        async fn store_average_cost(&self, _id: Uuid, _average: Option<f64>) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn deleted_course_recomputes_its_former_bootcamp() {
        let store = Arc::new(Recorder::default());
        let observer = AverageCostObserver::new(AverageCostService::new(store.clone(), Duration::from_secs(1)));

        let bootcamp = Uuid::new_v4();
        let mut ctx = ObserverContext::delete(&COURSES, Uuid::new_v4());
        ctx.existing = Some(json!({ "bootcamp": bootcamp.to_string() }));
        ctx.result = ctx.existing.clone();

        observer.execute(&ctx).await.unwrap();
        assert_eq!(*store.seen.lock().unwrap(), vec![bootcamp]);
    }

    #[tokio::test]
    async fn missing_bootcamp_is_reported() {
        let observer = AverageCostObserver::new(AverageCostService::new(
            Arc::new(Recorder::default()),
            Duration::from_secs(1),
        ));
        let ctx = ObserverContext::create(&COURSES, Map::new());
        assert!(observer.execute(&ctx).await.is_err());
    }
}
