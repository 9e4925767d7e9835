//! Maintains `bootcamp.averageCost` from the tuition of its courses.
//!
//! The stored value is the mean tuition rounded up to the next multiple of
//! ten, or unset when the bootcamp has no courses. Recomputations for the
//! same bootcamp are serialised so the last writer always saw the latest
//! committed set of courses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::database::manager::DatabaseError;

/// Storage the maintainer reads courses from and writes the aggregate to
#[async_trait]
pub trait CostStore: Send + Sync {
    /// Mean tuition over the bootcamp's courses, `None` when it has none
    async fn mean_tuition(&self, bootcamp_id: Uuid) -> Result<Option<f64>, DatabaseError>;

    /// Set (or unset with `None`) the stored average. A missing bootcamp is not an error.
    async fn store_average_cost(&self, bootcamp_id: Uuid, average: Option<f64>) -> Result<(), DatabaseError>;
}

pub struct PgCostStore {
    pool: PgPool,
}

impl PgCostStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CostStore for PgCostStore {
    async fn mean_tuition(&self, bootcamp_id: Uuid) -> Result<Option<f64>, DatabaseError> {
        let row = sqlx::query("SELECT AVG(\"tuition\") AS average FROM \"courses\" WHERE \"bootcamp_id\" = $1")
            .bind(bootcamp_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<Option<f64>, _>("average")?)
    }

    async fn store_average_cost(&self, bootcamp_id: Uuid, average: Option<f64>) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE \"bootcamps\" SET \"average_cost\" = $1 WHERE \"id\" = $2")
            .bind(average)
            .bind(bootcamp_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// `ceil(mean / 10) * 10`
pub fn round_up_to_ten(mean: f64) -> f64 {
    (mean / 10.0).ceil() * 10.0
}

#[derive(Clone)]
pub struct AverageCostService {
    store: Arc<dyn CostStore>,
    locks: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
    timeout: Duration,
}

impl AverageCostService {
    pub fn new(store: Arc<dyn CostStore>, timeout: Duration) -> Self {
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let timeout = Duration::from_millis(crate::config::config().aggregate.timeout_ms);
        Self::new(Arc::new(PgCostStore::new(pool)), timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Recompute and store the bootcamp's average cost, returning the stored value.
    /// Idempotent: running it twice on unchanged courses stores the same value.
    pub async fn recompute(&self, bootcamp_id: Uuid) -> Result<Option<f64>, DatabaseError> {
        let lease = self.lease(bootcamp_id);
        let _guard = lease.lock.lock().await;
        self.recompute_locked(bootcamp_id).await
    }

    async fn recompute_locked(&self, bootcamp_id: Uuid) -> Result<Option<f64>, DatabaseError> {
        let average = self.store.mean_tuition(bootcamp_id).await?.map(round_up_to_ten);
        self.store.store_average_cost(bootcamp_id, average).await?;
        debug!("Average cost for bootcamp {} set to {:?}", bootcamp_id, average);
        Ok(average)
    }

    fn lease(&self, bootcamp_id: Uuid) -> LockLease<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let lock = locks.entry(bootcamp_id).or_default().clone();
        LockLease { service: self, bootcamp_id, lock }
    }

    /// Drop the per-bootcamp lock once nobody else is waiting on it
    fn release(&self, bootcamp_id: Uuid, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // map entry + our handle
        if Arc::strong_count(lock) <= 2 {
            locks.remove(&bootcamp_id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

/// One caller's handle on a bootcamp lock. Dropping it, including when the
/// recompute future is cancelled by a timeout, prunes the lock map.
struct LockLease<'a> {
    service: &'a AverageCostService,
    bootcamp_id: Uuid,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        self.service.release(self.bootcamp_id, &self.lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory courses and bootcamps
    #[derive(Default)]
    struct MemoryStore {
        tuition: Mutex<HashMap<Uuid, Vec<f64>>>,
        stored: Mutex<HashMap<Uuid, Option<f64>>>,
        fail: bool,
    }

    impl MemoryStore {
        fn with_courses(bootcamp: Uuid, tuition: &[f64]) -> Self {
            let store = Self::default();
            store.tuition.lock().unwrap().insert(bootcamp, tuition.to_vec());
            store
        }

        fn stored(&self, bootcamp: Uuid) -> Option<Option<f64>> {
            self.stored.lock().unwrap().get(&bootcamp).copied()
        }
    }

    #[async_trait]
    impl CostStore for MemoryStore {
        async fn mean_tuition(&self, bootcamp_id: Uuid) -> Result<Option<f64>, DatabaseError> {
            if self.fail {
                return Err(DatabaseError::NotFound("store offline".into()));
            }
            let tuition = self.tuition.lock().unwrap();
            Ok(tuition
                .get(&bootcamp_id)
                .filter(|t| !t.is_empty())
                .map(|t| t.iter().sum::<f64>() / t.len() as f64))
        }

        async fn store_average_cost(&self, bootcamp_id: Uuid, average: Option<f64>) -> Result<(), DatabaseError> {
            self.stored.lock().unwrap().insert(bootcamp_id, average);
            Ok(())
        }
    }

    fn service(store: Arc<MemoryStore>) -> AverageCostService {
        AverageCostService::new(store, Duration::from_secs(1))
    }

    #[test]
    fn rounds_up_to_next_multiple_of_ten() {
        assert_eq!(round_up_to_ten(800.0), 800.0);
        assert_eq!(round_up_to_ten(800.333), 810.0);
        assert_eq!(round_up_to_ten(0.0), 0.0);
        assert_eq!(round_up_to_ten(1.0), 10.0);
    }

    #[tokio::test]
    async fn mean_of_courses_is_rounded_up() {
        let bootcamp = Uuid::new_v4();
        let store = Arc::new(MemoryStore::with_courses(bootcamp, &[500.0, 700.0, 1200.0]));
        let avg = service(store.clone()).recompute(bootcamp).await.unwrap();
        assert_eq!(avg, Some(800.0));
        assert_eq!(store.stored(bootcamp), Some(Some(800.0)));
    }

    #[tokio::test]
    async fn fractional_mean_rounds_up() {
        let bootcamp = Uuid::new_v4();
        let store = Arc::new(MemoryStore::with_courses(bootcamp, &[501.0, 700.0, 1200.0]));
        assert_eq!(service(store).recompute(bootcamp).await.unwrap(), Some(810.0));
    }

    #[tokio::test]
    async fn no_courses_unsets_the_average() {
        let bootcamp = Uuid::new_v4();
        let store = Arc::new(MemoryStore::with_courses(bootcamp, &[]));
        store.stored.lock().unwrap().insert(bootcamp, Some(900.0));
        assert_eq!(service(store.clone()).recompute(bootcamp).await.unwrap(), None);
        assert_eq!(store.stored(bootcamp), Some(None));
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let bootcamp = Uuid::new_v4();
        let store = Arc::new(MemoryStore::with_courses(bootcamp, &[1000.0, 2500.0]));
        let svc = service(store.clone());
        let first = svc.recompute(bootcamp).await.unwrap();
        let second = svc.recompute(bootcamp).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, Some(1750.0));
    }

    /// Never answers, so callers can only give up on it
    struct StalledStore;

    #[async_trait]
    impl CostStore for StalledStore {
        async fn mean_tuition(&self, _bootcamp_id: Uuid) -> Result<Option<f64>, DatabaseError> {
            std::future::pending().await
        }

        async fn store_average_cost(&self, _id: Uuid, _average: Option<f64>) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn store_failure_is_returned_and_lock_released() {
        let store = Arc::new(MemoryStore { fail: true, ..Default::default() });
        let svc = service(store);
        assert!(svc.recompute(Uuid::new_v4()).await.is_err());
        assert_eq!(svc.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn timed_out_recompute_releases_its_lock() {
        let svc = AverageCostService::new(Arc::new(StalledStore), Duration::from_secs(1));
        let outcome = tokio::time::timeout(Duration::from_millis(20), svc.recompute(Uuid::new_v4())).await;
        assert!(outcome.is_err());
        assert_eq!(svc.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn concurrent_recomputes_settle_on_latest_courses() {
        let bootcamp = Uuid::new_v4();
        let store = Arc::new(MemoryStore::with_courses(bootcamp, &[100.0]));
        let svc = service(store.clone());

        let spawn = |svc: &AverageCostService| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.recompute(bootcamp).await })
        };
        let handles: Vec<_> = (0..8).map(|_| spawn(&svc)).collect();
        store.tuition.lock().unwrap().insert(bootcamp, vec![100.0, 300.0]);
        let last = spawn(&svc);
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(last.await.unwrap().unwrap(), Some(200.0));

        assert_eq!(store.stored(bootcamp), Some(Some(200.0)));
        assert_eq!(svc.tracked_locks(), 0);
    }
}
