use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;

/// Observer rings with semantic meaning - synchronous (0-6) and asynchronous (7-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    DataPreparation = 0, // Load existing and parent records
    InputValidation = 1, // Field types, enums, bounds, required fields
    Security = 2,        // Ownership and role checks
    Business = 3,        // Domain rules
    Enrichment = 4,      // Derived fields, password hashing
    Database = 5,        // SQL execution
    PostDatabase = 6,    // Immediate processing after the write
    Audit = 7,           // Change tracking (async)
    Integration = 8,     // Aggregates and other follow-up work (async)
    Notification = 9,    // User notifications (async)
}

impl ObserverRing {
    pub const ALL: [ObserverRing; 10] = [
        ObserverRing::DataPreparation,
        ObserverRing::InputValidation,
        ObserverRing::Security,
        ObserverRing::Business,
        ObserverRing::Enrichment,
        ObserverRing::Database,
        ObserverRing::PostDatabase,
        ObserverRing::Audit,
        ObserverRing::Integration,
        ObserverRing::Notification,
    ];

    /// Check if ring executes synchronously (blocking)
    pub fn is_synchronous(&self) -> bool {
        (*self as u8) <= 6
    }

    /// Check if ring executes asynchronously (non-blocking)
    pub fn is_asynchronous(&self) -> bool {
        (*self as u8) >= 7
    }
}

/// Record mutations routed through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Base trait for all observers with metadata and applicability checks
pub trait Observer: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this observer belongs to
    fn ring(&self) -> ObserverRing;

    /// Check if observer applies to this operation
    fn applies_to_operation(&self, op: Operation) -> bool;

    /// Check if observer applies to this collection
    fn applies_to_schema(&self, _collection: &str) -> bool {
        true
    }

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Priority within ring (lower numbers execute first)
    fn priority(&self) -> u8 {
        50
    }
}

/// Rings 0-6: may modify the context; the first error aborts the operation
#[async_trait]
pub trait SyncObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}

/// Rings 7-9: run after commit on a read-only copy; errors are only logged
#[async_trait]
pub trait AsyncObserver: Observer {
    async fn execute(&self, ctx: &ObserverContext) -> Result<(), ObserverError>;
}

pub enum ObserverBox {
    Sync(Box<dyn SyncObserver>),
    Async(Arc<dyn AsyncObserver>),
}

impl ObserverBox {
    pub fn sync(observer: impl SyncObserver + 'static) -> Self {
        ObserverBox::Sync(Box::new(observer))
    }

    pub fn asynchronous(observer: impl AsyncObserver + 'static) -> Self {
        ObserverBox::Async(Arc::new(observer))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObserverBox::Sync(o) => o.name(),
            ObserverBox::Async(o) => o.name(),
        }
    }

    pub fn ring(&self) -> ObserverRing {
        match self {
            ObserverBox::Sync(o) => o.ring(),
            ObserverBox::Async(o) => o.ring(),
        }
    }

    pub fn applies_to_operation(&self, op: Operation) -> bool {
        match self {
            ObserverBox::Sync(o) => o.applies_to_operation(op),
            ObserverBox::Async(o) => o.applies_to_operation(op),
        }
    }

    pub fn applies_to_schema(&self, collection: &str) -> bool {
        match self {
            ObserverBox::Sync(o) => o.applies_to_schema(collection),
            ObserverBox::Async(o) => o.applies_to_schema(collection),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            ObserverBox::Sync(o) => o.timeout(),
            ObserverBox::Async(o) => o.timeout(),
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            ObserverBox::Sync(o) => o.priority(),
            ObserverBox::Async(o) => o.priority(),
        }
    }
}
