use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::collections::CollectionSpec;
use crate::database::models::Role;
use crate::observer::traits::{ObserverRing, Operation};

/// Authenticated caller on whose behalf the pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// State that flows through every ring for a single record mutation
#[derive(Debug, Clone)]
pub struct ObserverContext {
    pub operation: Operation,
    pub collection: &'static CollectionSpec,

    /// Target record for update/delete
    pub record_id: Option<Uuid>,
    /// Parent record id for nested creates, e.g. the bootcamp of a new course
    pub parent_id: Option<Uuid>,
    /// None for trusted system callers such as the seeder
    pub actor: Option<Actor>,

    /// Client-supplied body, checked field by field in ring 1
    pub input: Map<String, Value>,
    /// Server-assigned fields (owner, parent reference); never client-writable
    pub assigned: Map<String, Value>,
    /// Final field set written in ring 5, keyed by API name
    pub changes: Map<String, Value>,

    /// Loaded in ring 0
    pub existing: Option<Value>,
    pub parent: Option<Value>,

    /// Populated by ring 5
    pub result: Option<Value>,

    pub start_time: Instant,
    pub current_ring: Option<ObserverRing>,
}

impl ObserverContext {
    fn new(operation: Operation, collection: &'static CollectionSpec) -> Self {
        Self {
            operation,
            collection,
            record_id: None,
            parent_id: None,
            actor: None,
            input: Map::new(),
            assigned: Map::new(),
            changes: Map::new(),
            existing: None,
            parent: None,
            result: None,
            start_time: Instant::now(),
            current_ring: None,
        }
    }

    pub fn create(collection: &'static CollectionSpec, input: Map<String, Value>) -> Self {
        Self { input, ..Self::new(Operation::Create, collection) }
    }

    pub fn update(collection: &'static CollectionSpec, id: Uuid, input: Map<String, Value>) -> Self {
        Self {
            input,
            record_id: Some(id),
            ..Self::new(Operation::Update, collection)
        }
    }

    pub fn delete(collection: &'static CollectionSpec, id: Uuid) -> Self {
        Self { record_id: Some(id), ..Self::new(Operation::Delete, collection) }
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        if let Some(owner) = self.collection.owner_field {
            if self.operation == Operation::Create {
                self.assigned.insert(owner.to_string(), Value::String(actor.id.to_string()));
            }
        }
        self
    }

    /// Attach to a parent record; the parent reference field is assigned from it
    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        if let Some(parent) = self.collection.parent {
            self.assigned
                .insert(parent.field.to_string(), Value::String(parent_id.to_string()));
        }
        self
    }

    pub fn assign(mut self, field: &str, value: Value) -> Self {
        self.assigned.insert(field.to_string(), value);
        self
    }

    /// Value of `field` in the stored record: the write result, else the pre-image
    pub fn record_field(&self, field: &str) -> Option<&Value> {
        self.result
            .as_ref()
            .and_then(|r| r.get(field))
            .or_else(|| self.existing.as_ref().and_then(|r| r.get(field)))
    }

    pub fn record_uuid(&self, field: &str) -> Option<Uuid> {
        self.record_field(field)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn execution_time(&self) -> Duration {
        self.start_time.elapsed()
    }
}
