// Observer implementations organized by rings
// Each ring handles a specific phase of a record mutation

// Ring 0: Data Preparation - load the target and parent records
#[path = "0/record_loader.rs"]
pub mod record_loader;

// Ring 1: Input Validation
#[path = "1/field_validator.rs"]
pub mod field_validator;

// Ring 2: Security
#[path = "2/ownership_guard.rs"]
pub mod ownership_guard;

// Ring 3: Business Logic
#[path = "3/single_bootcamp.rs"]
pub mod single_bootcamp;

// Ring 4: Enrichment - derived and transformed fields
#[path = "4/password_hasher.rs"]
pub mod password_hasher;
#[path = "4/slug_generator.rs"]
pub mod slug_generator;

// Ring 5: Database - SQL execution
#[path = "5/sql_executor.rs"]
pub mod sql_executor;

// Ring 8: Integration - aggregate maintenance
#[path = "8/average_cost.rs"]
pub mod average_cost;

// Helper for registering observers (not ring-specific)
pub mod registry;
pub use registry::*;

pub use average_cost::AverageCostObserver;
pub use field_validator::FieldValidator;
pub use ownership_guard::OwnershipGuard;
pub use password_hasher::PasswordHasher;
pub use record_loader::RecordLoader;
pub use single_bootcamp::SingleBootcampRule;
pub use slug_generator::{slugify, SlugGenerator};
pub use sql_executor::SqlExecutor;
