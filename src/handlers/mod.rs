// handlers/mod.rs - one module per resource, mounted under /api/v1 by app.rs
//
// Reads go straight to the repository; every mutation is routed through the
// observer pipeline via utils::run_pipeline.

pub mod auth;
pub mod bootcamps;
pub mod courses;
pub mod reviews;
pub mod system;
pub mod users;
pub mod utils;
