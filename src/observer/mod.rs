// Observer system: every record mutation runs through a ring-ordered pipeline

pub mod context;
pub mod error;
pub mod implementations;
pub mod pipeline;
pub mod traits;

// Re-export core types
pub use context::*;
pub use error::*;
pub use implementations::build_pipeline;
pub use pipeline::*;
pub use traits::*;
