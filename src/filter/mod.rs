pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod operators;
pub mod pagination;
pub mod params;
pub mod plan;
pub mod types;

pub use error::FilterError;
pub use filter::Filter;
pub use params::parse_query_string;
pub use types::*;
