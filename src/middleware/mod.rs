pub mod auth;
pub mod response;

pub use auth::{expired_cookie, extract_token, token_cookie, AuthUser};
pub use response::{ApiResponse, ApiResult, ListResponse, ListResult};
