pub mod auth;
pub mod cache;
pub mod error;
pub mod rate_limit;
pub mod response;

pub use auth::{require_authority, session_binder, AuthBypass, AuthUser};
pub use cache::cache_aside;
pub use error::{recover_panic, route_not_found, translate_errors};
pub use rate_limit::{rate_limit, RateLimiter};
pub use response::{ApiResponse, ApiResult, RequestPath};
