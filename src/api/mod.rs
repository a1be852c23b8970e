//! HTTP API layer: handlers, routes, and authentication middleware

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::AppState;
pub use middleware::{auth_middleware, AuthUser};
pub use routes::create_routes;
