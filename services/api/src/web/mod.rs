pub mod auth;
pub mod cache;
pub mod categories;
pub mod collections;
pub mod context;
pub mod extract;
pub mod middleware;
pub mod pipeline;
pub mod rate_limit;
pub mod recipes;
pub mod rest;
pub mod role_requests;
pub mod router;
pub mod state;
pub mod users;

// The binaries only need the router and the OpenAPI document.
pub use rest::ApiDoc;
pub use router::build_router;
